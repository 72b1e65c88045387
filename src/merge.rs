//! Reconciling a translated catalog against a freshly extracted template.
//!
//! `update` rewrites the catalog's live message set to match the template's
//! keys while carrying prior translations across: exact key matches first,
//! then an approximate match over the translated candidates, and finally the
//! untranslated template message. Candidates matched neither way become
//! obsolete. This never fails on well-formed input; a missing match is a
//! normal outcome.

use std::collections::{HashMap, HashSet};

use crate::catalog::Catalog;
use crate::message::{Message, MessageKey, TranslationString};

/// Similarity floor for approximate matching.
const FUZZY_MATCH_CUTOFF: f64 = 0.6;

/// Updates `catalog` in place from `template`.
///
/// With `fuzzy_matching` enabled, a template message without an exact
/// `(id, context)` match takes its translation from the most similar
/// translated candidate, records that candidate's id as `previous_id`, and
/// is flagged fuzzy. An approximately matched candidate stays available as a
/// source for later template messages in the same pass; it only stops being
/// obsolete. The catalog's creation date is overwritten from the template;
/// its revision date is translator-owned and left untouched.
pub fn update(catalog: &mut Catalog, template: &Catalog, fuzzy_matching: bool) {
    let snapshot = catalog.take_messages();
    let mut by_key: HashMap<MessageKey, usize> = HashMap::new();
    for (index, message) in snapshot.iter().enumerate() {
        by_key.insert(message.key(), index);
    }

    // Approximate matching considers translated candidates only, keyed by
    // the normalized singular id with context ignored.
    let mut fuzzy_candidates: Vec<(String, MessageKey)> = Vec::new();
    if fuzzy_matching {
        for message in &snapshot {
            if !message.id.singular().is_empty() && message.is_translated() {
                fuzzy_candidates.push((fuzzy_match_key(message.id.singular()), message.key()));
            }
        }
    }

    let mut exact_consumed: HashSet<MessageKey> = HashSet::new();
    let mut fuzzy_consumed: HashSet<MessageKey> = HashSet::new();

    for template_message in template.iter() {
        if template_message.id.singular().is_empty() {
            continue;
        }
        let key = template_message.key();
        if let Some(&index) = by_key.get(&key) {
            exact_consumed.insert(key);
            merge_message(catalog, template_message, &snapshot[index], false);
            continue;
        }
        if fuzzy_matching {
            let wanted = fuzzy_match_key(template_message.id.singular());
            if let Some(old_key) = closest_match(&wanted, &fuzzy_candidates) {
                let index = by_key[&old_key];
                fuzzy_consumed.insert(old_key);
                merge_message(catalog, template_message, &snapshot[index], true);
                continue;
            }
        }
        catalog.add(template_message.clone());
    }

    for message in snapshot {
        let key = message.key();
        if !exact_consumed.contains(&key) && !fuzzy_consumed.contains(&key) {
            catalog.add_obsolete(message);
        }
    }

    catalog.creation_date = template.creation_date.clone();
}

/// Carries `old`'s translation into the template message, coercing the
/// translation shape when the pluralizable-ness changed and flagging the
/// result fuzzy for any approximate or shape-changing merge. The old
/// message's user comments are translator-owned and survive; locations,
/// auto comments, and flags come from the template.
fn merge_message(catalog: &mut Catalog, template_message: &Message, old: &Message, fuzzy: bool) {
    let mut message = template_message.clone();
    let mut fuzzy = fuzzy;
    if fuzzy {
        message.previous_id = Some(old.id.clone());
    }

    message.string = match (&message.id, &old.string) {
        (TranslationString::Plural(_), TranslationString::Plural(old_forms)) => {
            let mut forms = old_forms.clone();
            forms.resize(catalog.num_plurals(), String::new());
            TranslationString::Plural(forms)
        }
        (TranslationString::Plural(_), TranslationString::Singular(old_form)) => {
            fuzzy = true;
            let mut forms = vec![old_form.clone()];
            forms.resize(catalog.num_plurals(), String::new());
            TranslationString::Plural(forms)
        }
        (TranslationString::Singular(_), TranslationString::Plural(old_forms)) => {
            fuzzy = true;
            TranslationString::Singular(old_forms.first().cloned().unwrap_or_default())
        }
        (TranslationString::Singular(_), TranslationString::Singular(old_form)) => {
            TranslationString::Singular(old_form.clone())
        }
    };

    if fuzzy {
        message.flags.insert("fuzzy".to_string());
    }
    message.user_comments = old.user_comments.clone();
    catalog.add(message);
}

/// Normalizes an id for approximate matching: lowercased, surrounding
/// whitespace stripped, context ignored.
fn fuzzy_match_key(id: &str) -> String {
    id.trim().to_lowercase()
}

/// The single candidate most similar to `wanted` at or above the cutoff;
/// earlier candidates win ties.
fn closest_match(wanted: &str, candidates: &[(String, MessageKey)]) -> Option<MessageKey> {
    let mut best: Option<(f64, &MessageKey)> = None;
    for (candidate, key) in candidates {
        let score = similarity_ratio(wanted, candidate);
        if score >= FUZZY_MATCH_CUTOFF && best.map_or(true, |(s, _)| score > s) {
            best = Some((score, key));
        }
    }
    best.map(|(_, key)| key.clone())
}

/// Sequence similarity in `[0, 1]`: twice the total length of the matching
/// blocks over the combined length.
pub(crate) fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let mut b_positions: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &ch) in b.iter().enumerate() {
        b_positions.entry(ch).or_default().push(j);
    }

    let mut matched = 0usize;
    let mut regions = vec![(0usize, a.len(), 0usize, b.len())];
    while let Some((alo, ahi, blo, bhi)) = regions.pop() {
        let (i, j, size) = longest_match(&a, &b_positions, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        regions.push((alo, i, blo, j));
        regions.push((i + size, ahi, j + size, bhi));
    }
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

/// Longest block of `a[alo..ahi]` also appearing in `b[blo..bhi]`, returned
/// as `(start_in_a, start_in_b, length)`.
fn longest_match(
    a: &[char],
    b_positions: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0usize);
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();
    for i in alo..ahi {
        let mut new_runs: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b_positions.get(&a[i]) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let length = if j > blo {
                    run_lengths.get(&(j - 1)).copied().unwrap_or(0) + 1
                } else {
                    1
                };
                new_runs.insert(j, length);
                if length > best.2 {
                    best = (i + 1 - length, j + 1 - length, length);
                }
            }
        }
        run_lengths = new_runs;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translated(id: &str, string: &str) -> Message {
        Message::new(id.into(), Some(string.into()))
    }

    #[test]
    fn test_similarity_ratio() {
        assert!((similarity_ratio("Color", "Color") - 1.0).abs() < 1e-9);
        let close = similarity_ratio("color", "colour");
        assert!(close > 0.9, "got {}", close);
        assert!(similarity_ratio("Color", "Elephant") < 0.6);
        assert!((similarity_ratio("", "") - 1.0).abs() < 1e-9);
        assert_eq!(similarity_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_exact_match_keeps_translation() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(translated("Hello", "Hallo"));

        let mut template = Catalog::new(None, None);
        template.add(Message::new("Hello".into(), None));

        update(&mut catalog, &template, true);
        let msg = catalog.get("Hello", None).unwrap();
        assert_eq!(msg.string.singular(), "Hallo");
        assert!(!msg.is_fuzzy());
        assert_eq!(catalog.obsolete_len(), 0);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut catalog = Catalog::new(Some("de"), None);
        let mut msg = translated("Hello", "Hallo");
        msg.add_location("main.rs", 4);
        msg.user_comments.push("checked by hand".to_string());
        catalog.add(msg);
        catalog.add(translated("Bye", "Tschüss"));

        let copy = catalog.clone();
        update(&mut catalog, &copy, true);

        assert_eq!(catalog.len(), copy.len());
        assert_eq!(catalog.obsolete_len(), 0);
        for message in copy.iter() {
            let updated = catalog
                .get(message.id.singular(), message.context.as_deref())
                .unwrap();
            assert_eq!(updated, message);
        }
    }

    #[test]
    fn test_approximate_match_carries_translation() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(translated("Color", "Farbe"));

        let mut template = Catalog::new(None, None);
        template.add(Message::new("Colour".into(), None));

        update(&mut catalog, &template, true);

        assert!(catalog.get("Color", None).is_none());
        let msg = catalog.get("Colour", None).unwrap();
        assert_eq!(msg.string.singular(), "Farbe");
        assert!(msg.is_fuzzy());
        assert_eq!(
            msg.previous_id,
            Some(TranslationString::Singular("Color".to_string()))
        );
        // Approximately consumed, so not obsolete either.
        assert_eq!(catalog.obsolete_len(), 0);
    }

    #[test]
    fn test_fuzzy_matching_disabled() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(translated("Color", "Farbe"));

        let mut template = Catalog::new(None, None);
        template.add(Message::new("Colour".into(), None));

        update(&mut catalog, &template, false);

        let msg = catalog.get("Colour", None).unwrap();
        assert!(!msg.is_translated());
        assert!(!msg.is_fuzzy());
        assert!(catalog.get_obsolete("Color", None).is_some());
    }

    #[test]
    fn test_untranslated_candidates_not_fuzzy_sources() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new("Color".into(), None));

        let mut template = Catalog::new(None, None);
        template.add(Message::new("Colour".into(), None));

        update(&mut catalog, &template, true);
        let msg = catalog.get("Colour", None).unwrap();
        assert!(!msg.is_fuzzy());
        assert!(msg.previous_id.is_none());
    }

    #[test]
    fn test_fuzzy_source_reused_within_one_pass() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(translated("Color", "Farbe"));

        let mut template = Catalog::new(None, None);
        template.add(Message::new("Colour".into(), None));
        template.add(Message::new("Colors".into(), None));

        update(&mut catalog, &template, true);

        assert_eq!(
            catalog.get("Colour", None).unwrap().string.singular(),
            "Farbe"
        );
        assert_eq!(
            catalog.get("Colors", None).unwrap().string.singular(),
            "Farbe"
        );
        assert_eq!(catalog.obsolete_len(), 0);
    }

    #[test]
    fn test_singular_to_plural_pads_and_flags_fuzzy() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(translated("foo", "Voh"));

        let mut template = Catalog::new(None, None);
        template.add(Message::new(("foo", "foos").into(), None));

        update(&mut catalog, &template, true);

        let msg = catalog.get("foo", None).unwrap();
        assert!(msg.is_fuzzy());
        assert_eq!(msg.string.forms().len(), catalog.num_plurals());
        assert_eq!(msg.string.forms()[0], "Voh");
        assert_eq!(msg.string.forms()[1], "");
    }

    #[test]
    fn test_plural_to_singular_collapses_and_flags_fuzzy() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new(
            ("foo", "foos").into(),
            Some(vec!["Voh".to_string(), "Vohs".to_string()].into()),
        ));

        let mut template = Catalog::new(None, None);
        template.add(Message::new("foo".into(), None));

        update(&mut catalog, &template, true);

        let msg = catalog.get("foo", None).unwrap();
        assert!(msg.is_fuzzy());
        assert_eq!(msg.string, TranslationString::Singular("Voh".to_string()));
    }

    #[test]
    fn test_unmatched_candidates_become_obsolete() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(translated("stays", "bleibt"));
        catalog.add(translated("completely unrelated", "anders"));

        let mut template = Catalog::new(None, None);
        template.add(Message::new("stays".into(), None));

        update(&mut catalog, &template, true);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.obsolete_len(), 1);
        let obsolete = catalog.get_obsolete("completely unrelated", None).unwrap();
        assert_eq!(obsolete.string.singular(), "anders");
        assert!(catalog.get("completely unrelated", None).is_none());
    }

    #[test]
    fn test_creation_date_from_template_revision_kept() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.creation_date = "2020-01-01 00:00+0000".to_string();
        catalog.revision_date = "2023-05-05 10:00+0000".to_string();
        catalog.add(translated("Hello", "Hallo"));

        let mut template = Catalog::new(None, None);
        template.creation_date = "2024-06-06 06:00+0000".to_string();
        template.add(Message::new("Hello".into(), None));

        update(&mut catalog, &template, true);
        assert_eq!(catalog.creation_date, "2024-06-06 06:00+0000");
        assert_eq!(catalog.revision_date, "2023-05-05 10:00+0000");
    }

    #[test]
    fn test_user_comments_survive_locations_follow_template() {
        let mut catalog = Catalog::new(Some("de"), None);
        let mut old = translated("Hello", "Hallo");
        old.user_comments.push("reviewed".to_string());
        old.add_location("old.rs", 1);
        catalog.add(old);

        let mut template = Catalog::new(None, None);
        let mut fresh = Message::new("Hello".into(), None);
        fresh.add_location("new.rs", 42);
        fresh.auto_comments.push("extracted".to_string());
        template.add(fresh);

        update(&mut catalog, &template, true);
        let msg = catalog.get("Hello", None).unwrap();
        assert_eq!(msg.user_comments, vec!["reviewed"]);
        assert_eq!(msg.locations, vec![("new.rs".to_string(), 42)]);
        assert_eq!(msg.auto_comments, vec!["extracted"]);
    }

    #[test]
    fn test_context_respected_for_exact_matches() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(translated("May", "Mai").with_context(Some("month")));

        let mut template = Catalog::new(None, None);
        template.add(Message::new("May".into(), None).with_context(Some("verb")));

        update(&mut catalog, &template, true);

        // Different context is not an exact match, but the id is similar
        // enough for an approximate one.
        let msg = catalog.get("May", Some("verb")).unwrap();
        assert!(msg.is_fuzzy());
        assert_eq!(msg.string.singular(), "Mai");
    }
}
