//! Plural rule resolution.
//!
//! A catalog needs to know, for its locale, how many plural categories exist
//! and which C-style expression selects a category from a count (the value of
//! the `Plural-Forms` header). The `PluralRuleProvider` trait is the seam for
//! that collaborator; the default implementation combines a table of gettext
//! selector expressions for common languages with ICU cardinal rules for the
//! category count.

use icu_locale::Locale;
use icu_plurals::{PluralCategory, PluralRuleType, PluralRules};

/// The rule used when a locale is unknown: two categories, `n != 1`.
pub const DEFAULT_PLURAL_RULE: (usize, &str) = (2, "(n != 1)");

/// Resolves the plural arity and selector expression for a locale.
///
/// Implementations must not fail: an unrecognized locale resolves to the
/// default two-category rule.
pub trait PluralRuleProvider {
    /// Returns `(category_count, selector_expression)` for the locale.
    fn plural_rule(&self, locale: &str) -> (usize, String);
}

/// Default provider backed by a gettext expression table and ICU plural
/// rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcuPluralRuleProvider;

impl PluralRuleProvider for IcuPluralRuleProvider {
    fn plural_rule(&self, locale: &str) -> (usize, String) {
        let language = primary_language(locale);
        if let Some((count, expr)) = known_rule(&language) {
            return (count, expr.to_string());
        }
        // No known selector expression. ICU can still tell us the category
        // count; a count of one has the trivial selector, anything else
        // falls back to the two-category default.
        match icu_category_count(locale) {
            Some(1) => (1, "0".to_string()),
            _ => (DEFAULT_PLURAL_RULE.0, DEFAULT_PLURAL_RULE.1.to_string()),
        }
    }
}

/// Resolves a locale with the default provider.
pub fn plural_rule(locale: &str) -> (usize, String) {
    IcuPluralRuleProvider.plural_rule(locale)
}

/// The lowercased primary language subtag: `"de_DE"` and `"de-AT"` both
/// yield `"de"`.
fn primary_language(locale: &str) -> String {
    locale
        .split(['_', '-'])
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// gettext `Plural-Forms` rules for common languages. The count and the
/// expression must agree; expressions follow the conventions of the gettext
/// tools.
fn known_rule(language: &str) -> Option<(usize, &'static str)> {
    let rule = match language {
        "ja" | "zh" | "ko" | "vi" | "th" | "id" | "ms" => (1, "0"),
        "en" | "de" | "nl" | "sv" | "da" | "no" | "nb" | "nn" | "fi" | "et" | "el" | "eo"
        | "hu" | "it" | "es" | "ca" | "gl" | "eu" | "bg" | "sq" | "hi" | "bn" | "ta" | "te"
        | "ml" | "kn" | "mr" | "gu" | "pa" | "ur" | "fa" | "he" | "az" | "ka" | "mn" => {
            (2, "(n != 1)")
        }
        "fr" | "oc" | "tr" | "pt" | "fil" | "tl" | "am" => (2, "(n > 1)"),
        "ru" | "uk" | "be" | "sr" | "hr" | "bs" => (
            3,
            "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)",
        ),
        "pl" => (
            3,
            "(n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)",
        ),
        "cs" | "sk" => (3, "(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2"),
        "lt" => (
            3,
            "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && (n%100<10 || n%100>=20) ? 1 : 2)",
        ),
        "lv" => (3, "(n%10==1 && n%100!=11 ? 0 : n != 0 ? 1 : 2)"),
        "ro" => (
            3,
            "(n==1 ? 0 : (n==0 || (n%100 > 0 && n%100 < 20)) ? 1 : 2)",
        ),
        "sl" => (
            4,
            "(n%100==1 ? 0 : n%100==2 ? 1 : n%100==3 || n%100==4 ? 2 : 3)",
        ),
        "ga" => (5, "(n==1 ? 0 : n==2 ? 1 : n<7 ? 2 : n<11 ? 3 : 4)"),
        "ar" => (
            6,
            "(n==0 ? 0 : n==1 ? 1 : n==2 ? 2 : n%100>=3 && n%100<=10 ? 3 : n%100>=11 ? 4 : 5)",
        ),
        _ => return None,
    };
    Some(rule)
}

/// Counts the cardinal plural categories of a locale via ICU.
///
/// Each category is probed with representative values chosen to trigger that
/// form across languages; `None` if the locale cannot be parsed or rules
/// cannot be loaded.
fn icu_category_count(locale_str: &str) -> Option<usize> {
    let locale: Locale = locale_str.replace('_', "-").parse().ok()?;
    let pr = PluralRules::try_new(locale.into(), PluralRuleType::Cardinal.into()).ok()?;

    let test_values_by_category = [
        (PluralCategory::Zero, vec![0u32]),
        (PluralCategory::One, vec![1u32, 21, 31, 41]),
        (PluralCategory::Two, vec![2u32, 22, 32]),
        (PluralCategory::Few, vec![3u32, 4, 23, 24]),
        (PluralCategory::Many, vec![5u32, 11, 101]),
        (PluralCategory::Other, vec![6u32, 7, 8, 9, 10, 25, 100, 1000]),
    ];

    let mut count = 0;
    for (expected_category, test_values) in test_values_by_category.iter() {
        for &test_value in test_values {
            if pr.category_for(test_value as usize) == *expected_category {
                count += 1;
                break;
            }
        }
    }
    Some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_two_forms() {
        let (count, expr) = plural_rule("en");
        assert_eq!(count, 2);
        assert_eq!(expr, "(n != 1)");
    }

    #[test]
    fn test_region_subtag_ignored() {
        assert_eq!(plural_rule("de_DE"), plural_rule("de"));
        assert_eq!(plural_rule("pt-BR"), plural_rule("pt"));
    }

    #[test]
    fn test_japanese_single_form() {
        let (count, expr) = plural_rule("ja");
        assert_eq!(count, 1);
        assert_eq!(expr, "0");
    }

    #[test]
    fn test_russian_three_forms() {
        let (count, _) = plural_rule("ru");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_arabic_six_forms() {
        let (count, _) = plural_rule("ar");
        assert_eq!(count, 6);
    }

    #[test]
    fn test_unknown_locale_falls_back() {
        let (count, expr) = plural_rule("not-a-locale-at-all");
        assert_eq!((count, expr.as_str()), DEFAULT_PLURAL_RULE);
    }

    #[test]
    fn test_primary_language_extraction() {
        assert_eq!(primary_language("zh_Hans_CN"), "zh");
        assert_eq!(primary_language("SR-Latn"), "sr");
        assert_eq!(primary_language(""), "");
    }
}
