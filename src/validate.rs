//! Advisory catalog validation.
//!
//! A validation pass walks every live message through a set of named
//! checkers and collects issues without altering the catalog. Whether an
//! issue is a warning or a hard failure is the caller's decision. Checkers
//! are plain functions registered by name in a `CheckerRegistry`; extension
//! checks are added through explicit registration.

use crate::catalog::Catalog;
use crate::message::{extract_placeholders, Message, MessageKey, TranslationString};

/// One advisory finding about a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Key of the offending message
    pub key: MessageKey,
    /// Name of the checker that produced the finding
    pub checker: String,
    pub description: String,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key.context {
            Some(context) => write!(
                f,
                "{} (context \"{}\"): {}",
                self.key.id, context, self.description
            ),
            None => write!(f, "{}: {}", self.key.id, self.description),
        }
    }
}

/// A checker inspects one message and returns its findings as descriptions.
pub type Checker = fn(&Catalog, &Message) -> Vec<String>;

/// Named collection of checkers applied by [`CheckerRegistry::validate`].
pub struct CheckerRegistry {
    checkers: Vec<(String, Checker)>,
}

impl CheckerRegistry {
    /// An empty registry with no checks.
    pub fn new() -> Self {
        CheckerRegistry {
            checkers: Vec::new(),
        }
    }

    /// The built-in checks: plural arity and printf placeholder parity.
    pub fn with_defaults() -> Self {
        let mut registry = CheckerRegistry::new();
        registry.register("num-plurals", check_num_plurals);
        registry.register("python-format", check_python_format);
        registry
    }

    /// Registers a checker under a name; a later registration with the same
    /// name replaces the earlier one.
    pub fn register(&mut self, name: &str, checker: Checker) {
        self.checkers.retain(|(existing, _)| existing != name);
        self.checkers.push((name.to_string(), checker));
    }

    pub fn names(&self) -> Vec<&str> {
        self.checkers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Runs every checker over every live message. The catalog is not
    /// modified.
    pub fn validate(&self, catalog: &Catalog) -> Vec<Issue> {
        let mut issues = Vec::new();
        for message in catalog.iter() {
            for (name, checker) in &self.checkers {
                for description in checker(catalog, message) {
                    issues.push(Issue {
                        key: message.key(),
                        checker: name.clone(),
                        description,
                    });
                }
            }
        }
        issues
    }
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        CheckerRegistry::with_defaults()
    }
}

/// Validates a catalog with the built-in checkers.
pub fn validate(catalog: &Catalog) -> Vec<Issue> {
    CheckerRegistry::with_defaults().validate(catalog)
}

/// A pluralizable translation must have one form per catalog plural
/// category.
fn check_num_plurals(catalog: &Catalog, message: &Message) -> Vec<String> {
    if !message.is_pluralizable() {
        return Vec::new();
    }
    let found = match &message.string {
        TranslationString::Plural(forms) => forms.len(),
        TranslationString::Singular(_) => 1,
    };
    if found != catalog.num_plurals() {
        vec![format!(
            "catalog declares {} plural forms, translation has {}",
            catalog.num_plurals(),
            found
        )]
    } else {
        Vec::new()
    }
}

/// Printf placeholders in a translation must agree with its id: named
/// placeholders must all exist in the id, positional ones must match in
/// number and conversion type. Only messages carrying the `python-format`
/// flag are checked, and only non-empty translated forms.
fn check_python_format(_catalog: &Catalog, message: &Message) -> Vec<String> {
    if !message.flags.contains("python-format") {
        return Vec::new();
    }
    let id_forms = message.id.forms();
    let string_forms = message.string.forms();

    let mut issues = Vec::new();
    for (index, translation) in string_forms.iter().enumerate() {
        if translation.is_empty() {
            continue;
        }
        let id_form = id_forms[index.min(id_forms.len() - 1)];
        if let Some(description) = placeholder_mismatch(id_form, translation) {
            issues.push(description);
        }
    }
    issues
}

fn placeholder_mismatch(id: &str, translation: &str) -> Option<String> {
    let id_specs = extract_placeholders(id);
    let translation_specs = extract_placeholders(translation);
    if id_specs.is_empty() && translation_specs.is_empty() {
        return None;
    }

    let named = id_specs.iter().any(|(name, _)| name.is_some())
        || translation_specs.iter().any(|(name, _)| name.is_some());
    if named {
        for (name, conv) in &translation_specs {
            match name {
                Some(name) => {
                    if !id_specs
                        .iter()
                        .any(|(id_name, _)| id_name.as_deref() == Some(name.as_str()))
                    {
                        return Some(format!("unknown named placeholder %({}){}", name, conv));
                    }
                }
                None => {
                    return Some(
                        "positional placeholder mixed into named placeholders".to_string(),
                    );
                }
            }
        }
        return None;
    }

    if id_specs.len() != translation_specs.len() {
        return Some(format!(
            "placeholder count differs: id has {}, translation has {}",
            id_specs.len(),
            translation_specs.len()
        ));
    }
    for ((_, id_conv), (_, tr_conv)) in id_specs.iter().zip(translation_specs.iter()) {
        if id_conv != tr_conv {
            return Some(format!(
                "placeholder type mismatch: %{} vs %{}",
                id_conv, tr_conv
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_catalog_has_no_issues() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new("Hello %s".into(), Some("Hallo %s".into())));
        catalog.add(Message::new(
            ("%d file", "%d files").into(),
            Some(vec!["%d Datei".to_string(), "%d Dateien".to_string()].into()),
        ));
        assert!(validate(&catalog).is_empty());
    }

    #[test]
    fn test_plural_count_mismatch_reported() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new(("one", "many").into(), None));
        // The rule changes after the message was sized, leaving a mismatch.
        catalog.set_plural_rule(3, "(n != 1)");

        let issues = validate(&catalog);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].checker, "num-plurals");
        assert!(issues[0].description.contains("3 plural forms"));
    }

    #[test]
    fn test_missing_positional_placeholder_reported() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new("%d items".into(), Some("Artikel".into())));

        let issues = validate(&catalog);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].checker, "python-format");
        assert!(issues[0].description.contains("count differs"));
    }

    #[test]
    fn test_placeholder_type_mismatch_reported() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new("%d items".into(), Some("%s Artikel".into())));
        let issues = validate(&catalog);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].description.contains("type mismatch"));
    }

    #[test]
    fn test_unknown_named_placeholder_reported() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new(
            "%(count)d items".into(),
            Some("%(anzahl)d Artikel".into()),
        ));
        let issues = validate(&catalog);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].description.contains("anzahl"));
    }

    #[test]
    fn test_untranslated_forms_skipped() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new("%d items".into(), None));
        assert!(validate(&catalog).is_empty());
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new("%d items".into(), Some("Artikel".into())));
        let before = catalog.clone();
        let _ = validate(&catalog);
        assert_eq!(catalog.len(), before.len());
        assert_eq!(
            catalog.get("%d items", None),
            before.get("%d items", None)
        );
    }

    #[test]
    fn test_custom_checker_registration() {
        fn no_exclamations(_catalog: &Catalog, message: &Message) -> Vec<String> {
            if message.string.forms().iter().any(|f| f.contains('!')) {
                vec!["translation shouts".to_string()]
            } else {
                Vec::new()
            }
        }

        let mut registry = CheckerRegistry::new();
        registry.register("no-exclamations", no_exclamations);
        assert_eq!(registry.names(), vec!["no-exclamations"]);

        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new("Hi".into(), Some("Hallo!".into())));
        let issues = registry.validate(&catalog);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].checker, "no-exclamations");
    }

    #[test]
    fn test_issue_display_includes_context() {
        let issue = Issue {
            key: MessageKey::new("May", Some("month")),
            checker: "x".to_string(),
            description: "problem".to_string(),
        };
        assert_eq!(issue.to_string(), "May (context \"month\"): problem");
    }
}
