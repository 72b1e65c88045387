use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Matches printf-style placeholders like `%s`, `%(name)s`, `%05.2f`.
/// The final capture group is the conversion character.
fn printf_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"%(?:\((\w*)\))?[-#0 +]?(?:\*|\d+)?(?:\.(?:\*|\d+))?[hlL]?([diouxXeEfFgGcrs%])")
            .expect("placeholder regex is valid")
    })
}

/// Returns true if `text` contains at least one printf-style placeholder
/// (a literal `%%` does not count).
pub fn has_python_format(text: &str) -> bool {
    printf_placeholder_re()
        .captures_iter(text)
        .any(|c| c.get(2).map(|m| m.as_str()) != Some("%"))
}

/// Extracts the placeholders of `text` as `(name, conversion)` pairs,
/// skipping literal `%%`. Used by the placeholder-parity checker.
pub fn extract_placeholders(text: &str) -> Vec<(Option<String>, char)> {
    printf_placeholder_re()
        .captures_iter(text)
        .filter_map(|c| {
            let conv = c.get(2)?.as_str().chars().next()?;
            if conv == '%' {
                return None;
            }
            Some((c.get(1).map(|m| m.as_str().to_string()), conv))
        })
        .collect()
}

/// The text of a message id or translation.
///
/// A message is either singular (one string) or pluralizable. On the id side
/// a plural value is the `(singular, plural)` pair from extraction; on the
/// translation side it is one string per plural category of the catalog's
/// locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationString {
    Singular(String),
    Plural(Vec<String>),
}

impl TranslationString {
    /// The primary form: the string itself, or the singular of a plural pair.
    pub fn singular(&self) -> &str {
        match self {
            TranslationString::Singular(s) => s,
            TranslationString::Plural(forms) => forms.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// All forms in order. A singular value has exactly one.
    pub fn forms(&self) -> Vec<&str> {
        match self {
            TranslationString::Singular(s) => vec![s.as_str()],
            TranslationString::Plural(forms) => forms.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_plural(&self) -> bool {
        matches!(self, TranslationString::Plural(_))
    }

    /// True when no form carries any text.
    pub fn is_empty(&self) -> bool {
        match self {
            TranslationString::Singular(s) => s.is_empty(),
            TranslationString::Plural(forms) => forms.iter().all(|f| f.is_empty()),
        }
    }
}

impl From<&str> for TranslationString {
    fn from(s: &str) -> Self {
        TranslationString::Singular(s.to_string())
    }
}

impl From<String> for TranslationString {
    fn from(s: String) -> Self {
        TranslationString::Singular(s)
    }
}

impl From<(&str, &str)> for TranslationString {
    fn from((singular, plural): (&str, &str)) -> Self {
        TranslationString::Plural(vec![singular.to_string(), plural.to_string()])
    }
}

impl From<Vec<String>> for TranslationString {
    fn from(forms: Vec<String>) -> Self {
        TranslationString::Plural(forms)
    }
}

impl Default for TranslationString {
    fn default() -> Self {
        TranslationString::Singular(String::new())
    }
}

/// Lookup key for a message: the singular id plus the optional context.
/// Two messages with the same id but different contexts are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKey {
    pub id: String,
    pub context: Option<String>,
}

impl MessageKey {
    pub fn new(id: &str, context: Option<&str>) -> Self {
        MessageKey {
            id: id.to_string(),
            context: context.map(str::to_string),
        }
    }
}

/// A single translatable entry in a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Source text, singular or a singular/plural pair
    pub id: TranslationString,
    /// Translation, mirroring the arity of `id`
    pub string: TranslationString,
    /// `(file, line)` provenance pairs, ordered and de-duplicated
    pub locations: Vec<(String, u32)>,
    /// Flags such as `fuzzy` or `python-format`
    pub flags: BTreeSet<String>,
    /// Comments from extraction tooling
    pub auto_comments: Vec<String>,
    /// Comments written by translators
    pub user_comments: Vec<String>,
    /// The id this message was fuzzy-matched from during the last update
    pub previous_id: Option<TranslationString>,
    /// Disambiguation context
    pub context: Option<String>,
}

impl Message {
    /// Creates a message. The `python-format` flag is derived automatically
    /// when any id form contains a printf-style placeholder. The translation
    /// defaults to the empty shape matching the id's arity.
    pub fn new(id: TranslationString, string: Option<TranslationString>) -> Self {
        let string = string.unwrap_or_else(|| match &id {
            TranslationString::Singular(_) => TranslationString::Singular(String::new()),
            TranslationString::Plural(forms) => {
                TranslationString::Plural(vec![String::new(); forms.len().max(1)])
            }
        });
        let mut message = Message {
            id,
            string,
            locations: Vec::new(),
            flags: BTreeSet::new(),
            auto_comments: Vec::new(),
            user_comments: Vec::new(),
            previous_id: None,
            context: None,
        };
        if message.id.forms().iter().any(|form| has_python_format(form)) {
            message.flags.insert("python-format".to_string());
        }
        message
    }

    pub fn with_context(mut self, context: Option<&str>) -> Self {
        self.context = context.map(str::to_string);
        self
    }

    /// The key this message is stored under in a catalog.
    pub fn key(&self) -> MessageKey {
        MessageKey {
            id: self.id.singular().to_string(),
            context: self.context.clone(),
        }
    }

    pub fn is_pluralizable(&self) -> bool {
        self.id.is_plural()
    }

    pub fn is_fuzzy(&self) -> bool {
        self.flags.contains("fuzzy")
    }

    /// True when the translation carries text in every required form.
    pub fn is_translated(&self) -> bool {
        match &self.string {
            TranslationString::Singular(s) => !s.is_empty(),
            TranslationString::Plural(forms) => {
                !forms.is_empty() && forms.iter().any(|f| !f.is_empty())
            }
        }
    }

    /// Appends a location unless an identical `(file, line)` pair is present.
    pub fn add_location(&mut self, file: &str, line: u32) {
        if !self.locations.iter().any(|(f, l)| f == file && *l == line) {
            self.locations.push((file.to_string(), line));
        }
    }

    /// Union-merges provenance and commentary from another message with the
    /// same key. Translation text is not touched.
    pub fn merge(&mut self, other: &Message) {
        for (file, line) in &other.locations {
            self.add_location(file, *line);
        }
        for flag in &other.flags {
            self.flags.insert(flag.clone());
        }
        for comment in &other.auto_comments {
            if !self.auto_comments.contains(comment) {
                self.auto_comments.push(comment.clone());
            }
        }
        for comment in &other.user_comments {
            if !self.user_comments.contains(comment) {
                self.user_comments.push(comment.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_format_detection() {
        assert!(has_python_format("Hello %s"));
        assert!(has_python_format("%(count)d items"));
        assert!(has_python_format("%05.2f"));
        assert!(!has_python_format("100%% done"));
        assert!(!has_python_format("no placeholders"));
    }

    #[test]
    fn test_python_format_flag_derived() {
        let msg = Message::new("Hello %s".into(), None);
        assert!(msg.flags.contains("python-format"));

        let msg = Message::new("Hello".into(), None);
        assert!(!msg.flags.contains("python-format"));
    }

    #[test]
    fn test_plural_id_derives_format_flag() {
        let msg = Message::new(("one item", "%d items").into(), None);
        assert!(msg.flags.contains("python-format"));
    }

    #[test]
    fn test_extract_placeholders() {
        let specs = extract_placeholders("%(name)s has %d entries, %% literal");
        assert_eq!(
            specs,
            vec![(Some("name".to_string()), 's'), (None, 'd')]
        );
    }

    #[test]
    fn test_translation_string_shapes() {
        let singular = TranslationString::Singular("foo".to_string());
        assert_eq!(singular.singular(), "foo");
        assert!(!singular.is_plural());
        assert!(!singular.is_empty());

        let plural: TranslationString = ("foo", "foos").into();
        assert_eq!(plural.singular(), "foo");
        assert!(plural.is_plural());
        assert_eq!(plural.forms(), vec!["foo", "foos"]);

        let empty = TranslationString::Plural(vec![String::new(), String::new()]);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_default_translation_mirrors_arity() {
        let msg = Message::new(("one", "many").into(), None);
        assert!(msg.string.is_plural());
        assert_eq!(msg.string.forms().len(), 2);
        assert!(!msg.is_translated());
    }

    #[test]
    fn test_key_uses_singular_and_context() {
        let msg = Message::new(("apple", "apples").into(), None).with_context(Some("fruit"));
        let key = msg.key();
        assert_eq!(key.id, "apple");
        assert_eq!(key.context.as_deref(), Some("fruit"));
    }

    #[test]
    fn test_location_dedup() {
        let mut msg = Message::new("x".into(), None);
        msg.add_location("main.rs", 3);
        msg.add_location("main.rs", 3);
        msg.add_location("main.rs", 4);
        assert_eq!(msg.locations.len(), 2);
    }

    #[test]
    fn test_merge_unions() {
        let mut a = Message::new("x".into(), None);
        a.add_location("a.rs", 1);
        a.flags.insert("fuzzy".to_string());
        a.user_comments.push("keep me".to_string());

        let mut b = Message::new("x".into(), None);
        b.add_location("a.rs", 1);
        b.add_location("b.rs", 9);
        b.flags.insert("c-format".to_string());
        b.user_comments.push("keep me".to_string());
        b.user_comments.push("and me".to_string());

        a.merge(&b);
        assert_eq!(a.locations, vec![("a.rs".to_string(), 1), ("b.rs".to_string(), 9)]);
        assert!(a.flags.contains("fuzzy"));
        assert!(a.flags.contains("c-format"));
        assert_eq!(a.user_comments, vec!["keep me".to_string(), "and me".to_string()]);
    }
}
