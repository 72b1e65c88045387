use std::collections::HashMap;

use crate::message::{Message, MessageKey, TranslationString};
use crate::plurals;

/// Insertion-ordered, key-unique message store.
///
/// Iteration follows insertion order while lookup goes through the key map;
/// the key vector and the map are kept in step by the methods below.
#[derive(Debug, Clone, Default)]
struct OrderedMessageMap {
    order: Vec<MessageKey>,
    map: HashMap<MessageKey, Message>,
}

impl OrderedMessageMap {
    fn insert(&mut self, key: MessageKey, message: Message) {
        if !self.map.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.map.insert(key, message);
    }

    fn get(&self, key: &MessageKey) -> Option<&Message> {
        self.map.get(key)
    }

    fn get_mut(&mut self, key: &MessageKey) -> Option<&mut Message> {
        self.map.get_mut(key)
    }

    fn remove(&mut self, key: &MessageKey) -> Option<Message> {
        let removed = self.map.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    fn contains(&self, key: &MessageKey) -> bool {
        self.map.contains_key(key)
    }

    fn iter(&self) -> impl Iterator<Item = &Message> {
        self.order.iter().filter_map(|key| self.map.get(key))
    }

    fn drain(&mut self) -> Vec<Message> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|key| self.map.remove(&key))
            .collect()
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// A collection of translatable messages for one locale and domain, plus the
/// catalog-level header metadata.
///
/// A catalog without a locale is a template: no translations are expected.
/// Obsolete messages (removed from the template but kept for reference and
/// fuzzy matching) live in a side collection excluded from normal iteration.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub locale: Option<String>,
    pub domain: String,
    pub project: String,
    pub version: String,
    pub creation_date: String,
    pub revision_date: String,
    pub last_translator: String,
    pub language_team: String,
    pub charset: String,
    /// Header fuzzy bit: set when the header entry itself is flagged fuzzy
    pub fuzzy: bool,
    num_plurals: usize,
    plural_expr: String,
    messages: OrderedMessageMap,
    obsolete: OrderedMessageMap,
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::new(None, None)
    }
}

impl Catalog {
    /// Creates an empty catalog. With a locale the plural rule is resolved
    /// through the default provider; templates keep the two-category
    /// default.
    pub fn new(locale: Option<&str>, domain: Option<&str>) -> Self {
        let (num_plurals, plural_expr) = match locale {
            Some(locale) => plurals::plural_rule(locale),
            None => (
                plurals::DEFAULT_PLURAL_RULE.0,
                plurals::DEFAULT_PLURAL_RULE.1.to_string(),
            ),
        };
        Catalog {
            locale: locale.map(str::to_string),
            domain: domain.unwrap_or("messages").to_string(),
            project: "PROJECT".to_string(),
            version: "VERSION".to_string(),
            creation_date: "YEAR-MO-DA HO:MI+ZONE".to_string(),
            revision_date: "YEAR-MO-DA HO:MI+ZONE".to_string(),
            last_translator: "FULL NAME <EMAIL@ADDRESS>".to_string(),
            language_team: "LANGUAGE <LL@li.org>".to_string(),
            charset: "UTF-8".to_string(),
            fuzzy: false,
            num_plurals,
            plural_expr,
            messages: OrderedMessageMap::default(),
            obsolete: OrderedMessageMap::default(),
        }
    }

    /// Changes the locale and re-resolves the plural rule.
    pub fn set_locale(&mut self, locale: Option<&str>) {
        self.locale = locale.map(str::to_string);
        if let Some(locale) = locale {
            let (count, expr) = plurals::plural_rule(locale);
            self.num_plurals = count;
            self.plural_expr = expr;
        }
    }

    /// Overrides the plural rule, e.g. from a parsed `Plural-Forms` header
    /// or a non-default provider.
    pub fn set_plural_rule(&mut self, num_plurals: usize, plural_expr: &str) {
        self.num_plurals = num_plurals.max(1);
        self.plural_expr = plural_expr.to_string();
    }

    pub fn num_plurals(&self) -> usize {
        self.num_plurals
    }

    pub fn plural_expr(&self) -> &str {
        &self.plural_expr
    }

    /// The `Plural-Forms` header value.
    pub fn plural_forms(&self) -> String {
        format!("nplurals={}; plural={};", self.num_plurals, self.plural_expr)
    }

    pub fn is_template(&self) -> bool {
        self.locale.is_none()
    }

    /// Adds a message, union-merging locations, flags, and comments when the
    /// key is already present (the newer translation text wins).
    pub fn add(&mut self, message: Message) -> &Message {
        let mut message = message;
        self.normalize_plural_arity(&mut message);
        let key = message.key();
        if let Some(existing) = self.messages.get_mut(&key) {
            existing.merge(&message);
            existing.id = message.id;
            existing.string = message.string;
            if message.previous_id.is_some() {
                existing.previous_id = message.previous_id;
            }
        } else {
            self.messages.insert(key.clone(), message);
        }
        self.messages.get(&key).expect("message was just inserted")
    }

    /// Sizes a pluralizable translation to the catalog's category count.
    fn normalize_plural_arity(&self, message: &mut Message) {
        if !message.id.is_plural() {
            return;
        }
        let forms = match &mut message.string {
            TranslationString::Plural(forms) => forms,
            singular => {
                let first = singular.singular().to_string();
                *singular = TranslationString::Plural(vec![first]);
                match singular {
                    TranslationString::Plural(forms) => forms,
                    _ => unreachable!(),
                }
            }
        };
        forms.resize(self.num_plurals, String::new());
    }

    pub fn get(&self, id: &str, context: Option<&str>) -> Option<&Message> {
        self.messages.get(&MessageKey::new(id, context))
    }

    pub fn get_mut(&mut self, id: &str, context: Option<&str>) -> Option<&mut Message> {
        self.messages.get_mut(&MessageKey::new(id, context))
    }

    pub fn contains(&self, id: &str, context: Option<&str>) -> bool {
        self.messages.contains(&MessageKey::new(id, context))
    }

    /// Removes and returns a live message.
    pub fn delete(&mut self, id: &str, context: Option<&str>) -> Option<Message> {
        self.messages.remove(&MessageKey::new(id, context))
    }

    /// Live messages in insertion order; the header pseudo-message is not
    /// part of this iteration.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.len() == 0
    }

    /// Removes every live message, returning them in insertion order.
    pub(crate) fn take_messages(&mut self) -> Vec<Message> {
        self.messages.drain()
    }

    pub fn obsolete(&self) -> impl Iterator<Item = &Message> {
        self.obsolete.iter()
    }

    pub fn obsolete_len(&self) -> usize {
        self.obsolete.len()
    }

    pub fn add_obsolete(&mut self, message: Message) {
        self.obsolete.insert(message.key(), message);
    }

    pub fn get_obsolete(&self, id: &str, context: Option<&str>) -> Option<&Message> {
        self.obsolete.get(&MessageKey::new(id, context))
    }

    /// Removes every obsolete message, returning them in insertion order.
    pub fn clear_obsolete(&mut self) -> Vec<Message> {
        self.obsolete.drain()
    }

    /// The MIME header block as ordered `(key, value)` pairs.
    pub fn mime_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            (
                "Project-Id-Version".to_string(),
                format!("{} {}", self.project, self.version),
            ),
            ("POT-Creation-Date".to_string(), self.creation_date.clone()),
            ("PO-Revision-Date".to_string(), self.revision_date.clone()),
            (
                "Last-Translator".to_string(),
                self.last_translator.clone(),
            ),
        ];
        if let Some(locale) = &self.locale {
            headers.push(("Language".to_string(), locale.clone()));
        }
        headers.push(("Language-Team".to_string(), self.language_team.clone()));
        if self.locale.is_some() {
            headers.push(("Plural-Forms".to_string(), self.plural_forms()));
        }
        headers.push(("MIME-Version".to_string(), "1.0".to_string()));
        headers.push((
            "Content-Type".to_string(),
            format!("text/plain; charset={}", self.charset),
        ));
        headers.push((
            "Content-Transfer-Encoding".to_string(),
            "8bit".to_string(),
        ));
        headers
    }

    /// The header rendered as the translation body of the empty-id entry.
    pub fn header_text(&self) -> String {
        let mut text = String::new();
        for (key, value) in self.mime_headers() {
            text.push_str(&key);
            text.push_str(": ");
            text.push_str(&value);
            text.push('\n');
        }
        text
    }

    /// The header as a pseudo-message with an empty id, the shape it takes
    /// in PO and MO streams.
    pub fn header_message(&self) -> Message {
        let mut message = Message::new("".into(), Some(self.header_text().into()));
        if self.fuzzy {
            message.flags.insert("fuzzy".to_string());
        }
        message
    }

    /// Populates catalog metadata from a parsed header body: `Key: value`
    /// lines, where a line without a colon continues the previous value.
    pub fn parse_header(&mut self, text: &str) {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((key, value)) => {
                    pairs.push((key.trim().to_string(), value.trim().to_string()));
                }
                None => {
                    if let Some((_, value)) = pairs.last_mut() {
                        value.push('\n');
                        value.push_str(line.trim());
                    }
                }
            }
        }

        for (key, value) in pairs {
            match key.to_lowercase().as_str() {
                "project-id-version" => match value.rsplit_once(' ') {
                    Some((project, version)) => {
                        self.project = project.to_string();
                        self.version = version.to_string();
                    }
                    None => self.project = value,
                },
                "pot-creation-date" => self.creation_date = value,
                "po-revision-date" => self.revision_date = value,
                "last-translator" => self.last_translator = value,
                "language" => {
                    if self.locale.is_none() && !value.is_empty() {
                        self.set_locale(Some(&value));
                    }
                }
                "language-team" => self.language_team = value,
                "content-type" => {
                    for part in value.split(';') {
                        if let Some(charset) = part.trim().strip_prefix("charset=") {
                            let charset = charset.trim();
                            if !charset.is_empty() {
                                self.charset = charset.to_string();
                            }
                        }
                    }
                }
                "plural-forms" => self.parse_plural_forms(&value),
                _ => {}
            }
        }
    }

    /// Parses `nplurals=N; plural=EXPR;` from a `Plural-Forms` value. Either
    /// half may be missing; a malformed value leaves the current rule alone.
    fn parse_plural_forms(&mut self, value: &str) {
        let mut num_plurals = None;
        let mut plural_expr = None;
        for part in value.split(';') {
            let part = part.trim();
            if let Some(n) = part.strip_prefix("nplurals=") {
                num_plurals = n.trim().parse::<usize>().ok();
            } else if let Some(expr) = part.strip_prefix("plural=") {
                plural_expr = Some(expr.trim().to_string());
            }
        }
        if let Some(n) = num_plurals {
            self.num_plurals = n.max(1);
        }
        if let Some(expr) = plural_expr {
            if !expr.is_empty() {
                self.plural_expr = expr;
            }
        }
    }
}
