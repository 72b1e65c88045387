//! Reading and writing the PO text format.
//!
//! The reader consumes an entire byte stream, sniffs the charset declared in
//! the header entry (falling back to a caller-supplied or 8-bit-safe
//! default), decodes once, and runs a line-oriented parser over the text.
//! The writer mirrors the reader's escape table and wraps long lines at
//! whitespace or hyphen boundaries on the escaped text.

use std::io::{Read, Write};

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::catalog::Catalog;
use crate::error::{CatalogError, CatalogResult};
use crate::message::{Message, TranslationString};

/// Options for [`read_po`].
#[derive(Debug, Clone, Default)]
pub struct PoReadOptions<'a> {
    /// Locale of the catalog being read; `None` reads a template unless the
    /// header carries a `Language` field.
    pub locale: Option<&'a str>,
    pub domain: Option<&'a str>,
    /// Drop `#~` entries instead of keeping them in the obsolete collection.
    pub ignore_obsolete: bool,
    /// Charset to use when the header does not declare one.
    pub charset: Option<&'a str>,
    /// Name of the input, used in error messages.
    pub source: Option<&'a str>,
}

/// Options for [`write_po`].
#[derive(Debug, Clone)]
pub struct PoWriteOptions {
    /// Maximum physical line width for message text; `0` disables message
    /// wrapping (comments still wrap at a fixed fallback width).
    pub width: usize,
    pub omit_header: bool,
    pub no_location: bool,
    /// Sort messages by id instead of insertion order.
    pub sort_output: bool,
    /// Sort messages by their first location.
    pub sort_by_location: bool,
    pub ignore_obsolete: bool,
    /// Emit `#|` previous-id comments.
    pub include_previous: bool,
    /// Emit line numbers in `#:` comments.
    pub include_lineno: bool,
}

impl Default for PoWriteOptions {
    fn default() -> Self {
        PoWriteOptions {
            width: 76,
            omit_header: false,
            no_location: false,
            sort_output: false,
            sort_by_location: false,
            ignore_obsolete: false,
            include_previous: false,
            include_lineno: true,
        }
    }
}

const FALLBACK_COMMENT_WIDTH: usize = 76;

/// Upper bound on `msgstr[N]` indexes. No plural rule needs anywhere near
/// this many forms, and the index sizes an in-memory vector.
const MAX_PLURAL_FORMS: usize = 32;

// ---------------------------------------------------------------------------
// escaping

/// Escapes a string and surrounds it with double quotes, the inverse of the
/// reader's unescape table.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Parses one quoted string from a physical line. Unknown escapes pass the
/// following character through unchanged.
fn parse_quoted(line: &str, line_no: usize, source: Option<&str>) -> CatalogResult<String> {
    let line = line.trim();
    let mut chars = line.chars();
    if chars.next() != Some('"') {
        return Err(po_error(source, line_no, "expected quoted string"));
    }
    let mut out = String::new();
    let mut closed = false;
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                closed = true;
                break;
            }
            '\\' => match chars.next() {
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('n') => out.push('\n'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => return Err(po_error(source, line_no, "unterminated string")),
            },
            other => out.push(other),
        }
    }
    if !closed {
        return Err(po_error(source, line_no, "unterminated string"));
    }
    Ok(out)
}

fn po_error(source: Option<&str>, line: usize, reason: &str) -> CatalogError {
    CatalogError::PoParse {
        source: source.map(str::to_string),
        line,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// reader

/// Which field a bare `"..."` continuation line appends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Target {
    #[default]
    None,
    Context,
    Id,
    IdPlural,
    Str(usize),
    PrevId,
    PrevIdPlural,
    PrevContext,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    user_comments: Vec<String>,
    auto_comments: Vec<String>,
    locations: Vec<(String, u32)>,
    flags: Vec<String>,
    context: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    translations: Vec<String>,
    prev_msgid: Option<String>,
    prev_msgid_plural: Option<String>,
    prev_context: Option<String>,
    obsolete: bool,
    target: Target,
    in_msgstr: bool,
}

impl EntryBuilder {
    fn is_empty(&self) -> bool {
        self.msgid.is_none()
            && self.context.is_none()
            && self.translations.is_empty()
            && self.user_comments.is_empty()
            && self.auto_comments.is_empty()
            && self.locations.is_empty()
            && self.flags.is_empty()
    }

    fn set_translation(&mut self, index: usize, value: String) {
        if self.translations.len() <= index {
            self.translations.resize(index + 1, String::new());
        }
        self.translations[index] = value;
    }

    fn append(&mut self, value: &str) {
        match self.target {
            Target::Context => append_opt(&mut self.context, value),
            Target::Id => append_opt(&mut self.msgid, value),
            Target::IdPlural => append_opt(&mut self.msgid_plural, value),
            Target::Str(index) => {
                if let Some(slot) = self.translations.get_mut(index) {
                    slot.push_str(value);
                }
            }
            Target::PrevId => append_opt(&mut self.prev_msgid, value),
            Target::PrevIdPlural => append_opt(&mut self.prev_msgid_plural, value),
            Target::PrevContext => append_opt(&mut self.prev_context, value),
            Target::None => {}
        }
    }
}

fn append_opt(slot: &mut Option<String>, value: &str) {
    match slot {
        Some(existing) => existing.push_str(value),
        None => *slot = Some(value.to_string()),
    }
}

/// Parses a PO byte stream into a catalog.
pub fn read_po(stream: &mut dyn Read, options: &PoReadOptions<'_>) -> CatalogResult<Catalog> {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes)?;
    parse_po(&bytes, options)
}

/// Parses PO bytes already held in memory.
pub fn parse_po(bytes: &[u8], options: &PoReadOptions<'_>) -> CatalogResult<Catalog> {
    let charset = sniff_charset(bytes)
        .or_else(|| options.charset.map(str::to_string))
        .unwrap_or_default();
    let encoding = Encoding::for_label(charset.as_bytes()).unwrap_or(WINDOWS_1252);
    let (text, _, _) = encoding.decode(bytes);

    let mut catalog = Catalog::new(options.locale, options.domain);
    if let Some(charset) = sniff_charset(bytes) {
        catalog.charset = charset;
    }

    let mut builder = EntryBuilder::default();
    let source = options.source;
    let mut line_no = 0usize;

    for raw_line in text.lines() {
        line_no += 1;
        let mut line = raw_line.trim_end();

        if line.is_empty() {
            flush_entry(&mut catalog, &mut builder, options)?;
            continue;
        }

        let mut obsolete_line = false;
        if let Some(rest) = line.strip_prefix("#~") {
            obsolete_line = true;
            line = rest.trim_start();
            if line.is_empty() {
                continue;
            }
        }

        let starts_entry = line.starts_with('#')
            || line.starts_with("msgctxt")
            || line.starts_with("msgid");
        if builder.in_msgstr && starts_entry {
            flush_entry(&mut catalog, &mut builder, options)?;
        }
        if obsolete_line {
            builder.obsolete = true;
        }

        if let Some(rest) = line.strip_prefix("#|") {
            parse_previous(&mut builder, rest.trim_start(), line_no, source)?;
        } else if let Some(rest) = line.strip_prefix("#.") {
            builder.auto_comments.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("#:") {
            parse_locations(&mut builder, rest);
        } else if let Some(rest) = line.strip_prefix("#,") {
            for flag in rest.split(',') {
                let flag = flag.trim();
                if !flag.is_empty() {
                    builder.flags.push(flag.to_string());
                }
            }
        } else if let Some(rest) = line.strip_prefix('#') {
            builder
                .user_comments
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else if let Some(rest) = line.strip_prefix("msgctxt") {
            builder.context = Some(parse_quoted(rest, line_no, source)?);
            builder.target = Target::Context;
            builder.in_msgstr = false;
        } else if let Some(rest) = line.strip_prefix("msgid_plural") {
            builder.msgid_plural = Some(parse_quoted(rest, line_no, source)?);
            builder.target = Target::IdPlural;
        } else if let Some(rest) = line.strip_prefix("msgid") {
            builder.msgid = Some(parse_quoted(rest, line_no, source)?);
            builder.target = Target::Id;
            builder.in_msgstr = false;
        } else if let Some(rest) = line.strip_prefix("msgstr[") {
            let close = rest
                .find(']')
                .ok_or_else(|| po_error(source, line_no, "missing ] in msgstr index"))?;
            let index: usize = rest[..close]
                .trim()
                .parse()
                .map_err(|_| po_error(source, line_no, "invalid msgstr index"))?;
            if index >= MAX_PLURAL_FORMS {
                return Err(po_error(source, line_no, "msgstr index out of range"));
            }
            let value = parse_quoted(&rest[close + 1..], line_no, source)?;
            builder.set_translation(index, value);
            builder.target = Target::Str(index);
            builder.in_msgstr = true;
        } else if let Some(rest) = line.strip_prefix("msgstr") {
            builder.set_translation(0, parse_quoted(rest, line_no, source)?);
            builder.target = Target::Str(0);
            builder.in_msgstr = true;
        } else if line.starts_with('"') {
            let value = parse_quoted(line, line_no, source)?;
            builder.append(&value);
        } else {
            return Err(po_error(source, line_no, "unexpected input"));
        }
    }
    flush_entry(&mut catalog, &mut builder, options)?;

    Ok(catalog)
}

/// Parses a `#|` previous-id comment line.
fn parse_previous(
    builder: &mut EntryBuilder,
    rest: &str,
    line_no: usize,
    source: Option<&str>,
) -> CatalogResult<()> {
    if let Some(value) = rest.strip_prefix("msgid_plural") {
        builder.prev_msgid_plural = Some(parse_quoted(value, line_no, source)?);
        builder.target = Target::PrevIdPlural;
    } else if let Some(value) = rest.strip_prefix("msgid") {
        builder.prev_msgid = Some(parse_quoted(value, line_no, source)?);
        builder.target = Target::PrevId;
    } else if let Some(value) = rest.strip_prefix("msgctxt") {
        builder.prev_context = Some(parse_quoted(value, line_no, source)?);
        builder.target = Target::PrevContext;
    } else if rest.starts_with('"') {
        let value = parse_quoted(rest, line_no, source)?;
        match builder.target {
            Target::PrevId | Target::PrevIdPlural | Target::PrevContext => builder.append(&value),
            _ => {}
        }
    }
    Ok(())
}

/// Parses a `#:` location comment. A reference whose line number does not
/// parse drops only that reference.
fn parse_locations(builder: &mut EntryBuilder, rest: &str) {
    for reference in rest.split_whitespace() {
        if let Some((file, line)) = reference.rsplit_once(':') {
            if let Ok(line) = line.parse::<u32>() {
                if !builder
                    .locations
                    .iter()
                    .any(|(f, l)| f == file && *l == line)
                {
                    builder.locations.push((file.to_string(), line));
                }
            }
        }
    }
}

fn flush_entry(
    catalog: &mut Catalog,
    builder: &mut EntryBuilder,
    options: &PoReadOptions<'_>,
) -> CatalogResult<()> {
    let builder = std::mem::take(builder);
    if builder.is_empty() {
        return Ok(());
    }
    let msgid = builder.msgid.clone().unwrap_or_default();

    // The entry with an empty id is the header: its translation body holds
    // the catalog metadata.
    if msgid.is_empty() && builder.context.is_none() && !builder.obsolete {
        if let Some(header) = builder.translations.first() {
            catalog.parse_header(header);
        }
        catalog.fuzzy = builder.flags.iter().any(|f| f == "fuzzy");
        return Ok(());
    }

    let id = match &builder.msgid_plural {
        Some(plural) => TranslationString::Plural(vec![msgid, plural.clone()]),
        None => TranslationString::Singular(msgid),
    };
    let string = if builder.msgid_plural.is_some() {
        TranslationString::Plural(builder.translations.clone())
    } else {
        TranslationString::Singular(
            builder.translations.first().cloned().unwrap_or_default(),
        )
    };

    let mut message = Message::new(id, Some(string));
    message.context = builder.context.clone();
    message.locations = builder.locations.clone();
    message.flags.extend(builder.flags.iter().cloned());
    for comment in &builder.auto_comments {
        if !message.auto_comments.contains(comment) {
            message.auto_comments.push(comment.clone());
        }
    }
    for comment in &builder.user_comments {
        if !message.user_comments.contains(comment) {
            message.user_comments.push(comment.clone());
        }
    }
    message.previous_id = match (builder.prev_msgid, builder.prev_msgid_plural) {
        (Some(singular), Some(plural)) => {
            Some(TranslationString::Plural(vec![singular, plural]))
        }
        (Some(singular), None) => Some(TranslationString::Singular(singular)),
        (None, Some(plural)) => Some(TranslationString::Plural(vec![String::new(), plural])),
        (None, None) => None,
    };

    if builder.obsolete {
        if !options.ignore_obsolete {
            catalog.add_obsolete(message);
        }
    } else {
        catalog.add(message);
    }
    Ok(())
}

/// Finds the `charset=` declaration in the header entry, before any
/// decoding. PO keywords are ASCII, so the scan walks raw lines and only
/// looks inside the `msgstr` body of an entry whose id is empty; a charset
/// mentioned in a comment or in message text does not count.
fn sniff_charset(bytes: &[u8]) -> Option<String> {
    let mut in_header = false;
    let mut in_msgstr = false;
    for raw in bytes.split(|&b| b == b'\n') {
        let line = raw.trim_ascii();
        if line == b"msgid \"\"" {
            in_header = true;
            in_msgstr = false;
            continue;
        }
        if !in_header {
            continue;
        }
        if line.starts_with(b"msgstr") {
            in_msgstr = true;
            if let Some(charset) = charset_in(line) {
                return Some(charset);
            }
        } else if line.starts_with(b"\"") {
            if in_msgstr {
                if let Some(charset) = charset_in(line) {
                    return Some(charset);
                }
            } else if line != b"\"\"" {
                // A non-empty id continuation: not the header after all.
                in_header = false;
            }
        } else if !line.starts_with(b"#") {
            // Blank line or a new keyword ends the entry.
            in_header = false;
            in_msgstr = false;
        }
    }
    None
}

fn charset_in(line: &[u8]) -> Option<String> {
    let needle = b"charset=";
    let start = line
        .windows(needle.len())
        .position(|window| window == needle)?
        + needle.len();
    let mut charset = String::new();
    for &byte in &line[start..] {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            charset.push(byte as char);
        } else {
            break;
        }
    }
    if charset.is_empty() || charset.eq_ignore_ascii_case("charset") {
        None
    } else {
        Some(charset)
    }
}

// ---------------------------------------------------------------------------
// writer

/// Serializes a catalog in PO format, encoded with the catalog charset.
pub fn write_po(
    stream: &mut dyn Write,
    catalog: &Catalog,
    options: &PoWriteOptions,
) -> CatalogResult<()> {
    let mut out = String::new();

    if !options.omit_header {
        let header = catalog.header_message();
        write_message(&mut out, catalog, &header, "", options);
        out.push('\n');
    }

    let mut messages: Vec<&Message> = catalog.iter().collect();
    if options.sort_output {
        messages.sort_by_key(|m| (m.id.singular().to_string(), m.context.clone()));
    } else if options.sort_by_location {
        messages.sort_by_key(|m| m.locations.first().cloned());
    }

    let mut first = true;
    for message in messages {
        if !first {
            out.push('\n');
        }
        first = false;
        write_message(&mut out, catalog, message, "", options);
    }

    if !options.ignore_obsolete {
        for message in catalog.obsolete() {
            if !first {
                out.push('\n');
            }
            first = false;
            write_message(&mut out, catalog, message, "#~ ", options);
        }
    }

    let encoding = Encoding::for_label(catalog.charset.as_bytes()).unwrap_or(UTF_8);
    let (encoded, _, _) = encoding.encode(&out);
    stream.write_all(&encoded)?;
    Ok(())
}

fn comment_width(options: &PoWriteOptions) -> usize {
    if options.width > 0 {
        options.width
    } else {
        FALLBACK_COMMENT_WIDTH
    }
}

fn write_comment(out: &mut String, text: &str, marker: &str, prefix: &str, width: usize) {
    let lead = format!("{}#{} ", prefix, marker);
    for line in wrap_text(text, width.saturating_sub(lead.len()).max(1)) {
        out.push_str(&lead);
        out.push_str(line.trim());
        out.push('\n');
    }
}

fn write_field(
    out: &mut String,
    keyword: &str,
    value: &str,
    prefix: &str,
    width: usize,
) {
    out.push_str(prefix);
    out.push_str(keyword);
    out.push(' ');
    out.push_str(&normalize(value, prefix, width));
    out.push('\n');
}

fn write_message(
    out: &mut String,
    catalog: &Catalog,
    message: &Message,
    prefix: &str,
    options: &PoWriteOptions,
) {
    let cwidth = comment_width(options);

    for comment in &message.user_comments {
        write_comment(out, comment, "", prefix, cwidth);
    }
    for comment in &message.auto_comments {
        write_comment(out, comment, ".", prefix, cwidth);
    }
    if !options.no_location && !message.locations.is_empty() {
        let mut locations = message.locations.clone();
        locations.sort();
        let refs: Vec<String> = locations
            .iter()
            .map(|(file, line)| {
                if options.include_lineno {
                    format!("{}:{}", file, line)
                } else {
                    file.clone()
                }
            })
            .collect();
        write_comment(out, &refs.join(" "), ":", prefix, cwidth);
    }
    if !message.flags.is_empty() {
        let flags: Vec<&str> = message.flags.iter().map(String::as_str).collect();
        out.push_str(prefix);
        out.push_str("#, ");
        out.push_str(&flags.join(", "));
        out.push('\n');
    }
    if options.include_previous {
        if let Some(previous) = &message.previous_id {
            match previous {
                TranslationString::Singular(id) => {
                    write_previous_field(out, "msgid", id, prefix, options.width);
                }
                TranslationString::Plural(forms) => {
                    write_previous_field(
                        out,
                        "msgid",
                        forms.first().map(String::as_str).unwrap_or(""),
                        prefix,
                        options.width,
                    );
                    if let Some(plural) = forms.get(1) {
                        write_previous_field(out, "msgid_plural", plural, prefix, options.width);
                    }
                }
            }
        }
    }

    if let Some(context) = &message.context {
        write_field(out, "msgctxt", context, prefix, options.width);
    }
    match (&message.id, &message.string) {
        (TranslationString::Plural(id_forms), string) => {
            write_field(
                out,
                "msgid",
                id_forms.first().map(String::as_str).unwrap_or(""),
                prefix,
                options.width,
            );
            write_field(
                out,
                "msgid_plural",
                id_forms.get(1).map(String::as_str).unwrap_or(""),
                prefix,
                options.width,
            );
            let forms = string.forms();
            for index in 0..catalog.num_plurals() {
                let form = forms.get(index).copied().unwrap_or("");
                write_field(
                    out,
                    &format!("msgstr[{}]", index),
                    form,
                    prefix,
                    options.width,
                );
            }
        }
        (TranslationString::Singular(id), string) => {
            write_field(out, "msgid", id, prefix, options.width);
            write_field(out, "msgstr", string.singular(), prefix, options.width);
        }
    }
}

/// Previous-id lines carry the `#| ` marker on every physical line,
/// including continuations.
fn write_previous_field(out: &mut String, keyword: &str, value: &str, prefix: &str, width: usize) {
    let marker = format!("{}#| ", prefix);
    out.push_str(&marker);
    out.push_str(keyword);
    out.push(' ');
    out.push_str(&normalize(value, &marker, width));
    out.push('\n');
}

/// Splits text into lines, each retaining its trailing newline.
fn split_keep_newline(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if ch == '\n' {
            lines.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Splits a line into wrappable chunks: whitespace runs stand alone and a
/// hyphen between word characters ends its chunk, so breaks land at
/// whitespace or hyphen boundaries.
fn wrap_chunks(line: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = line.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        let boundary_before = !current.is_empty()
            && (ch.is_whitespace() != current.ends_with(|c: char| c.is_whitespace()));
        if boundary_before {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
        let next_is_word = chars.get(i + 1).is_some_and(|c| c.is_alphanumeric());
        if ch == '-' && i > 0 && chars[i - 1].is_alphanumeric() && next_is_word {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Renders a message field value as quoted PO text. Values that wrap or
/// span several lines become an empty first string followed by one quoted
/// string per physical line; the width check runs on the escaped text.
fn normalize(text: &str, prefix: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    if width > 0 {
        for line in split_keep_newline(text) {
            if escape(&line).len() + prefix.len() > width {
                let mut chunks = wrap_chunks(&line);
                chunks.reverse();
                while !chunks.is_empty() {
                    let mut buf: Vec<String> = Vec::new();
                    // The prefix and the surrounding quotes count against
                    // the width once per physical line.
                    let mut size = 2 + prefix.len();
                    while let Some(chunk) = chunks.pop() {
                        let chunk_len = escape(&chunk).len() - 2;
                        if size + chunk_len < width {
                            size += chunk_len;
                            buf.push(chunk);
                        } else if buf.is_empty() {
                            // A single chunk longer than the width gets its
                            // own line rather than being split.
                            buf.push(chunk);
                            break;
                        } else {
                            chunks.push(chunk);
                            break;
                        }
                    }
                    lines.push(buf.concat());
                }
            } else {
                lines.push(line);
            }
        }
    } else {
        lines = split_keep_newline(text);
    }

    if lines.len() <= 1 {
        return escape(text);
    }
    let mut out = String::from("\"\"\n");
    let quoted: Vec<String> = lines
        .iter()
        .map(|line| format!("{}{}", prefix, escape(line)))
        .collect();
    out.push_str(&quoted.join("\n"));
    out
}

/// Greedy word wrap that never splits a word.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return vec![String::new()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in words {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
