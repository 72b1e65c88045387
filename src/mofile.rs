//! Reading and writing the MO binary format.
//!
//! Layout: a fixed seven-word header (magic, version, message count, offset
//! of the original-string index, offset of the translated-string index, and
//! two hash-table words this implementation always writes as zero), two
//! parallel `(length, offset)` index tables, then the raw string data. A
//! context is joined to its id with byte 0x04; plural forms are joined with
//! 0x00. The entry whose original string is empty is the catalog header.

use std::io::{Read, Write};

use encoding_rs::{Encoding, UTF_8};

use crate::catalog::Catalog;
use crate::error::{CatalogError, CatalogResult};
use crate::message::{Message, TranslationString};

/// Magic number of a little-endian MO file.
pub const MO_MAGIC_LE: u32 = 0x950412de;
/// The same magic read from a big-endian MO file.
pub const MO_MAGIC_BE: u32 = 0xde120495;

const HEADER_SIZE: u32 = 28;

const CONTEXT_SEPARATOR: u8 = 0x04;
const PLURAL_SEPARATOR: u8 = 0x00;

fn mo_error(source: Option<&str>, reason: &str) -> CatalogError {
    CatalogError::MoFormat {
        source: source.map(str::to_string),
        reason: reason.to_string(),
    }
}

/// Bounds-checked view over MO bytes with the byte order taken from the
/// magic number.
struct MoReader<'a> {
    bytes: &'a [u8],
    big_endian: bool,
    source: Option<&'a str>,
}

impl<'a> MoReader<'a> {
    fn word(&self, offset: usize) -> CatalogResult<u32> {
        let end = offset
            .checked_add(4)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| mo_error(self.source, "truncated index table"))?;
        let raw: [u8; 4] = self.bytes[offset..end]
            .try_into()
            .expect("slice is four bytes");
        Ok(if self.big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        })
    }

    fn string(&self, length: u32, offset: u32) -> CatalogResult<&'a [u8]> {
        let start = offset as usize;
        let end = start
            .checked_add(length as usize)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| mo_error(self.source, "string data out of bounds"))?;
        Ok(&self.bytes[start..end])
    }

    /// The `(length, offset)` pair at slot `index` of the table starting at
    /// `table_offset`.
    fn table_entry(&self, table_offset: u32, index: u32) -> CatalogResult<(u32, u32)> {
        let slot = table_offset as usize + index as usize * 8;
        Ok((self.word(slot)?, self.word(slot + 4)?))
    }
}

/// Parses an MO byte stream into a catalog.
pub fn read_mo(stream: &mut dyn Read) -> CatalogResult<Catalog> {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes)?;
    parse_mo(&bytes, None)
}

/// Parses MO bytes already held in memory. `source` names the input in
/// error messages.
pub fn parse_mo(bytes: &[u8], source: Option<&str>) -> CatalogResult<Catalog> {
    if bytes.len() < HEADER_SIZE as usize {
        return Err(mo_error(source, "file too short for header"));
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().expect("slice is four bytes"));
    let big_endian = match magic {
        MO_MAGIC_LE => false,
        MO_MAGIC_BE => true,
        _ => return Err(mo_error(source, "bad magic number")),
    };
    let reader = MoReader {
        bytes,
        big_endian,
        source,
    };

    let count = reader.word(8)?;
    let ids_table = reader.word(12)?;
    let strings_table = reader.word(16)?;

    let mut catalog = Catalog::new(None, None);

    // Header first: its charset decodes every other entry.
    for index in 0..count {
        let (id_len, id_offset) = reader.table_entry(ids_table, index)?;
        if id_len != 0 {
            continue;
        }
        let (str_len, str_offset) = reader.table_entry(strings_table, index)?;
        let header_bytes = reader.string(str_len, str_offset)?;
        let (header, _, _) = UTF_8.decode(header_bytes);
        catalog.parse_header(&header);
        break;
    }
    let encoding = Encoding::for_label(catalog.charset.as_bytes()).unwrap_or(UTF_8);
    let decode = |raw: &[u8]| -> String { encoding.decode(raw).0.into_owned() };

    for index in 0..count {
        let (id_len, id_offset) = reader.table_entry(ids_table, index)?;
        if id_len == 0 {
            continue;
        }
        let (str_len, str_offset) = reader.table_entry(strings_table, index)?;
        let id_bytes = reader.string(id_len, id_offset)?;
        let str_bytes = reader.string(str_len, str_offset)?;

        let (context, id_bytes) = match id_bytes
            .iter()
            .position(|&b| b == CONTEXT_SEPARATOR)
        {
            Some(pos) => (Some(decode(&id_bytes[..pos])), &id_bytes[pos + 1..]),
            None => (None, id_bytes),
        };

        let id_forms: Vec<String> = id_bytes
            .split(|&b| b == PLURAL_SEPARATOR)
            .map(decode)
            .collect();
        let message = if id_forms.len() > 1 {
            let forms: Vec<String> = str_bytes
                .split(|&b| b == PLURAL_SEPARATOR)
                .map(decode)
                .collect();
            Message::new(
                TranslationString::Plural(id_forms),
                Some(TranslationString::Plural(forms)),
            )
        } else {
            Message::new(
                TranslationString::Singular(id_forms.into_iter().next().unwrap_or_default()),
                Some(TranslationString::Singular(decode(str_bytes))),
            )
        };
        catalog.add(message.with_context(context.as_deref()));
    }

    Ok(catalog)
}

/// Serializes a catalog in MO format.
///
/// Fuzzy messages are skipped unless `include_fuzzy`; obsolete messages are
/// never written. Messages are ordered by id (plural messages by their
/// singular form) before offsets are assigned; downstream consumers rely on
/// that ordering even though no hash table is emitted.
pub fn write_mo(
    stream: &mut dyn Write,
    catalog: &Catalog,
    include_fuzzy: bool,
) -> CatalogResult<()> {
    let encoding = Encoding::for_label(catalog.charset.as_bytes()).unwrap_or(UTF_8);
    let encode = |text: &str| -> Vec<u8> { encoding.encode(text).0.into_owned() };

    let header = catalog.header_message();
    let mut messages: Vec<&Message> = catalog
        .iter()
        .filter(|m| include_fuzzy || !m.is_fuzzy())
        .collect();
    messages.sort_by_key(|m| (m.id.singular().to_string(), m.context.clone()));
    messages.insert(0, &header);

    let mut id_entries: Vec<Vec<u8>> = Vec::with_capacity(messages.len());
    let mut string_entries: Vec<Vec<u8>> = Vec::with_capacity(messages.len());
    for message in &messages {
        let mut id_entry = Vec::new();
        if let Some(context) = &message.context {
            id_entry.extend_from_slice(&encode(context));
            id_entry.push(CONTEXT_SEPARATOR);
        }
        let id_forms = message.id.forms();
        for (index, form) in id_forms.iter().enumerate() {
            if index > 0 {
                id_entry.push(PLURAL_SEPARATOR);
            }
            id_entry.extend_from_slice(&encode(form));
        }
        id_entries.push(id_entry);

        let mut string_entry = Vec::new();
        match &message.string {
            TranslationString::Plural(forms) => {
                for (index, form) in forms.iter().enumerate() {
                    if index > 0 {
                        string_entry.push(PLURAL_SEPARATOR);
                    }
                    // An untranslated plural slot falls back to the id form.
                    let text = if form.is_empty() {
                        id_forms.get(index.min(1)).copied().unwrap_or("")
                    } else {
                        form.as_str()
                    };
                    string_entry.extend_from_slice(&encode(text));
                }
            }
            TranslationString::Singular(form) => {
                string_entry.extend_from_slice(&encode(form));
            }
        }
        string_entries.push(string_entry);
    }

    let count = messages.len() as u32;
    let ids_table = HEADER_SIZE;
    let strings_table = ids_table + count * 8;
    let ids_blob_offset = strings_table + count * 8;

    let mut ids_blob: Vec<u8> = Vec::new();
    let mut id_index: Vec<(u32, u32)> = Vec::with_capacity(id_entries.len());
    for entry in &id_entries {
        id_index.push((entry.len() as u32, ids_blob_offset + ids_blob.len() as u32));
        ids_blob.extend_from_slice(entry);
        ids_blob.push(0);
    }

    let strings_blob_offset = ids_blob_offset + ids_blob.len() as u32;
    let mut strings_blob: Vec<u8> = Vec::new();
    let mut string_index: Vec<(u32, u32)> = Vec::with_capacity(string_entries.len());
    for entry in &string_entries {
        string_index.push((
            entry.len() as u32,
            strings_blob_offset + strings_blob.len() as u32,
        ));
        strings_blob.extend_from_slice(entry);
        strings_blob.push(0);
    }

    stream.write_all(&MO_MAGIC_LE.to_le_bytes())?;
    stream.write_all(&0u32.to_le_bytes())?; // format version
    stream.write_all(&count.to_le_bytes())?;
    stream.write_all(&ids_table.to_le_bytes())?;
    stream.write_all(&strings_table.to_le_bytes())?;
    stream.write_all(&0u32.to_le_bytes())?; // hash table size
    stream.write_all(&0u32.to_le_bytes())?; // hash table offset
    for (length, offset) in &id_index {
        stream.write_all(&length.to_le_bytes())?;
        stream.write_all(&offset.to_le_bytes())?;
    }
    for (length, offset) in &string_index {
        stream.write_all(&length.to_le_bytes())?;
        stream.write_all(&offset.to_le_bytes())?;
    }
    stream.write_all(&ids_blob)?;
    stream.write_all(&strings_blob)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(catalog: &Catalog, include_fuzzy: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        write_mo(&mut buf, catalog, include_fuzzy).unwrap();
        buf
    }

    #[test]
    fn test_mo_round_trip() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new("Hello".into(), Some("Hallo".into())));
        catalog.add(
            Message::new("May".into(), Some("Mai".into())).with_context(Some("month")),
        );
        catalog.add(Message::new(
            ("one", "many").into(),
            Some(vec!["eins".to_string(), "viele".to_string()].into()),
        ));

        let reread = parse_mo(&write(&catalog, false), None).unwrap();
        assert_eq!(reread.len(), catalog.len());
        for message in catalog.iter() {
            let other = reread
                .get(message.id.singular(), message.context.as_deref())
                .unwrap();
            assert_eq!(other.string, message.string);
            assert_eq!(other.context, message.context);
        }
    }

    #[test]
    fn test_header_round_trips_as_empty_id_entry() {
        let mut catalog = Catalog::new(None, None);
        catalog.project = "Widget".to_string();
        catalog.version = "3.4".to_string();
        catalog.last_translator = "A Translator <a@example.com>".to_string();

        let reread = parse_mo(&write(&catalog, false), None).unwrap();
        assert_eq!(reread.project, "Widget");
        assert_eq!(reread.version, "3.4");
        assert_eq!(reread.last_translator, "A Translator <a@example.com>");
        assert_eq!(reread.len(), 0);
    }

    #[test]
    fn test_fuzzy_messages_excluded_by_default() {
        let mut catalog = Catalog::new(Some("de"), None);
        let mut fuzzy = Message::new("draft".into(), Some("Entwurf".into()));
        fuzzy.flags.insert("fuzzy".to_string());
        catalog.add(fuzzy);
        catalog.add(Message::new("done".into(), Some("fertig".into())));

        let without = parse_mo(&write(&catalog, false), None).unwrap();
        assert!(without.get("draft", None).is_none());
        assert!(without.get("done", None).is_some());

        let with = parse_mo(&write(&catalog, true), None).unwrap();
        assert!(with.get("draft", None).is_some());
    }

    #[test]
    fn test_messages_ordered_by_id() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new("zebra".into(), Some("Z".into())));
        catalog.add(Message::new("apple".into(), Some("A".into())));
        catalog.add(Message::new("mango".into(), Some("M".into())));

        let reread = parse_mo(&write(&catalog, false), None).unwrap();
        let ids: Vec<String> = reread.iter().map(|m| m.id.singular().to_string()).collect();
        assert_eq!(ids, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_empty_plural_slot_falls_back_to_id_form() {
        let mut catalog = Catalog::new(Some("de"), None);
        catalog.add(Message::new(("one", "many").into(), None));

        let reread = parse_mo(&write(&catalog, false), None).unwrap();
        let msg = reread.get("one", None).unwrap();
        assert_eq!(msg.string.forms(), vec!["one", "many"]);
    }

    #[test]
    fn test_bad_magic_is_fatal() {
        let mut bytes = write(&Catalog::new(None, None), false);
        bytes[0] = 0xff;
        let result = parse_mo(&bytes, Some("broken.mo"));
        match result {
            Err(CatalogError::MoFormat { source, reason }) => {
                assert_eq!(source.as_deref(), Some("broken.mo"));
                assert!(reason.contains("magic"));
            }
            other => panic!("expected MoFormat error, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_table_is_fatal() {
        let bytes = write(&Catalog::new(None, None), false);
        let result = parse_mo(&bytes[..HEADER_SIZE as usize + 4], None);
        assert!(matches!(result, Err(CatalogError::MoFormat { .. })));
    }

    #[test]
    fn test_out_of_bounds_entry_is_fatal() {
        let mut bytes = write(&Catalog::new(None, None), false);
        // Point the first translated-string entry far outside the file.
        let strings_table = u32::from_le_bytes(bytes[16..20].try_into().unwrap()) as usize;
        bytes[strings_table + 4..strings_table + 8]
            .copy_from_slice(&0xffff_0000u32.to_le_bytes());
        let result = parse_mo(&bytes, None);
        assert!(matches!(result, Err(CatalogError::MoFormat { .. })));
    }

    #[test]
    fn test_big_endian_input() {
        // One non-header message, "a" -> "b", in big-endian layout.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MO_MAGIC_LE.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes()); // count
        bytes.extend_from_slice(&28u32.to_be_bytes()); // ids table
        bytes.extend_from_slice(&36u32.to_be_bytes()); // strings table
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes()); // id length
        bytes.extend_from_slice(&44u32.to_be_bytes()); // id offset
        bytes.extend_from_slice(&1u32.to_be_bytes()); // string length
        bytes.extend_from_slice(&46u32.to_be_bytes()); // string offset
        bytes.extend_from_slice(b"a\0b\0");

        let catalog = parse_mo(&bytes, None).unwrap();
        assert_eq!(catalog.get("a", None).unwrap().string.singular(), "b");
    }

    #[test]
    fn test_too_short_input_is_fatal() {
        assert!(matches!(
            parse_mo(&[0u8; 10], None),
            Err(CatalogError::MoFormat { .. })
        ));
    }
}
