//! Reading, writing, and maintaining gettext message catalogs.
//!
//! A [`Catalog`] holds [`Message`]s keyed by singular id and optional
//! context, together with the MIME headers and the plural rule of its
//! locale. Catalogs round-trip through the PO text format ([`read_po`],
//! [`write_po`]) and the MO binary format ([`read_mo`], [`write_mo`]),
//! and a translation catalog is reconciled against a freshly extracted
//! template with [`update`].
//!
//! ```no_run
//! use std::fs::File;
//!
//! use gettext_catalog::{read_po, update, write_po, PoReadOptions, PoWriteOptions};
//!
//! fn refresh() -> gettext_catalog::CatalogResult<()> {
//!     let mut file = File::open("de/LC_MESSAGES/messages.po")?;
//!     let mut catalog = read_po(&mut file, &PoReadOptions::default())?;
//!
//!     let mut template_file = File::open("messages.pot")?;
//!     let template = read_po(&mut template_file, &PoReadOptions::default())?;
//!
//!     update(&mut catalog, &template, true);
//!
//!     let mut out = File::create("de/LC_MESSAGES/messages.po")?;
//!     write_po(&mut out, &catalog, &PoWriteOptions::default())?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod merge;
pub mod message;
pub mod mofile;
pub mod plurals;
pub mod pofile;
pub mod validate;

pub use catalog::Catalog;
pub use error::{CatalogError, CatalogResult};
pub use merge::update;
pub use message::{Message, MessageKey, TranslationString};
pub use mofile::{parse_mo, read_mo, write_mo};
pub use plurals::{plural_rule, IcuPluralRuleProvider, PluralRuleProvider, DEFAULT_PLURAL_RULE};
pub use pofile::{parse_po, read_po, write_po, PoReadOptions, PoWriteOptions};
pub use validate::{validate, Checker, CheckerRegistry, Issue};
