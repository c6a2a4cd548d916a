//! Update-modifier application and change-log translation for slate documents.
//!
//! An update document is parsed into a [`ModifierSpec`], evaluated against a
//! document by the [`executor`], and the resulting field changes are
//! translated into a [`LogEntry`] that a replica can [`replay`] to reach the
//! same post-image.

mod config;
pub mod document;
mod error;
pub mod executor;
mod modifier;
mod ops;
pub mod oplog;
mod updater;
pub mod upsert;

pub use bson::{Bson, Document, RawDocument, RawDocumentBuf};
pub use config::{LogStrategy, UpdateConfig};
pub use error::UpdateError;
pub use executor::{ChangeRecord, FieldChange, execute};
pub use modifier::{
    BitArgs, BitOp, BitOperand, FieldModifier, ModifierOp, ModifierSpec, PushArgs,
    parse_document, parse_modifiers,
};
pub use oplog::{LogEntry, LogOp, LoggedMutation, MutationKind, replay, translate};
pub use updater::{UpdateOutcome, UpdateRequest, Updater};
