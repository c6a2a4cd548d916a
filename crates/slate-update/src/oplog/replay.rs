use bson::Document;

use crate::document;
use crate::error::UpdateError;
use crate::executor;
use crate::modifier::{FieldModifier, ModifierOp, ModifierSpec};
use crate::oplog::entry::{LogEntry, LogOp, MutationKind};

/// Apply a log entry on a replica and return the resulting document.
///
/// Inserts replace whatever the replica holds. Updates need the replica's
/// copy of the document and apply mutations in primary order. Assignments,
/// rewritten or logged `$set`, are written literally and replace any
/// non-document value on the way to the field; every other modifier runs
/// through the same executor as the primary. An error discards the whole
/// entry.
pub fn replay(pre_image: Option<Document>, entry: &LogEntry) -> Result<Document, UpdateError> {
    match &entry.op {
        LogOp::Insert(inserted) => {
            tracing::debug!(id = %entry.target, "replaying insert");
            Ok(inserted.clone())
        }
        LogOp::Update(mutations) => {
            let mut doc =
                pre_image.ok_or_else(|| UpdateError::DocumentNotFound(entry.target.to_string()))?;
            for m in mutations {
                match &m.kind {
                    MutationKind::RewrittenAssign(value)
                    | MutationKind::Original(ModifierOp::Set(value)) => {
                        document::force_assign(&mut doc, &m.path, value.clone())?;
                    }
                    MutationKind::Original(op) => {
                        let spec = ModifierSpec {
                            entries: vec![FieldModifier {
                                path: m.path.clone(),
                                op: op.clone(),
                            }],
                        };
                        executor::execute(&mut doc, &spec)?;
                    }
                }
            }

            tracing::debug!(id = %entry.target, mutations = mutations.len(), "replayed update");
            Ok(doc)
        }
    }
}
