use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::document;
use crate::error::UpdateError;
use crate::modifier::{FieldModifier, ModifierOp, ModifierSpec};
use crate::ops;

/// The fate of one field after a modifier was evaluated against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeRecord {
    Unchanged,
    /// The field existed and now holds this value.
    Modified(Bson),
    /// The field did not exist and now holds this value.
    Created(Bson),
    /// The field existed and was removed.
    Removed,
}

impl ChangeRecord {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ChangeRecord::Unchanged)
    }

    /// The post-image value, if the field exists afterwards.
    pub fn value(&self) -> Option<&Bson> {
        match self {
            ChangeRecord::Modified(v) | ChangeRecord::Created(v) => Some(v),
            ChangeRecord::Unchanged | ChangeRecord::Removed => None,
        }
    }
}

/// One evaluated modifier: what was asked for and what it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub path: String,
    pub op: ModifierOp,
    /// Whether the field existed in the pre-image.
    pub prior_present: bool,
    pub change: ChangeRecord,
}

/// Apply every modifier in `spec` to `doc`.
///
/// All modifiers are evaluated against the unmodified pre-image first; the
/// document is only touched once every one of them has succeeded, so an error
/// leaves `doc` exactly as it was. Changes are committed and returned in modifier
/// order.
pub fn execute(doc: &mut Document, spec: &ModifierSpec) -> Result<Vec<FieldChange>, UpdateError> {
    let changes = evaluate(doc, spec)?;
    commit(doc, &changes)?;

    tracing::debug!(
        modifiers = spec.entries.len(),
        changed = changes.iter().filter(|c| !c.change.is_unchanged()).count(),
        "applied modifiers"
    );
    Ok(changes)
}

/// Evaluate `spec` against `doc` without modifying it.
pub fn evaluate(doc: &Document, spec: &ModifierSpec) -> Result<Vec<FieldChange>, UpdateError> {
    spec.entries
        .iter()
        .map(|fm| evaluate_one(doc, fm))
        .collect()
}

fn evaluate_one(doc: &Document, fm: &FieldModifier) -> Result<FieldChange, UpdateError> {
    let current = document::lookup(doc, &fm.path)?;
    let change = match &fm.op {
        ModifierOp::Push(args) => ops::push::apply(&fm.path, current, args)?,
        ModifierOp::Bit(args) => ops::bit::apply(&fm.path, current, args)?,
        ModifierOp::Set(value) => ops::scalar::set(current, value),
        ModifierOp::Unset => ops::scalar::unset(current),
        ModifierOp::Inc(amount) => ops::scalar::inc(&fm.path, current, amount)?,
    };

    tracing::trace!(path = %fm.path, op = fm.op.operator(), ?change, "evaluated modifier");
    Ok(FieldChange {
        path: fm.path.clone(),
        op: fm.op.clone(),
        prior_present: current.is_some(),
        change,
    })
}

/// Write evaluated changes into `doc`.
///
/// Paths in a parsed `ModifierSpec` never overlap, and every intermediate on a changed
/// path was already validated by `lookup`, so this cannot fail halfway for a
/// `ModifierSpec` produced by `parse_modifiers`. It still works on a scratch copy so the
/// all-or-nothing guarantee holds for hand-built ones too.
fn commit(doc: &mut Document, changes: &[FieldChange]) -> Result<(), UpdateError> {
    if changes.iter().all(|c| c.change.is_unchanged()) {
        return Ok(());
    }

    let mut next = doc.clone();
    for fc in changes {
        match &fc.change {
            ChangeRecord::Unchanged => {}
            ChangeRecord::Modified(value) | ChangeRecord::Created(value) => {
                document::assign(&mut next, &fc.path, value.clone())?;
            }
            ChangeRecord::Removed => {
                document::remove(&mut next, &fc.path)?;
            }
        }
    }
    *doc = next;
    Ok(())
}
