use crate::config::LogStrategy;
use crate::executor::FieldChange;
use crate::modifier::ModifierOp;
use crate::oplog::entry::{LoggedMutation, MutationKind};

/// Decide the log representation of every changed field.
///
/// A modifier is logged verbatim only when replaying it yields the same value
/// regardless of the replica's prior content for that field. Otherwise the
/// computed post-image is logged as a literal assignment, so a replica that
/// replays entries in primary order converges even if its pre-image drifted.
/// `Unchanged` fields are not logged.
pub fn translate(changes: &[FieldChange], strategy: LogStrategy) -> Vec<LoggedMutation> {
    changes
        .iter()
        .filter(|fc| !fc.change.is_unchanged())
        .map(|fc| {
            let kind = match (fc.change.value(), rewrite(fc, strategy)) {
                (Some(value), true) => {
                    tracing::debug!(
                        path = %fc.path,
                        op = fc.op.operator(),
                        "logging post-image instead of modifier"
                    );
                    MutationKind::RewrittenAssign(value.clone())
                }
                _ => MutationKind::Original(fc.op.clone()),
            };
            LoggedMutation {
                path: fc.path.clone(),
                kind,
            }
        })
        .collect()
}

fn rewrite(fc: &FieldChange, strategy: LogStrategy) -> bool {
    match (&fc.op, strategy) {
        (ModifierOp::Unset, _) => false,
        (_, LogStrategy::RewriteAll) => true,
        // The trim window depends on the exact prior array.
        (ModifierOp::Push(args), _) => args.bound.is_some(),
        (ModifierOp::Bit(_) | ModifierOp::Inc(_), LogStrategy::Conservative) => true,
        // From an absent field the result depends only on the operands.
        (ModifierOp::Bit(_) | ModifierOp::Inc(_), LogStrategy::Minimal) => fc.prior_present,
        (ModifierOp::Set(_), _) => false,
    }
}
