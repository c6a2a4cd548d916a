//! Change-log records: what a primary emits for each document mutation, and
//! how a replica replays it.

mod entry;
mod replay;
mod translate;

pub use entry::{LogEntry, LogOp, LoggedMutation, MutationKind};
pub use replay::replay;
pub use translate::translate;
