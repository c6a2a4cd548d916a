//! One handler per `ModifierOp` variant. Each handler is a pure function of
//! the field's current value (`None` when absent) and its parameters, and
//! reports the field's fate as a `ChangeRecord` without touching the document.

pub(crate) mod bit;
pub(crate) mod push;
pub(crate) mod scalar;
