use bson::Bson;

use crate::document::type_name;
use crate::error::UpdateError;
use crate::executor::ChangeRecord;
use crate::modifier::{BitArgs, BitOp};

/// `$bit`: fold the `and` / `or` operands into the integer at `path`.
///
/// An absent field starts from a virtual 0. A field that existed before is
/// always written back, even when the result is unchanged or zero; an absent
/// field is only materialized when the result is non-zero.
///
/// The result is a long when the stored value or any operand is a long,
/// otherwise an int. AND and OR of sign-extended ints always fit in an int.
pub(crate) fn apply(
    path: &str,
    current: Option<&Bson>,
    args: &BitArgs,
) -> Result<ChangeRecord, UpdateError> {
    let (start, stored_wide) = match current {
        Some(Bson::Int32(v)) => (*v as i64, false),
        Some(Bson::Int64(v)) => (*v, true),
        Some(other) => {
            return Err(UpdateError::type_mismatch(
                path,
                format!("$bit requires an integer, found {}", type_name(other)),
            ));
        }
        None => (0, false),
    };

    let result = args.ops.iter().fold(start, |acc, (op, operand)| match op {
        BitOp::And => acc & operand.as_i64(),
        BitOp::Or => acc | operand.as_i64(),
    });

    let wide = stored_wide || args.ops.iter().any(|(_, operand)| operand.is_wide());
    let value = if wide {
        Bson::Int64(result)
    } else {
        Bson::Int32(result as i32)
    };

    Ok(match current {
        Some(_) => ChangeRecord::Modified(value),
        None if result != 0 => ChangeRecord::Created(value),
        None => ChangeRecord::Unchanged,
    })
}
