use bson::Bson;

use crate::document::type_name;
use crate::error::UpdateError;
use crate::executor::ChangeRecord;

/// `$set`: unchanged when the stored value already equals `value`.
pub(crate) fn set(current: Option<&Bson>, value: &Bson) -> ChangeRecord {
    match current {
        Some(existing) if existing == value => ChangeRecord::Unchanged,
        Some(_) => ChangeRecord::Modified(value.clone()),
        None => ChangeRecord::Created(value.clone()),
    }
}

/// `$unset`: remove the field if present.
pub(crate) fn unset(current: Option<&Bson>) -> ChangeRecord {
    match current {
        Some(_) => ChangeRecord::Removed,
        None => ChangeRecord::Unchanged,
    }
}

/// `$inc`: increment a numeric field.
///
/// Type promotion rules:
/// - int + int → int (long on overflow)
/// - int + long, long + long → long
/// - anything + double → double
/// - missing field starts from 0 with the increment's type
pub(crate) fn inc(
    path: &str,
    current: Option<&Bson>,
    amount: &Bson,
) -> Result<ChangeRecord, UpdateError> {
    let current = match current {
        Some(existing) => existing,
        None => return Ok(ChangeRecord::Created(amount.clone())),
    };

    let overflow = || UpdateError::InvalidModifier(format!("$inc on '{path}' overflows a long"));
    let result = match (current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(*a as i64 + *b as i64),
        },
        (Bson::Int32(a), Bson::Int64(b)) => {
            Bson::Int64((*a as i64).checked_add(*b).ok_or_else(overflow)?)
        }
        (Bson::Int64(a), Bson::Int32(b)) => {
            Bson::Int64(a.checked_add(*b as i64).ok_or_else(overflow)?)
        }
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Int64(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + *b as f64),
        (Bson::Double(a), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        (other, _) => {
            return Err(UpdateError::type_mismatch(
                path,
                format!("$inc requires a number, found {}", type_name(other)),
            ));
        }
    };

    Ok(ChangeRecord::Modified(result))
}
