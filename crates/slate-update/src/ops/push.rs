use bson::Bson;

use crate::document::type_name;
use crate::error::UpdateError;
use crate::executor::ChangeRecord;
use crate::modifier::PushArgs;

/// `$push`: append `each` to the array at `path`, then keep only the last
/// `bound` elements when a bound is given.
///
/// The trim window depends on the exact prior contents and length, so the
/// result is only reproducible on a replica with a byte-identical pre-image.
pub(crate) fn apply(
    path: &str,
    current: Option<&Bson>,
    args: &PushArgs,
) -> Result<ChangeRecord, UpdateError> {
    let mut array = match current {
        Some(Bson::Array(existing)) => existing.clone(),
        Some(other) => {
            return Err(UpdateError::type_mismatch(
                path,
                format!("$push requires an array, found {}", type_name(other)),
            ));
        }
        None => Vec::with_capacity(args.each.len()),
    };
    array.extend(args.each.iter().cloned());

    if let Some(bound) = args.bound {
        retain_last(&mut array, bound);
    }

    let value = Bson::Array(array);
    Ok(match current {
        Some(_) => ChangeRecord::Modified(value),
        None => ChangeRecord::Created(value),
    })
}

/// Keep the trailing `bound` elements, discarding from the front.
fn retain_last(array: &mut Vec<Bson>, bound: i64) {
    let keep = usize::try_from(bound).unwrap_or(0);
    if array.len() > keep {
        array.drain(..array.len() - keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::bson;

    fn ints(values: &[i32]) -> Bson {
        Bson::Array(values.iter().map(|v| Bson::Int32(*v)).collect())
    }

    fn args(each: &[i32], bound: Option<i64>) -> PushArgs {
        PushArgs {
            each: each.iter().map(|v| Bson::Int32(*v)).collect(),
            bound,
        }
    }

    #[test]
    fn appends_within_bound() {
        let current = ints(&[1, 2]);
        let change = apply("a", Some(&current), &args(&[3], Some(3))).unwrap();
        assert_eq!(change, ChangeRecord::Modified(ints(&[1, 2, 3])));
    }

    #[test]
    fn trims_from_front() {
        let current = ints(&[1, 2, 3]);
        let change = apply("a", Some(&current), &args(&[4], Some(3))).unwrap();
        assert_eq!(change, ChangeRecord::Modified(ints(&[2, 3, 4])));
    }

    #[test]
    fn trims_into_appended_values() {
        let current = ints(&[1, 2]);
        let change = apply("a", Some(&current), &args(&[3, 4, 5, 6], Some(2))).unwrap();
        assert_eq!(change, ChangeRecord::Modified(ints(&[5, 6])));
    }

    #[test]
    fn absent_field_is_created() {
        let change = apply("a", None, &args(&[1, 2, 3], Some(3))).unwrap();
        assert_eq!(change, ChangeRecord::Created(ints(&[1, 2, 3])));
    }

    #[test]
    fn no_bound_grows_unbounded() {
        let current = ints(&[3, 4, 5]);
        let change = apply("a", Some(&current), &args(&[6, 7], None)).unwrap();
        assert_eq!(change, ChangeRecord::Modified(ints(&[3, 4, 5, 6, 7])));
    }

    #[test]
    fn zero_or_negative_bound_empties() {
        let current = ints(&[1, 2]);
        for bound in [0, -1, i64::MIN] {
            let change = apply("a", Some(&current), &args(&[3], Some(bound))).unwrap();
            assert_eq!(change, ChangeRecord::Modified(ints(&[])));
        }
    }

    #[test]
    fn empty_each_on_absent_creates_empty_array() {
        let change = apply("a", None, &args(&[], None)).unwrap();
        assert_eq!(change, ChangeRecord::Created(ints(&[])));
    }

    #[test]
    fn mixed_element_types_are_preserved() {
        let current = bson!(["x", 1]);
        let push = PushArgs {
            each: vec![bson!({ "k": true }), Bson::Null],
            bound: Some(3),
        };
        let change = apply("a", Some(&current), &push).unwrap();
        assert_eq!(
            change,
            ChangeRecord::Modified(bson!([1, { "k": true }, null]))
        );
    }

    #[test]
    fn non_array_errors() {
        for current in [Bson::Int32(1), Bson::String("x".into()), Bson::Null] {
            let err = apply("a", Some(&current), &args(&[1], None)).unwrap_err();
            assert!(matches!(err, UpdateError::TypeMismatch { .. }));
        }
    }
}
