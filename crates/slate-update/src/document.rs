//! Dotted-path addressing over `bson::Document` and key-collapsing
//! construction from raw BSON input.
//!
//! Paths walk nested documents only: `"stats.flags"` reads `doc["stats"]["flags"]`.
//! Any non-document value in an intermediate position is a type mismatch.

use bson::raw::{RawArray, RawBsonRef, RawDocument};
use bson::{Bson, Document};

use crate::error::UpdateError;

/// Build an owned `Document` from raw input, keeping only the last occurrence
/// of a repeated key at every nesting level.
///
/// A repeated key keeps the position of its first occurrence and the value of
/// its last, which is plain ordered-map insert semantics.
pub fn collapse_keys(raw: &RawDocument) -> Result<Document, UpdateError> {
    let mut doc = Document::new();
    for result in raw.iter() {
        let (key, value) = result.map_err(|e| UpdateError::Bson(e.to_string()))?;
        doc.insert(key.to_string(), collapse_value(value)?);
    }
    Ok(doc)
}

fn collapse_array(raw: &RawArray) -> Result<Vec<Bson>, UpdateError> {
    let mut out = Vec::new();
    for result in raw {
        let value = result.map_err(|e| UpdateError::Bson(e.to_string()))?;
        out.push(collapse_value(value)?);
    }
    Ok(out)
}

fn collapse_value(value: RawBsonRef) -> Result<Bson, UpdateError> {
    match value {
        RawBsonRef::Document(d) => Ok(Bson::Document(collapse_keys(d)?)),
        RawBsonRef::Array(a) => Ok(Bson::Array(collapse_array(a)?)),
        other => other
            .to_owned()
            .try_into()
            .map_err(|e: bson::error::Error| UpdateError::Bson(e.to_string())),
    }
}

/// Split a dotted path, rejecting empty segments (`"a..b"`, `".a"`, `""`).
pub fn split_path(path: &str) -> Result<Vec<&str>, UpdateError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(UpdateError::InvalidModifier(format!(
            "field path '{path}' contains an empty segment"
        )));
    }
    Ok(segments)
}

/// Returns true when one path equals the other or is a dotted prefix of it.
///
/// `"a"` conflicts with `"a"` and `"a.b"`, but not with `"ab"`.
pub fn paths_conflict(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    long == short || (long.starts_with(short) && long.as_bytes()[short.len()] == b'.')
}

/// Look up the value at a dotted path.
///
/// `Ok(None)` means the field is absent, including when an intermediate
/// document is missing.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Result<Option<&'a Bson>, UpdateError> {
    let segments = split_path(path)?;
    let (leaf, intermediates) = match segments.split_last() {
        Some(parts) => parts,
        None => return Ok(None),
    };

    let mut current = doc;
    for &segment in intermediates {
        match current.get(segment) {
            Some(Bson::Document(sub)) => current = sub,
            Some(other) => {
                return Err(UpdateError::type_mismatch(
                    path,
                    format!(
                        "intermediate '{segment}' is {}, not a document",
                        type_name(other)
                    ),
                ));
            }
            None => return Ok(None),
        }
    }
    Ok(current.get(*leaf))
}

/// Assign `value` at a dotted path, creating missing intermediate documents.
pub fn assign(doc: &mut Document, path: &str, value: Bson) -> Result<(), UpdateError> {
    let segments = split_path(path)?;
    assign_segments(doc, path, &segments, value)
}

fn assign_segments(
    doc: &mut Document,
    path: &str,
    segments: &[&str],
    value: Bson,
) -> Result<(), UpdateError> {
    match segments {
        [] => Err(UpdateError::InvalidModifier("empty field path".into())),
        [leaf] => {
            doc.insert(leaf.to_string(), value);
            Ok(())
        }
        [head, rest @ ..] => {
            if !doc.contains_key(*head) {
                doc.insert(head.to_string(), Document::new());
            }
            match doc.get_mut(*head) {
                Some(Bson::Document(sub)) => assign_segments(sub, path, rest, value),
                Some(other) => Err(UpdateError::type_mismatch(
                    path,
                    format!("intermediate '{head}' is {}, not a document", type_name(other)),
                )),
                None => Err(UpdateError::type_mismatch(path, "intermediate vanished")),
            }
        }
    }
}

/// Assign `value` at a dotted path, replacing any non-document intermediate
/// with an empty document.
///
/// Replay writes logged post-images through this.
pub fn force_assign(doc: &mut Document, path: &str, value: Bson) -> Result<(), UpdateError> {
    let segments = split_path(path)?;
    force_assign_segments(doc, &segments, value);
    Ok(())
}

fn force_assign_segments(doc: &mut Document, segments: &[&str], value: Bson) {
    match segments {
        [] => {}
        [leaf] => {
            doc.insert(leaf.to_string(), value);
        }
        [head, rest @ ..] => {
            if !matches!(doc.get(*head), Some(Bson::Document(_))) {
                doc.insert(head.to_string(), Document::new());
            }
            if let Some(Bson::Document(sub)) = doc.get_mut(*head) {
                force_assign_segments(sub, rest, value);
            }
        }
    }
}

/// Remove the value at a dotted path. Missing intermediates are not an error.
pub fn remove(doc: &mut Document, path: &str) -> Result<Option<Bson>, UpdateError> {
    let segments = split_path(path)?;
    remove_segments(doc, path, &segments)
}

fn remove_segments(
    doc: &mut Document,
    path: &str,
    segments: &[&str],
) -> Result<Option<Bson>, UpdateError> {
    match segments {
        [] => Ok(None),
        [leaf] => Ok(doc.remove(*leaf)),
        [head, rest @ ..] => match doc.get_mut(*head) {
            Some(Bson::Document(sub)) => remove_segments(sub, path, rest),
            Some(other) => Err(UpdateError::type_mismatch(
                path,
                format!("intermediate '{head}' is {}, not a document", type_name(other)),
            )),
            None => Ok(None),
        },
    }
}

/// Short human-readable name of a value's BSON type, for error messages.
pub(crate) fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Document(_) => "document",
        Bson::Array(_) => "array",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Decimal128(_) => "decimal",
        _ => "unsupported type",
    }
}
