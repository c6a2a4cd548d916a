use bson::oid::ObjectId;
use bson::raw::RawDocument;
use bson::{Bson, Document};

use crate::document::{self, collapse_keys};
use crate::error::UpdateError;

/// Build the pre-image for an upsert from the query's equality terms.
///
/// Contributing terms are top-level `field: value` pairs (where `value` is not
/// an operator document), `field: { $eq: value }`, and the same forms nested
/// inside `$and`. Anything else (`$or`, `$gt`, `$in`, ...) is a predicate the
/// new document need not satisfy by construction and is skipped.
///
/// `_id` always comes first; when the query pins no `_id` a fresh ObjectId is
/// generated. The generated id ends up in the logged insert, so replicas never
/// generate their own.
pub fn base_document(query: &RawDocument) -> Result<Document, UpdateError> {
    let query = collapse_keys(query)?;
    let mut base = Document::new();
    collect_equalities(&query, &mut base)?;
    let base = normalize_id(base);

    tracing::debug!(fields = base.len(), "synthesized upsert base document");
    Ok(base)
}

fn collect_equalities(query: &Document, base: &mut Document) -> Result<(), UpdateError> {
    for (key, value) in query {
        match key.as_str() {
            "$and" => {
                let clauses = match value {
                    Bson::Array(clauses) => clauses,
                    _ => return Err(UpdateError::InvalidQuery("$and value must be an array".into())),
                };
                for clause in clauses {
                    match clause {
                        Bson::Document(d) => collect_equalities(d, base)?,
                        _ => {
                            return Err(UpdateError::InvalidQuery(
                                "$and array elements must be documents".into(),
                            ));
                        }
                    }
                }
            }
            k if k.starts_with('$') => {}
            field => {
                if let Some(eq) = equality_value(value) {
                    document::assign(base, field, eq.clone()).map_err(|e| {
                        UpdateError::InvalidQuery(format!("equality on '{field}': {e}"))
                    })?;
                }
            }
        }
    }
    Ok(())
}

/// The value a field condition pins the field to, if it is an equality.
fn equality_value(condition: &Bson) -> Option<&Bson> {
    match condition {
        Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
            ops.get("$eq")
        }
        plain => Some(plain),
    }
}

/// Move `_id` to the front, generating one when missing.
fn normalize_id(mut doc: Document) -> Document {
    let id = doc
        .remove("_id")
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
    let mut out = Document::new();
    out.insert("_id", id);
    for (key, value) in doc {
        out.insert(key, value);
    }
    out
}
