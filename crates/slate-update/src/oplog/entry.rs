use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

use crate::error::UpdateError;
use crate::modifier::{ModifierOp, parse_document};

/// How a single field mutation is carried in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum MutationKind {
    /// The modifier exactly as the client sent it.
    Original(ModifierOp),
    /// The field's post-image, to be assigned verbatim.
    RewrittenAssign(Bson),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedMutation {
    pub path: String,
    pub kind: MutationKind,
}

impl LoggedMutation {
    /// The mutation in operator form, rewritten assignments as `$set`.
    pub fn as_modifier(&self) -> ModifierOp {
        match &self.kind {
            MutationKind::Original(op) => op.clone(),
            MutationKind::RewrittenAssign(value) => ModifierOp::Set(value.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOp {
    /// A document created by an upsert, logged as its full post-image.
    Insert(Document),
    /// Field mutations of an existing document, in application order.
    Update(Vec<LoggedMutation>),
}

/// One durable change-log record for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// `_id` of the mutated document.
    pub target: Bson,
    pub op: LogOp,
}

impl LogEntry {
    /// Render as an oplog document:
    /// `{ op: "u", o2: { _id }, o: <update> }` or `{ op: "i", o: <document> }`.
    ///
    /// Update bodies use ordinary operator syntax, rewritten mutations as
    /// `$set`, so they parse with [`parse_document`]. Grouping by operator
    /// reorders fields across operators, which is harmless because logged
    /// paths never overlap.
    pub fn to_document(&self) -> Document {
        match &self.op {
            LogOp::Insert(document) => doc! { "op": "i", "o": document.clone() },
            LogOp::Update(mutations) => doc! {
                "op": "u",
                "o2": { "_id": self.target.clone() },
                "o": update_document(mutations)
            },
        }
    }

    /// Parse an oplog document produced by [`LogEntry::to_document`].
    ///
    /// Every mutation comes back as `Original`: a rewritten assignment is
    /// indistinguishable from, and replays exactly like, a logged `$set`.
    ///
    /// Mutations come back grouped by operator, operators in order of first
    /// use, so `[a: $set, b: $unset, c: $set]` reads back as `a, c, b`. Order
    /// within one operator is kept. Logged paths never overlap, so replaying
    /// the regrouped list yields the same document.
    pub fn from_document(record: &Document) -> Result<Self, UpdateError> {
        let malformed = |msg: &str| UpdateError::MalformedLogEntry(msg.to_string());
        let body = record
            .get_document("o")
            .map_err(|_| malformed("missing 'o' document"))?;

        match record.get_str("op").map_err(|_| malformed("missing 'op'"))? {
            "i" => {
                let target = body
                    .get("_id")
                    .cloned()
                    .ok_or_else(|| malformed("inserted document has no _id"))?;
                Ok(LogEntry {
                    target,
                    op: LogOp::Insert(body.clone()),
                })
            }
            "u" => {
                let target = record
                    .get_document("o2")
                    .ok()
                    .and_then(|o2| o2.get("_id"))
                    .cloned()
                    .ok_or_else(|| malformed("missing 'o2._id'"))?;
                let mutations = parse_document(body)?
                    .entries
                    .into_iter()
                    .map(|fm| LoggedMutation {
                        path: fm.path,
                        kind: MutationKind::Original(fm.op),
                    })
                    .collect();
                Ok(LogEntry {
                    target,
                    op: LogOp::Update(mutations),
                })
            }
            other => Err(malformed(&format!("unknown op '{other}'"))),
        }
    }
}

fn update_document(mutations: &[LoggedMutation]) -> Document {
    let mut update = Document::new();
    for m in mutations {
        let op = m.as_modifier();
        if !update.contains_key(op.operator()) {
            update.insert(op.operator(), Document::new());
        }
        if let Some(Bson::Document(fields)) = update.get_mut(op.operator()) {
            fields.insert(m.path.clone(), op.operand());
        }
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::{BitArgs, BitOp, BitOperand, PushArgs};

    fn sample_update() -> LogEntry {
        LogEntry {
            target: Bson::Int32(1),
            op: LogOp::Update(vec![
                LoggedMutation {
                    path: "val".into(),
                    kind: MutationKind::RewrittenAssign(bson::bson!([3, 4, 5])),
                },
                LoggedMutation {
                    path: "log".into(),
                    kind: MutationKind::Original(ModifierOp::Push(PushArgs {
                        each: vec![Bson::Int32(6)],
                        bound: None,
                    })),
                },
                LoggedMutation {
                    path: "flags".into(),
                    kind: MutationKind::Original(ModifierOp::Bit(BitArgs {
                        ops: vec![(BitOp::Or, BitOperand::Int64(2))],
                    })),
                },
            ]),
        }
    }

    #[test]
    fn update_renders_operator_syntax() {
        let rendered = sample_update().to_document();
        assert_eq!(
            rendered,
            doc! {
                "op": "u",
                "o2": { "_id": 1 },
                "o": {
                    "$set": { "val": [3, 4, 5] },
                    "$push": { "log": { "$each": [6] } },
                    "$bit": { "flags": { "or": 2_i64 } }
                }
            }
        );
    }

    #[test]
    fn insert_renders_document() {
        let entry = LogEntry {
            target: Bson::Int32(1),
            op: LogOp::Insert(doc! { "_id": 1, "val": [1, 2, 3] }),
        };
        assert_eq!(
            entry.to_document(),
            doc! { "op": "i", "o": { "_id": 1, "val": [1, 2, 3] } }
        );
    }

    #[test]
    fn rendered_update_parses_back() {
        let parsed = LogEntry::from_document(&sample_update().to_document()).unwrap();
        assert_eq!(parsed.target, Bson::Int32(1));
        let LogOp::Update(mutations) = parsed.op else {
            panic!("expected update");
        };
        assert_eq!(mutations.len(), 3);
        assert_eq!(
            mutations[0].kind,
            MutationKind::Original(ModifierOp::Set(bson::bson!([3, 4, 5])))
        );
    }

    #[test]
    fn parsed_mutations_are_grouped_by_operator() {
        let entry = LogEntry {
            target: Bson::Int32(1),
            op: LogOp::Update(vec![
                LoggedMutation {
                    path: "a".into(),
                    kind: MutationKind::RewrittenAssign(Bson::Int32(1)),
                },
                LoggedMutation {
                    path: "b".into(),
                    kind: MutationKind::Original(ModifierOp::Unset),
                },
                LoggedMutation {
                    path: "c".into(),
                    kind: MutationKind::RewrittenAssign(Bson::Int32(3)),
                },
            ]),
        };
        let parsed = LogEntry::from_document(&entry.to_document()).unwrap();
        let LogOp::Update(mutations) = &parsed.op else {
            panic!("expected update");
        };
        let paths: Vec<&str> = mutations.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "c", "b"]);

        let pre = doc! { "_id": 1, "b": true };
        assert_eq!(
            crate::oplog::replay(Some(pre.clone()), &parsed).unwrap(),
            crate::oplog::replay(Some(pre), &entry).unwrap()
        );
    }

    #[test]
    fn from_document_rejects_garbage() {
        assert!(LogEntry::from_document(&doc! { "op": "x", "o": {} }).is_err());
        assert!(LogEntry::from_document(&doc! { "op": "u" }).is_err());
        assert!(LogEntry::from_document(&doc! { "op": "u", "o": { "$set": { "a": 1 } } }).is_err());
        assert!(LogEntry::from_document(&doc! { "op": "i", "o": { "a": 1 } }).is_err());
    }

    #[test]
    fn serde_round_trip_through_bson() {
        let entry = sample_update();
        let encoded = bson::serialize_to_document(&entry).unwrap();
        let decoded: LogEntry = bson::deserialize_from_document(encoded).unwrap();
        assert_eq!(decoded, entry);
    }
}
