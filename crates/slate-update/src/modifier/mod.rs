use bson::raw::RawDocument;
use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::document::{collapse_keys, paths_conflict, split_path};
use crate::error::UpdateError;

/// Sub-operator of `$bit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOp {
    And,
    Or,
}

impl BitOp {
    pub fn name(self) -> &'static str {
        match self {
            BitOp::And => "and",
            BitOp::Or => "or",
        }
    }
}

/// Integer operand of a `$bit` sub-operator. The width is kept so that the
/// result can be stored in the narrowest type that holds every input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOperand {
    Int32(i32),
    Int64(i64),
}

impl BitOperand {
    pub fn as_i64(self) -> i64 {
        match self {
            BitOperand::Int32(v) => v as i64,
            BitOperand::Int64(v) => v,
        }
    }

    pub fn is_wide(self) -> bool {
        matches!(self, BitOperand::Int64(_))
    }

    fn to_bson(self) -> Bson {
        match self {
            BitOperand::Int32(v) => Bson::Int32(v),
            BitOperand::Int64(v) => Bson::Int64(v),
        }
    }
}

/// Parameters of `$push`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushArgs {
    /// Values appended, in order.
    pub each: Vec<Bson>,
    /// Number of trailing elements to retain after appending. `None` means
    /// unbounded growth; zero or negative retains nothing.
    pub bound: Option<i64>,
}

/// Parameters of `$bit`: surviving sub-operators in parameter-object order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitArgs {
    pub ops: Vec<(BitOp, BitOperand)>,
}

/// A single field-level modifier instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierOp {
    /// Append values to an array, optionally keeping only the last N.
    Push(PushArgs),
    /// Combine an integer field with AND / OR operands.
    Bit(BitArgs),
    /// Set a field to a literal value.
    Set(Bson),
    /// Remove a field.
    Unset,
    /// Add a numeric amount to a field.
    Inc(Bson),
}

impl ModifierOp {
    /// Operator key used in update documents.
    pub fn operator(&self) -> &'static str {
        match self {
            ModifierOp::Push(_) => "$push",
            ModifierOp::Bit(_) => "$bit",
            ModifierOp::Set(_) => "$set",
            ModifierOp::Unset => "$unset",
            ModifierOp::Inc(_) => "$inc",
        }
    }

    /// The per-field operand in update-document syntax, such that
    /// `{ operator(): { path: operand() } }` parses back to this op.
    pub fn operand(&self) -> Bson {
        match self {
            ModifierOp::Push(args) => {
                let mut params = Document::new();
                params.insert("$each", Bson::Array(args.each.clone()));
                if let Some(bound) = args.bound {
                    params.insert("$slice", Bson::Int64(bound));
                }
                Bson::Document(params)
            }
            ModifierOp::Bit(args) => {
                let mut params = Document::new();
                for (op, operand) in &args.ops {
                    params.insert(op.name(), operand.to_bson());
                }
                Bson::Document(params)
            }
            ModifierOp::Set(value) => value.clone(),
            ModifierOp::Unset => Bson::String(String::new()),
            ModifierOp::Inc(amount) => amount.clone(),
        }
    }
}

/// A single path + operator pair within a `ModifierSpec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldModifier {
    pub path: String,
    pub op: ModifierOp,
}

/// A parsed update document: modifiers in the order they were written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModifierSpec {
    pub entries: Vec<FieldModifier>,
}

impl ModifierSpec {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a BSON update document into a validated `ModifierSpec`.
///
/// Recognizes `$push`, `$bit`, `$set`, `$unset` and `$inc`, each mapping field
/// paths to operands. Every mapping is key-collapsed first, so a repeated key
/// at any level contributes only its last value.
///
/// # Errors
///
/// Returns `InvalidModifier` for unknown operators, bare fields, malformed
/// operands, `_id` targets, or two modifiers on overlapping paths.
pub fn parse_modifiers(raw: &RawDocument) -> Result<ModifierSpec, UpdateError> {
    let doc = collapse_keys(raw)?;
    parse_document(&doc)
}

/// Same as [`parse_modifiers`] for an already-built document.
pub fn parse_document(doc: &Document) -> Result<ModifierSpec, UpdateError> {
    let mut entries = Vec::new();

    for (key, value) in doc {
        let fields = match value {
            Bson::Document(d) => d,
            _ => {
                return Err(UpdateError::InvalidModifier(format!(
                    "{key} value must be a document"
                )));
            }
        };
        let parse_operand: fn(&str, &Bson) -> Result<ModifierOp, UpdateError> = match key.as_str()
        {
            "$push" => parse_push,
            "$bit" => parse_bit,
            "$set" => parse_set,
            "$unset" => parse_unset,
            "$inc" => parse_inc,
            k if k.starts_with('$') => {
                return Err(UpdateError::InvalidModifier(format!("unknown operator: {k}")));
            }
            k => {
                return Err(UpdateError::InvalidModifier(format!(
                    "expected an operator, found bare field '{k}'"
                )));
            }
        };

        for (path, operand) in fields {
            split_path(path)?;
            let op = parse_operand(path, operand)?;
            entries.push(FieldModifier {
                path: path.clone(),
                op,
            });
        }
    }

    let spec = ModifierSpec { entries };
    if spec.is_empty() {
        return Err(UpdateError::InvalidModifier("empty update document".into()));
    }

    let entries = &spec.entries;
    for (i, fm) in entries.iter().enumerate() {
        if paths_conflict(&fm.path, "_id") {
            return Err(UpdateError::InvalidModifier("cannot modify _id".into()));
        }
        if let Some(other) = entries[..i]
            .iter()
            .find(|prev| paths_conflict(&prev.path, &fm.path))
        {
            return Err(UpdateError::InvalidModifier(format!(
                "{} on '{}' conflicts with {} on '{}'",
                fm.op.operator(),
                fm.path,
                other.op.operator(),
                other.path
            )));
        }
    }

    Ok(spec)
}

/// `$push` operand: either a bare value, or `{ $each: [..], $slice|$trim: n }`.
fn parse_push(path: &str, operand: &Bson) -> Result<ModifierOp, UpdateError> {
    let params = match operand {
        Bson::Document(d) if d.keys().any(|k| k.starts_with('$')) => d,
        bare => {
            return Ok(ModifierOp::Push(PushArgs {
                each: vec![bare.clone()],
                bound: None,
            }));
        }
    };

    let mut each = None;
    let mut bound = None;
    for (key, value) in params {
        match key.as_str() {
            "$each" => match value {
                Bson::Array(values) => each = Some(values.clone()),
                _ => {
                    return Err(UpdateError::InvalidModifier(format!(
                        "$push: $each for '{path}' must be an array"
                    )));
                }
            },
            // Synonyms: whichever appears later in the parameter object wins.
            "$slice" | "$trim" => bound = Some(parse_bound(path, key, value)?),
            k if k.starts_with('$') => {
                return Err(UpdateError::InvalidModifier(format!(
                    "$push: unknown modifier {k} for '{path}'"
                )));
            }
            k => {
                return Err(UpdateError::InvalidModifier(format!(
                    "$push: '{path}' mixes modifiers with field '{k}'"
                )));
            }
        }
    }

    let each = each.ok_or_else(|| {
        UpdateError::InvalidModifier(format!("$push: '{path}' has modifiers but no $each"))
    })?;
    Ok(ModifierOp::Push(PushArgs { each, bound }))
}

fn parse_bound(path: &str, key: &str, value: &Bson) -> Result<i64, UpdateError> {
    match value {
        Bson::Int32(n) => Ok(*n as i64),
        Bson::Int64(n) => Ok(*n),
        Bson::Double(d) if d.fract() == 0.0 && d.is_finite() => Ok(*d as i64),
        _ => Err(UpdateError::InvalidModifier(format!(
            "$push: {key} for '{path}' must be an integer"
        ))),
    }
}

/// `$bit` operand: `{ and?: int, or?: int }`, already key-collapsed.
fn parse_bit(path: &str, operand: &Bson) -> Result<ModifierOp, UpdateError> {
    let params = match operand {
        Bson::Document(d) => d,
        _ => {
            return Err(UpdateError::InvalidModifier(format!(
                "$bit: operand for '{path}' must be a document"
            )));
        }
    };

    let mut ops = Vec::with_capacity(params.len());
    for (key, value) in params {
        let op = match key.as_str() {
            "and" => BitOp::And,
            "or" => BitOp::Or,
            k => {
                return Err(UpdateError::InvalidModifier(format!(
                    "$bit: unknown sub-operator '{k}' for '{path}'"
                )));
            }
        };
        let operand = match value {
            Bson::Int32(v) => BitOperand::Int32(*v),
            Bson::Int64(v) => BitOperand::Int64(*v),
            _ => {
                return Err(UpdateError::InvalidModifier(format!(
                    "$bit: {key} operand for '{path}' must be an integer"
                )));
            }
        };
        ops.push((op, operand));
    }

    if ops.is_empty() {
        return Err(UpdateError::InvalidModifier(format!(
            "$bit: no sub-operators for '{path}'"
        )));
    }
    Ok(ModifierOp::Bit(BitArgs { ops }))
}

fn parse_set(_path: &str, operand: &Bson) -> Result<ModifierOp, UpdateError> {
    Ok(ModifierOp::Set(operand.clone()))
}

/// `$unset` ignores its operand (`{ "field": "" }` by convention).
fn parse_unset(_path: &str, _operand: &Bson) -> Result<ModifierOp, UpdateError> {
    Ok(ModifierOp::Unset)
}

fn parse_inc(path: &str, operand: &Bson) -> Result<ModifierOp, UpdateError> {
    match operand {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Ok(ModifierOp::Inc(operand.clone())),
        _ => Err(UpdateError::InvalidModifier(format!(
            "$inc value for '{path}' must be numeric"
        ))),
    }
}
