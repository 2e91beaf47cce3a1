//! Metadata filter language.
//!
//! Filters are parsed from the JSON condition DSL into a sum-type AST and
//! evaluated by exhaustive match against document metadata. A filter maps
//! field names to conditions; all entries are conjoined (logical AND).
//!
//! Supported conditions per field:
//! - a bare scalar or list value: exact equality
//! - an operator object with any subset of `$eq`, `$ne`, `$gt`, `$gte`,
//!   `$lt`, `$lte`, `$in`, `$nin`, `$exists`
//!
//! Filters see raw metadata, including reserved keys such as `_tenant_id`
//! and `_ttl_expires`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};

/// A single predicate applied to one metadata field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Value equals the operand.
    Eq(Value),
    /// Value differs from the operand.
    Ne(Value),
    /// Value is strictly greater than the operand.
    Gt(Value),
    /// Value is greater than or equal to the operand.
    Gte(Value),
    /// Value is strictly less than the operand.
    Lt(Value),
    /// Value is less than or equal to the operand.
    Lte(Value),
    /// Value is one of the operands.
    In(Vec<Value>),
    /// Value is none of the operands.
    Nin(Vec<Value>),
    /// Field presence matches the operand.
    Exists(bool),
}

impl Condition {
    /// Evaluates this condition against the field value, if present.
    ///
    /// An absent field fails every condition except `Exists(false)`.
    #[must_use]
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Exists(wanted) => value.is_some() == *wanted,
            _ => {
                let Some(value) = value else { return false };
                match self {
                    Self::Eq(operand) => values_equal(value, operand),
                    Self::Ne(operand) => !values_equal(value, operand),
                    Self::Gt(operand) => compare(value, operand) == Some(Ordering::Greater),
                    Self::Gte(operand) => {
                        matches!(compare(value, operand), Some(Ordering::Greater | Ordering::Equal))
                    }
                    Self::Lt(operand) => compare(value, operand) == Some(Ordering::Less),
                    Self::Lte(operand) => {
                        matches!(compare(value, operand), Some(Ordering::Less | Ordering::Equal))
                    }
                    Self::In(operands) => operands.iter().any(|o| values_equal(value, o)),
                    Self::Nin(operands) => !operands.iter().any(|o| values_equal(value, o)),
                    Self::Exists(_) => unreachable!("handled above"),
                }
            }
        }
    }
}

/// Equality with numeric coercion: `1` and `1.0` are the same value.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering for the range operators.
///
/// Numbers compare as `f64`, strings lexicographically; every other pairing
/// is unordered and fails the predicate.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}

/// A conjunction of per-field conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: BTreeMap<String, Vec<Condition>>,
}

impl Filter {
    /// Creates an empty filter that matches every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the JSON condition DSL.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Filter`] when the input is not an object, an
    /// operator object carries an unknown `$` key, or an operator operand has
    /// the wrong shape.
    pub fn parse(value: &Value) -> EngineResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| EngineError::filter(format!("expected object filter, got {value}")))?;

        let mut fields = BTreeMap::new();
        for (field, condition) in obj {
            fields.insert(field.clone(), parse_conditions(field, condition)?);
        }
        Ok(Self { fields })
    }

    /// Returns `true` when the filter has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Replaces every condition on `field` with the given one.
    ///
    /// Used by the tenant scope to force its own predicate over anything the
    /// caller supplied for the same key.
    pub fn set(&mut self, field: impl Into<String>, condition: Condition) {
        self.fields.insert(field.into(), vec![condition]);
    }

    /// Evaluates the filter against document metadata.
    #[must_use]
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.fields.iter().all(|(field, conditions)| {
            let value = metadata.get(field);
            conditions.iter().all(|c| c.matches(value))
        })
    }
}

fn parse_conditions(field: &str, value: &Value) -> EngineResult<Vec<Condition>> {
    let Some(ops) = value.as_object() else {
        // Bare scalar or list: exact equality.
        return Ok(vec![Condition::Eq(value.clone())]);
    };

    let mut conditions = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$gt" => Condition::Gt(operand.clone()),
            "$gte" => Condition::Gte(operand.clone()),
            "$lt" => Condition::Lt(operand.clone()),
            "$lte" => Condition::Lte(operand.clone()),
            "$in" => Condition::In(operand_list(field, "$in", operand)?),
            "$nin" => Condition::Nin(operand_list(field, "$nin", operand)?),
            "$exists" => Condition::Exists(operand.as_bool().ok_or_else(|| {
                EngineError::filter(format!("`{field}`: $exists takes a boolean, got {operand}"))
            })?),
            other => {
                return Err(EngineError::filter(format!(
                    "`{field}`: unknown operator `{other}`"
                )))
            }
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn operand_list(field: &str, op: &str, operand: &Value) -> EngineResult<Vec<Value>> {
    operand
        .as_array()
        .cloned()
        .ok_or_else(|| EngineError::filter(format!("`{field}`: {op} takes an array, got {operand}")))
}
