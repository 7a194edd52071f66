//! Parsing the JSON condition tree into nodes.
//!
//! A condition is a JSON object. Each entry is either a field leaf
//! (`{"Status": "new"}` or `{"Age": {"$gte": 18}}`) or a one-level composite
//! (`{"$or": [{"Status": "new"}, {"Status": {"$regex": "^pend"}}]}`). Composite
//! children must themselves be flat field leaves; deeper nesting is rejected.

use crate::error::AppError;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn joiner(self) -> &'static str {
        match self {
            Connective::And => " AND ",
            Connective::Or => " OR ",
        }
    }
}

/// One field leaf: plain equality or an operator map.
#[derive(Clone, Debug)]
pub struct Leaf {
    pub field: String,
    pub term: LeafTerm,
}

#[derive(Clone, Debug)]
pub enum LeafTerm {
    Eq(Value),
    Ops(Map<String, Value>),
}

#[derive(Clone, Debug)]
pub enum ConditionNode {
    Leaf(Leaf),
    Composite(Connective, Vec<Leaf>),
}

/// Parse a condition object into nodes. Accepts only a JSON object at the
/// top level; `$and`/`$or` entries become composites, everything else a leaf.
pub fn parse_condition(cond: &Value) -> Result<Vec<ConditionNode>, AppError> {
    let obj = match cond {
        Value::Object(m) => m,
        Value::Null => return Ok(Vec::new()),
        _ => return Err(AppError::Compile("condition must be a JSON object".into())),
    };
    let mut nodes = Vec::with_capacity(obj.len());
    for (key, val) in obj {
        match key.as_str() {
            "$and" => nodes.push(parse_composite(Connective::And, val)?),
            "$or" => nodes.push(parse_composite(Connective::Or, val)?),
            _ => nodes.push(ConditionNode::Leaf(parse_leaf(key, val)?)),
        }
    }
    Ok(nodes)
}

fn parse_leaf(field: &str, val: &Value) -> Result<Leaf, AppError> {
    let term = match val {
        Value::Object(ops) => LeafTerm::Ops(ops.clone()),
        other => LeafTerm::Eq(other.clone()),
    };
    Ok(Leaf {
        field: field.to_string(),
        term,
    })
}

fn parse_composite(connective: Connective, val: &Value) -> Result<ConditionNode, AppError> {
    let arr = val.as_array().ok_or_else(|| {
        AppError::Compile(format!(
            "{} operand must be an array of conditions",
            connective_name(connective)
        ))
    })?;
    let mut leaves = Vec::new();
    for item in arr {
        let obj = item.as_object().ok_or_else(|| {
            AppError::Compile(format!(
                "{} children must be objects",
                connective_name(connective)
            ))
        })?;
        for (k, v) in obj {
            // Composites are exactly one level deep in the source format.
            if k == "$and" || k == "$or" {
                return Err(AppError::Compile(format!(
                    "nested {} inside {} is not supported",
                    k,
                    connective_name(connective)
                )));
            }
            leaves.push(parse_leaf(k, v)?);
        }
    }
    Ok(ConditionNode::Composite(connective, leaves))
}

fn connective_name(c: Connective) -> &'static str {
    match c {
        Connective::And => "$and",
        Connective::Or => "$or",
    }
}
