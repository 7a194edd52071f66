//! Compile condition nodes into parameterized predicates.
//!
//! Predicates are storage-agnostic: the clause uses `?` placeholders and the
//! operand values ride alongside as an ordered argument list. The Postgres
//! builder renumbers placeholders to `$n` at assembly time. Operand values are
//! never interpolated into the clause text.

use crate::error::AppError;
use crate::meta::ModelDescriptor;
use crate::query::{ConditionNode, Connective, Leaf, LeafTerm};
use serde_json::{Map, Value};

/// A parameterized filter fragment plus its bound arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub clause: String,
    pub args: Vec<Value>,
}

impl Predicate {
    pub fn new(clause: impl Into<String>, args: Vec<Value>) -> Self {
        Predicate {
            clause: clause.into(),
            args,
        }
    }
}

/// Compile parsed condition nodes against a model's schema. Each composite
/// node collapses into exactly one joined predicate; a leaf whose operator
/// map carries no recognized operator contributes nothing.
pub fn compile(
    nodes: &[ConditionNode],
    model: &ModelDescriptor,
) -> Result<Vec<Predicate>, AppError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            ConditionNode::Leaf(leaf) => {
                if let Some(p) = compile_leaf(leaf, model)? {
                    out.push(p);
                }
            }
            ConditionNode::Composite(connective, leaves) => {
                if let Some(p) = compile_composite(*connective, leaves, model)? {
                    out.push(p);
                }
            }
        }
    }
    Ok(out)
}

fn resolve_column(model: &ModelDescriptor, field: &str) -> Result<String, AppError> {
    model
        .resolve_field(field)
        .map(|f| f.storage_name.clone())
        .ok_or_else(|| AppError::Compile(format!("unknown field: {}", field)))
}

fn compile_leaf(leaf: &Leaf, model: &ModelDescriptor) -> Result<Option<Predicate>, AppError> {
    let column = resolve_column(model, &leaf.field)?;
    match &leaf.term {
        LeafTerm::Eq(v) => Ok(Some(Predicate::new(
            format!("{} = ?", column),
            vec![v.clone()],
        ))),
        LeafTerm::Ops(ops) => operator_predicate(&column, ops),
    }
}

fn compile_composite(
    connective: Connective,
    leaves: &[Leaf],
    model: &ModelDescriptor,
) -> Result<Option<Predicate>, AppError> {
    let mut clauses = Vec::with_capacity(leaves.len());
    let mut args = Vec::new();
    for leaf in leaves {
        if let Some(p) = compile_leaf(leaf, model)? {
            clauses.push(p.clause);
            args.extend(p.args);
        }
    }
    if clauses.is_empty() {
        return Ok(None);
    }
    Ok(Some(Predicate {
        clause: format!("({})", clauses.join(connective.joiner())),
        args,
    }))
}

/// Compile one operator map for a column. Returns `Ok(None)` when no
/// recognized operator is present; malformed operand shapes are errors.
fn operator_predicate(
    column: &str,
    ops: &Map<String, Value>,
) -> Result<Option<Predicate>, AppError> {
    if let Some(raw) = ops.get("$regex") {
        let keyword = raw
            .as_str()
            .ok_or_else(|| AppError::Compile("$regex operand must be a string".into()))?;
        return Ok(Some(Predicate::new(
            format!("{} LIKE ?", column),
            vec![Value::String(like_pattern(keyword))],
        )));
    }
    if let Some(raw) = ops.get("$in") {
        return membership(column, raw, false).map(Some);
    }
    if let Some(raw) = ops.get("$nin") {
        return membership(column, raw, true).map(Some);
    }
    if let Some(raw) = ops.get("$eq") {
        return Ok(Some(Predicate::new(
            format!("{} = ?", column),
            vec![raw.clone()],
        )));
    }
    if let Some(raw) = ops.get("$ne") {
        return Ok(Some(Predicate::new(
            format!("{} <> ?", column),
            vec![raw.clone()],
        )));
    }
    if ops.contains_key("$exists") {
        // Only the operator's presence matters; the operand is not bound.
        return Ok(Some(Predicate::new(
            format!("{} IS NOT NULL", column),
            Vec::new(),
        )));
    }
    Ok(range_predicate(column, ops))
}

/// Anchor-stripping LIKE semantics: `^` / `$` bound the match; an unanchored
/// side gets a wildcard. No anchors at all means substring match.
fn like_pattern(keyword: &str) -> String {
    let anchored_left = keyword.starts_with('^');
    let anchored_right = keyword.len() > anchored_left as usize && keyword.ends_with('$');
    let start = anchored_left as usize;
    let end = keyword.len() - anchored_right as usize;
    let core = &keyword[start..end];
    match (anchored_left, anchored_right) {
        (true, true) => core.to_string(),
        (true, false) => format!("{}%", core),
        (false, true) => format!("%{}", core),
        (false, false) => format!("%{}%", core),
    }
}

fn membership(column: &str, raw: &Value, negate: bool) -> Result<Predicate, AppError> {
    let items = raw.as_array().ok_or_else(|| {
        AppError::Compile(format!(
            "{} operand must be an array",
            if negate { "$nin" } else { "$in" }
        ))
    })?;
    if items.is_empty() {
        // IN over an empty set matches nothing; NOT IN excludes nothing.
        let clause = if negate { "1 = 1" } else { "1 = 0" };
        return Ok(Predicate::new(clause, Vec::new()));
    }
    let placeholders = vec!["?"; items.len()].join(", ");
    let op = if negate { "NOT IN" } else { "IN" };
    Ok(Predicate::new(
        format!("{} {} ({})", column, op, placeholders),
        items.clone(),
    ))
}

/// Range family: at most one lower bound and one upper bound fuse into a
/// single predicate. `$gt` takes precedence over `$gte`, `$lt` over `$lte`.
fn range_predicate(column: &str, ops: &Map<String, Value>) -> Option<Predicate> {
    let lower = ops
        .get("$gt")
        .map(|v| (">", v))
        .or_else(|| ops.get("$gte").map(|v| (">=", v)));
    let upper = ops
        .get("$lt")
        .map(|v| ("<", v))
        .or_else(|| ops.get("$lte").map(|v| ("<=", v)));
    match (lower, upper) {
        (Some((lop, lv)), Some((uop, uv))) => Some(Predicate::new(
            format!("{} {} ? AND {} {} ?", column, lop, column, uop),
            vec![lv.clone(), uv.clone()],
        )),
        (Some((lop, lv)), None) => Some(Predicate::new(
            format!("{} {} ?", column, lop),
            vec![lv.clone()],
        )),
        (None, Some((uop, uv))) => Some(Predicate::new(
            format!("{} {} ?", column, uop),
            vec![uv.clone()],
        )),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{BaseFields, FieldDescriptor, FieldKind, ModelDescriptor};
    use crate::query::parse_condition;
    use serde_json::json;

    fn model() -> ModelDescriptor {
        ModelDescriptor::builder("User")
            .embed(BaseFields::audit())
            .field(FieldDescriptor::new("UserName", FieldKind::String).label("User Name"))
            .field(FieldDescriptor::new("Pass", FieldKind::String).label("Password"))
            .field(FieldDescriptor::new("Age", FieldKind::Integer).label("Age"))
            .build()
            .unwrap()
    }

    fn compile_one(cond: serde_json::Value) -> Predicate {
        let nodes = parse_condition(&cond).unwrap();
        let mut preds = compile(&nodes, &model()).unwrap();
        assert_eq!(preds.len(), 1);
        preds.remove(0)
    }

    #[test]
    fn equality_leaf_binds_value() {
        let p = compile_one(json!({"UserName": "alice"}));
        assert_eq!(p.clause, "user_name = ?");
        assert_eq!(p.args, vec![json!("alice")]);
    }

    #[test]
    fn regex_prefix_anchor_means_prefix_match() {
        let p = compile_one(json!({"Pass": {"$regex": "^abc"}}));
        assert_eq!(p.clause, "pass LIKE ?");
        assert_eq!(p.args, vec![json!("abc%")]);
    }

    #[test]
    fn regex_suffix_anchor_means_suffix_match() {
        let p = compile_one(json!({"Pass": {"$regex": "abc$"}}));
        assert_eq!(p.args, vec![json!("%abc")]);
    }

    #[test]
    fn regex_unanchored_means_substring_match() {
        let p = compile_one(json!({"Pass": {"$regex": "abc"}}));
        assert_eq!(p.args, vec![json!("%abc%")]);
    }

    #[test]
    fn regex_both_anchors_means_exact_match() {
        let p = compile_one(json!({"Pass": {"$regex": "^abc$"}}));
        assert_eq!(p.args, vec![json!("abc")]);
    }

    #[test]
    fn regex_non_string_operand_is_a_compile_error() {
        let nodes = parse_condition(&json!({"Pass": {"$regex": 5}})).unwrap();
        assert!(matches!(
            compile(&nodes, &model()),
            Err(AppError::Compile(_))
        ));
    }

    #[test]
    fn membership_expands_one_placeholder_per_item() {
        let p = compile_one(json!({"Age": {"$in": [1, 2, 3]}}));
        assert_eq!(p.clause, "age IN (?, ?, ?)");
        assert_eq!(p.args, vec![json!(1), json!(2), json!(3)]);
        let p = compile_one(json!({"Age": {"$nin": [4]}}));
        assert_eq!(p.clause, "age NOT IN (?)");
    }

    #[test]
    fn membership_non_array_operand_is_a_compile_error() {
        let nodes = parse_condition(&json!({"Age": {"$in": 3}})).unwrap();
        assert!(compile(&nodes, &model()).is_err());
    }

    #[test]
    fn empty_membership_matches_nothing() {
        let p = compile_one(json!({"Age": {"$in": []}}));
        assert_eq!(p.clause, "1 = 0");
        assert!(p.args.is_empty());
    }

    #[test]
    fn exists_compiles_to_not_null_without_binding_operand() {
        let p = compile_one(json!({"Pass": {"$exists": true}}));
        assert_eq!(p.clause, "pass IS NOT NULL");
        assert!(p.args.is_empty());
    }

    #[test]
    fn gte_and_lt_fuse_into_half_open_range() {
        let p = compile_one(json!({"Age": {"$gte": 18, "$lt": 65}}));
        assert_eq!(p.clause, "age >= ? AND age < ?");
        assert_eq!(p.args, vec![json!(18), json!(65)]);
    }

    #[test]
    fn single_bound_stays_one_sided() {
        let p = compile_one(json!({"Age": {"$lte": 65}}));
        assert_eq!(p.clause, "age <= ?");
    }

    #[test]
    fn gt_wins_over_gte_when_both_present() {
        let p = compile_one(json!({"Age": {"$gt": 18, "$gte": 21}}));
        assert_eq!(p.clause, "age > ?");
        assert_eq!(p.args, vec![json!(18)]);
    }

    #[test]
    fn unrecognized_operator_map_yields_no_predicate() {
        let nodes = parse_condition(&json!({"Age": {"$bogus": 1}})).unwrap();
        let preds = compile(&nodes, &model()).unwrap();
        assert!(preds.is_empty());
    }

    #[test]
    fn or_composite_collapses_into_one_predicate() {
        let p = compile_one(json!({"$or": [{"Pass": "123"}, {"Pass": {"$regex": "^333"}}]}));
        assert_eq!(p.clause, "(pass = ? OR pass LIKE ?)");
        assert_eq!(p.args, vec![json!("123"), json!("333%")]);
    }

    #[test]
    fn and_composite_uses_and_joiner() {
        let p = compile_one(json!({"$and": [{"Age": {"$gte": 18}}, {"UserName": "bob"}]}));
        assert_eq!(p.clause, "(age >= ? AND user_name = ?)");
    }

    #[test]
    fn unknown_field_is_a_compile_error() {
        let nodes = parse_condition(&json!({"Ghost": 1})).unwrap();
        assert!(matches!(
            compile(&nodes, &model()),
            Err(AppError::Compile(_))
        ));
    }

    #[test]
    fn field_names_are_normalized_to_storage_names() {
        let p = compile_one(json!({"CreatedAt": {"$gt": "2024-01-01"}}));
        assert_eq!(p.clause, "created_at > ?");
    }
}
