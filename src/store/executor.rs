//! Transactional CRUD execution. Each operation runs inside one transaction
//! scoped to one request; any error returns early and the dropped transaction
//! rolls back, so no partial writes are observable. Request cancellation drops
//! the in-flight future, which drops (and thereby rolls back) the transaction.

use crate::error::AppError;
use crate::meta::ModelDescriptor;
use crate::query::Predicate;
use crate::store::{
    count_rows, delete_rows, insert_row, select_rows, soft_delete_rows, update_rows, PgBindValue,
    QueryBuf, SortKey,
};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

/// A fully resolved list query: compiled predicates plus effective paging.
#[derive(Debug, Default)]
pub struct ListQuery {
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub projection: Option<Vec<String>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub struct Executor;

impl Executor {
    /// Insert each document in order inside one transaction. Any failing
    /// insert aborts the whole batch. Returns stored rows in input order.
    pub async fn create(
        pool: &PgPool,
        model: &ModelDescriptor,
        docs: &[Map<String, Value>],
    ) -> Result<Vec<Value>, AppError> {
        let mut tx = pool.begin().await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            let sets = prepare_sets(model, doc)?;
            if sets.is_empty() {
                return Err(AppError::Validation("document has no recognized fields".into()));
            }
            let q = insert_row(model, &sets);
            let row = fetch_one(&mut tx, &q).await?;
            out.push(row_to_doc(model, &row));
        }
        tx.commit().await?;
        Ok(out)
    }

    /// Fetch matching rows plus the pagination-independent total count, both
    /// from the same filter predicates within one transaction.
    pub async fn list(
        pool: &PgPool,
        model: &ModelDescriptor,
        query: &ListQuery,
    ) -> Result<(Vec<Value>, i64), AppError> {
        let mut predicates = query.predicates.clone();
        push_live_filter(model, &mut predicates);
        let mut tx = pool.begin().await?;
        let q = select_rows(
            model,
            &predicates,
            query.projection.as_deref(),
            &query.sort,
            query.limit,
            query.offset,
        );
        let rows = fetch_all(&mut tx, &q).await?;
        let cq = count_rows(model, &predicates);
        let count_row = fetch_one(&mut tx, &cq).await?;
        let total: i64 = count_row.try_get(0)?;
        tx.commit().await?;
        Ok((rows.iter().map(|r| row_to_doc(model, r)).collect(), total))
    }

    /// Load the pre-update rows, enforce the one-vs-many discipline, apply the
    /// partial document, and return the post-update rows.
    pub async fn update(
        pool: &PgPool,
        model: &ModelDescriptor,
        predicates: &[Predicate],
        doc: &Map<String, Value>,
        multi: bool,
    ) -> Result<Vec<Value>, AppError> {
        let sets = prepare_sets(model, doc)?;
        if sets.is_empty() {
            return Err(AppError::Validation("document has no recognized fields".into()));
        }
        let mut target = predicates.to_vec();
        push_live_filter(model, &mut target);

        let mut tx = pool.begin().await?;
        let pre = fetch_all(&mut tx, &select_rows(model, &target, None, &[], None, None)).await?;
        enforce_multi(pre.len(), multi, "update")?;
        if pre.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }
        let q = update_rows(model, &target, &sets);
        let rows = fetch_all(&mut tx, &q).await?;
        tx.commit().await?;
        Ok(rows.iter().map(|r| row_to_doc(model, r)).collect())
    }

    /// Load the pre-delete rows, enforce the one-vs-many discipline, then
    /// delete (soft when the model soft-deletes, unless `unsoft` bypasses it).
    /// Returns the pre-delete rows.
    pub async fn delete(
        pool: &PgPool,
        model: &ModelDescriptor,
        predicates: &[Predicate],
        multi: bool,
        unsoft: bool,
    ) -> Result<Vec<Value>, AppError> {
        let target = delete_scope(model, predicates, unsoft);
        let mut tx = pool.begin().await?;
        let pre = fetch_all(&mut tx, &select_rows(model, &target, None, &[], None, None)).await?;
        enforce_multi(pre.len(), multi, "delete")?;
        if pre.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }
        let q = match (&model.soft_delete, unsoft) {
            (Some(col), false) => soft_delete_rows(model, col, &target),
            _ => delete_rows(model, &target),
        };
        execute(&mut tx, &q).await?;
        tx.commit().await?;
        Ok(pre.iter().map(|r| row_to_doc(model, r)).collect())
    }
}

/// Predicate set a delete both pre-reads and removes against. With `unsoft`
/// the live filter is skipped on both sides, so the rows counted against the
/// multi discipline are exactly the rows the hard delete removes.
fn delete_scope(
    model: &ModelDescriptor,
    predicates: &[Predicate],
    unsoft: bool,
) -> Vec<Predicate> {
    let mut target = predicates.to_vec();
    if !unsoft {
        push_live_filter(model, &mut target);
    }
    target
}

/// Soft-deleting models only see live rows by default.
fn push_live_filter(model: &ModelDescriptor, predicates: &mut Vec<Predicate>) {
    if let Some(col) = &model.soft_delete {
        predicates.push(Predicate::new(format!("{} IS NULL", col), Vec::new()));
    }
}

/// More than one matching record requires the caller's explicit multi opt-in;
/// a single-record operation with no match is a 404, not a silent no-op.
fn enforce_multi(matched: usize, multi: bool, operation: &str) -> Result<(), AppError> {
    if !multi {
        if matched > 1 {
            return Err(AppError::Validation(format!(
                "{} matched {} records; set multi to affect more than one",
                operation, matched
            )));
        }
        if matched == 0 {
            return Err(AppError::NotFound("no matching record".into()));
        }
    }
    Ok(())
}

/// Build column/value pairs from a payload. Keys not declared on the model are
/// dropped (payloads are decoded into a fresh instance of the model's shape,
/// never applied onto something wider). Association-classified fields bind
/// wholesale as JSON; scalar fields reject structured values.
fn prepare_sets(
    model: &ModelDescriptor,
    doc: &Map<String, Value>,
) -> Result<Vec<(String, PgBindValue)>, AppError> {
    let mut sets = Vec::with_capacity(doc.len());
    for (key, val) in doc {
        let Some(field) = model.resolve_field(key) else {
            continue;
        };
        let bind = if field.is_association() {
            PgBindValue::json_wholesale(val)
        } else {
            if val.is_object() || val.is_array() {
                return Err(AppError::Validation(format!(
                    "field '{}' expects a scalar value",
                    field.code
                )));
            }
            PgBindValue::from_json(val)
        };
        sets.push((field.storage_name.clone(), bind));
    }
    Ok(sets)
}

async fn fetch_all(conn: &mut PgConnection, q: &QueryBuf) -> Result<Vec<PgRow>, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query.fetch_all(&mut *conn).await
}

async fn fetch_one(conn: &mut PgConnection, q: &QueryBuf) -> Result<PgRow, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query.fetch_one(&mut *conn).await
}

async fn execute(conn: &mut PgConnection, q: &QueryBuf) -> Result<(), sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query.execute(&mut *conn).await?;
    Ok(())
}

/// Map a row back to a document keyed by field codes.
fn row_to_doc(model: &ModelDescriptor, row: &PgRow) -> Value {
    use sqlx::Column;
    let mut map = Map::new();
    for col in row.columns() {
        let storage = col.name();
        let key = model
            .field_by_storage(storage)
            .map(|f| f.code.clone())
            .unwrap_or_else(|| storage.to_string());
        map.insert(key, cell_to_value(row, storage));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{BaseFields, FieldDescriptor, FieldKind, ModelDescriptor};
    use serde_json::json;

    fn model() -> ModelDescriptor {
        ModelDescriptor::builder("Order")
            .embed(BaseFields::audit())
            .field(FieldDescriptor::new("Status", FieldKind::String).label("Status"))
            .field(FieldDescriptor::new("Payload", FieldKind::Object).label("Payload"))
            .build()
            .unwrap()
    }

    fn doc(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn unknown_payload_keys_are_dropped() {
        let sets = prepare_sets(&model(), &doc(json!({"Status": "new", "Evil": 1}))).unwrap();
        let cols: Vec<_> = sets.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(cols, ["status"]);
    }

    #[test]
    fn scalar_fields_reject_structured_values() {
        let err = prepare_sets(&model(), &doc(json!({"Status": {"nested": true}}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn association_fields_bind_wholesale() {
        let sets = prepare_sets(&model(), &doc(json!({"Payload": {"a": [1, 2]}}))).unwrap();
        assert!(matches!(sets[0].1, PgBindValue::Json(_)));
    }

    #[test]
    fn multi_discipline_rejects_silent_cascades() {
        assert!(enforce_multi(1, false, "update").is_ok());
        assert!(enforce_multi(5, true, "update").is_ok());
        assert!(matches!(
            enforce_multi(2, false, "delete"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            enforce_multi(0, false, "update"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn unsoft_delete_scopes_pre_read_and_removal_identically() {
        let preds = vec![Predicate::new("id = ?", vec![json!(1)])];
        let scoped = delete_scope(&model(), &preds, false);
        assert_eq!(scoped.len(), 2);
        assert_eq!(scoped[1].clause, "deleted_at IS NULL");
        // Bypassing soft delete also bypasses the live filter, on both the
        // pre-read and the removal, so discipline counts what gets removed.
        let unsoft = delete_scope(&model(), &preds, true);
        assert_eq!(unsoft.len(), 1);
        assert_eq!(unsoft[0].clause, "id = ?");
    }

    #[test]
    fn live_filter_applies_only_to_soft_deleting_models() {
        let mut preds = Vec::new();
        push_live_filter(&model(), &mut preds);
        assert_eq!(preds[0].clause, "deleted_at IS NULL");

        let hard = ModelDescriptor::builder("Log")
            .field(FieldDescriptor::new("ID", FieldKind::Integer).label("ID"))
            .build()
            .unwrap();
        let mut preds = Vec::new();
        push_live_filter(&hard, &mut preds);
        assert!(preds.is_empty());
    }
}
