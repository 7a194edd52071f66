//! The four CRUD operation bodies. Handlers parse input, compile conditions,
//! run the transactional executor, and funnel the outcome through the envelope.

use crate::error::AppError;
use crate::meta::ModelDescriptor;
use crate::query::{compile, parse_condition, Predicate};
use crate::response::Envelope;
use crate::state::AppState;
use crate::store::{Executor, ListQuery, SortKey};
use axum::Json;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Create: single payload or array of payloads; response mirrors input arity.
pub async fn create(
    state: AppState,
    model: Arc<ModelDescriptor>,
    body: Value,
) -> Result<Json<Envelope>, AppError> {
    let (docs, multi) = match body {
        Value::Array(items) => {
            let mut docs = Vec::with_capacity(items.len());
            for item in items {
                docs.push(payload_object(item)?);
            }
            (docs, true)
        }
        other => (vec![payload_object(other)?], false),
    };
    if docs.is_empty() {
        return Err(AppError::Validation("create payload is empty".into()));
    }
    let mut rows = Executor::create(&state.pool, &model, &docs).await?;
    let data = if multi {
        Value::Array(rows)
    } else {
        rows.remove(0)
    };
    Ok(Json(Envelope::ok(data)))
}

/// Read/list: cond + sort + project + range/page/size, echoing the effective
/// parameters beside the result so callers can discover server-side defaults.
pub async fn list(
    state: AppState,
    model: Arc<ModelDescriptor>,
    params: HashMap<String, String>,
) -> Result<Json<Envelope>, AppError> {
    let mut ret = Map::new();

    let mut predicates = Vec::new();
    if let Some(raw) = params.get("cond").filter(|s| !s.is_empty()) {
        let cond: Value = serde_json::from_str(raw)
            .map_err(|e| AppError::Compile(format!("cond is not valid JSON: {}", e)))?;
        let nodes = parse_condition(&cond)?;
        predicates = compile(&nodes, &model)?;
        ret.insert("cond".into(), cond);
    }

    let mut sort = Vec::new();
    if let Some(raw) = params.get("sort").filter(|s| !s.is_empty()) {
        let mut echo = Vec::new();
        for name in raw.split(',') {
            let (name, descending) = match name.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (name, false),
            };
            // Unknown sort fields are skipped, not rejected.
            if let Some(field) = model.resolve_field(name) {
                sort.push(SortKey {
                    column: field.storage_name.clone(),
                    descending,
                });
                echo.push(if descending {
                    format!("-{}", field.code)
                } else {
                    field.code.clone()
                });
            }
        }
        if !echo.is_empty() {
            ret.insert("sort".into(), Value::String(echo.join(",")));
        }
    }

    let mut projection = None;
    if let Some(raw) = params.get("project").filter(|s| !s.is_empty()) {
        let mut columns = Vec::new();
        let mut echo = Vec::new();
        for name in raw.split(',') {
            let name = name.strip_prefix('-').unwrap_or(name);
            if let Some(field) = model.resolve_field(name) {
                columns.push(field.storage_name.clone());
                echo.push(field.code.clone());
            }
        }
        if !columns.is_empty() {
            projection = Some(columns);
            ret.insert("project".into(), Value::String(echo.join(",")));
        }
    }

    let range = params
        .get("range")
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "PAGE".to_string());
    if range != "PAGE" && range != "ALL" {
        return Err(AppError::BadRequest(format!(
            "range must be PAGE or ALL, got '{}'",
            range
        )));
    }
    ret.insert("range".into(), Value::String(range.clone()));

    let page = positive_param(&params, "page", 1);
    let size = positive_param(&params, "size", state.config.default_page_size);
    let (limit, offset) = if range == "PAGE" {
        ret.insert("page".into(), json!(page));
        ret.insert("size".into(), json!(size));
        (Some(size), Some(page_offset(page, size)?))
    } else {
        (None, None)
    };

    if let Some(hook) = &model.before_query {
        hook(&mut predicates);
    }

    let query = ListQuery {
        predicates,
        sort,
        projection,
        limit,
        offset,
    };
    let (rows, total) = Executor::list(&state.pool, &model, &query).await?;
    ret.insert("list".into(), Value::Array(rows));
    ret.insert("totalrecords".into(), json!(total));
    if range == "PAGE" {
        ret.insert("totalpages".into(), json!(total_pages(total, size)));
    }
    Ok(Json(Envelope::ok(Value::Object(ret))))
}

/// Update: `{cond, doc, multi?, all?}`; exactly-one semantics unless multi.
pub async fn update(
    state: AppState,
    model: Arc<ModelDescriptor>,
    body: Value,
) -> Result<Json<Envelope>, AppError> {
    let body = payload_object(body)?;
    let cond = body.get("cond").cloned().unwrap_or(Value::Null);
    let doc = match body.get("doc") {
        Some(Value::Object(m)) if !m.is_empty() => m.clone(),
        _ => {
            return Err(AppError::Validation(
                "update condition and document are required".into(),
            ))
        }
    };
    let multi = flag(&body, "multi") || flag(&body, "all");
    let predicates = required_predicates(&cond, &model, "update")?;
    let mut rows = Executor::update(&state.pool, &model, &predicates, &doc, multi).await?;
    let data = if multi {
        Value::Array(rows)
    } else {
        rows.remove(0)
    };
    Ok(Json(Envelope::ok(data)))
}

/// Delete: cond/multi/unsoft from the query string when `cond` is present
/// there, otherwise from the JSON body. An empty condition is a hard error.
pub async fn delete(
    state: AppState,
    model: Arc<ModelDescriptor>,
    params: HashMap<String, String>,
    body: Option<Value>,
) -> Result<Json<Envelope>, AppError> {
    let (cond, multi, unsoft) = match params.get("cond").filter(|s| !s.is_empty()) {
        Some(raw) => {
            let cond: Value = serde_json::from_str(raw)
                .map_err(|e| AppError::Compile(format!("cond is not valid JSON: {}", e)))?;
            let multi = has_param(&params, "multi") || has_param(&params, "all");
            let unsoft = has_param(&params, "unsoft");
            (cond, multi, unsoft)
        }
        None => {
            let body = payload_object(body.unwrap_or(Value::Null))
                .map_err(|_| AppError::Validation("delete condition is required".into()))?;
            let cond = body.get("cond").cloned().unwrap_or(Value::Null);
            let multi = flag(&body, "multi") || flag(&body, "all");
            let unsoft = flag(&body, "unsoft");
            (cond, multi, unsoft)
        }
    };
    let predicates = required_predicates(&cond, &model, "delete")?;
    let mut rows = Executor::delete(&state.pool, &model, &predicates, multi, unsoft).await?;
    let data = if multi {
        Value::Array(rows)
    } else {
        rows.remove(0)
    };
    Ok(Json(Envelope::ok(data)))
}

fn payload_object(v: Value) -> Result<Map<String, Value>, AppError> {
    match v {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn flag(body: &Map<String, Value>, key: &str) -> bool {
    body.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Query-string flags count as set when present with any non-empty value.
fn has_param(params: &HashMap<String, String>, key: &str) -> bool {
    params.get(key).is_some_and(|v| !v.is_empty())
}

fn total_pages(total: i64, size: u64) -> u64 {
    (total.max(0) as u64).div_ceil(size)
}

/// `page` is only constrained to be >= 1, so the offset multiplication must
/// not be allowed to wrap.
fn page_offset(page: u64, size: u64) -> Result<u64, AppError> {
    page.saturating_sub(1)
        .checked_mul(size)
        .ok_or_else(|| AppError::BadRequest(format!("page {} is out of range", page)))
}

fn positive_param(params: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    params
        .get(key)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&n| n >= 1)
        .unwrap_or(default)
}

/// Compile a write-path condition; an empty condition, or one that compiles
/// to no predicate at all, must never reach the store as an unbounded write.
fn required_predicates(
    cond: &Value,
    model: &ModelDescriptor,
    operation: &str,
) -> Result<Vec<Predicate>, AppError> {
    let nodes = parse_condition(cond)?;
    if nodes.is_empty() {
        return Err(AppError::Validation(format!(
            "{} condition must not be empty",
            operation
        )));
    }
    let predicates = compile(&nodes, model)?;
    if predicates.is_empty() {
        return Err(AppError::Validation(format!(
            "{} condition compiled to no predicate",
            operation
        )));
    }
    Ok(predicates)
}
