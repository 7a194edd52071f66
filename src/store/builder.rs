//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE statements from a
//! model descriptor and compiled predicates. Predicate clauses arrive with `?`
//! placeholders and are renumbered to `$n` here.

use crate::meta::ModelDescriptor;
use crate::query::Predicate;
use crate::store::PgBindValue;

/// Quote identifier for PostgreSQL (safe: identifiers come from descriptors only).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }
}

/// One ORDER BY key, already resolved to a storage column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

/// Renumber `?` placeholders to `$n`, continuing from the params already in `buf`.
fn render_clause(clause: &str, offset: usize) -> String {
    let mut out = String::with_capacity(clause.len() + 4);
    let mut n = offset;
    for c in clause.chars() {
        if c == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(c);
        }
    }
    out
}

fn where_clause(buf: &mut QueryBuf, predicates: &[Predicate]) -> String {
    if predicates.is_empty() {
        return String::new();
    }
    let mut parts = Vec::with_capacity(predicates.len());
    for p in predicates {
        parts.push(render_clause(&p.clause, buf.params.len()));
        buf.params.extend(p.args.iter().map(PgBindValue::from_json));
    }
    format!(" WHERE {}", parts.join(" AND "))
}

fn column_list(model: &ModelDescriptor, projection: Option<&[String]>) -> String {
    match projection {
        Some(cols) if !cols.is_empty() => {
            cols.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ")
        }
        _ => model
            .fields
            .iter()
            .map(|f| quoted(&f.storage_name))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn order_clause(model: &ModelDescriptor, sort: &[SortKey]) -> String {
    if sort.is_empty() {
        // Stable order for pagination when the model carries an id column.
        return match model.field_by_storage("id") {
            Some(_) => format!(" ORDER BY {}", quoted("id")),
            None => String::new(),
        };
    }
    let keys: Vec<String> = sort
        .iter()
        .map(|k| {
            format!(
                "{} {}",
                quoted(&k.column),
                if k.descending { "desc" } else { "asc" }
            )
        })
        .collect();
    format!(" ORDER BY {}", keys.join(", "))
}

/// SELECT with filters, optional projection, sort, and offset/limit.
pub fn select_rows(
    model: &ModelDescriptor,
    predicates: &[Predicate],
    projection: Option<&[String]>,
    sort: &[SortKey],
    limit: Option<u64>,
    offset: Option<u64>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = column_list(model, projection);
    let where_part = where_clause(&mut q, predicates);
    let order_part = order_clause(model, sort);
    let limit_part = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_part = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        cols,
        quoted(&model.table_name),
        where_part,
        order_part,
        limit_part,
        offset_part
    );
    q
}

/// COUNT over the same filters, independent of pagination.
pub fn count_rows(model: &ModelDescriptor, predicates: &[Predicate]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_part = where_clause(&mut q, predicates);
    q.sql = format!(
        "SELECT COUNT(*) FROM {}{}",
        quoted(&model.table_name),
        where_part
    );
    q
}

/// INSERT one row from prepared column/value pairs, returning the stored row.
/// Audit stamp columns the caller did not provide are filled with NOW().
pub fn insert_row(model: &ModelDescriptor, sets: &[(String, PgBindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(sets.len() + 2);
    let mut placeholders = Vec::with_capacity(sets.len() + 2);
    for (col, val) in sets {
        q.params.push(val.clone());
        cols.push(quoted(col));
        placeholders.push(format!("${}", q.params.len()));
    }
    for stamp in ["created_at", "updated_at"] {
        if model.field_by_storage(stamp).is_some() && !sets.iter().any(|(c, _)| c == stamp) {
            cols.push(quoted(stamp));
            placeholders.push("NOW()".to_string());
        }
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(&model.table_name),
        cols.join(", "),
        placeholders.join(", "),
        column_list(model, None)
    );
    q
}

/// UPDATE matching rows with prepared SET pairs, returning the post-update rows.
pub fn update_rows(
    model: &ModelDescriptor,
    predicates: &[Predicate],
    sets: &[(String, PgBindValue)],
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut set_parts = Vec::with_capacity(sets.len() + 1);
    for (col, val) in sets {
        q.params.push(val.clone());
        set_parts.push(format!("{} = ${}", quoted(col), q.params.len()));
    }
    if model.field_by_storage("updated_at").is_some()
        && !sets.iter().any(|(c, _)| c == "updated_at")
    {
        set_parts.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let where_part = where_clause(&mut q, predicates);
    q.sql = format!(
        "UPDATE {} SET {}{} RETURNING {}",
        quoted(&model.table_name),
        set_parts.join(", "),
        where_part,
        column_list(model, None)
    );
    q
}

/// Hard delete of matching rows.
pub fn delete_rows(model: &ModelDescriptor, predicates: &[Predicate]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_part = where_clause(&mut q, predicates);
    q.sql = format!("DELETE FROM {}{}", quoted(&model.table_name), where_part);
    q
}

/// Soft delete: stamp the model's soft-delete column instead of removing rows.
pub fn soft_delete_rows(
    model: &ModelDescriptor,
    soft_column: &str,
    predicates: &[Predicate],
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_part = where_clause(&mut q, predicates);
    q.sql = format!(
        "UPDATE {} SET {} = NOW(){}",
        quoted(&model.table_name),
        quoted(soft_column),
        where_part
    );
    q
}
