//! Model and field descriptors, built once at registration and immutable afterward.

use crate::case::to_storage_name;
use crate::error::ConfigError;
use crate::query::Predicate;
use crate::rest::VerbConfig;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Primitive category of a field's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Boolean,
    Integer,
    Number,
    String,
    Object,
}

/// One schema field. `storage_name` is derived from `code` once, at
/// construction, so every query path sees the same column name.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub code: String,
    pub label: Option<String>,
    pub kind: FieldKind,
    pub is_array: bool,
    pub is_reference: bool,
    pub referenced_model: Option<String>,
    pub storage_name: String,
}

impl FieldDescriptor {
    pub fn new(code: impl Into<String>, kind: FieldKind) -> Self {
        let code = code.into();
        let storage_name = to_storage_name(&code);
        FieldDescriptor {
            code,
            label: None,
            kind,
            is_array: false,
            is_reference: false,
            referenced_model: None,
            storage_name,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Mark the field as a reference to another registered model. One-to-many
    /// relationships are expressed by combining with [`FieldDescriptor::array`].
    pub fn references(mut self, model: impl Into<String>) -> Self {
        self.is_reference = true;
        self.referenced_model = Some(model.into());
        self
    }

    /// Whether an update to this field replaces the stored value wholesale
    /// instead of setting a scalar column. Classification comes from the
    /// descriptor, not from the shape of the incoming value.
    pub fn is_association(&self) -> bool {
        self.is_reference || self.is_array || self.kind == FieldKind::Object
    }
}

/// Engine-reserved base field sets that may be spliced into a model. Only
/// these participate in embedding; arbitrary nested shapes do not.
pub struct BaseFields {
    fields: Vec<FieldDescriptor>,
    soft_delete: Option<String>,
}

impl BaseFields {
    /// Audit columns carried by every persistent model in the original
    /// system: assigned id, create/update stamps, and a soft-delete stamp.
    pub fn audit() -> Self {
        BaseFields {
            fields: vec![
                FieldDescriptor::new("ID", FieldKind::Integer).label("ID"),
                FieldDescriptor::new("CreatedAt", FieldKind::String).label("Created At"),
                FieldDescriptor::new("UpdatedAt", FieldKind::String).label("Updated At"),
                FieldDescriptor::new("DeletedAt", FieldKind::String),
            ],
            soft_delete: Some("deleted_at".to_string()),
        }
    }

    /// Audit columns without the soft-delete stamp.
    pub fn audit_hard() -> Self {
        BaseFields {
            fields: vec![
                FieldDescriptor::new("ID", FieldKind::Integer).label("ID"),
                FieldDescriptor::new("CreatedAt", FieldKind::String).label("Created At"),
                FieldDescriptor::new("UpdatedAt", FieldKind::String).label("Updated At"),
            ],
            soft_delete: None,
        }
    }
}

/// Hook run against the compiled filter predicates before a list query
/// executes, letting a model scope every read (e.g. tenant or org filters).
pub type BeforeQueryHook = Arc<dyn Fn(&mut Vec<Predicate>) + Send + Sync>;

/// One registered record shape. Built once through [`ModelDescriptor::builder`],
/// never mutated after registration.
#[derive(Clone)]
pub struct ModelDescriptor {
    pub name: String,
    pub full_name: String,
    pub label: Option<String>,
    pub route_alias: Option<String>,
    pub table_name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Storage column used for soft deletes, when the model carries one.
    pub soft_delete: Option<String>,
    pub verbs: VerbConfig,
    pub before_query: Option<BeforeQueryHook>,
}

impl std::fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl ModelDescriptor {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    /// Resolve an external field identifier to its descriptor: exact code
    /// match first, then by normalized storage name.
    pub fn resolve_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.code == name)
            .or_else(|| {
                let storage = to_storage_name(name);
                self.fields.iter().find(|f| f.storage_name == storage)
            })
    }

    pub fn field_by_storage(&self, storage: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.storage_name == storage)
    }

    /// Fields visible in the published schema. Fields without a display
    /// label are internal: they still participate in storage operations but
    /// are dropped here.
    pub fn published_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.label.is_some())
    }

    /// Serializable published view of the descriptor.
    pub fn published(&self) -> Value {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PubField<'a> {
            code: &'a str,
            name: &'a str,
            kind: FieldKind,
            is_reference: bool,
            is_array: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            referenced_model: Option<&'a str>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PubModel<'a> {
            name: &'a str,
            fully_qualified_name: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            display_name: Option<&'a str>,
            fields: Vec<PubField<'a>>,
        }
        let fields = self
            .published_fields()
            .map(|f| PubField {
                code: &f.code,
                name: f.label.as_deref().unwrap_or(&f.code),
                kind: f.kind,
                is_reference: f.is_reference,
                is_array: f.is_array,
                referenced_model: f.referenced_model.as_deref(),
            })
            .collect();
        serde_json::to_value(PubModel {
            name: &self.name,
            fully_qualified_name: &self.full_name,
            display_name: self.label.as_deref(),
            fields,
        })
        .unwrap_or(Value::Null)
    }

    /// Route path segment: explicit alias, else the lowercased model name.
    pub fn path_segment(&self) -> String {
        self.route_alias
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }
}

pub struct ModelBuilder {
    name: String,
    full_name: Option<String>,
    label: Option<String>,
    route_alias: Option<String>,
    table_name: Option<String>,
    fields: Vec<FieldDescriptor>,
    soft_delete: Option<String>,
    verbs: VerbConfig,
    before_query: Option<BeforeQueryHook>,
}

impl ModelBuilder {
    fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        ModelBuilder {
            name,
            full_name: None,
            label: None,
            route_alias: None,
            table_name: None,
            fields: Vec::new(),
            soft_delete: None,
            verbs: VerbConfig::default(),
            before_query: None,
        }
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn route_alias(mut self, alias: impl Into<String>) -> Self {
        self.route_alias = Some(alias.into());
        self
    }

    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Splice an engine-reserved base field set into this model. This is how
    /// shared audit/soft-delete columns are inherited without a general
    /// inheritance model.
    pub fn embed(mut self, base: BaseFields) -> Self {
        self.fields.extend(base.fields);
        if base.soft_delete.is_some() {
            self.soft_delete = base.soft_delete;
        }
        self
    }

    pub fn verbs(mut self, verbs: VerbConfig) -> Self {
        self.verbs = verbs;
        self
    }

    pub fn before_query<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Vec<Predicate>) + Send + Sync + 'static,
    {
        self.before_query = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<ModelDescriptor, ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::EmptyModel { model: self.name });
        }
        for (i, f) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|g| g.code == f.code) {
                return Err(ConfigError::DuplicateField {
                    model: self.name,
                    code: f.code.clone(),
                });
            }
        }
        let table_name = self
            .table_name
            .unwrap_or_else(|| to_storage_name(&self.name));
        let full_name = self
            .full_name
            .unwrap_or_else(|| format!("modelrest.{}", self.name));
        Ok(ModelDescriptor {
            name: self.name,
            full_name,
            label: self.label,
            route_alias: self.route_alias,
            table_name,
            fields: self.fields,
            soft_delete: self.soft_delete,
            verbs: self.verbs,
            before_query: self.before_query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> ModelDescriptor {
        ModelDescriptor::builder("Order")
            .label("Order")
            .embed(BaseFields::audit())
            .field(FieldDescriptor::new("Status", FieldKind::String).label("Status"))
            .field(FieldDescriptor::new("InternalNote", FieldKind::String))
            .build()
            .unwrap()
    }

    #[test]
    fn embed_splices_audit_fields_and_soft_delete() {
        let m = order();
        assert!(m.resolve_field("ID").is_some());
        assert!(m.resolve_field("CreatedAt").is_some());
        assert_eq!(m.soft_delete.as_deref(), Some("deleted_at"));
    }

    #[test]
    fn unlabeled_fields_are_dropped_from_published_schema() {
        let m = order();
        let published: Vec<_> = m.published_fields().map(|f| f.code.as_str()).collect();
        assert!(published.contains(&"Status"));
        assert!(!published.contains(&"InternalNote"));
        assert!(!published.contains(&"DeletedAt"));
        // still resolvable for storage operations
        assert!(m.resolve_field("InternalNote").is_some());
    }

    #[test]
    fn resolve_field_accepts_code_or_storage_name() {
        let m = order();
        assert_eq!(m.resolve_field("CreatedAt").unwrap().storage_name, "created_at");
        assert_eq!(m.resolve_field("created_at").unwrap().code, "CreatedAt");
        assert!(m.resolve_field("nope").is_none());
    }

    #[test]
    fn duplicate_field_code_is_rejected() {
        let err = ModelDescriptor::builder("M")
            .field(FieldDescriptor::new("A", FieldKind::String))
            .field(FieldDescriptor::new("A", FieldKind::Integer))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateField { .. }));
    }

    #[test]
    fn empty_model_is_rejected() {
        let err = ModelDescriptor::builder("M").build().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyModel { .. }));
    }

    #[test]
    fn association_classification_comes_from_descriptor() {
        let scalar = FieldDescriptor::new("Status", FieldKind::String);
        let json_blob = FieldDescriptor::new("Payload", FieldKind::Object);
        let to_many = FieldDescriptor::new("Items", FieldKind::Object)
            .array()
            .references("OrderItem");
        assert!(!scalar.is_association());
        assert!(json_blob.is_association());
        assert!(to_many.is_association());
    }
}
