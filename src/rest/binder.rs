//! Mounts CRUD handlers for registered models. Pure wiring: verb resolution
//! and conflict detection happen here, operation bodies live in `handlers`.

use crate::error::ConfigError;
use crate::meta::ModelDescriptor;
use crate::rest::{handlers, RestDescriptor};
use crate::state::AppState;
use axum::extract::Query;
use axum::routing::{MethodFilter, MethodRouter};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

fn method_filter(
    model: &ModelDescriptor,
    operation: &'static str,
    method: &axum::http::Method,
) -> Result<MethodFilter, ConfigError> {
    MethodFilter::try_from(method.clone()).map_err(|_| ConfigError::InvalidMethod {
        model: model.name.clone(),
        operation,
        method: method.to_string(),
    })
}

/// Bind one model's enabled operations at `{prefix}/{path segment}`.
/// On a method conflict nothing is mounted for the model and the error names
/// the colliding operations.
pub fn bind_model(
    router: Router,
    state: &AppState,
    model: Arc<ModelDescriptor>,
) -> Result<(Router, RestDescriptor), ConfigError> {
    if let Some((first, second, method)) = model.verbs.find_conflict() {
        return Err(ConfigError::MethodConflict {
            model: model.name.clone(),
            first,
            second,
            method: method.to_string(),
        });
    }

    let enabled = model.verbs.enabled();
    let mut desc = RestDescriptor {
        ignore_auth: model.verbs.ignore_auth,
        ..RestDescriptor::default()
    };
    if enabled.is_empty() {
        return Ok((router, desc));
    }

    let path = format!("{}/{}", state.config.route_prefix, model.path_segment());
    let mut mr = MethodRouter::new();
    for (operation, method) in enabled {
        let filter = method_filter(&model, operation, &method)?;
        let st = state.clone();
        let m = model.clone();
        match operation {
            "create" => {
                desc.create = true;
                mr = mr.on(filter, move |Json(body): Json<Value>| {
                    let st = st.clone();
                    let m = m.clone();
                    async move { handlers::create(st, m, body).await }
                });
            }
            "read" => {
                desc.read = true;
                mr = mr.on(
                    filter,
                    move |Query(params): Query<HashMap<String, String>>| {
                        let st = st.clone();
                        let m = m.clone();
                        async move { handlers::list(st, m, params).await }
                    },
                );
            }
            "update" => {
                desc.update = true;
                mr = mr.on(filter, move |Json(body): Json<Value>| {
                    let st = st.clone();
                    let m = m.clone();
                    async move { handlers::update(st, m, body).await }
                });
            }
            "delete" => {
                desc.delete = true;
                mr = mr.on(
                    filter,
                    move |Query(params): Query<HashMap<String, String>>,
                          body: Option<Json<Value>>| {
                        let st = st.clone();
                        let m = m.clone();
                        async move { handlers::delete(st, m, params, body.map(|b| b.0)).await }
                    },
                );
            }
            _ => unreachable!("unknown operation"),
        }
    }
    tracing::info!(model = %model.name, path = %path, "mounted CRUD routes");
    Ok((router.route(&path, mr), desc))
}

/// Bind every registered model in registration order and record which
/// operations were mounted. Fails loudly on the first configuration error;
/// nothing should serve with a half-bound surface.
pub fn bind_all(mut router: Router, state: &AppState) -> Result<Router, ConfigError> {
    let mut mounted = HashMap::new();
    for model in state.registry.list() {
        let (next, desc) = bind_model(router, state, model.clone())?;
        router = next;
        mounted.insert(model.name.clone(), desc);
    }
    // Nothing else writes this lock, and losing the descriptors at startup
    // would silently blank the metadata route.
    let mut rest = state
        .rest
        .write()
        .expect("rest descriptor lock poisoned during binding");
    *rest = mounted;
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::meta::{BaseFields, FieldDescriptor, FieldKind, ModelDescriptor, RegistryBuilder};
    use crate::rest::{Verb, VerbConfig};
    use axum::http::Method;

    fn test_state(registry: RegistryBuilder) -> AppState {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/modelrest_test")
            .expect("lazy pool");
        AppState::new(pool, registry.freeze(), EngineConfig::default())
    }

    fn order_model(verbs: VerbConfig) -> ModelDescriptor {
        ModelDescriptor::builder("Order")
            .embed(BaseFields::audit())
            .field(FieldDescriptor::new("Status", FieldKind::String).label("Status"))
            .verbs(verbs)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn default_verbs_mount_all_four_operations() {
        let mut registry = RegistryBuilder::new();
        registry.register(order_model(VerbConfig::default()));
        let state = test_state(registry);
        let model = state.registry.lookup("Order").unwrap();
        let (_, desc) = bind_model(Router::new(), &state, model).unwrap();
        assert!(desc.create && desc.read && desc.update && desc.delete);
        assert!(desc.is_valid());
    }

    #[tokio::test]
    async fn conflicting_verbs_mount_nothing_and_fail_registration() {
        let mut registry = RegistryBuilder::new();
        registry.register(order_model(
            VerbConfig::default().delete(Verb::Method(Method::PUT)),
        ));
        let state = test_state(registry);
        let model = state.registry.lookup("Order").unwrap();
        let err = bind_model(Router::new(), &state, model).unwrap_err();
        match err {
            ConfigError::MethodConflict { first, second, method, .. } => {
                assert_eq!((first, second), ("update", "delete"));
                assert_eq!(method, "PUT");
            }
            other => panic!("expected method conflict, got {other}"),
        }
        // bind_all fails too, with no descriptors recorded
        let err = bind_all(Router::new(), &state);
        assert!(err.is_err());
        assert!(state.rest.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fully_disabled_model_mounts_zero_handlers() {
        let mut registry = RegistryBuilder::new();
        registry.register(order_model(VerbConfig::none()));
        let state = test_state(registry);
        let model = state.registry.lookup("Order").unwrap();
        let (_, desc) = bind_model(Router::new(), &state, model).unwrap();
        assert!(!desc.is_valid());
    }

    #[tokio::test]
    async fn auth_exemption_is_echoed_into_the_descriptor() {
        let mut registry = RegistryBuilder::new();
        registry.register(order_model(VerbConfig::default().ignore_auth()));
        let state = test_state(registry);
        let model = state.registry.lookup("Order").unwrap();
        let (_, desc) = bind_model(Router::new(), &state, model).unwrap();
        assert!(desc.ignore_auth);
        let v = serde_json::to_value(desc).unwrap();
        assert_eq!(v["ignoreAuth"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn bind_all_records_one_descriptor_per_model() {
        let mut registry = RegistryBuilder::new();
        registry.register(order_model(VerbConfig::default()));
        registry.register(
            ModelDescriptor::builder("User")
                .embed(BaseFields::audit())
                .field(FieldDescriptor::new("UserName", FieldKind::String).label("User Name"))
                .verbs(VerbConfig::default().delete(Verb::Disabled))
                .build()
                .unwrap(),
        );
        let state = test_state(registry);
        bind_all(Router::new(), &state).unwrap();
        let rest = state.rest.read().unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest["Order"].delete);
        assert!(!rest["User"].delete);
    }
}
