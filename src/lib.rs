//! modelrest: a model-driven RESTful resource engine.
//!
//! Register a record shape once (fields, labels, references, verb bindings)
//! and the engine generates the four CRUD operations for it: create with
//! single/batch payloads, list with a JSON condition language plus sorting,
//! projection and pagination, and condition-targeted update/delete with an
//! explicit multi-record opt-in. Every operation runs inside one transaction
//! and every outcome flows through one envelope shape.

pub mod case;
pub mod config;
pub mod error;
pub mod meta;
pub mod query;
pub mod response;
pub mod rest;
pub mod routes;
pub mod state;
pub mod store;

pub use config::EngineConfig;
pub use error::{AppError, ConfigError};
pub use meta::{
    BaseFields, FieldDescriptor, FieldKind, MetaRegistry, ModelDescriptor, RegistryBuilder,
};
pub use query::{compile, parse_condition, ConditionNode, Predicate};
pub use response::Envelope;
pub use rest::{bind_all, bind_model, RestDescriptor, Verb, VerbConfig};
pub use routes::{common_routes, meta_routes};
pub use state::AppState;
