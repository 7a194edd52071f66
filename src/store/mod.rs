//! Postgres-backed store: safe SQL assembly plus the transactional CRUD executor.
//! Identifiers come from registered descriptors only; values always bind as parameters.

mod bind;
mod builder;
mod executor;

pub use bind::*;
pub use builder::*;
pub use executor::*;
