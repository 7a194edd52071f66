//! CRUD route generation: verb resolution, conflict detection, binding, handlers.

mod binder;
mod handlers;
mod verbs;

pub use binder::*;
pub use handlers::*;
pub use verbs::*;
