//! Model metadata: registration-time schema descriptions and the frozen registry.

mod descriptor;
mod registry;

pub use descriptor::*;
pub use registry::*;
