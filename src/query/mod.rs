//! JSON condition language: parse trees and compile them into parameterized predicates.

mod compile;
mod cond;

pub use compile::*;
pub use cond::*;
