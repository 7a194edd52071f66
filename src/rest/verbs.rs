//! Per-model operation-to-HTTP-method bindings, with conflict detection.

use axum::http::Method;
use serde::Serialize;

/// Binding for one CRUD operation: an HTTP method, or disabled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verb {
    Method(Method),
    Disabled,
}

impl Verb {
    pub fn method(&self) -> Option<&Method> {
        match self {
            Verb::Method(m) => Some(m),
            Verb::Disabled => None,
        }
    }
}

/// The four operation bindings for one model. Defaults mirror the original
/// engine: create POST, read GET, update PUT, delete DELETE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerbConfig {
    pub create: Verb,
    pub read: Verb,
    pub update: Verb,
    pub delete: Verb,
    /// Authorization signal consumed, not computed, by the engine: routes for
    /// this model are exempt from the surrounding auth layer when set.
    pub ignore_auth: bool,
}

impl Default for VerbConfig {
    fn default() -> Self {
        VerbConfig {
            create: Verb::Method(Method::POST),
            read: Verb::Method(Method::GET),
            update: Verb::Method(Method::PUT),
            delete: Verb::Method(Method::DELETE),
            ignore_auth: false,
        }
    }
}

impl VerbConfig {
    /// All four operations disabled (the `-` sentinel of the original tags).
    pub fn none() -> Self {
        VerbConfig {
            create: Verb::Disabled,
            read: Verb::Disabled,
            update: Verb::Disabled,
            delete: Verb::Disabled,
            ignore_auth: false,
        }
    }

    pub fn create(mut self, verb: Verb) -> Self {
        self.create = verb;
        self
    }

    pub fn read(mut self, verb: Verb) -> Self {
        self.read = verb;
        self
    }

    pub fn update(mut self, verb: Verb) -> Self {
        self.update = verb;
        self
    }

    pub fn delete(mut self, verb: Verb) -> Self {
        self.delete = verb;
        self
    }

    pub fn ignore_auth(mut self) -> Self {
        self.ignore_auth = true;
        self
    }

    /// Enabled operations with their effective methods, in create/read/update/
    /// delete order.
    pub fn enabled(&self) -> Vec<(&'static str, Method)> {
        [
            ("create", &self.create),
            ("read", &self.read),
            ("update", &self.update),
            ("delete", &self.delete),
        ]
        .into_iter()
        .filter_map(|(op, v)| v.method().map(|m| (op, m.clone())))
        .collect()
    }

    /// First pair of enabled operations sharing a method, if any. Two enabled
    /// operations on one route path must never share a method.
    pub fn find_conflict(&self) -> Option<(&'static str, &'static str, Method)> {
        let enabled = self.enabled();
        for (i, (op_a, m_a)) in enabled.iter().enumerate() {
            for (op_b, m_b) in &enabled[i + 1..] {
                if m_a == m_b {
                    return Some((op_a, op_b, m_a.clone()));
                }
            }
        }
        None
    }
}

/// Which operations were actually mounted for a model; computed once at
/// binding time and read-only afterward. Drives the metadata route, which is
/// also how the surrounding auth layer learns which models opted out of it.
#[derive(Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestDescriptor {
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
    pub ignore_auth: bool,
}

impl RestDescriptor {
    pub fn is_valid(&self) -> bool {
        self.create || self.read || self.update || self.delete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_four_operations_without_conflict() {
        let cfg = VerbConfig::default();
        assert_eq!(cfg.enabled().len(), 4);
        assert!(cfg.find_conflict().is_none());
    }

    #[test]
    fn shared_method_between_enabled_operations_is_a_conflict() {
        let cfg = VerbConfig::default().update(Verb::Method(Method::POST));
        let (a, b, m) = cfg.find_conflict().unwrap();
        assert_eq!((a, b), ("create", "update"));
        assert_eq!(m, Method::POST);
    }

    #[test]
    fn disabled_operations_never_conflict() {
        let cfg = VerbConfig::default()
            .create(Verb::Disabled)
            .update(Verb::Method(Method::POST));
        assert!(cfg.find_conflict().is_none());
        assert_eq!(cfg.enabled().len(), 3);
    }

    #[test]
    fn none_disables_everything() {
        let cfg = VerbConfig::none();
        assert!(cfg.enabled().is_empty());
        assert!(!RestDescriptor::default().is_valid());
    }
}
