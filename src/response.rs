//! Uniform response envelope: every operation outcome funnels through this shape.

use serde::Serialize;
use serde_json::Value;

/// `{code: 0, data}` on success, `{code: nonzero, msg}` on failure.
#[derive(Serialize, Debug)]
pub struct Envelope {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn ok(data: Value) -> Self {
        Envelope {
            code: 0,
            msg: None,
            data: Some(data),
        }
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Envelope {
            code: -1,
            msg: Some(msg.into()),
            data: None,
        }
    }
}
