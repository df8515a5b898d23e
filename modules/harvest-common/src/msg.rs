use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An informational, warning, or error message attached to a harvest or export result.
///
/// `code` and `message` must both be non-empty; this is checked in [`Msg::new`] with a
/// debug assertion rather than a `Result`, since a blank code or message is always a
/// caller bug rather than a runtime condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Msg {
    pub code: String,
    pub message: String,
    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Value>,
}

impl Msg {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        debug_assert!(!code.is_empty(), "Msg code must not be empty");
        debug_assert!(!message.is_empty(), "Msg message must not be empty");
        Self {
            code,
            message,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_with_extras_flattened() {
        let msg = Msg::new("token_not_found", "No token for uid").with_extra("uid", "abc123");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["code"], "token_not_found");
        assert_eq!(json["uid"], "abc123");

        let back: Msg = serde_json::from_value(json).unwrap();
        assert_eq!(back.code, msg.code);
        assert_eq!(back.extras.get("uid").unwrap(), "abc123");
    }
}
