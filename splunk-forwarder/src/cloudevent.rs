use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::EventError;

/// Prefix for envelope fields promoted into the per-event context, giving
/// `Ce-id`, `Ce-type` and so on.
pub const CE_HEADER_PREFIX: &str = "Ce-";

/// Payload key the eventing engine plants its routing block under.
pub const METADATA_KEY: &str = "notif-metadata";

/// The inner notification payload. Arbitrary fields are preserved as-is,
/// only `events` and `notif-metadata` carry meaning here.
pub type Action = Map<String, Value>;

/// An envelope as the eventing engine sends it. Only `data` is structural;
/// every other top-level field rides along and is promoted to a header.
#[derive(Debug, Deserialize)]
pub struct CloudEvent {
    #[serde(default)]
    pub data: Option<DataField>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// `data` as the engine sends it: an object, or historically a JSON-encoded
/// string holding one. Anything else is caught by the last variant so the
/// error can say what was actually there.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DataField {
    Object(Action),
    Encoded(String),
    Other(Value),
}

impl DataField {
    fn resolve(self) -> Result<Action, EventError> {
        match self {
            DataField::Object(action) => Ok(action),
            DataField::Encoded(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(action)) => Ok(action),
                Ok(other) => Err(EventError::InvalidDataField(format!(
                    "data string decodes to {} instead of an object",
                    type_name(&other)
                ))),
                Err(e) => Err(EventError::InvalidDataField(format!(
                    "data string is not valid JSON: {}",
                    e
                ))),
            },
            DataField::Other(other) => Err(EventError::InvalidDataField(format!(
                "data is {}, expected an object or a JSON-encoded string",
                type_name(&other)
            ))),
        }
    }
}

/// The routing block the engine buries inside the payload, telling us where
/// this event goes and how.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingBlock {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, rename = "X-Insight-Token")]
    pub token: Option<String>,

    // The engine has sent this as both a bool and a string over time
    #[serde(default, rename = "trustAll", deserialize_with = "lenient_bool")]
    pub trust_all: bool,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Integration-specific settings, as a JSON-encoded string.
    #[serde(default)]
    pub extras: Option<String>,

    #[serde(default, rename = "_originalId")]
    pub original_id: Option<Value>,
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::String(s)) => Ok(s.eq_ignore_ascii_case("true")),
        _ => Ok(false),
    }
}

/// Per-event state accumulated by the pipeline stages and finally consumed
/// by the outcome encoder.
#[derive(Debug)]
pub struct EventContext {
    /// One `Ce-`-prefixed header per top-level envelope field.
    pub headers: HashMap<String, String>,
    /// The routing block extracted from the payload.
    pub metadata: RoutingBlock,
    /// Decoded form of the routing block's `extras` string.
    pub extras: Map<String, Value>,
    /// Tenancy identifiers from the envelope's `rh-account` / `rh-org-id`.
    pub account_id: Option<String>,
    pub org_id: Option<String>,
    /// Normalized delivery target, filled in before delivery.
    pub target_url: Option<String>,
    /// Intake instant, used for the outcome's `duration`.
    pub received_at: Instant,
}

impl EventContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.header("Ce-id")
    }

    pub fn event_type(&self) -> Option<&str> {
        self.header("Ce-type")
    }

    /// Drops every header whose name starts with `ce-`, however cased, so
    /// none of the promoted fields leak back to the engine.
    pub fn remove_ce_headers(&mut self) {
        self.headers
            .retain(|name, _| !name.to_ascii_lowercase().starts_with("ce-"));
    }
}

/// Unwraps an envelope into the per-event context and the payload the
/// splitter operates on. The routing block is removed from the payload here;
/// nothing downstream sees it again.
pub fn decode(bytes: &[u8]) -> Result<(EventContext, Action), EventError> {
    let envelope: CloudEvent = serde_json::from_slice(bytes)?;

    let mut headers = HashMap::with_capacity(envelope.attributes.len());
    for (key, value) in &envelope.attributes {
        headers.insert(format!("{CE_HEADER_PREFIX}{key}"), header_value(value));
    }

    let account_id = envelope.attributes.get("rh-account").map(header_value);
    let org_id = envelope.attributes.get("rh-org-id").map(header_value);

    let data = envelope
        .data
        .ok_or_else(|| EventError::InvalidDataField("data is missing or null".to_string()))?;
    let mut action = data.resolve()?;

    let metadata = match action.remove(METADATA_KEY) {
        Some(block @ Value::Object(_)) => {
            // A block whose fields are the wrong shape is as unusable as a
            // missing one
            serde_json::from_value::<RoutingBlock>(block)
                .map_err(|_| EventError::MissingRoutingBlock)?
        }
        _ => return Err(EventError::MissingRoutingBlock),
    };

    let extras = match metadata.extras.as_deref() {
        None => Map::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(extras)) => extras,
            Ok(other) => {
                return Err(EventError::InvalidExtras(format!(
                    "extras decodes to {} instead of an object",
                    type_name(&other)
                )))
            }
            Err(e) => {
                return Err(EventError::InvalidExtras(format!(
                    "extras is not valid JSON: {}",
                    e
                )))
            }
        },
    };

    let context = EventContext {
        headers,
        metadata,
        extras,
        account_id,
        org_id,
        target_url: None,
        received_at: Instant::now(),
    };

    Ok((context, action))
}

/// Envelope attribute to header string. Strings promote as-is, anything else
/// as its JSON text, since headers are flat strings on the wire.
fn header_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    fn test_envelope() -> Value {
        json!({
            "specversion": "1.0.0",
            "id": "b4e3db6a-5b56-4960-9987-1952bb0a2109",
            "type": "com.redhat.console.notification.toCamel.splunk",
            "source": "notifications",
            "time": "2023-02-08T15:22:00.000000000Z",
            "rh-account": "test-account-id",
            "rh-org-id": "test-org-id",
            "data": {
                "version": "2.0.0",
                "bundle": "console",
                "application": "integrations",
                "event_type": "integration-test",
                "events": [
                    { "metadata": {}, "payload": { "message": "Hello, world!" } }
                ],
                "notif-metadata": {
                    "url": "https://splunk.example.com",
                    "X-Insight-Token": "super-secret-token",
                    "trustAll": "false",
                    "type": "splunk",
                    "extras": "{\"originalId\":\"1234\"}",
                    "_originalId": "1234"
                }
            }
        })
    }

    fn stringify_data(mut envelope: Value) -> Value {
        let data = envelope["data"].take();
        envelope["data"] = Value::String(serde_json::to_string(&data).unwrap());
        envelope
    }

    fn decode_value(envelope: &Value) -> Result<(EventContext, Action), EventError> {
        decode(&serde_json::to_vec(envelope).unwrap())
    }

    #[test]
    fn promotes_envelope_fields_to_headers() {
        let (context, _) = decode_value(&test_envelope()).unwrap();

        assert_eq!(context.headers.len(), 7);
        assert_eq!(
            context.event_id(),
            Some("b4e3db6a-5b56-4960-9987-1952bb0a2109")
        );
        assert_eq!(
            context.event_type(),
            Some("com.redhat.console.notification.toCamel.splunk")
        );
        assert_eq!(context.header("Ce-specversion"), Some("1.0.0"));
        assert_eq!(context.header("Ce-source"), Some("notifications"));
        assert_eq!(context.header("Ce-rh-account"), Some("test-account-id"));
        assert_eq!(context.header("Ce-data"), None);
        assert_eq!(context.account_id.as_deref(), Some("test-account-id"));
        assert_eq!(context.org_id.as_deref(), Some("test-org-id"));
    }

    #[test]
    fn non_string_fields_promote_as_json_text() {
        let envelope = json!({
            "id": "1",
            "retries": 3,
            "urgent": true,
            "data": { "notif-metadata": {} }
        });
        let (context, _) = decode_value(&envelope).unwrap();

        assert_eq!(context.header("Ce-retries"), Some("3"));
        assert_eq!(context.header("Ce-urgent"), Some("true"));
    }

    #[test]
    fn extracts_routing_block_and_strips_it_from_payload() {
        let (context, action) = decode_value(&test_envelope()).unwrap();

        assert_eq!(
            context.metadata.url.as_deref(),
            Some("https://splunk.example.com")
        );
        assert_eq!(context.metadata.token.as_deref(), Some("super-secret-token"));
        assert!(!context.metadata.trust_all);
        assert_eq!(context.metadata.kind.as_deref(), Some("splunk"));
        assert_eq!(context.metadata.original_id, Some(json!("1234")));
        assert_eq!(context.extras, json!({"originalId": "1234"}).as_object().unwrap().clone());

        assert!(!action.contains_key(METADATA_KEY));
        assert_eq!(action["bundle"], json!("console"));
        assert_eq!(action["events"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn string_encoded_data_decodes_like_object_data() {
        let (object_context, object_action) = decode_value(&test_envelope()).unwrap();
        let (string_context, string_action) =
            decode_value(&stringify_data(test_envelope())).unwrap();

        assert_eq!(object_context.headers, string_context.headers);
        assert_eq!(
            object_context.metadata.url,
            string_context.metadata.url
        );
        assert_json_eq!(Value::Object(object_action), Value::Object(string_action));
    }

    #[test]
    fn trust_all_accepts_bools_and_strings() {
        for (given, expected) in [
            (json!(true), true),
            (json!(false), false),
            (json!("true"), true),
            (json!("TRUE"), true),
            (json!("false"), false),
            (json!("nonsense"), false),
            (json!(null), false),
        ] {
            let envelope = json!({
                "id": "1",
                "data": { "notif-metadata": { "trustAll": given } }
            });
            let (context, _) = decode_value(&envelope).unwrap();
            assert_eq!(context.metadata.trust_all, expected, "trustAll: {:?}", given);
        }

        let envelope = json!({ "id": "1", "data": { "notif-metadata": {} } });
        let (context, _) = decode_value(&envelope).unwrap();
        assert!(!context.metadata.trust_all);
    }

    #[test]
    fn rejects_non_object_envelopes() {
        assert!(matches!(
            decode(b"not json at all"),
            Err(EventError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            decode(b"[1, 2, 3]"),
            Err(EventError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn rejects_unusable_data_fields() {
        for data in [json!(17), json!([1, 2]), json!(null)] {
            let envelope = json!({ "id": "1", "data": data });
            assert!(
                matches!(
                    decode_value(&envelope),
                    Err(EventError::InvalidDataField(_))
                ),
                "data: {:?}",
                data
            );
        }

        let envelope = json!({ "id": "1" });
        assert!(matches!(
            decode_value(&envelope),
            Err(EventError::InvalidDataField(_))
        ));

        // Strings must themselves decode to an object
        for data in [json!("not json"), json!("[1, 2]"), json!("\"scalar\"")] {
            let envelope = json!({ "id": "1", "data": data });
            assert!(
                matches!(
                    decode_value(&envelope),
                    Err(EventError::InvalidDataField(_))
                ),
                "data: {:?}",
                data
            );
        }
    }

    #[test]
    fn rejects_missing_or_malformed_routing_blocks() {
        let envelope = json!({ "id": "1", "data": { "events": [] } });
        assert!(matches!(
            decode_value(&envelope),
            Err(EventError::MissingRoutingBlock)
        ));

        let envelope = json!({ "id": "1", "data": { "notif-metadata": "a string" } });
        assert!(matches!(
            decode_value(&envelope),
            Err(EventError::MissingRoutingBlock)
        ));

        let envelope = json!({ "id": "1", "data": { "notif-metadata": { "url": 17 } } });
        assert!(matches!(
            decode_value(&envelope),
            Err(EventError::MissingRoutingBlock)
        ));
    }

    #[test]
    fn rejects_undecodable_extras() {
        for extras in ["not json", "[1, 2]", "\"scalar\""] {
            let envelope = json!({
                "id": "1",
                "data": { "notif-metadata": { "extras": extras } }
            });
            assert!(
                matches!(decode_value(&envelope), Err(EventError::InvalidExtras(_))),
                "extras: {:?}",
                extras
            );
        }
    }

    #[test]
    fn missing_extras_mean_an_empty_map() {
        let envelope = json!({ "id": "1", "data": { "notif-metadata": {} } });
        let (context, _) = decode_value(&envelope).unwrap();
        assert!(context.extras.is_empty());
    }

    #[test]
    fn remove_ce_headers_is_case_insensitive() {
        let envelope = json!({
            "id": "1",
            "data": { "notif-metadata": {} }
        });
        let (mut context, _) = decode_value(&envelope).unwrap();
        // Promotion prefixes everything with Ce-, so craft the odd ones directly
        context
            .headers
            .insert("ce-lower".to_string(), "x".to_string());
        context
            .headers
            .insert("cE-mixed".to_string(), "x".to_string());
        context
            .headers
            .insert("x-custom".to_string(), "kept".to_string());

        context.remove_ce_headers();

        assert_eq!(context.headers.len(), 1);
        assert_eq!(context.header("x-custom"), Some("kept"));
    }
}
