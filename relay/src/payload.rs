//! Vendor wire format.
//!
//! Events go out as a single form field `data` holding base64 over the
//! JSON document `{"event": ..., "properties": {...}}`. Profile updates
//! go out as an "engage" JSON document with `$`-prefixed keys. The
//! project token and the epoch-seconds `time` field are stamped on by
//! the transport layer, never by callers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::Result;

/// Property value as accepted by the vendor. Keeping this a closed set
/// means non-serializable values cannot reach the encoder.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    String(String),
    Int(i64),
    Null,
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::String(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::String(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<Option<&str>> for PropValue {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(v) => v.into(),
            None => PropValue::Null,
        }
    }
}

/// Ordered property mapping; insertion order is preserved in the
/// encoded payload.
pub type Properties = IndexMap<String, PropValue>;

/// A named occurrence with its property mapping, sent once per user
/// action.
#[derive(Clone, Debug, Serialize)]
pub struct AnalyticsEvent {
    #[serde(rename = "event")]
    pub name: &'static str,
    pub properties: Properties,
}

impl AnalyticsEvent {
    pub fn new(name: &'static str, properties: Properties) -> Self {
        Self { name, properties }
    }
}

/// Stamp the project token and the `time` field onto an event before
/// transmission. An existing `time` is left alone; the token always
/// reflects the configured credential.
pub fn finalize(event: &mut AnalyticsEvent, token: &str) {
    if !event.properties.contains_key("time") {
        event.properties.insert(
            "time".to_string(),
            PropValue::Int(chrono::Utc::now().timestamp()),
        );
    }
    event
        .properties
        .insert("token".to_string(), token.into());
}

/// Encode a finalized event as the vendor wire body.
pub fn encode(event: &AnalyticsEvent) -> Result<String> {
    let json = serde_json::to_string(event)?;
    Ok(STANDARD.encode(json))
}

/// Profile mutation derived by a tracker. `set` overwrites fields on
/// the vendor-side record; `add` increments the named counters.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileUpdate {
    pub distinct_id: String,
    pub set: Properties,
    pub add: IndexMap<String, i64>,
}

/// The engage document as the vendor expects it. Borrowed view over a
/// `ProfileUpdate` with the token injected by the transport client.
#[derive(Serialize)]
pub struct EngageDocument<'a> {
    #[serde(rename = "$token")]
    pub token: &'a str,
    #[serde(rename = "$distinct_id")]
    pub distinct_id: &'a str,
    #[serde(rename = "$set")]
    pub set: &'a Properties,
    #[serde(rename = "$add")]
    pub add: &'a IndexMap<String, i64>,
}

impl<'a> EngageDocument<'a> {
    pub fn new(token: &'a str, update: &'a ProfileUpdate) -> Self {
        Self {
            token,
            distinct_id: &update.distinct_id,
            set: &update.set,
            add: &update.add,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> AnalyticsEvent {
        let mut properties = Properties::new();
        properties.insert("platform".to_string(), "tiktok".into());
        properties.insert("scale_position".to_string(), PropValue::Int(4));
        properties.insert("answer_text".to_string(), PropValue::Null);
        AnalyticsEvent::new("Share Completed", properties)
    }

    #[test]
    fn prop_value_serialization() {
        assert_eq!(
            serde_json::to_string(&PropValue::String("a".to_string())).unwrap(),
            r#""a""#
        );
        assert_eq!(serde_json::to_string(&PropValue::Int(4)).unwrap(), "4");
        assert_eq!(serde_json::to_string(&PropValue::Null).unwrap(), "null");
    }

    #[test]
    fn finalize_injects_token_and_time() {
        let mut event = sample_event();
        finalize(&mut event, "testtoken");

        assert_eq!(
            event.properties.get("token"),
            Some(&PropValue::String("testtoken".to_string()))
        );
        assert!(matches!(
            event.properties.get("time"),
            Some(PropValue::Int(t)) if *t > 0
        ));
    }

    #[test]
    fn finalize_keeps_existing_time() {
        let mut event = sample_event();
        event.properties.insert("time".to_string(), PropValue::Int(42));
        finalize(&mut event, "testtoken");

        assert_eq!(event.properties.get("time"), Some(&PropValue::Int(42)));
    }

    #[test]
    fn encoded_event_round_trips() {
        let mut event = sample_event();
        finalize(&mut event, "testtoken");

        let body = encode(&event).unwrap();
        let decoded = STANDARD.decode(body).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();

        assert_eq!(value["event"], "Share Completed");
        assert_eq!(value["properties"]["platform"], "tiktok");
        assert_eq!(value["properties"]["scale_position"], 4);
        assert_eq!(value["properties"]["answer_text"], serde_json::Value::Null);
        assert_eq!(value["properties"]["token"], "testtoken");
        assert!(value["properties"]["time"].is_i64());
    }

    #[test]
    fn engage_document_uses_vendor_keys() {
        let mut set = Properties::new();
        set.insert("$email".to_string(), "user@example.com".into());
        set.insert("tiktok_clicks".to_string(), PropValue::Int(1));
        let mut add = IndexMap::new();
        add.insert("tiktok_clicks".to_string(), 1);

        let update = ProfileUpdate {
            distinct_id: "user@example.com".to_string(),
            set,
            add,
        };
        let document = EngageDocument::new("testtoken", &update);
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["$token"], "testtoken");
        assert_eq!(value["$distinct_id"], "user@example.com");
        assert_eq!(value["$set"]["$email"], "user@example.com");
        assert_eq!(value["$add"]["tiktok_clicks"], 1);
    }
}
