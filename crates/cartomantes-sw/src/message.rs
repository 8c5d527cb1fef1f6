//! Typed payloads crossing the worker boundary.
//!
//! Page messages, push data and background messages arrive as loosely shaped JSON.
//! They are validated here into typed values before any notification is built; a
//! payload that does not validate degrades to defaults instead of failing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Message posted by a page to the worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Raise a notification without a push round-trip.
    #[serde(rename = "LOCAL_NOTIFY")]
    LocalNotify(NotificationFields),
    /// Activate a waiting worker immediately.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Validate a raw message. Anything unrecognised is [`ClientMessage::Unknown`].
    pub fn parse(value: &JsonValue) -> Self {
        Self::deserialize(value).unwrap_or(Self::Unknown)
    }
}

/// Message posted by the worker to its clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    /// A new worker version took over.
    #[serde(rename = "SW_UPDATED")]
    SwUpdated { version: String },
}

/// Optional notification fields, before defaults are applied.
///
/// Empty strings count as absent. Numbers and booleans are accepted as text.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotificationFields {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tag: Option<String>,
}

impl NotificationFields {
    /// Fields of a push message.
    ///
    /// JSON objects are read field by field. Data that is not JSON becomes the body
    /// text; data that is not even UTF-8 yields an empty body.
    pub fn from_push(data: Option<&[u8]>) -> Self {
        let Some(data) = data else {
            return Self::default();
        };
        match serde_json::from_slice::<JsonValue>(data) {
            Ok(value @ JsonValue::Object(_)) => Self::deserialize(&value).unwrap_or_default(),
            Ok(_) => Self::default(),
            Err(_) => Self {
                body: std::str::from_utf8(data)
                    .ok()
                    .map(str::to_string)
                    .filter(|text| !text.is_empty()),
                ..Self::default()
            },
        }
    }

    /// Fields of a cloud-messaging background message.
    ///
    /// Each field is taken from the `notification` object, then `data`, then the
    /// top level. A URL may also be given as `click_action`.
    pub fn from_messaging(payload: &JsonValue) -> Self {
        let empty = Map::new();
        let top = payload.as_object().unwrap_or(&empty);
        let levels: Vec<&Map<String, JsonValue>> = ["notification", "data"]
            .into_iter()
            .filter_map(|key| top.get(key).and_then(JsonValue::as_object))
            .chain(std::iter::once(top))
            .collect();

        let pick = |keys: &[&str]| {
            levels.iter().find_map(|level| {
                keys.iter()
                    .find_map(|key| level.get(*key).and_then(text_value))
            })
        };

        Self {
            title: pick(&["title"]),
            body: pick(&["body"]),
            url: pick(&["url", "click_action"]),
            tag: pick(&["tag"]),
        }
    }
}

fn text_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        // Zero is as absent as an empty string.
        JsonValue::Number(n) if n.as_f64() == Some(0.0) => None,
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    Ok(text_value(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_local_notify() {
        let message = ClientMessage::parse(&json!({
            "type": "LOCAL_NOTIFY",
            "title": "Nova leitura",
            "url": "painel.html",
            "tag": "leitura-42"
        }));
        assert_eq!(
            message,
            ClientMessage::LocalNotify(NotificationFields {
                title: Some("Nova leitura".to_string()),
                body: None,
                url: Some("painel.html".to_string()),
                tag: Some("leitura-42".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_skip_waiting() {
        assert_eq!(
            ClientMessage::parse(&json!({"type": "SKIP_WAITING"})),
            ClientMessage::SkipWaiting
        );
    }

    #[test]
    fn test_unrecognised_messages_are_unknown() {
        assert_eq!(ClientMessage::parse(&json!({"type": "PING"})), ClientMessage::Unknown);
        assert_eq!(ClientMessage::parse(&json!({"title": "x"})), ClientMessage::Unknown);
        assert_eq!(ClientMessage::parse(&json!("LOCAL_NOTIFY")), ClientMessage::Unknown);
        assert_eq!(ClientMessage::parse(&JsonValue::Null), ClientMessage::Unknown);
    }

    #[test]
    fn test_empty_strings_count_as_absent() {
        let message = ClientMessage::parse(&json!({"type": "LOCAL_NOTIFY", "title": "", "body": 3}));
        let ClientMessage::LocalNotify(fields) = message else {
            panic!("expected LOCAL_NOTIFY");
        };
        assert_eq!(fields.title, None);
        assert_eq!(fields.body, Some("3".to_string()));
    }

    #[test]
    fn test_falsy_values_count_as_absent() {
        let message = ClientMessage::parse(&json!({
            "type": "LOCAL_NOTIFY",
            "title": 0,
            "body": false,
            "url": null,
            "tag": 0.0
        }));
        assert_eq!(message, ClientMessage::LocalNotify(NotificationFields::default()));

        let fields = NotificationFields::from_messaging(&json!({
            "notification": {"title": 0},
            "data": {"title": "Cartas"}
        }));
        assert_eq!(fields.title.as_deref(), Some("Cartas"));
    }

    #[test]
    fn test_worker_message_wire_format() {
        let message = WorkerMessage::SwUpdated {
            version: "v1.1.9".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "SW_UPDATED", "version": "v1.1.9"})
        );
    }

    #[test]
    fn test_push_json_object() {
        let fields = NotificationFields::from_push(Some(br#"{"title":"Oi","url":"/x"}"#));
        assert_eq!(fields.title.as_deref(), Some("Oi"));
        assert_eq!(fields.url.as_deref(), Some("/x"));
        assert_eq!(fields.body, None);
    }

    #[test]
    fn test_push_plain_text_becomes_body() {
        let fields = NotificationFields::from_push(Some(b"Sua leitura chegou"));
        assert_eq!(fields.title, None);
        assert_eq!(fields.body.as_deref(), Some("Sua leitura chegou"));
    }

    #[test]
    fn test_push_garbage_degrades_to_empty() {
        assert_eq!(
            NotificationFields::from_push(Some(&[0xff, 0xfe, 0x00])),
            NotificationFields::default()
        );
        assert_eq!(NotificationFields::from_push(None), NotificationFields::default());
        assert_eq!(
            NotificationFields::from_push(Some(b"[1,2]")),
            NotificationFields::default()
        );
    }

    #[test]
    fn test_messaging_priority() {
        let fields = NotificationFields::from_messaging(&json!({
            "notification": {"title": "from notification"},
            "data": {"title": "from data", "body": "data body", "click_action": "painel.html"},
            "title": "top",
            "body": "top body",
            "tag": "top-tag"
        }));
        assert_eq!(fields.title.as_deref(), Some("from notification"));
        assert_eq!(fields.body.as_deref(), Some("data body"));
        assert_eq!(fields.url.as_deref(), Some("painel.html"));
        assert_eq!(fields.tag.as_deref(), Some("top-tag"));
    }

    #[test]
    fn test_messaging_non_object_payload() {
        assert_eq!(
            NotificationFields::from_messaging(&json!(null)),
            NotificationFields::default()
        );
    }
}
