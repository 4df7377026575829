//! The generic wire envelope shared by venues that follow the
//! `{event|topic, data}` convention.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded inbound (or encoded outbound) frame.
///
/// Venues wrap their payloads in a small envelope: an `event` name for
/// control traffic and request acknowledgements, a `topic` for channel
/// pushes, and a free-form `data` payload that only the venue adapter
/// knows how to parse. Ping/pong keep-alive frames and `success:false`
/// error responses ride the same shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name for control frames and request acknowledgements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Channel name for subscription pushes (e.g. `PERP_BTC_USDC@trade`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Request id echoed back by the venue on acknowledgements.
    /// Some venues echo it as a string, so both encodings are accepted.
    #[serde(
        default,
        deserialize_with = "de_request_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    /// Acknowledgement outcome; `Some(false)` marks an error response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Venue-supplied error description accompanying `success:false`.
    #[serde(rename = "errorMsg", skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    /// Venue timestamp in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    /// Venue payload; opaque to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Parse an envelope from raw frame text.
    ///
    /// # Errors
    /// Returns the underlying serde error when the frame is not a JSON
    /// object of the expected shape.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Build a control envelope carrying only an event name.
    #[must_use]
    pub fn control(event: &str) -> Self {
        Self {
            event: Some(event.to_string()),
            ..Self::default()
        }
    }

    /// `true` for a venue ping that expects a pong reply.
    #[must_use]
    pub fn is_ping(&self) -> bool {
        self.event.as_deref() == Some("ping")
    }

    /// `true` for a pong acknowledging our keep-alive ping.
    #[must_use]
    pub fn is_pong(&self) -> bool {
        self.event.as_deref() == Some("pong")
    }

    /// `true` when the venue reports a failed request (`success:false`).
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.success == Some(false)
    }
}

fn de_request_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}
