//! Line shapes of the facade protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sibi_gateway::{Channel, GatewayError, Published};

use super::error::{FacadeError, Result};

/// One request line: `{"id": <any>, "method": "<name>", "params": {...}}`.
///
/// `id` is echoed back untouched; `params` may be omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|err| FacadeError::InvalidRequest(err.to_string()))
    }
}

/// Error object carried by a failed reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    /// Server error code, for application errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Server-side request or order id, for application errors.
    #[serde(rename = "reqId", skip_serializing_if = "Option::is_none")]
    pub req_id: Option<i64>,
}

impl From<&FacadeError> for ErrorBody {
    fn from(err: &FacadeError) -> Self {
        let (code, req_id) = match err {
            FacadeError::Gateway(GatewayError::Api { id, code, .. }) => (Some(*code), Some(*id)),
            _ => (None, None),
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            code,
            req_id,
        }
    }
}

/// Reply to exactly one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Success { id: Value, result: Value },
    Failure { id: Value, error: ErrorBody },
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Response::Success { id, result }
    }

    pub fn failure(id: Value, err: &FacadeError) -> Self {
        Response::Failure {
            id,
            error: err.into(),
        }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// An event pushed on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub channel: Channel,
    #[serde(rename = "reqId")]
    pub req_id: i64,
    pub data: Value,
}

impl Event {
    /// Wrap a published event. `None` if its payload is not JSON.
    pub fn from_published(published: &Published) -> Option<Self> {
        let data = serde_json::from_str(&published.payload).ok()?;
        Some(Self {
            channel: published.channel,
            req_id: published.id,
            data,
        })
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_without_params() {
        let request = Request::parse(r#"{"id": 7, "method": "status"}"#).unwrap();
        assert_eq!(request.id, json!(7));
        assert_eq!(request.method, "status");
        assert!(request.params.is_null());
    }

    #[test]
    fn request_without_method_is_invalid() {
        let err = Request::parse(r#"{"id": 7}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert!(Request::parse("not json").is_err());
    }

    #[test]
    fn api_failure_carries_code_and_id() {
        let err = FacadeError::Gateway(GatewayError::Api {
            id: 4,
            code: 200,
            message: "No security definition".to_string(),
        });
        let line = Response::failure(json!("a"), &err).to_line();
        let value: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["id"], "a");
        assert_eq!(value["error"]["kind"], "api");
        assert_eq!(value["error"]["code"], 200);
        assert_eq!(value["error"]["reqId"], 4);
    }

    #[test]
    fn plain_failure_has_kind_and_message_only() {
        let err = FacadeError::Gateway(GatewayError::NotConnected);
        let value = serde_json::to_value(Response::failure(json!(1), &err)).unwrap();

        assert_eq!(
            value,
            json!({
                "id": 1,
                "error": { "kind": "not_connected", "message": "not connected to gateway" }
            })
        );
    }

    #[test]
    fn event_line_embeds_payload() {
        let published = Published {
            channel: Channel::TickPrice,
            id: 3,
            payload: r#"{"price":1.5}"#.to_string(),
        };
        let event = Event::from_published(&published).unwrap();

        assert_eq!(
            serde_json::from_str::<Value>(&event.to_line()).unwrap(),
            json!({ "channel": "tickPrice", "reqId": 3, "data": { "price": 1.5 } })
        );
    }
}
