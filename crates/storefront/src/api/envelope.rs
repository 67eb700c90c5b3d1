//! Uniform response envelope.
//!
//! The backend is not consistent about response shapes: some endpoints answer
//! `{success, data, message}`, some `{data, message}`, and some return the bare
//! record or array. Every 2xx body is normalized into [`Envelope`] so callers
//! only ever look at one shape.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ApiError;

/// `{data, success, message}` view of a successful HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    /// Payload; `None` when the backend sent no data (or `null`).
    pub data: Option<T>,
    /// Whether the backend reported the operation as successful.
    pub success: bool,
    /// Optional human readable message from the backend.
    pub message: Option<String>,
}

impl Envelope<Value> {
    /// Normalize a raw 2xx JSON body.
    #[must_use]
    pub fn normalize(body: Value) -> Self {
        match body {
            Value::Object(mut map) => {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned);

                if let Some(success) = map.get("success").and_then(Value::as_bool) {
                    let data = map.remove("data").filter(|v| !v.is_null());
                    return Self {
                        data,
                        success,
                        message,
                    };
                }

                if map.contains_key("data") {
                    let data = map.remove("data").filter(|v| !v.is_null());
                    return Self {
                        data,
                        success: true,
                        message,
                    };
                }

                Self {
                    data: Some(Value::Object(map)),
                    success: true,
                    message: None,
                }
            }
            Value::Null => Self {
                data: None,
                success: true,
                message: None,
            },
            other => Self {
                data: Some(other),
                success: true,
                message: None,
            },
        }
    }

    /// Decode the payload into a concrete type.
    ///
    /// A payload that does not decode is an error only when the backend claims
    /// success; on a failed envelope the payload is irrelevant and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] if a successful payload has the wrong shape.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Envelope<T>, ApiError> {
        let data = match self.data {
            None => None,
            Some(value) => match serde_json::from_value::<T>(value) {
                Ok(data) => Some(data),
                Err(_) if !self.success => None,
                Err(e) => return Err(ApiError::Decode(e)),
            },
        };

        Ok(Envelope {
            data,
            success: self.success,
            message: self.message,
        })
    }
}

impl<T> Envelope<T> {
    /// Convert into the payload, treating `success: false` or a missing payload
    /// as a rejection.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the backend reported failure and
    /// [`ApiError::MissingData`] if it reported success without a payload.
    pub fn into_data(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(
                self.message
                    .unwrap_or_else(|| "Request was not successful".to_string()),
            ));
        }
        self.data.ok_or(ApiError::MissingData)
    }

    /// Convert into the backend message for calls whose payload is unused.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the backend reported failure.
    pub fn into_ack(self) -> Result<Option<String>, ApiError> {
        if self.success {
            Ok(self.message)
        } else {
            Err(ApiError::Rejected(
                self.message
                    .unwrap_or_else(|| "Request was not successful".to_string()),
            ))
        }
    }
}

/// Pull a readable message out of an error response body.
pub(super) fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        for key in ["message", "error", "detail"] {
            if let Some(text) = map.get(key).and_then(Value::as_str) {
                return Some(text.to_owned());
            }
        }
        return None;
    }

    Some(trimmed.chars().take(200).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: i64,
    }

    #[test]
    fn keeps_native_envelopes() {
        let env = Envelope::normalize(json!({
            "success": false,
            "message": "Invalid promo code",
            "data": null
        }));
        assert!(!env.success);
        assert_eq!(env.message.as_deref(), Some("Invalid promo code"));
        assert_eq!(env.data, None);
    }

    #[test]
    fn wraps_data_only_envelopes_as_success() {
        let env = Envelope::normalize(json!({"data": {"id": 3}, "message": "ok"}));
        assert!(env.success);
        let env = env.decode::<Thing>().unwrap();
        assert_eq!(env.data, Some(Thing { id: 3 }));
        assert_eq!(env.message.as_deref(), Some("ok"));
    }

    #[test]
    fn wraps_bare_records_and_arrays() {
        let env = Envelope::normalize(json!({"id": 5})).decode::<Thing>().unwrap();
        assert_eq!(env.into_data().unwrap(), Thing { id: 5 });

        let env = Envelope::normalize(json!([{"id": 1}, {"id": 2}]))
            .decode::<Vec<Thing>>()
            .unwrap();
        assert_eq!(env.into_data().unwrap().len(), 2);
    }

    #[test]
    fn empty_body_is_success_without_data() {
        let env = Envelope::normalize(Value::Null);
        assert!(env.success);
        assert!(env.clone().into_ack().is_ok());
        assert!(matches!(env.into_data(), Err(ApiError::MissingData)));
    }

    #[test]
    fn bad_payload_is_an_error_only_on_success() {
        let ok = Envelope::normalize(json!({"success": true, "data": {"id": "x"}}));
        assert!(matches!(ok.decode::<Thing>(), Err(ApiError::Decode(_))));

        let failed = Envelope::normalize(json!({"success": false, "data": {"id": "x"}}));
        let failed = failed.decode::<Thing>().unwrap();
        assert_eq!(failed.data, None);
        assert!(matches!(failed.into_data(), Err(ApiError::Rejected(_))));
    }

    #[test]
    fn extracts_error_messages() {
        assert_eq!(
            error_message(r#"{"message":"Out of stock"}"#).as_deref(),
            Some("Out of stock")
        );
        assert_eq!(
            error_message(r#"{"error":"Bad Request"}"#).as_deref(),
            Some("Bad Request")
        );
        assert_eq!(error_message("gateway timeout").as_deref(), Some("gateway timeout"));
        assert_eq!(error_message("  "), None);
        assert_eq!(error_message(r#"{"status":500}"#), None);
    }
}
