//! Response envelope parsing and classification
//!
//! Every backend reply is parsed into a [`ResponseShape`]: the strict
//! `{code, message, data}` envelope when all three keys are present, or a
//! lenient shape for older endpoints that report success through `success`
//! / `ok` flags. Classification then maps the shape onto a
//! [`Classification`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Code carried by a successful envelope
pub const SUCCESS_CODE: i64 = 200;

/// Code the backend uses for "authentication expired"
pub const AUTH_EXPIRED_CODE: i64 = 401;

/// The normalized `{code, message, data}` wrapper.
///
/// Fields are kept as raw JSON: an envelope is recognised by its keys, not
/// by the types the server happened to put in them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: Value,
    pub message: Value,
    pub data: Value,
}

impl Envelope {
    /// Numeric code, if the server sent one
    pub fn code(&self) -> Option<i64> {
        self.code.as_i64()
    }
}

/// Result of the tagged parse
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    Strict(Envelope),
    Lenient(Value),
}

impl ResponseShape {
    /// Strict when `code`, `message` and `data` are all present, else lenient.
    pub fn parse(body: Value) -> Self {
        match body {
            Value::Object(mut obj)
                if obj.contains_key("code")
                    && obj.contains_key("message")
                    && obj.contains_key("data") =>
            {
                Self::Strict(Envelope {
                    code: obj.remove("code").unwrap_or(Value::Null),
                    message: obj.remove("message").unwrap_or(Value::Null),
                    data: obj.remove("data").unwrap_or(Value::Null),
                })
            }
            other => Self::Lenient(other),
        }
    }
}

/// Outcome of classifying a response body
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success(Value),
    BusinessError { message: String, raw: Value },
    AuthExpired(String),
}

/// Classify a response body against the given reserved auth-expired code.
pub fn classify(body: Value, auth_expired_code: i64) -> Classification {
    match ResponseShape::parse(body) {
        ResponseShape::Strict(envelope) => classify_strict(envelope, auth_expired_code),
        ResponseShape::Lenient(raw) => classify_lenient(raw, auth_expired_code),
    }
}

fn classify_strict(envelope: Envelope, auth_expired_code: i64) -> Classification {
    let code = envelope.code();
    if code == Some(SUCCESS_CODE) {
        return Classification::Success(envelope.data);
    }

    let message = envelope
        .message
        .as_str()
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed (code={})", envelope.code));

    if code == Some(auth_expired_code) {
        return Classification::AuthExpired(message);
    }

    let raw = serde_json::to_value(&envelope).unwrap_or(Value::Null);
    Classification::BusinessError { message, raw }
}

fn classify_lenient(raw: Value, auth_expired_code: i64) -> Classification {
    let code = raw.get("code").filter(|c| !c.is_null());

    let is_success = code.and_then(Value::as_i64) == Some(SUCCESS_CODE)
        || raw.get("success").is_some_and(is_truthy)
        || raw.get("ok").is_some_and(is_truthy);

    let Some(code) = code else {
        return Classification::Success(raw);
    };
    if is_success {
        return Classification::Success(raw);
    }

    let message = message_field(&raw).unwrap_or_else(|| format!("Request failed (code={})", code));

    if code.as_i64() == Some(auth_expired_code) {
        Classification::AuthExpired(message)
    } else {
        Classification::BusinessError { message, raw }
    }
}

/// `message`, falling back to `msg`
pub(crate) fn message_field(body: &Value) -> Option<String> {
    ["message", "msg"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|m| !m.is_empty())
        .map(str::to_string)
}

/// Loose truthiness for compatibility flags
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_success_returns_payload_unchanged() {
        let payloads = [
            json!({"token": "abc", "userInfo": {"id": 1}}),
            json!([1, 2, 3]),
            json!(null),
            json!("plain"),
        ];
        for payload in payloads {
            let body = json!({"code": 200, "message": "ok", "data": payload.clone()});
            assert_eq!(classify(body, AUTH_EXPIRED_CODE), Classification::Success(payload));
        }
    }

    #[test]
    fn test_strict_null_code_is_business_error() {
        let body = json!({"code": null, "message": "boom", "data": null});
        match classify(body, AUTH_EXPIRED_CODE) {
            Classification::BusinessError { message, raw } => {
                assert_eq!(message, "boom");
                assert_eq!(raw["code"], Value::Null);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_strict_non_numeric_code_is_business_error() {
        let body = json!({"code": "200", "message": "", "data": 1});
        match classify(body, AUTH_EXPIRED_CODE) {
            Classification::BusinessError { message, .. } => {
                assert_eq!(message, "Request failed (code=\"200\")");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_strict_success_ignores_message_type() {
        let body = json!({"code": 200, "message": 0, "data": {"token": "t"}});
        assert_eq!(
            classify(body, AUTH_EXPIRED_CODE),
            Classification::Success(json!({"token": "t"}))
        );
    }

    #[test]
    fn test_strict_auth_expired() {
        let body = json!({"code": 401, "message": "token expired", "data": null});
        assert_eq!(
            classify(body, AUTH_EXPIRED_CODE),
            Classification::AuthExpired("token expired".into())
        );
    }

    #[test]
    fn test_strict_business_error_keeps_envelope() {
        let body = json!({"code": 500, "message": "title required", "data": null});
        match classify(body, AUTH_EXPIRED_CODE) {
            Classification::BusinessError { message, raw } => {
                assert_eq!(message, "title required");
                assert_eq!(raw["code"], 500);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_strict_business_error_without_message() {
        let body = json!({"code": 404, "message": null, "data": null});
        match classify(body, AUTH_EXPIRED_CODE) {
            Classification::BusinessError { message, .. } => {
                assert_eq!(message, "Request failed (code=404)");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_shape_requires_all_three_keys() {
        assert!(matches!(
            ResponseShape::parse(json!({"code": 200, "message": "ok", "data": 1})),
            ResponseShape::Strict(_)
        ));
        assert!(matches!(
            ResponseShape::parse(json!({"code": 200, "data": 1})),
            ResponseShape::Lenient(_)
        ));
        // Key presence decides, whatever the field types
        assert!(matches!(
            ResponseShape::parse(json!({"code": "200", "message": 7, "data": 1})),
            ResponseShape::Strict(_)
        ));
        assert!(matches!(
            ResponseShape::parse(json!([1, 2])),
            ResponseShape::Lenient(_)
        ));
    }

    #[test]
    fn test_lenient_success_from_flags_without_code() {
        for body in [
            json!({"success": true, "items": []}),
            json!({"ok": true}),
            json!({"ok": 1}),
        ] {
            assert_eq!(
                classify(body.clone(), AUTH_EXPIRED_CODE),
                Classification::Success(body)
            );
        }
    }

    #[test]
    fn test_lenient_without_code_is_success() {
        let body = json!({"items": [1, 2], "total": 2});
        assert_eq!(
            classify(body.clone(), AUTH_EXPIRED_CODE),
            Classification::Success(body)
        );
        let body = json!([{"id": 1}]);
        assert_eq!(
            classify(body.clone(), AUTH_EXPIRED_CODE),
            Classification::Success(body)
        );
    }

    #[test]
    fn test_lenient_code_with_success_flag_wins() {
        let body = json!({"code": 0, "success": true});
        assert_eq!(
            classify(body.clone(), AUTH_EXPIRED_CODE),
            Classification::Success(body)
        );
    }

    #[test]
    fn test_lenient_business_error_uses_msg() {
        let body = json!({"code": 400, "msg": "bad keyword"});
        match classify(body, AUTH_EXPIRED_CODE) {
            Classification::BusinessError { message, raw } => {
                assert_eq!(message, "bad keyword");
                assert_eq!(raw["code"], 400);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_lenient_auth_expired() {
        let body = json!({"code": 401});
        assert_eq!(
            classify(body, AUTH_EXPIRED_CODE),
            Classification::AuthExpired("Request failed (code=401)".into())
        );
    }

    #[test]
    fn test_custom_auth_expired_code() {
        let body = json!({"code": 4010, "message": "relogin", "data": null});
        assert_eq!(
            classify(body, 4010),
            Classification::AuthExpired("relogin".into())
        );
    }
}
