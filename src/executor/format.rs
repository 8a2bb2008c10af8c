//! Reply formatting.
//!
//! The one payload-aware convenience the router applies: hex-quantity
//! results are rewritten as base-10 decimal strings. Chain values routinely
//! exceed 64 bits (wei balances), so the conversion runs on arbitrary-
//! precision integers.

use num_bigint::BigUint;
use serde_json::{json, Value};

/// Placeholder emitted when a `0x`-prefixed result does not parse as hex.
const CONVERSION_ERROR: &str = "Error converting result to decimal";

/// Convert a `0x`-prefixed hex quantity to its decimal representation.
pub fn hex_to_decimal(hex: &str) -> Option<String> {
    let digits = hex.strip_prefix("0x")?;
    BigUint::parse_bytes(digits.as_bytes(), 16).map(|n| n.to_str_radix(10))
}

/// Shape an upstream reply for the client.
///
/// Everything the upstream said passes through (including error bodies);
/// the session id is attached, and a string `result` beginning with `0x`
/// is converted to decimal. A missing or non-object reply collapses to an
/// error marker.
pub fn format_response(reply: Value, session_id: &str) -> Value {
    let Value::Object(mut body) = reply else {
        return json!({"error": "Invalid response format"});
    };

    body.insert("sessionId".to_string(), json!(session_id));

    if let Some(Value::String(result)) = body.get("result") {
        if result.starts_with("0x") {
            let converted = match hex_to_decimal(result) {
                Some(decimal) => json!(decimal),
                None => json!(CONVERSION_ERROR),
            };
            body.insert("result".to_string(), converted);
        }
    }

    Value::Object(body)
}
