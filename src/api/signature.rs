//! Request signing for the Temu open-API router.
//!
//! Every request carries a `sign` field computed over all other parameters.
//! The canonical string is built by sorting parameter names (byte order) and
//! concatenating `name + value` with no separator. Nested objects and arrays
//! are rendered as compact JSON with sorted keys, so the signature depends
//! only on the parameter *values*, never on map iteration order.
//!
//! `null` parameters are left out of both the canonical string and the body.

use crate::error::ListingError;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the parameter that carries the signature.
pub const SIGN_KEY: &str = "sign";

/// Digest used to sign a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignMethod {
    /// `MD5(secret + canonical + secret)`, uppercase hex. (default)
    #[default]
    Md5,
    /// `HMAC-SHA256(secret, canonical)`, uppercase hex.
    HmacSha256,
}

/// Build the canonical string for `params`, skipping `sign` and `null` values.
pub fn canonical_string(params: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = params
        .iter()
        .filter(|(k, v)| k.as_str() != SIGN_KEY && !v.is_null())
        .map(|(k, _)| k)
        .collect();
    keys.sort_unstable();

    let mut out = String::with_capacity(keys.len() * 24);
    for key in keys {
        out.push_str(key);
        render_value(&params[key.as_str()], &mut out);
    }
    out
}

/// Top-level values: strings verbatim, everything else as canonical JSON.
fn render_value(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        other => write_canonical_json(other, out),
    }
}

/// Compact JSON with object keys sorted, independent of serde_json's map order.
pub fn write_canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            // serde_json never fails to serialise a plain string
            out.push_str(&serde_json::to_string(s).unwrap_or_default());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical_json(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

/// Compute the signature of `params` with `secret`.
pub fn sign(
    params: &Map<String, Value>,
    secret: &str,
    method: SignMethod,
) -> Result<String, ListingError> {
    let canonical = canonical_string(params);
    match method {
        SignMethod::Md5 => {
            let mut hasher = Md5::new();
            hasher.update(secret.as_bytes());
            hasher.update(canonical.as_bytes());
            hasher.update(secret.as_bytes());
            Ok(hex::encode_upper(hasher.finalize()))
        }
        SignMethod::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .map_err(|e| ListingError::Internal(format!("invalid HMAC key: {e}")))?;
            mac.update(canonical.as_bytes());
            Ok(hex::encode_upper(mac.finalize().into_bytes()))
        }
    }
}

/// Insert the `sign` field into `params`, replacing any previous value.
pub fn sign_in_place(
    params: &mut Map<String, Value>,
    secret: &str,
    method: SignMethod,
) -> Result<(), ListingError> {
    let signature = sign(params, secret, method)?;
    params.insert(SIGN_KEY.to_string(), Value::String(signature));
    Ok(())
}

/// Check the `sign` field of `params` against a recomputed signature.
pub fn verify(params: &Map<String, Value>, secret: &str, method: SignMethod) -> bool {
    let Some(Value::String(given)) = params.get(SIGN_KEY) else {
        return false;
    };
    match sign(params, secret, method) {
        Ok(expected) => expected.eq_ignore_ascii_case(given),
        Err(_) => false,
    }
}
