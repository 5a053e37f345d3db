//! # Body Decoding
//!
//! JSON and form-encoded request bodies, both decoded into a JSON object.
//! Form encoding carries no types: a key seen once becomes a string, a
//! repeated key becomes an array of strings.

use serde_json::{Map, Value};

use super::errors::{ApiError, ApiResult};

pub fn decode_body(content_type: Option<&str>, body: &[u8]) -> ApiResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match mime.as_deref() {
        Some("application/json") => decode_json(body),
        Some(mime) if mime.ends_with("+json") => decode_json(body),
        Some("application/x-www-form-urlencoded") => Ok(decode_form(body)),
        Some(other) => Err(ApiError::UnsupportedContentType(other.to_string())),
        None => Err(ApiError::UnsupportedContentType("none".to_string())),
    }
}

fn decode_json(body: &[u8]) -> ApiResult<Map<String, Value>> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::BadArguments(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(ApiError::BadArguments(format!("Unable to decode data: {}", e))),
    }
}

fn decode_form(body: &[u8]) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        let value = Value::String(value.into_owned());
        match out.get_mut(&*key) {
            None => {
                out.insert(key.into_owned(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    out
}
