use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::EllError;
use crate::provider::retry::retry_after_from_headers;

use super::PROVIDER_NAME;

pub(crate) fn parse_openai_error(
    status: u16,
    headers: &HashMap<String, String>,
    body: &str,
) -> EllError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }
    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        code: Option<Value>,
    }

    let message = match serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
    {
        Some(error) => {
            let message = error.message.unwrap_or_else(|| "unknown error".to_string());
            match error.code {
                Some(Value::Null) | None => message,
                Some(code) => format!("{message} ({code})"),
            }
        }
        None => format!("status {status}: {body}"),
    };
    warn!(provider = PROVIDER_NAME, status, message = message.as_str(), "vendor returned an error status");

    match status {
        401 | 403 => EllError::Auth { message },
        429 => EllError::RateLimit {
            message,
            retry_after: retry_after_from_headers(headers),
        },
        // Vendor-side rejections (400 included) are provider failures; only
        // pre-flight checks produce `InvalidRequest`.
        _ => EllError::provider(PROVIDER_NAME, message),
    }
}
