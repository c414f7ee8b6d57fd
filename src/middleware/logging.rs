use axum::extract::Request;
use tracing::{Span, info_span};

use crate::utils::security::mask_uri_token;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

/// Request span. Credentials are reduced to presence flags.
pub fn make_log_span(request: &Request) -> Span {
    let masked_uri = mask_uri_token(&request.uri().to_string());
    let headers = request.headers();

    info_span!(
        "request",
        method = ?request.method(),
        uri = ?masked_uri,
        version = ?request.version(),
        signed = headers.contains_key(SIGNATURE_HEADER),
        internal = headers.contains_key(INTERNAL_KEY_HEADER),
    )
}
