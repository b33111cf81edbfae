use axum::{
    Json,
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Attached to every request by [`request_id`].
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

pub fn json_error(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
        .into_response()
}

// Middleware: reuse a sane incoming `x-request-id` or mint a uuid, expose it
// to handlers and echo it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestMeta {
        request_id: request_id.clone(),
    });

    let mut resp = next.run(req).await;
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, v);
    }
    resp
}
