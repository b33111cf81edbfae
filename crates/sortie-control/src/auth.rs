use axum::{
    Extension, Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use serde::Serialize;
use sortie_agent::config::UserCredential;

use crate::security::json_error;
use crate::state::AppState;

/// Username of the caller, inserted by [`basic_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthFailure {
    MissingHeader,
    BadFormat,
    BadCredentials,
}

impl AuthFailure {
    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::MissingHeader => "Authorization header missing or invalid",
            AuthFailure::BadFormat => "Invalid Authorization header format",
            AuthFailure::BadCredentials => "Invalid username or password",
        }
    }
}

/// Decodes `Basic base64(user:pass)` and checks it against `users`.
pub fn authenticate(header: Option<&str>, users: &[UserCredential]) -> Result<AuthUser, AuthFailure> {
    let encoded = header
        .and_then(|h| h.strip_prefix("Basic "))
        .ok_or(AuthFailure::MissingHeader)?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthFailure::BadFormat)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthFailure::BadFormat)?;
    let (username, password) = decoded.split_once(':').ok_or(AuthFailure::BadFormat)?;

    users
        .iter()
        .find(|u| u.username == username && u.password == password)
        .map(|u| AuthUser {
            username: u.username.clone(),
        })
        .ok_or(AuthFailure::BadCredentials)
}

// Middleware: every /api route requires Basic credentials from config.
pub async fn basic_auth(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authenticate(header, &state.users) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(failure) => {
            tracing::debug!(?failure, path = %req.uri().path(), "authentication rejected");
            let mut resp = json_error(StatusCode::UNAUTHORIZED, failure.message());
            resp.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Basic"),
            );
            resp
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub message: &'static str,
    pub user: String,
}

pub async fn validate(Extension(user): Extension<AuthUser>) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        message: "Authentication valid",
        user: user.username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<UserCredential> {
        vec![
            UserCredential {
                username: "admin".to_string(),
                password: "secret".to_string(),
            },
            UserCredential {
                username: "ops".to_string(),
                password: "a:b".to_string(),
            },
        ]
    }

    fn basic(raw: &str) -> String {
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }

    #[test]
    fn accepts_configured_pair() {
        let h = basic("admin:secret");
        assert_eq!(
            authenticate(Some(&h), &users()),
            Ok(AuthUser {
                username: "admin".to_string()
            })
        );
    }

    #[test]
    fn password_may_contain_colon() {
        let h = basic("ops:a:b");
        assert_eq!(authenticate(Some(&h), &users()).unwrap().username, "ops");
    }

    #[test]
    fn missing_or_non_basic_header() {
        assert_eq!(authenticate(None, &users()), Err(AuthFailure::MissingHeader));
        assert_eq!(
            authenticate(Some("Bearer abc"), &users()),
            Err(AuthFailure::MissingHeader)
        );
    }

    #[test]
    fn undecodable_header() {
        assert_eq!(
            authenticate(Some("Basic !!!"), &users()),
            Err(AuthFailure::BadFormat)
        );
        let no_colon = basic("admin");
        assert_eq!(
            authenticate(Some(&no_colon), &users()),
            Err(AuthFailure::BadFormat)
        );
    }

    #[test]
    fn wrong_pair_and_empty_user_list() {
        let h = basic("admin:nope");
        assert_eq!(authenticate(Some(&h), &users()), Err(AuthFailure::BadCredentials));
        let ok = basic("admin:secret");
        assert_eq!(authenticate(Some(&ok), &[]), Err(AuthFailure::BadCredentials));
    }
}
