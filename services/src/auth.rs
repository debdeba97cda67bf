//! Bearer-token authentication.
//!
//! Handlers that need an authenticated user take a [`RequireAuth`] argument.
//! Because it is a `FromRequestParts` extractor it runs before the body is
//! read and before any handler code, so an unauthenticated request never
//! reaches storage or the database.
//!
//! # Token Requirements
//!
//! The JWT must:
//! - Be signed (HS256) with the server's `JWT_SECRET`
//! - Have a valid `exp` (expiration) claim
//! - Have a `sub` (subject) claim containing the numeric user id
//! - Have an `iss` (issuer) claim matching [`ISSUER`]

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const ISSUER: &str = "Collage";

/// Lifetime of tokens minted by [`issue_session_token`].
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Mint a session token for `user_id`.
pub fn issue_session_token(
    user_id: i64,
    jwt_secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
        iss: ISSUER.to_owned(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
}

/// Authenticated user context extracted from a valid session JWT.
///
/// # Rejection
///
/// Returns `SessionAuthError` (401 Unauthorized) if the token is missing,
/// malformed, badly signed, expired, from another issuer, or names a
/// non-numeric subject.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    user_id: i64,
    claims: SessionClaims,
}

impl RequireAuth {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }
}

#[derive(Debug, Serialize)]
pub struct SessionAuthError {
    pub error: String,
    pub message: String,
}

impl SessionAuthError {
    fn missing_token() -> Self {
        Self {
            error: "missing_token".to_owned(),
            message: "Authorization header with Bearer token is required".to_owned(),
        }
    }

    fn invalid_format() -> Self {
        Self {
            error: "invalid_format".to_owned(),
            message: "Authorization header must be in format: Bearer <token>".to_owned(),
        }
    }

    fn invalid_token(reason: impl Into<String>) -> Self {
        Self {
            error: "invalid_token".to_owned(),
            message: reason.into(),
        }
    }

    fn missing_config() -> Self {
        Self {
            error: "server_error".to_owned(),
            message: "Server configuration error".to_owned(),
        }
    }
}

impl IntoResponse for SessionAuthError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self.error, "Rejected unauthenticated request");
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header_str = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let stripped = header_str.strip_prefix("Bearer ")?.trim();
    if stripped.is_empty() {
        return None;
    }
    Some(stripped)
}

fn validate_session_token(token: &str, jwt_secret: &str) -> Result<SessionClaims, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token has expired".to_owned(),
        jsonwebtoken::errors::ErrorKind::InvalidSignature => "Invalid token signature".to_owned(),
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => "Invalid token issuer".to_owned(),
        _ => format!("Token validation failed: {e}"),
    })?;

    Ok(token_data.claims)
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = SessionAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let config = parts
            .extensions
            .get::<Config>()
            .ok_or_else(SessionAuthError::missing_config)?;

        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            if parts.headers.contains_key(AUTHORIZATION) {
                SessionAuthError::invalid_format()
            } else {
                SessionAuthError::missing_token()
            }
        })?;

        let claims = validate_session_token(token, config.jwt_secret())
            .map_err(SessionAuthError::invalid_token)?;
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| SessionAuthError::invalid_token("Token subject is not a user id"))?;

        Ok(Self { user_id, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    const TEST_SECRET: &str = "test-jwt-secret-for-unit-tests";

    fn parts_with(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        parts.extensions.insert(Config::new_for_test());
        parts
    }

    fn token_with(sub: &str, iss: &str, exp_offset: i64, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub: sub.to_owned(),
            iat: now,
            exp: now + exp_offset,
            iss: iss.to_owned(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn extract_bearer_token_variants() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer my-token-123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("my-token-123"));

        headers.insert(AUTHORIZATION, "my-token-123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn issued_token_validates() {
        let token = issue_session_token(42, TEST_SECRET).unwrap();
        let claims = validate_session_token(&token, TEST_SECRET).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECS);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_session_token(42, TEST_SECRET).unwrap();
        let err = validate_session_token(&token, "wrong-secret").unwrap_err();
        assert!(err.contains("Invalid token signature"), "{err}");
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let expired = token_with("1", ISSUER, -3600, TEST_SECRET);
        assert_eq!(
            validate_session_token(&expired, TEST_SECRET).unwrap_err(),
            "Token has expired"
        );

        let foreign = token_with("1", "SomeoneElse", 3600, TEST_SECRET);
        assert_eq!(
            validate_session_token(&foreign, TEST_SECRET).unwrap_err(),
            "Invalid token issuer"
        );
    }

    #[tokio::test]
    async fn extractor_yields_user_id() {
        let secret = Config::new_for_test().jwt_secret().to_owned();
        let token = issue_session_token(7, &secret).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));

        let auth = RequireAuth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(auth.user_id(), 7);
        assert!(auth.expires_at() > auth.claims().iat);
    }

    #[tokio::test]
    async fn extractor_rejections() {
        let secret = Config::new_for_test().jwt_secret().to_owned();

        let err = RequireAuth::from_request_parts(&mut parts_with(None), &())
            .await
            .unwrap_err();
        assert_eq!(err.error, "missing_token");

        let err = RequireAuth::from_request_parts(&mut parts_with(Some("Token abc")), &())
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_format");

        let non_numeric = token_with("alice", ISSUER, 3600, &secret);
        let err = RequireAuth::from_request_parts(
            &mut parts_with(Some(&format!("Bearer {non_numeric}"))),
            &(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error, "invalid_token");

        let (mut bare, ()) = Request::builder().body(()).unwrap().into_parts();
        let err = RequireAuth::from_request_parts(&mut bare, &())
            .await
            .unwrap_err();
        assert_eq!(err.error, "server_error");
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
