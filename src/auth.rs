use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const TOKEN_VALIDITY_HOURS: i64 = 8;

/// Signing secret, registered as app data so the extractor can reach it.
#[derive(Clone)]
pub struct TokenSecret(pub String);

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug)]
pub enum AuthError {
    /// No Authorization header, or one that is not a bearer token.
    MissingCredentials,
    /// Login rejected the username/password pair.
    InvalidCredentials,
    /// Token failed signature or shape checks.
    InvalidToken,
    /// Token was once valid but its validity window has closed.
    ExpiredToken,
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "no token provided"),
            AuthError::InvalidCredentials => write!(f, "invalid username or password"),
            AuthError::InvalidToken => write!(f, "invalid token"),
            AuthError::ExpiredToken => write!(f, "token expired"),
        }
    }
}

impl std::error::Error for AuthError {}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InvalidToken | AuthError::ExpiredToken => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "success": false, "error": self.to_string() }))
    }
}

/// Sign a short-lived operator token.
pub fn issue_token(username: &str, secret: &str) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: username.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_VALIDITY_HOURS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Check signature and expiry, returning the claims on success.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        _ => AuthError::InvalidToken,
    })
}

/// Extractor gating the operator routes: a valid bearer token yields the
/// operator's claims, anything else short-circuits the handler with the
/// matching 401/403 response.
pub struct Operator(pub Claims);

impl FromRequest for Operator {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(operator_from_request(req))
    }
}

fn operator_from_request(req: &HttpRequest) -> Result<Operator, AuthError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingCredentials)?;

    // A route registered without a secret cannot validate anything.
    let secret = req
        .app_data::<web::Data<TokenSecret>>()
        .ok_or(AuthError::InvalidToken)?;

    let claims = verify_token(token, &secret.0).inspect_err(|e| {
        metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL, "kind" => e.kind())
            .increment(1);
    })?;
    Ok(Operator(claims))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify_roundtrip() {
        let token = issue_token("operator", "s3cret").unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, "operator");
        assert_eq!(claims.exp - claims.iat, TOKEN_VALIDITY_HOURS * 3600);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = issue_token("operator", "s3cret").unwrap();
        assert!(matches!(
            verify_token(&token, "other"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_token_is_invalid() {
        assert!(matches!(
            verify_token("not-a-jwt", "s3cret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let now = Utc::now();
        let claims = Claims {
            sub: "operator".into(),
            iat: (now - Duration::hours(9)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        assert!(matches!(
            verify_token(&token, "s3cret"),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn status_codes_split_missing_from_invalid() {
        assert_eq!(AuthError::MissingCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidToken.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::ExpiredToken.status_code(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn extractor_rejects_a_missing_header() {
        let req = actix_web::test::TestRequest::default()
            .app_data(web::Data::new(TokenSecret("s3cret".into())))
            .to_http_request();
        assert!(matches!(
            operator_from_request(&req),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[actix_web::test]
    async fn extractor_rejects_non_bearer_schemes() {
        let req = actix_web::test::TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic b3BzOnBhc3M="))
            .app_data(web::Data::new(TokenSecret("s3cret".into())))
            .to_http_request();
        assert!(matches!(
            operator_from_request(&req),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[actix_web::test]
    async fn extractor_accepts_a_valid_bearer_token() {
        let token = issue_token("operator", "s3cret").unwrap();
        let req = actix_web::test::TestRequest::default()
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .app_data(web::Data::new(TokenSecret("s3cret".into())))
            .to_http_request();
        let operator = operator_from_request(&req).unwrap();
        assert_eq!(operator.0.sub, "operator");
    }
}
