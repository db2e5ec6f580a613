/*!
 * # Authentication
 *
 * Bearer JWT authentication for the AgroLink API. Tokens are HS256 signed
 * with issuer and audience checks. The middleware resolves the token to a
 * stored user, rejects suspended accounts and places an [`AuthUser`] in the
 * request extensions; handlers turn it into an explicit [`Actor`] for every
 * service call.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user;
use crate::errors::ServiceError;
use crate::repositories::UserRepository;
use crate::workflow::{AccountStatus, Actor, UserRole};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // Subject (user ID)
    pub role: UserRole,   // Role at issue time; the stored role wins
    pub jti: String,      // JWT ID
    pub iat: i64,         // Issued at
    pub exp: i64,         // Expiration
    pub iss: String,      // Issuer
    pub aud: String,      // Audience
}

/// The caller, resolved from the token and the users table.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub name: String,
    pub email: String,
    pub token_id: String,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(config: &AppConfig) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            config.auth_audience.clone(),
            config.auth_issuer.clone(),
            Duration::seconds(config.jwt_expiration as i64),
        )
    }
}

/// Issued access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Signs an access token for `user`.
    pub fn issue_token(&self, user: &user::Model) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.config.token_expiration).timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(IssuedToken {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_expiration.num_seconds(),
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Resolves a bearer token to an active stored user.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let user = UserRepository::find_optional(&*self.db, user_id)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if user.status == AccountStatus::Suspended {
            warn!(%user_id, "suspended account attempted access");
            return Err(AuthError::AccountSuspended);
        }

        Ok(AuthUser {
            user_id: user.id,
            role: user.role,
            name: user.name,
            email: user.email,
            token_id: claims.jti,
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Account is suspended")]
    AccountSuspended,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AccountSuspended => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(_) | AuthError::DatabaseError(_) => {
                ServiceError::InternalError(err.to_string())
            }
            AuthError::MissingAuth
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::UserNotFound => ServiceError::Unauthorized(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware that validates the bearer token
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::MissingAuth)?;
    let user = auth_service.authenticate(token).await?;
    debug!(user_id = %user.user_id, role = %user.role, "authenticated");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self, auth_service: Arc<AuthService>) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self, auth_service: Arc<AuthService>) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            auth_service,
            auth_middleware,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::workflow::Availability;

    fn service(secret: &str, issuer: &str) -> AuthService {
        AuthService::new(
            AuthConfig::new(
                secret.to_string(),
                "agrolink-api".to_string(),
                issuer.to_string(),
                Duration::minutes(30),
            ),
            Arc::new(DatabaseConnection::Disconnected),
        )
    }

    fn driver() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            name: "Kasun".into(),
            email: "kasun@example.com".into(),
            phone: None,
            role: UserRole::Driver,
            status: AccountStatus::Active,
            availability: Availability::Available,
            service_area: Some("Kandy".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let auth = service("a-very-long-test-secret-of-32-chars!", "agrolink-auth");
        let user = driver();
        let issued = auth.issue_token(&user).unwrap();
        let claims = auth.validate_token(&issued.access_token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, UserRole::Driver);
        assert_eq!(issued.token_type, "Bearer");
    }

    #[test]
    fn token_from_other_issuer_or_secret_is_rejected() {
        let issuer = service("a-very-long-test-secret-of-32-chars!", "agrolink-auth");
        let token = issuer.issue_token(&driver()).unwrap().access_token;

        let other_issuer = service("a-very-long-test-secret-of-32-chars!", "someone-else");
        assert_matches!(other_issuer.validate_token(&token), Err(AuthError::InvalidToken));

        let other_secret = service("another-long-test-secret-of-32-chars", "agrolink-auth");
        assert_matches!(other_secret.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
    }

    #[test]
    fn suspended_accounts_map_to_forbidden() {
        assert_matches!(
            ServiceError::from(AuthError::AccountSuspended),
            ServiceError::Forbidden(_)
        );
        assert_matches!(
            ServiceError::from(AuthError::TokenExpired),
            ServiceError::Unauthorized(_)
        );
    }
}
