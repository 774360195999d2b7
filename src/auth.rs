// src/auth.rs
use crate::accounts::{AccountService, Tenant, User};
use crate::core::config_manager::AuthSettings;
use crate::core::Database;
use crate::error::ServiceError;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub iss: String,
    pub aud: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthConfig {
    secret: String,
    pub issuer: String,
    pub audience: String,
}

impl AuthConfig {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            secret: settings.jwt_secret.clone(),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
        }
    }

    /// Mint an HS256 bearer token for `email`
    pub fn issue_token(&self, email: &str, name: Option<&str>, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_lowercase(),
            email: email.to_string(),
            name: name.map(str::to_string),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: (now + ttl).timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to sign token")
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?;
        Ok(token_data.claims)
    }
}

/// Authenticated user with tenant information
pub struct AuthenticatedUser {
    pub user: User,
    pub tenant: Tenant,
}

impl AuthenticatedUser {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }

    pub fn tenant_name(&self) -> &str {
        &self.tenant.tenant_name
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_config = match req.guard::<&State<AuthConfig>>().await {
            Outcome::Success(config) => config,
            Outcome::Error((status, _)) => return reject(req, status, AuthError::DatabaseError),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let db = match req.guard::<&State<Database>>().await {
            Outcome::Success(db) => db,
            Outcome::Error((status, _)) => return reject(req, status, AuthError::DatabaseError),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let token = match req.headers().get_one("Authorization") {
            Some(header) if header.starts_with("Bearer ") => &header[7..],
            Some(_) => {
                warn!("Invalid Authorization header format");
                return reject(req, Status::Unauthorized, AuthError::InvalidToken);
            }
            None => {
                debug!("Missing Authorization header");
                return reject(req, Status::Unauthorized, AuthError::MissingToken);
            }
        };

        let claims = match auth_config.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("Token verification failed: {}", e);
                return reject(req, Status::Unauthorized, AuthError::TokenVerificationFailed);
            }
        };

        match AccountService::new(db.pool())
            .resolve_login(&claims.email, claims.name.as_deref())
            .await
        {
            Ok((tenant, user)) => {
                debug!(
                    "User {} authenticated for tenant: {}",
                    user.email, tenant.tenant_name
                );
                Outcome::Success(AuthenticatedUser { user, tenant })
            }
            Err(ServiceError::Forbidden(reason)) => {
                warn!("Login refused for {}: {}", claims.email, reason);
                reject(req, Status::Forbidden, AuthError::NotAuthorized)
            }
            Err(e) => {
                error!("Failed to resolve login for {}: {:#}", claims.email, e);
                reject(req, Status::InternalServerError, AuthError::DatabaseError)
            }
        }
    }
}

/// Requires an authenticated user whose role is at least Admin
pub struct RequireAdmin(pub AuthenticatedUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequireAdmin {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthenticatedUser::from_request(req).await {
            Outcome::Success(auth) if auth.user.role.can_manage_members() => {
                Outcome::Success(RequireAdmin(auth))
            }
            Outcome::Success(auth) => {
                warn!("{} lacks the admin role", auth.email());
                reject(req, Status::Forbidden, AuthError::NotAuthorized)
            }
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(f) => Outcome::Forward(f),
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    TokenVerificationFailed,
    NotAuthorized,
    DatabaseError,
}

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Authorization token required",
            AuthError::InvalidToken => "Invalid authorization token format",
            AuthError::TokenVerificationFailed => "Token verification failed",
            AuthError::NotAuthorized => "Not authorized for this operation",
            AuthError::DatabaseError => "Database error occurred",
        }
    }
}

/// Message of the first guard failure in a request, read back by the error catchers
#[derive(Debug, Clone, Copy)]
pub struct AuthFailure(pub Option<&'static str>);

impl AuthFailure {
    pub fn of(req: &Request<'_>) -> Option<&'static str> {
        req.local_cache(|| AuthFailure(None)).0
    }
}

fn reject<T>(req: &Request<'_>, status: Status, error: AuthError) -> Outcome<T, AuthError> {
    req.local_cache(|| AuthFailure(Some(error.message())));
    Outcome::Error((status, error))
}

// Optional auth guard that doesn't fail if no auth is provided
pub struct OptionalAuth {
    pub user: Option<AuthenticatedUser>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthenticatedUser::from_request(req).await {
            Outcome::Success(auth) => Outcome::Success(OptionalAuth { user: Some(auth) }),
            _ => Outcome::Success(OptionalAuth { user: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(&AuthSettings::default())
    }

    #[test]
    fn test_token_round_trip() {
        let auth = config();
        let token = auth
            .issue_token("Jane@acme.io", Some("Jane"), Duration::hours(1))
            .unwrap();
        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.email, "Jane@acme.io");
        assert_eq!(claims.sub, "jane@acme.io");
        assert_eq!(claims.name.as_deref(), Some("Jane"));
    }

    #[test]
    fn test_rejects_expired_and_foreign_tokens() {
        let auth = config();
        let expired = auth
            .issue_token("a@acme.io", None, Duration::hours(-2))
            .unwrap();
        assert!(auth.verify(&expired).is_err());

        let other = AuthConfig::new(&AuthSettings {
            jwt_secret: "another-secret".to_string(),
            ..AuthSettings::default()
        });
        let foreign = other.issue_token("a@acme.io", None, Duration::hours(1)).unwrap();
        assert!(auth.verify(&foreign).is_err());

        let wrong_audience = AuthConfig::new(&AuthSettings {
            audience: "someone-else".to_string(),
            ..AuthSettings::default()
        });
        let token = wrong_audience
            .issue_token("a@acme.io", None, Duration::hours(1))
            .unwrap();
        assert!(auth.verify(&token).is_err());
    }
}
