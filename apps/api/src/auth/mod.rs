//! Caller identity. Production verifies HS256 bearer tokens and takes the
//! `sub` claim as the stable caller id. The disabled mode exists for local
//! testing only and cannot be selected in a production profile.

use std::sync::Arc;

use anyhow::bail;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::warn;

use crate::config::{AppEnv, AuthMode, Config};
use crate::errors::AppError;
use crate::state::AppState;

pub trait IdentityVerifier: Send + Sync {
    /// Resolves the bearer token (if any) to a caller id.
    fn verify(&self, bearer: Option<&str>) -> Result<String, AppError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: i64,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, bearer: Option<&str>) -> Result<String, AppError> {
        let token = bearer.ok_or_else(|| {
            AppError::Unauthorized("Missing Authorization header".into())
        })?;

        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| {
                warn!("Rejected bearer token: {e}");
                AppError::Unauthorized("Invalid or expired token".into())
            })?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized("Token has no subject".into()));
        }
        Ok(claims.sub)
    }
}

/// Every request runs as one fixed identity.
pub struct DisabledAuth {
    dev_user_id: String,
}

impl DisabledAuth {
    pub fn new(dev_user_id: impl Into<String>) -> Self {
        Self {
            dev_user_id: dev_user_id.into(),
        }
    }
}

impl IdentityVerifier for DisabledAuth {
    fn verify(&self, _bearer: Option<&str>) -> Result<String, AppError> {
        Ok(self.dev_user_id.clone())
    }
}

/// Builds the verifier selected by configuration.
pub fn verifier_from_config(config: &Config) -> anyhow::Result<Arc<dyn IdentityVerifier>> {
    match &config.auth {
        AuthMode::Jwt { secret } => Ok(Arc::new(JwtVerifier::new(secret))),
        AuthMode::Disabled { .. } if config.app_env == AppEnv::Production => {
            bail!("AUTH_MODE=disabled is not allowed when APP_ENV=production")
        }
        AuthMode::Disabled { dev_user_id } => {
            warn!("Authentication is DISABLED; all requests run as '{dev_user_id}'");
            Ok(Arc::new(DisabledAuth::new(dev_user_id.clone())))
        }
    }
}

/// Authenticated caller, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = match parts.headers.get("authorization") {
            None => None,
            Some(value) => {
                let header = value.to_str().map_err(|_| {
                    AppError::Unauthorized("Invalid Authorization header".into())
                })?;
                Some(header.strip_prefix("Bearer ").ok_or_else(|| {
                    AppError::Unauthorized(
                        "Invalid Authorization format. Expected: Bearer <token>".into(),
                    )
                })?)
            }
        };

        let user_id = state.verifier.verify(bearer)?;
        Ok(AuthUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        exp: i64,
    }

    fn token(secret: &str, sub: &str, exp_offset_secs: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + exp_offset_secs;
        encode(
            &Header::default(),
            &TestClaims { sub, exp },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_subject() {
        let verifier = JwtVerifier::new("secret");
        let caller = verifier.verify(Some(&token("secret", "user-42", 600))).unwrap();
        assert_eq!(caller, "user-42");
    }

    #[test]
    fn test_wrong_secret_expired_or_missing_token_rejected() {
        let verifier = JwtVerifier::new("secret");
        assert_matches!(
            verifier.verify(Some(&token("other", "user-42", 600))),
            Err(AppError::Unauthorized(_))
        );
        assert_matches!(
            verifier.verify(Some(&token("secret", "user-42", -600))),
            Err(AppError::Unauthorized(_))
        );
        assert_matches!(verifier.verify(None), Err(AppError::Unauthorized(_)));
    }

    #[test]
    fn test_disabled_auth_returns_dev_identity() {
        let verifier = DisabledAuth {
            dev_user_id: "dev".into(),
        };
        assert_eq!(verifier.verify(None).unwrap(), "dev");
    }
}
