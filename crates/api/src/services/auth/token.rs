//! Access token signer and validator (HS256 JWT).
//!
//! Both halves are built once from the immutable [`JwtConfig`] at startup and
//! shared through application state.
//!
//! Validation order is fixed: signature, issuer, audience, then expiry with
//! zero clock-skew tolerance. Expiry is checked by hand after decoding so the
//! boundary is exact (`now < exp`) instead of the library's leeway-based one.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use milo_core::{AccountId, Email};

use crate::config::JwtConfig;
use crate::models::Identity;

/// Claim set carried by every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Account id in decimal form.
    pub sub: String,
    pub email: String,
    pub role: String,
    /// Random per-token id for audit correlation.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Why a presented token was rejected. Internal diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token issuer does not match")]
    WrongIssuer,
    #[error("token audience does not match")]
    WrongAudience,
    #[error("token has expired")]
    Expired,
    #[error("token claims are invalid: {0}")]
    InvalidClaims(String),
}

/// Errors that can occur while signing a token.
#[derive(Debug, Error)]
#[error("failed to sign access token: {0}")]
pub struct SigningError(#[from] jsonwebtoken::errors::Error);

/// Issues signed access tokens.
#[derive(Clone)]
pub struct TokenSigner {
    key: EncodingKey,
    issuer: String,
    audience: String,
    lifespan: TimeDelta,
}

impl TokenSigner {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            key: EncodingKey::from_secret(config.secret.expose_secret().as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            lifespan: config.lifespan,
        }
    }

    /// Issue a token valid from now.
    ///
    /// # Errors
    ///
    /// Returns `SigningError` if encoding fails.
    pub fn issue(
        &self,
        account_id: AccountId,
        email: &Email,
        role: &str,
    ) -> Result<IssuedAccessToken, SigningError> {
        self.issue_at(account_id, email, role, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `SigningError` if encoding fails.
    pub fn issue_at(
        &self,
        account_id: AccountId,
        email: &Email,
        role: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, SigningError> {
        let expires_at = now + self.lifespan;
        let claims = AccessClaims {
            sub: account_id.to_string(),
            email: email.to_string(),
            role: role.to_owned(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key)?;
        Ok(IssuedAccessToken { token, expires_at })
    }
}

/// Validates bearer tokens and rebuilds the caller's [`Identity`].
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Self {
            key: DecodingKey::from_secret(config.secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Validate a token against the current time.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a `TokenRejection`.
    pub fn validate(&self, token: &str) -> Result<Identity, TokenRejection> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a `TokenRejection`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, TokenRejection> {
        let claims = decode::<AccessClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                ErrorKind::InvalidIssuer => TokenRejection::WrongIssuer,
                ErrorKind::InvalidAudience => TokenRejection::WrongAudience,
                ErrorKind::MissingRequiredClaim(claim) => {
                    TokenRejection::InvalidClaims(format!("missing {claim}"))
                }
                _ => TokenRejection::Malformed,
            })?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(TokenRejection::Expired);
        }

        let account_id = claims
            .sub
            .parse::<AccountId>()
            .map_err(|_| TokenRejection::InvalidClaims("sub is not an account id".to_owned()))?;
        let email = Email::parse(&claims.email)
            .map_err(|e| TokenRejection::InvalidClaims(format!("email: {e}")))?;

        Ok(Identity {
            account_id,
            email,
            role: claims.role,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config(secret: &str, issuer: &str, audience: &str) -> JwtConfig {
        JwtConfig {
            secret: SecretString::from(secret.to_owned()),
            issuer: issuer.to_owned(),
            audience: audience.to_owned(),
            lifespan: TimeDelta::minutes(60),
        }
    }

    fn default_config() -> JwtConfig {
        config("k7Qp2vXz9LmN4rTs8WyB1cFh6JdG3aEu", "milo-api", "milo-clients")
    }

    fn email() -> Email {
        Email::parse("admin@milo.com").unwrap()
    }

    #[test]
    fn test_issue_then_validate() {
        let cfg = default_config();
        let issued = TokenSigner::new(&cfg)
            .issue(AccountId::new(1), &email(), "Administrador")
            .unwrap();

        let identity = TokenValidator::new(&cfg).validate(&issued.token).unwrap();
        assert_eq!(identity.account_id, AccountId::new(1));
        assert_eq!(identity.email, email());
        assert_eq!(identity.role, "Administrador");
    }

    #[test]
    fn test_expiry_is_issue_time_plus_lifespan() {
        let cfg = default_config();
        let now = Utc::now();
        let issued = TokenSigner::new(&cfg)
            .issue_at(AccountId::new(1), &email(), "Mesero", now)
            .unwrap();
        assert_eq!(issued.expires_at, now + TimeDelta::minutes(60));
    }

    #[test]
    fn test_jti_is_unique_per_token() {
        let cfg = default_config();
        let signer = TokenSigner::new(&cfg);
        let key = DecodingKey::from_secret(cfg.secret.expose_secret().as_bytes());
        let validation = TokenValidator::new(&cfg).validation;

        let jti = |token: &str| {
            decode::<AccessClaims>(token, &key, &validation)
                .unwrap()
                .claims
                .jti
        };
        let a = signer.issue(AccountId::new(1), &email(), "Mesero").unwrap();
        let b = signer.issue(AccountId::new(1), &email(), "Mesero").unwrap();
        assert_ne!(jti(&a.token), jti(&b.token));
    }

    #[test]
    fn test_zero_clock_skew() {
        let cfg = default_config();
        let issued_at = Utc::now() - TimeDelta::minutes(60);
        let issued = TokenSigner::new(&cfg)
            .issue_at(AccountId::new(1), &email(), "Mesero", issued_at)
            .unwrap();
        let validator = TokenValidator::new(&cfg);

        assert!(
            validator
                .validate_at(&issued.token, issued.expires_at - TimeDelta::seconds(1))
                .is_ok()
        );
        assert_eq!(
            validator.validate_at(&issued.token, issued.expires_at),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let issued = TokenSigner::new(&config(
            "Zx8Wv7Ut6Sr5Qp4On3Ml2Kj1Ih0GfEdC",
            "milo-api",
            "milo-clients",
        ))
        .issue(AccountId::new(1), &email(), "Mesero")
        .unwrap();

        assert_eq!(
            TokenValidator::new(&default_config()).validate(&issued.token),
            Err(TokenRejection::BadSignature)
        );
    }

    #[test]
    fn test_rejects_wrong_issuer_and_audience() {
        let cfg = default_config();
        let other_issuer = config(
            "k7Qp2vXz9LmN4rTs8WyB1cFh6JdG3aEu",
            "someone-else",
            "milo-clients",
        );
        let other_audience = config("k7Qp2vXz9LmN4rTs8WyB1cFh6JdG3aEu", "milo-api", "other-app");
        let validator = TokenValidator::new(&cfg);

        let token = TokenSigner::new(&other_issuer)
            .issue(AccountId::new(1), &email(), "Mesero")
            .unwrap()
            .token;
        assert_eq!(validator.validate(&token), Err(TokenRejection::WrongIssuer));

        let token = TokenSigner::new(&other_audience)
            .issue(AccountId::new(1), &email(), "Mesero")
            .unwrap()
            .token;
        assert_eq!(validator.validate(&token), Err(TokenRejection::WrongAudience));
    }

    #[test]
    fn test_signature_checked_before_expiry() {
        let stale = TokenSigner::new(&config(
            "Zx8Wv7Ut6Sr5Qp4On3Ml2Kj1Ih0GfEdC",
            "milo-api",
            "milo-clients",
        ))
        .issue_at(
            AccountId::new(1),
            &email(),
            "Mesero",
            Utc::now() - TimeDelta::days(2),
        )
        .unwrap();

        assert_eq!(
            TokenValidator::new(&default_config()).validate(&stale.token),
            Err(TokenRejection::BadSignature)
        );
    }

    #[test]
    fn test_rejects_garbage() {
        let validator = TokenValidator::new(&default_config());
        assert_eq!(validator.validate(""), Err(TokenRejection::Malformed));
        assert_eq!(
            validator.validate("not.a.jwt"),
            Err(TokenRejection::Malformed)
        );
    }

    #[test]
    fn test_rejects_non_numeric_subject() {
        let cfg = default_config();
        let now = Utc::now();
        let claims = AccessClaims {
            sub: "admin".to_owned(),
            email: "admin@milo.com".to_owned(),
            role: "Administrador".to_owned(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + TimeDelta::minutes(5)).timestamp(),
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(cfg.secret.expose_secret().as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            TokenValidator::new(&cfg).validate(&token),
            Err(TokenRejection::InvalidClaims(_))
        ));
    }
}
