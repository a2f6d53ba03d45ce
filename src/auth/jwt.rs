/// JWT Token Generation and Validation
///
/// Mints and parses the two token kinds. Each issuance embeds a fresh
/// revocation handle; the codec itself never touches the revocation store.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;

use crate::auth::claims::{AccessClaims, RefreshClaims, Role, TokenClaims};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};

// Ten years. Anything longer is a configuration mistake, and bounding it keeps
// `iat + lifetime` far from overflow.
const MAX_TOKEN_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// A freshly signed token together with its revocation handle
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub handle: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl IssuedToken {
    /// Validity window at issuance; zero for tokens minted already expired
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.expires_at - self.issued_at).unwrap_or(0))
    }
}

/// What a successfully parsed token says about its bearer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub user_id: i64,
    pub role: Role,
    pub handle: String,
}

/// Signs and verifies access/refresh tokens with one process-wide HS256 key
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

impl TokenCodec {
    /// # Errors
    /// Returns a config error if the secret is empty or a token lifetime is
    /// out of range
    pub fn new(config: &JwtSettings) -> Result<Self, AppError> {
        if config.secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()).into());
        }
        check_lifetime("jwt.access_token_expiry", config.access_token_expiry)?;
        check_lifetime("jwt.refresh_token_expiry", config.refresh_token_expiry)?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact; a token one second past `exp` is expired.
        validation.leeway = 0;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
        })
    }

    /// Access token lifetime in seconds
    pub fn access_token_expiry(&self) -> i64 {
        self.access_token_expiry
    }

    pub fn issue_access_token(&self, user_id: i64, role: Role) -> Result<IssuedToken, AppError> {
        self.issue::<AccessClaims>(user_id, role, self.access_token_expiry)
    }

    pub fn issue_refresh_token(&self, user_id: i64, role: Role) -> Result<IssuedToken, AppError> {
        self.issue::<RefreshClaims>(user_id, role, self.refresh_token_expiry)
    }

    /// # Errors
    /// `TokenExpired` for a correctly signed token past its expiry,
    /// `TokenMalformed` for everything else (bad signature, wrong kind, garbage)
    pub fn parse_access_token(&self, token: &str) -> Result<TokenIdentity, AppError> {
        self.parse::<AccessClaims>(token)
    }

    pub fn parse_refresh_token(&self, token: &str) -> Result<TokenIdentity, AppError> {
        self.parse::<RefreshClaims>(token)
    }

    fn issue<C: TokenClaims>(
        &self,
        user_id: i64,
        role: Role,
        expiry_seconds: i64,
    ) -> Result<IssuedToken, AppError> {
        let issued_at = chrono::Utc::now().timestamp();
        let expires_at = issued_at + expiry_seconds;
        let handle = C::KIND.new_handle();
        let claims = C::new(
            user_id,
            role,
            handle.clone(),
            issued_at,
            expires_at,
            self.issuer.clone(),
        );

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            handle,
            issued_at,
            expires_at,
        })
    }

    fn parse<C: TokenClaims>(&self, token: &str) -> Result<TokenIdentity, AppError> {
        let claims = decode::<C>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    tracing::debug!(kind = ?C::KIND, error = %e, "JWT validation error");
                    AuthError::TokenMalformed
                }
            })?;

        if !claims.handle().starts_with(C::KIND.handle_prefix()) {
            return Err(AuthError::TokenMalformed.into());
        }

        Ok(TokenIdentity {
            user_id: claims.user_id(),
            role: claims.role(),
            handle: claims.handle().to_string(),
        })
    }
}

/// Negative lifetimes are allowed and mint tokens that are already expired.
fn check_lifetime(name: &str, seconds: i64) -> Result<(), ConfigError> {
    if seconds.unsigned_abs() > MAX_TOKEN_LIFETIME_SECS {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be within {} seconds, got {}",
            name, MAX_TOKEN_LIFETIME_SECS, seconds
        )));
    }
    Ok(())
}
