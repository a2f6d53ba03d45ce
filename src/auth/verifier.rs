/// Credential Verifier
///
/// Confirms an (email, password) pair against the credential store. Unknown
/// email and wrong password produce the same `InvalidCredentials` error and
/// cost the same bcrypt work.

use lazy_static::lazy_static;
use std::sync::Arc;

use crate::auth::password::verify_password;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{CredentialRecord, CredentialStore};

lazy_static! {
    // Verified against when the email is unknown, so both failure paths run bcrypt.
    static ref DUMMY_HASH: String =
        bcrypt::hash("techstore-dummy-password", bcrypt::DEFAULT_COST).unwrap_or_default();
}

#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// # Errors
    /// - `ValidationError::EmptyField` if email or password is empty
    /// - `AuthError::InvalidCredentials` for unknown email or wrong password
    /// - `DatabaseError::Unavailable` if the store cannot be queried
    pub async fn verify(&self, email: &str, password: &str) -> Result<CredentialRecord, AppError> {
        if email.trim().is_empty() {
            return Err(ValidationError::EmptyField("email".to_string()).into());
        }
        if password.is_empty() {
            return Err(ValidationError::EmptyField("password".to_string()).into());
        }

        // Registration stores emails lowercased.
        let email = email.trim().to_lowercase();
        let mut records = self.store.find_by_email(&email).await?;
        if records.len() > 1 {
            tracing::warn!(
                matches = records.len(),
                "Multiple credential records share one email, using the first"
            );
        }

        if records.is_empty() {
            let _ = verify_password(password, &DUMMY_HASH);
            return Err(AuthError::InvalidCredentials.into());
        }
        let record = records.swap_remove(0);

        if !verify_password(password, &record.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(record)
    }
}
