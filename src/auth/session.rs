/// Session Orchestrator
///
/// Composes the credential verifier, token codec and revocation store into
/// login, authorize, refresh and logout. A token is honored only if it parses
/// (signature, shape, kind, expiry) AND its revocation handle is present in
/// the store.
///
/// Refresh does not revoke the previous access token: old and new access
/// tokens both stay valid until their own expiry.

use std::sync::Arc;

use crate::auth::bearer::extract_bearer_token;
use crate::auth::claims::Role;
use crate::auth::jwt::{IssuedToken, TokenCodec};
use crate::auth::verifier::CredentialVerifier;
use crate::error::{AppError, AuthError};
use crate::store::{CredentialStore, RevocationStore};

/// Typed request context attached by the bearer middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub role: Role,
    /// Revocation handle of the access token used on this request
    pub access_handle: String,
}

impl AuthenticatedUser {
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i64,
    pub role: Role,
}

#[derive(Clone)]
pub struct SessionManager {
    verifier: CredentialVerifier,
    codec: TokenCodec,
    revocations: Arc<dyn RevocationStore>,
}

impl SessionManager {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        codec: TokenCodec,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        Self {
            verifier: CredentialVerifier::new(credentials),
            codec,
            revocations,
        }
    }

    /// Access token lifetime in seconds, as advertised to clients
    pub fn access_token_expiry(&self) -> i64 {
        self.codec.access_token_expiry()
    }

    /// Verify credentials, mint an access/refresh pair and register both handles.
    ///
    /// The two store writes are independent: if the refresh handle fails to
    /// store after the access handle succeeded, the error is returned and the
    /// access handle is left in place until its TTL.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let user = self.verifier.verify(email, password).await?;

        let access = self.codec.issue_access_token(user.id, user.role)?;
        let refresh = self.codec.issue_refresh_token(user.id, user.role)?;

        self.register(&access, user.id).await?;
        self.register(&refresh, user.id).await?;

        tracing::info!(user_id = user.id, role = %user.role, "Session started");

        Ok(LoginOutcome {
            access_token: access.token,
            refresh_token: refresh.token,
            user_id: user.id,
            role: user.role,
        })
    }

    /// Validate an access token and confirm its handle is still live.
    ///
    /// # Errors
    /// `TokenExpired` / `TokenMalformed` from parsing, `TokenRevoked` if the
    /// handle is gone, `RevocationStoreError::Unavailable` if the store cannot
    /// answer. A store failure is never reported as revoked or as success.
    pub async fn authorize(&self, access_token: &str) -> Result<AuthenticatedUser, AppError> {
        let identity = self.codec.parse_access_token(access_token)?;

        if !self.revocations.exists(&identity.handle).await? {
            return Err(AuthError::TokenRevoked.into());
        }

        Ok(AuthenticatedUser {
            user_id: identity.user_id,
            role: identity.role,
            access_handle: identity.handle,
        })
    }

    /// `authorize` on a raw `Authorization` header value
    pub async fn authorize_header(&self, header: Option<&str>) -> Result<AuthenticatedUser, AppError> {
        let token = extract_bearer_token(header)?;
        self.authorize(token).await
    }

    /// Mint a new access token from a live refresh token.
    ///
    /// The role is taken from the refresh token, not re-read from the store.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let identity = self.codec.parse_refresh_token(refresh_token)?;

        if !self.revocations.exists(&identity.handle).await? {
            return Err(AuthError::TokenRevoked.into());
        }

        let access = self.codec.issue_access_token(identity.user_id, identity.role)?;
        self.register(&access, identity.user_id).await?;

        tracing::info!(user_id = identity.user_id, "Access token refreshed");
        Ok(access.token)
    }

    /// Delete the access handle and, if the refresh token parses, its handle.
    ///
    /// A missing, malformed or expired refresh token is tolerated. Store
    /// failures are surfaced for both deletions.
    pub async fn logout(&self, access_handle: &str, refresh_token: Option<&str>) -> Result<(), AppError> {
        self.revocations.delete(access_handle).await?;

        match refresh_token.map(|token| self.codec.parse_refresh_token(token)) {
            Some(Ok(identity)) => {
                self.revocations.delete(&identity.handle).await?;
                tracing::info!(user_id = identity.user_id, "Session ended");
            }
            Some(Err(e)) => {
                tracing::info!(error = %e, "Logout with unusable refresh token, access side revoked only");
            }
            None => {
                tracing::info!("Logout without refresh token, access side revoked only");
            }
        }

        Ok(())
    }

    async fn register(&self, issued: &IssuedToken, user_id: i64) -> Result<(), AppError> {
        self.revocations
            .put(&issued.handle, &user_id.to_string(), issued.ttl())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::JwtSettings;
    use crate::error::RevocationStoreError;
    use crate::store::{CredentialRecord, InMemoryRevocationStore, NewCredential};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedStore {
        records: Vec<CredentialRecord>,
    }

    #[async_trait]
    impl CredentialStore for FixedStore {
        async fn find_by_email(&self, email: &str) -> Result<Vec<CredentialRecord>, AppError> {
            Ok(self.records.iter().filter(|r| r.email == email).cloned().collect())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<CredentialRecord>, AppError> {
            Ok(self.records.iter().find(|r| r.id == id).cloned())
        }

        async fn insert(&self, _new: NewCredential) -> Result<CredentialRecord, AppError> {
            unimplemented!("not used by the session manager")
        }
    }

    /// Wraps the in-memory store and can be switched into an outage
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryRevocationStore,
        down: AtomicBool,
        /// Fail every `put` after this many successes (0 = never)
        fail_put_after: AtomicUsize,
        puts: AtomicUsize,
    }

    impl FlakyStore {
        fn outage() -> AppError {
            RevocationStoreError::Unavailable("connection refused".into()).into()
        }
    }

    #[async_trait]
    impl RevocationStore for FlakyStore {
        async fn put(&self, handle: &str, subject: &str, ttl: Duration) -> Result<(), AppError> {
            let done = self.puts.fetch_add(1, Ordering::SeqCst);
            let limit = self.fail_put_after.load(Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) || (limit > 0 && done >= limit) {
                return Err(Self::outage());
            }
            self.inner.put(handle, subject, ttl).await
        }

        async fn delete(&self, handle: &str) -> Result<(), AppError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(Self::outage());
            }
            self.inner.delete(handle).await
        }

        async fn exists(&self, handle: &str) -> Result<bool, AppError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(Self::outage());
            }
            self.inner.exists(handle).await
        }
    }

    fn jwt_settings() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    fn user(id: i64, email: &str, password: &str, role: Role) -> CredentialRecord {
        CredentialRecord {
            id,
            full_name: "Test User".into(),
            email: email.into(),
            phone: "0900000000".into(),
            password_hash: bcrypt::hash(password, 4).unwrap(),
            role,
            is_active: true,
        }
    }

    fn manager_with(store: Arc<FlakyStore>, settings: JwtSettings) -> SessionManager {
        let credentials = Arc::new(FixedStore {
            records: vec![user(7, "a@x.com", "secret123", Role::User)],
        });
        SessionManager::new(credentials, TokenCodec::new(&settings).unwrap(), store)
    }

    fn manager() -> (SessionManager, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore::default());
        (manager_with(store.clone(), jwt_settings()), store)
    }

    #[tokio::test]
    async fn test_login_returns_tokens_and_stored_identity() {
        let (sessions, store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();

        assert!(!outcome.access_token.is_empty());
        assert!(!outcome.refresh_token.is_empty());
        assert_eq!(outcome.user_id, 7);
        assert_eq!(outcome.role, Role::User);
        assert_eq!(store.inner.len().await, 2);
    }

    #[tokio::test]
    async fn test_login_failures_are_identical() {
        let (sessions, store) = manager();

        let wrong = sessions.login("a@x.com", "wrong").await.unwrap_err();
        let unknown = sessions.login("nosuch@x.com", "whatever").await.unwrap_err();

        assert_eq!(wrong.auth_kind(), Some(AuthError::InvalidCredentials));
        assert_eq!(unknown.auth_kind(), Some(AuthError::InvalidCredentials));
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_each_login_creates_a_fresh_session() {
        let (sessions, store) = manager();
        let first = sessions.login("a@x.com", "secret123").await.unwrap();
        let second = sessions.login("a@x.com", "secret123").await.unwrap();

        assert_eq!(store.inner.len().await, 4);

        let first_user = sessions.authorize(&first.access_token).await.unwrap();
        let second_user = sessions.authorize(&second.access_token).await.unwrap();
        assert_ne!(first_user.access_handle, second_user.access_handle);

        // Logging out one session leaves the other usable
        sessions.logout(&first_user.access_handle, Some(first.refresh_token.as_str())).await.unwrap();
        assert!(sessions.authorize(&second.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_authorize_before_and_after_logout() {
        let (sessions, store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();

        let user = sessions.authorize(&outcome.access_token).await.unwrap();
        assert_eq!(user.user_id, 7);
        assert_eq!(user.role, Role::User);
        assert!(user.access_handle.starts_with("access-"));

        sessions.logout(&user.access_handle, Some(outcome.refresh_token.as_str())).await.unwrap();

        let err = sessions.authorize(&outcome.access_token).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::TokenRevoked));

        let err = sessions.refresh(&outcome.refresh_token).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::TokenRevoked));
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_access_token_valid() {
        let (sessions, _store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();

        let renewed = sessions.refresh(&outcome.refresh_token).await.unwrap();
        assert_ne!(renewed, outcome.access_token);

        let old_user = sessions.authorize(&outcome.access_token).await.unwrap();
        let new_user = sessions.authorize(&renewed).await.unwrap();
        assert_eq!(old_user.user_id, new_user.user_id);
        assert_ne!(old_user.access_handle, new_user.access_handle);
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let (sessions, _store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();

        let err = sessions.refresh(&outcome.access_token).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::TokenMalformed));
    }

    #[tokio::test]
    async fn test_authorize_rejects_refresh_token() {
        let (sessions, _store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();

        let err = sessions.authorize(&outcome.refresh_token).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::TokenMalformed));
    }

    #[tokio::test]
    async fn test_expired_access_token_is_expired_before_store_lookup() {
        let mut settings = jwt_settings();
        settings.access_token_expiry = -1;
        let store = Arc::new(FlakyStore::default());
        let sessions = manager_with(store.clone(), settings);

        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();
        store.down.store(true, Ordering::SeqCst);

        let err = sessions.authorize(&outcome.access_token).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_authorize_fails_closed_on_store_outage() {
        let (sessions, store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();
        store.down.store(true, Ordering::SeqCst);

        let err = sessions.authorize(&outcome.access_token).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::RevocationStore(RevocationStoreError::Unavailable(_))
        ));
        assert_ne!(err.auth_kind(), Some(AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn test_refresh_fails_closed_on_store_outage() {
        let (sessions, store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();
        store.down.store(true, Ordering::SeqCst);

        let err = sessions.refresh(&outcome.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::RevocationStore(_)));
    }

    #[tokio::test]
    async fn test_login_partial_write_is_reported_and_not_unwound() {
        let (sessions, store) = manager();
        store.fail_put_after.store(1, Ordering::SeqCst);

        let err = sessions.login("a@x.com", "secret123").await.unwrap_err();
        assert!(matches!(err, AppError::RevocationStore(_)));
        // The access handle written first stays behind
        assert_eq!(store.inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_logout_tolerates_bad_refresh_token() {
        let (sessions, store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();
        let user = sessions.authorize(&outcome.access_token).await.unwrap();

        sessions.logout(&user.access_handle, Some("garbage")).await.unwrap();

        assert!(sessions.authorize(&outcome.access_token).await.is_err());
        // Refresh side untouched
        assert_eq!(store.inner.len().await, 1);
        assert!(sessions.refresh(&outcome.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_without_refresh_token() {
        let (sessions, _store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();
        let user = sessions.authorize(&outcome.access_token).await.unwrap();

        sessions.logout(&user.access_handle, None).await.unwrap();
        let err = sessions.authorize(&outcome.access_token).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn test_logout_surfaces_store_outage() {
        let (sessions, store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();
        let user = sessions.authorize(&outcome.access_token).await.unwrap();
        store.down.store(true, Ordering::SeqCst);

        let err = sessions.logout(&user.access_handle, Some(outcome.refresh_token.as_str())).await.unwrap_err();
        assert!(matches!(err, AppError::RevocationStore(_)));
    }

    #[tokio::test]
    async fn test_authorize_header() {
        let (sessions, _store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();

        let header = format!("Bearer {}", outcome.access_token);
        assert!(sessions.authorize_header(Some(header.as_str())).await.is_ok());

        let err = sessions.authorize_header(Some(outcome.access_token.as_str())).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::TokenMalformed));
        let err = sessions.authorize_header(None).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::TokenMalformed));
    }

    #[tokio::test]
    async fn test_handles_registered_with_token_lifetime_and_subject() {
        let (sessions, store) = manager();
        let outcome = sessions.login("a@x.com", "secret123").await.unwrap();
        let user = sessions.authorize(&outcome.access_token).await.unwrap();

        assert_eq!(store.inner.subject(&user.access_handle).await.as_deref(), Some("7"));
    }

    #[test]
    fn test_has_role() {
        let user = AuthenticatedUser {
            user_id: 1,
            role: Role::User,
            access_handle: "access-x".into(),
        };
        assert!(user.has_role(&[Role::User, Role::Admin]));
        assert!(!user.has_role(&[Role::Admin]));
    }
}
