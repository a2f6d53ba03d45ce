/// Authentication module
///
/// The session core: credential verification, token issuance/parsing,
/// password hashing, and the session lifecycle built on top of the
/// revocation store.

mod bearer;
mod claims;
mod jwt;
mod password;
mod session;
mod verifier;

pub use bearer::extract_bearer_token;
pub use claims::{AccessClaims, RefreshClaims, Role, TokenClaims, TokenKind};
pub use jwt::{IssuedToken, TokenCodec, TokenIdentity};
pub use password::{hash_password, verify_password};
pub use session::{AuthenticatedUser, LoginOutcome, SessionManager};
pub use verifier::CredentialVerifier;
