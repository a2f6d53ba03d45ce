/// External collaborators of the session core
///
/// Both sit behind async traits so the core can be wired to Postgres/Redis in
/// production and to in-memory doubles in tests.

mod credentials;
mod revocation;

pub use credentials::{CredentialRecord, CredentialStore, NewCredential, PgCredentialStore};
pub use revocation::{InMemoryRevocationStore, RedisRevocationStore, RevocationStore};
