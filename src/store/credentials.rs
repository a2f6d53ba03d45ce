/// Credential Store
///
/// Lookup of registered principals. The session core only needs
/// `find_by_email`; the other operations serve registration and profile
/// routes.

use async_trait::async_trait;
use sqlx::PgPool;
use std::fmt;

use crate::auth::Role;
use crate::error::AppError;

/// A registered principal as stored
#[derive(Clone)]
pub struct CredentialRecord {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Input for registration; the password is already hashed
#[derive(Clone)]
pub struct NewCredential {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// All non-deleted records with this email. Normally zero or one.
    async fn find_by_email(&self, email: &str) -> Result<Vec<CredentialRecord>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<CredentialRecord>, AppError>;

    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if the email is taken
    async fn insert(&self, new: NewCredential) -> Result<CredentialRecord, AppError>;
}

type UserRow = (i64, String, String, String, String, String, bool);

fn into_record(row: UserRow) -> Result<CredentialRecord, AppError> {
    let (id, full_name, email, phone, password_hash, role, is_active) = row;
    let role = role
        .parse()
        .map_err(|_| AppError::Internal(format!("Unknown role '{}' for user {}", role, id)))?;
    Ok(CredentialRecord {
        id,
        full_name,
        email,
        phone,
        password_hash,
        role,
        is_active,
    })
}

/// Postgres-backed credential store over the `users` table
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Vec<CredentialRecord>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, full_name, email, phone, password_hash, role, is_active
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            ORDER BY id
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_record).collect()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<CredentialRecord>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, full_name, email, phone, password_hash, role, is_active
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_record).transpose()
    }

    async fn insert(&self, new: NewCredential) -> Result<CredentialRecord, AppError> {
        let now = chrono::Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (full_name, email, phone, password_hash, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&new.full_name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(new.is_active)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = id, "User record created");

        Ok(CredentialRecord {
            id,
            full_name: new.full_name,
            email: new.email,
            phone: new.phone,
            password_hash: new.password_hash,
            role: new.role,
            is_active: new.is_active,
        })
    }
}
