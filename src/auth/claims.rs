/// JWT Claims structures
///
/// Access and refresh tokens use distinct claim shapes: the revocation handle
/// lives under `access_uuid` in one and `refresh_uuid` in the other. A token of
/// one kind therefore fails to deserialize as the other kind even though both
/// are signed with the same key.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};

/// Role of a principal, copied into tokens at issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(AppError::Validation(ValidationError::InvalidFormat(format!(
                "role '{}'",
                other
            )))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn handle_prefix(&self) -> &'static str {
        match self {
            TokenKind::Access => "access-",
            TokenKind::Refresh => "refresh-",
        }
    }

    /// Fresh revocation handle: kind prefix plus a v4 UUID (122 random bits)
    pub fn new_handle(&self) -> String {
        format!("{}{}", self.handle_prefix(), Uuid::new_v4())
    }
}

/// Common view over the two claim shapes
pub trait TokenClaims: Serialize + DeserializeOwned {
    const KIND: TokenKind;

    fn new(user_id: i64, role: Role, handle: String, iat: i64, exp: i64, iss: String) -> Self;
    fn user_id(&self) -> i64;
    fn role(&self) -> Role;
    fn handle(&self) -> &str;
}

/// Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    pub user_id: i64,
    pub role: Role,
    pub access_uuid: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
}

/// Claims for refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub user_id: i64,
    pub role: Role,
    pub refresh_uuid: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl TokenClaims for AccessClaims {
    const KIND: TokenKind = TokenKind::Access;

    fn new(user_id: i64, role: Role, handle: String, iat: i64, exp: i64, iss: String) -> Self {
        Self {
            user_id,
            role,
            access_uuid: handle,
            iat,
            exp,
            iss,
        }
    }

    fn user_id(&self) -> i64 {
        self.user_id
    }

    fn role(&self) -> Role {
        self.role
    }

    fn handle(&self) -> &str {
        &self.access_uuid
    }
}

impl TokenClaims for RefreshClaims {
    const KIND: TokenKind = TokenKind::Refresh;

    fn new(user_id: i64, role: Role, handle: String, iat: i64, exp: i64, iss: String) -> Self {
        Self {
            user_id,
            role,
            refresh_uuid: handle,
            iat,
            exp,
            iss,
        }
    }

    fn user_id(&self) -> i64 {
        self.user_id
    }

    fn role(&self) -> Role {
        self.role
    }

    fn handle(&self) -> &str {
        &self.refresh_uuid
    }
}
