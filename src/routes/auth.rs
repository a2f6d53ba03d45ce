/// Authentication Routes
///
/// Handles registration, login, token refresh, logout, and profile lookup.
/// All session semantics live in `SessionManager`; these handlers only decode
/// requests, call it, and wrap the result in the response envelope.

use actix_web::{http::StatusCode, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, AuthenticatedUser, Role, SessionManager};
use crate::error::{AppError, DatabaseError, ErrorContext};
use crate::response;
use crate::store::{CredentialRecord, CredentialStore, NewCredential};
use crate::validators::{is_valid_email, is_valid_name, is_valid_phone};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request; the refresh token is optional
#[derive(Deserialize, Default)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Login response with access and refresh tokens
#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub user_role: Role,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Public view of a user; never includes the password hash
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub is_active: bool,
}

impl From<CredentialRecord> for UserResponse {
    fn from(record: CredentialRecord) -> Self {
        Self {
            id: record.id,
            full_name: record.full_name,
            email: record.email,
            phone: record.phone,
            role: record.role,
            is_active: record.is_active,
        }
    }
}

/// POST /auth/register
///
/// Register a new account. Accounts are always created with role `user`.
///
/// # Errors
/// - 400: Validation errors (invalid email/name/phone/password)
/// - 409: Email already registered
/// - 500: Persistence failure
pub async fn register(
    form: web::Json<RegisterRequest>,
    credentials: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let email = is_valid_email(&form.email)?;
    let full_name = is_valid_name(&form.full_name)?;
    let phone = is_valid_phone(&form.phone)?;

    if !credentials
        .find_by_email(&email)
        .await
        .map_err(|e| context.record(e))?
        .is_empty()
    {
        return Err(DatabaseError::UniqueConstraintViolation("Email already exists".to_string()).into());
    }

    let password_hash = hash_password(&form.password)?;

    let user = credentials
        .insert(NewCredential {
            full_name,
            email,
            phone,
            password_hash,
            role: Role::User,
            is_active: true,
        })
        .await
        .map_err(|e| context.record(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user.id,
        "User registered successfully"
    );

    Ok(response::success(
        StatusCode::CREATED,
        "User registered successfully",
        UserResponse::from(user),
    ))
}

/// POST /auth/login
///
/// # Errors
/// - 400: Empty email or password
/// - 401: Invalid credentials (unknown email and wrong password look the same)
/// - 500: Credential store or revocation store failure
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let outcome = sessions.login(&form.email, &form.password).await.map_err(|e| context.record(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = outcome.user_id,
        "User logged in successfully"
    );

    Ok(response::success(
        StatusCode::OK,
        "Login successful",
        LoginResponse {
            user_id: outcome.user_id,
            user_role: outcome.role,
            access_token: outcome.access_token,
            refresh_token: outcome.refresh_token,
            token_type: "Bearer",
            expires_in: sessions.access_token_expiry(),
        },
    ))
}

/// POST /auth/refresh
///
/// Mint a new access token. The refresh token itself is not rotated and the
/// previous access token stays valid until it expires.
///
/// # Errors
/// - 401: Malformed, expired, or revoked refresh token
/// - 500: Revocation store failure
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let access_token = sessions.refresh(&form.refresh_token).await.map_err(|e| context.record(e))?;

    Ok(response::success(
        StatusCode::OK,
        "Token refreshed successfully",
        RefreshResponse {
            access_token,
            token_type: "Bearer",
            expires_in: sessions.access_token_expiry(),
        },
    ))
}

/// POST /auth/logout
///
/// **Requires valid access token.** Revokes the access token used on this
/// request and, if the body carries a usable refresh token, that one too.
pub async fn logout(
    user: web::ReqData<AuthenticatedUser>,
    body: Option<web::Json<LogoutRequest>>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner();
    let context = ErrorContext::new("user_logout").with_user_id(user.user_id);
    let body = body.map(web::Json::into_inner).unwrap_or_default();

    sessions
        .logout(&user.access_handle, body.refresh_token.as_deref())
        .await
        .map_err(|e| context.record(e))?;

    Ok(response::success_empty(StatusCode::OK, "Logout successful"))
}

/// GET /auth/me
///
/// **Requires valid access token.** Returns the caller's profile.
pub async fn get_current_user(
    user: web::ReqData<AuthenticatedUser>,
    credentials: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let record = credentials
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;

    Ok(response::success(StatusCode::OK, "OK", UserResponse::from(record)))
}

/// GET /users/{id}
///
/// **Requires valid access token with role `admin`.**
pub async fn get_user(
    path: web::Path<i64>,
    credentials: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let record = credentials
        .find_by_id(id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("User {} not found", id)))?;

    Ok(response::success(StatusCode::OK, "OK", UserResponse::from(record)))
}
