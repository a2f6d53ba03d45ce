use crate::error::{AppError, AuthError};

/// Extract the token from an `Authorization` header value.
///
/// Accepts exactly `Bearer <token>`: two space-separated parts with the
/// literal scheme `Bearer`. Anything else, including a missing header, is
/// `TokenMalformed`.
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    let header = header.ok_or(AuthError::TokenMalformed)?;
    let parts: Vec<&str> = header.split(' ').collect();

    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(*token),
        _ => Err(AuthError::TokenMalformed.into()),
    }
}
