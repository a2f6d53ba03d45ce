/// Middleware module
///
/// Bearer authentication and role gating.

mod jwt_middleware;
mod require_role;

pub use jwt_middleware::JwtMiddleware;
pub use require_role::RequireRole;
