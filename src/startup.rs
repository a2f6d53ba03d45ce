use actix_web::{dev::Server, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::SessionManager;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{JwtMiddleware, RequireRole};
use crate::routes::{get_current_user, get_user, health_check, login, logout, refresh, register};
use crate::store::CredentialStore;

pub fn run(
    listener: TcpListener,
    sessions: SessionManager,
    credentials: Arc<dyn CredentialStore>,
) -> Result<Server, std::io::Error> {
    let sessions_data = web::Data::new(sessions.clone());
    let credentials_data: web::Data<dyn CredentialStore> = web::Data::from(credentials);

    let server = HttpServer::new(move || {
        // Malformed JSON bodies get the same envelope as every other error.
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            AppError::Validation(ValidationError::InvalidFormat(format!("request body: {}", err))).into()
        });

        App::new()
            // Global middleware
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(json_config)
            .app_data(sessions_data.clone())
            .app_data(credentials_data.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))

            // Protected routes (require a live access token)
            .service(
                web::resource("/auth/logout")
                    .wrap(JwtMiddleware::new(sessions.clone()))
                    .route(web::post().to(logout)),
            )
            .service(
                web::resource("/auth/me")
                    .wrap(JwtMiddleware::new(sessions.clone()))
                    .route(web::get().to(get_current_user)),
            )

            // Admin routes: bearer check runs first, then the role gate
            .service(
                web::scope("/users")
                    .wrap(RequireRole::admin())
                    .wrap(JwtMiddleware::new(sessions.clone()))
                    .route("/{id}", web::get().to(get_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
