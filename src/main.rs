use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use techstore_auth::auth::{SessionManager, TokenCodec};
use techstore_auth::configuration::get_configuration;
use techstore_auth::startup::run;
use techstore_auth::store::{
    CredentialStore, InMemoryRevocationStore, PgCredentialStore, RedisRevocationStore,
    RevocationStore,
};
use techstore_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let connection_string = configuration.database.connection_string();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
        })?;

    tracing::info!("Database connection pool created successfully");

    let revocations: Arc<dyn RevocationStore> = match &configuration.redis {
        Some(redis) => {
            let store = RedisRevocationStore::connect(&redis.url).await.map_err(|e| {
                tracing::error!("Failed to connect to Redis: {}", e);
                std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "Redis connection error",
                )
            })?;
            tracing::info!("Revocation store connected to Redis");
            Arc::new(store)
        }
        None => {
            tracing::warn!(
                "No redis configured; revocations live in process memory and are lost on restart"
            );
            Arc::new(InMemoryRevocationStore::new())
        }
    };

    let codec = TokenCodec::new(&configuration.jwt).map_err(|e| {
        tracing::error!("Invalid JWT settings: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let credentials: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool));
    let sessions = SessionManager::new(credentials.clone(), codec, revocations);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    tracing::info!("Binding server to address: {}", address);

    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, sessions, credentials)?;
    tracing::info!("Server started successfully");

    server.await
}
