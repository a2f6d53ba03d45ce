#![allow(dead_code)]

use async_trait::async_trait;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use techstore_auth::auth::{Role, SessionManager, TokenCodec};
use techstore_auth::configuration::JwtSettings;
use techstore_auth::error::{AppError, DatabaseError};
use techstore_auth::startup::run;
use techstore_auth::store::{
    CredentialRecord, CredentialStore, InMemoryRevocationStore, NewCredential,
};

pub const PASSWORD: &str = "correct horse";

/// Credential store over a plain vector, standing in for Postgres
#[derive(Default)]
pub struct InMemoryCredentialStore {
    records: Mutex<Vec<CredentialRecord>>,
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Vec<CredentialRecord>, AppError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().filter(|r| r.email == email).cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<CredentialRecord>, AppError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, new: NewCredential) -> Result<CredentialRecord, AppError> {
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.email == new.email) {
            return Err(DatabaseError::UniqueConstraintViolation("email".to_string()).into());
        }
        let record = CredentialRecord {
            id: records.len() as i64 + 1,
            full_name: new.full_name,
            email: new.email,
            phone: new.phone,
            password_hash: new.password_hash,
            role: new.role,
            is_active: new.is_active,
        };
        records.push(record.clone());
        Ok(record)
    }
}

pub struct TestApp {
    pub address: String,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub revocations: Arc<InMemoryRevocationStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Insert a user directly, bypassing registration so any role can be seeded
    pub async fn seed_user(&self, email: &str, role: Role) -> i64 {
        let password_hash = bcrypt::hash(PASSWORD, 4).expect("Failed to hash password");
        self.credentials
            .insert(NewCredential {
                full_name: "Test User".to_string(),
                email: email.to_string(),
                phone: "0901234567".to_string(),
                password_hash,
                role,
                is_active: true,
            })
            .await
            .expect("Failed to seed user")
            .id
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Log in and return (access_token, refresh_token)
    pub async fn login(&self, email: &str) -> (String, String) {
        let response = self
            .post_json(
                "/auth/login",
                &serde_json::json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);

        let body: serde_json::Value = response.json().await.unwrap();
        (
            body["data"]["access_token"].as_str().unwrap().to_string(),
            body["data"]["refresh_token"].as_str().unwrap().to_string(),
        )
    }
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "integration-test-secret-with-enough-bytes".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 3600,
        issuer: "techstore".to_string(),
    }
}

pub fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let credentials = Arc::new(InMemoryCredentialStore::default());
    let revocations = Arc::new(InMemoryRevocationStore::new());
    let codec = TokenCodec::new(&jwt_settings()).expect("Failed to build token codec");
    let sessions = SessionManager::new(credentials.clone(), codec, revocations.clone());

    let server = run(listener, sessions, credentials.clone()).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        credentials,
        revocations,
        client: reqwest::Client::new(),
    }
}
