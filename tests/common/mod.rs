#![allow(dead_code)]

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;
use studio_access_server::{AppState, InMemoryStore, Settings, User};

pub const MASTER_EMAIL: &str = "master@test.local";

pub fn test_settings() -> Settings {
    Settings::new_for_test().expect("Failed to load test config")
}

pub fn test_state(store: &InMemoryStore) -> AppState {
    AppState::with_store(test_settings(), Arc::new(store.clone())).expect("Failed to build state")
}

pub async fn seed_user(store: &InMemoryStore, email: &str) -> User {
    let user = User::new(email.to_string(), Some("Test User".to_string()));
    store.insert_user(user.clone()).await;
    user
}

/// Access token as the hosted backend would mint it after login.
pub fn backend_token(user: &User) -> String {
    let settings = test_settings();
    encode(
        &Header::default(),
        &json!({
            "sub": user.id.to_string(),
            "email": user.email,
            "aud": settings.auth.backend_jwt_audience,
            "iat": Utc::now().timestamp(),
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        }),
        &EncodingKey::from_secret(settings.auth.backend_jwt_secret.as_bytes()),
    )
    .expect("Failed to sign backend token")
}
