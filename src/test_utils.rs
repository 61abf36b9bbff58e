//! Shared fixtures for the test suite: a ready-made [`Config`]/credential
//! pair and an in-memory client, so individual test modules don't each
//! hand-roll the same boilerplate.

#![allow(dead_code)]

use std::sync::Arc;

use crate::client::mock::InMemoryClient;
use crate::config::Config;
use crate::credentials::UserCredential;

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.endpoint = "obs.example.com".to_string();
    config.target_user_count = 1;
    config
}

pub fn test_user(access_key: &str) -> UserCredential {
    UserCredential {
        username: "alice".to_string(),
        access_key: access_key.to_string(),
        secret_key: "SK".to_string(),
        session_token: None,
        original_access_key: access_key.to_string(),
    }
}

pub fn test_client() -> Arc<InMemoryClient> {
    Arc::new(InMemoryClient::new())
}
