#![allow(dead_code)]

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;
use tower::ServiceExt;
use trailbook::{
    ServerConfig, create_app,
    db::{Database, User},
    mail::MemoryMailer,
};
use url::Url;

pub const APPROVAL_MAIL: &str = "operator@example.com";
pub const PUBLIC_URL: &str = "http://localhost:7292";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub mailer: MemoryMailer,
}

/// Parsed response: status plus the JSON envelope.
pub struct Reply {
    pub status: StatusCode,
    pub json: Value,
}

impl Reply {
    pub fn message(&self) -> &str {
        self.json["message"].as_str().unwrap_or_default()
    }

    pub fn category(&self) -> &str {
        self.json["response"].as_str().unwrap_or_default()
    }

    pub fn data(&self) -> &Value {
        &self.json["data"]
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_quota(1000).await
    }

    pub async fn with_quota(requests_per_minute: u32) -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let mailer = MemoryMailer::new();
        let config = ServerConfig {
            db: db.clone(),
            public_url: Url::parse(PUBLIC_URL).expect("Invalid URL"),
            token_secret: b"integration-test-secret-0123456789".to_vec(),
            approval_mail: APPROVAL_MAIL.to_string(),
            ip_header: None,
            requests_per_minute: NonZeroU32::new(requests_per_minute).expect("quota"),
            mailer: Arc::new(mailer.clone()),
        };
        let router = create_app(&config)
            .expect("Failed to build app")
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));

        Self { router, db, mailer }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply { status, json }
    }

    pub async fn get(&self, uri: &str, authorization: Option<&str>) -> Reply {
        self.send("GET", uri, authorization, None).await
    }

    pub async fn post(&self, uri: &str, authorization: Option<&str>, body: Value) -> Reply {
        self.send("POST", uri, authorization, Some(body)).await
    }

    /// Sign up through the API.
    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> Reply {
        self.post(
            "/auth/users",
            None,
            serde_json::json!({ "username": username, "email": email, "password": password }),
        )
        .await
    }

    /// Sign up, then approve, confirm and assign `role` directly.
    pub async fn active_user(&self, username: &str, password: &str, role: &str) -> User {
        let email = format!("{username}@example.com");
        let reply = self.sign_up(username, &email, password).await;
        assert_eq!(reply.status, StatusCode::CREATED, "sign-up failed: {}", reply.json);
        let id = reply.data()["id"].as_i64().unwrap();

        let role = self.db.roles().get_by_name(role).await.unwrap().unwrap();
        self.db.users().activate(id, role.id, "test").await.unwrap();
        self.db.users().get_by_id(id).await.unwrap().unwrap()
    }

    /// Token from the link in the latest mail sent to `to`.
    pub fn mailed_token(&self, to: &str) -> String {
        let notification = self
            .mailer
            .last_to(to)
            .unwrap_or_else(|| panic!("no mail sent to {to}"));
        let link = notification.substitutions.get("link").expect("mail has a link");
        link.rsplit('/').next().unwrap().to_string()
    }

    /// Password login; returns the bearer token.
    pub async fn login(&self, identifier: &str, password: &str) -> String {
        let reply = self.get("/auth/tokens", Some(&basic(identifier, password))).await;
        assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.json);
        reply.data()["token"].as_str().unwrap().to_string()
    }
}

pub fn basic(identifier: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{identifier}:{secret}")))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
