#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storefront_auth::{
    ServerConfig,
    auth::ClientIpHeader,
    create_app,
    db::{Database, MemberRole},
    mail::{MailError, MailSender},
    password::{CredentialError, CredentialVerifier},
};
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";
pub const PASSWORD: &str = "password123";

/// Cheap stand-in for Argon2 so the tests stay fast.
pub struct PlainVerifier;

impl CredentialVerifier for PlainVerifier {
    fn hash(&self, password: &str) -> Result<String, CredentialError> {
        Ok(format!("plain:{}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        Ok(hash.strip_prefix("plain:") == Some(password))
    }
}

/// Mail sender that keeps messages for inspection.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl MailSender for Outbox {
    fn send(&self, to: &str, _subject: &str, body: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

impl Outbox {
    /// Verification token from the latest mail sent to `email`.
    pub fn verification_token(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, body) = sent.iter().rev().find(|(to, _)| to == email)?;
        let link = body.lines().find(|line| line.starts_with("http"))?;
        url::Url::parse(link)
            .ok()?
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub config: ServerConfig,
    pub outbox: Arc<Outbox>,
}

/// Builder for test apps with non-default settings.
pub struct TestSetup {
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    login_rate_per_minute: u32,
    ip_header: Option<ClientIpHeader>,
}

impl TestSetup {
    pub fn new() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(60),
            refresh_token_ttl: Duration::from_secs(3600),
            login_rate_per_minute: 1000,
            ip_header: None,
        }
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    pub fn with_login_rate(mut self, per_minute: u32) -> Self {
        self.login_rate_per_minute = per_minute;
        self
    }

    pub fn with_ip_header(mut self, header: ClientIpHeader) -> Self {
        self.ip_header = Some(header);
        self
    }

    pub async fn build(self) -> TestApp {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let outbox = Arc::new(Outbox::default());
        let config = ServerConfig {
            db: db.clone(),
            jwt_secret: JWT_SECRET.to_vec(),
            access_token_ttl: self.access_token_ttl,
            refresh_token_ttl: self.refresh_token_ttl,
            secure_cookies: false,
            login_rate_per_minute: self.login_rate_per_minute,
            ip_header: self.ip_header,
            credentials: Arc::new(PlainVerifier),
            mail: outbox.clone(),
            base_url: url::Url::parse("http://localhost:8080").unwrap(),
        };
        TestApp {
            app: create_app(&config),
            db,
            config,
            outbox,
        }
    }
}

pub async fn setup() -> TestApp {
    TestSetup::new().build().await
}

/// Result of a successful login through the API.
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    /// Insert a verified member with the shared test password.
    pub async fn create_member(&self, email: &str, role: MemberRole) -> i64 {
        self.db
            .members()
            .create(email, &format!("plain:{}", PASSWORD), role)
            .await
            .expect("Failed to create member")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn login(&self, email: &str) -> Session {
        let response = self
            .send(json_post(
                "/api/members/login",
                &serde_json::json!({ "email": email, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let refresh_token = refresh_cookie_value(&response).expect("login sets refresh cookie");
        let body = body_json(response).await;
        Session {
            access_token: body["accessToken"].as_str().unwrap().to_string(),
            refresh_token,
        }
    }

    pub async fn reissue(&self, refresh_token: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/members/reissue")
                .header(header::COOKIE, format!("refreshToken={}", refresh_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get_with_token(&self, uri: &str, access_token: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub fn json_post(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The raw Set-Cookie header for the refresh token, if any.
pub fn refresh_set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("refreshToken="))
        .map(str::to_string)
}

/// The refresh token value set by the response. Empty (cleared) cookies yield None.
pub fn refresh_cookie_value(response: &Response<Body>) -> Option<String> {
    let cookie = refresh_set_cookie(response)?;
    let value = cookie
        .strip_prefix("refreshToken=")?
        .split(';')
        .next()?
        .to_string();
    (!value.is_empty()).then_some(value)
}
