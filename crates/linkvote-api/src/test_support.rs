use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use linkvote_db::Database;

use crate::mailer::Mailer;
use crate::session::{SESSION_COOKIE, SessionSettings};
use crate::{AppState, AppStateInner, routes};

/// Keeps every sent message so tests can follow reset links.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<String>>,
}

impl RecordingMailer {
    pub fn last_reset_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let html = sent.last()?;
        let start = html.find("token=")? + "token=".len();
        let token = html[start..]
            .split(['&', '"', '<'])
            .next()?;
        Some(token.to_string())
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, _to: &str, _subject: &str, html: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(html.to_string());
        Ok(())
    }
}

#[derive(Clone)]
pub struct TestApp {
    pub app: Router,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            sessions: SessionSettings::default(),
            frontend_url: "http://localhost:3000".into(),
            mailer: mailer.clone(),
        });
        Self {
            app: routes::router(state),
            mailer,
        }
    }

    /// Returns the status, the JSON body (`Null` if not JSON) and any session cookie set.
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let cookie = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| pair.starts_with(&format!("{SESSION_COOKIE}=")) && !pair.ends_with('='))
            .map(str::to_string);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body, cookie)
    }

    pub async fn register(&self, username: &str) -> (StatusCode, Value, Option<String>) {
        self.send(json_request(
            Method::POST,
            "/auth/register",
            Some(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "password123",
            })),
            None,
        ))
        .await
    }

    /// Create a post as the session holder and return its id.
    pub async fn create_post(&self, cookie: Option<&str>, title: &str) -> i64 {
        let (status, body, _) = self
            .send(json_request(
                Method::POST,
                "/posts",
                Some(json!({ "title": title, "text": format!("{title} body") })),
                cookie,
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_i64().unwrap()
    }
}

/// `cookie` is a `name=value` pair as captured by [`TestApp::send`].
pub fn json_request(method: Method, uri: &str, body: Option<Value>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
