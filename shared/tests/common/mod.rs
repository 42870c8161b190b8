#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ajali_core::capabilities::{
    Capabilities, GeoReading, GeolocationError, GeolocationProvider, HttpError, HttpMethod,
    HttpRequest, HttpResponse, HttpTransport, MemoryTokenStore, NoGeolocation,
};
use ajali_core::{App, ClientConfig, Role, Session, User, UserId};
use secrecy::SecretString;
use serde_json::{json, Value};

pub const BASE_URL: &str = "http://api.test/api";

/// What the fake backend saw.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
struct Scripted {
    status: u16,
    body: Value,
    delay: Duration,
}

/// HTTP transport answering from a per-route script. The last scripted
/// response for a route repeats; unscripted routes fail as a connection
/// error.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: HttpMethod, path: &str, status: u16, body: Value) {
        self.respond_after(method, path, status, body, Duration::ZERO);
    }

    pub fn respond_after(
        &self,
        method: HttpMethod,
        path: &str,
        status: u16,
        body: Value,
        delay: Duration,
    ) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Scripted { status, body, delay });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }

    fn next(&self, method: HttpMethod, path: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let path = request.url().path().to_string();
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method(),
            path: path.clone(),
            query: request.url().query().map(str::to_string),
            authorization: request.headers().get("authorization").map(str::to_string),
            content_type: request.headers().get("content-type").map(str::to_string),
            body: request.body().map(<[u8]>::to_vec).unwrap_or_default(),
        });

        let Some(scripted) = self.next(request.method(), &path) else {
            return Err(HttpError::Connection {
                message: format!("no script for {} {path}", request.method()),
            });
        };
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        Ok(HttpResponse::json_body(scripted.status, &scripted.body))
    }
}

pub struct FixedLocation(pub f64, pub f64);

#[async_trait::async_trait]
impl GeolocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<GeoReading, GeolocationError> {
        Ok(GeoReading::new(self.0, self.1))
    }
}

pub struct DeniedLocation;

#[async_trait::async_trait]
impl GeolocationProvider for DeniedLocation {
    async fn current_position(&self) -> Result<GeoReading, GeolocationError> {
        Err(GeolocationError::PermissionDenied)
    }
}

/// Never answers.
pub struct SilentLocation;

#[async_trait::async_trait]
impl GeolocationProvider for SilentLocation {
    async fn current_position(&self) -> Result<GeoReading, GeolocationError> {
        std::future::pending().await
    }
}

pub struct Harness {
    pub app: App,
    pub transport: Arc<ScriptedTransport>,
    pub tokens: Arc<MemoryTokenStore>,
}

pub fn harness() -> Harness {
    harness_with(Arc::new(NoGeolocation), MemoryTokenStore::new())
}

pub fn harness_with(
    geolocation: Arc<dyn GeolocationProvider>,
    tokens: MemoryTokenStore,
) -> Harness {
    let config = ClientConfig::from_toml_str(&format!(
        "[api]\nbase_url = \"{BASE_URL}\"\nrequest_timeout_secs = 5\n"
    ))
    .unwrap();
    let transport = ScriptedTransport::new();
    let tokens = Arc::new(tokens);
    let app = App::new(
        config,
        Capabilities::new(transport.clone(), tokens.clone(), geolocation),
    )
    .unwrap();
    Harness {
        app,
        transport,
        tokens,
    }
}

pub fn user(id: &str, role: Role) -> User {
    User {
        id: UserId::new(id),
        username: format!("user{id}"),
        email: Some(format!("user{id}@example.com")),
        full_name: None,
        phone_number: None,
        role,
        created_at: None,
    }
}

pub async fn sign_in(harness: &Harness, id: &str, role: Role, token: &str) {
    harness
        .app
        .session()
        .sign_in(Session::new(user(id, role), SecretString::new(token.to_string())))
        .await;
}

pub fn user_json(id: u64, role: &str) -> Value {
    json!({
        "id": id,
        "username": format!("user{id}"),
        "email": format!("user{id}@example.com"),
        "full_name": null,
        "role": role,
        "created_at": "2024-01-05T12:00:00"
    })
}

/// A report as the backend serializes it: location nested, media grouped.
pub fn report_json(id: u64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "Two matatus collided at the roundabout, lanes blocked",
        "incident_type": "accident",
        "status": "pending",
        "location": {
            "latitude": -1.2921,
            "longitude": 36.8219,
            "address": "Kenyatta Avenue, Nairobi"
        },
        "user_id": 5,
        "user": user_json(5, "user"),
        "media": { "images": [], "videos": [] },
        "created_at": "2024-01-05T15:04:00",
        "updated_at": "2024-01-05T15:04:00"
    })
}

pub fn wrapped_report(id: u64, title: &str) -> Value {
    json!({ "report": report_json(id, title) })
}

pub fn auth_json(token: &str, id: u64, role: &str) -> Value {
    json!({
        "access_token": token,
        "user_id": id,
        "role": role,
        "user": user_json(id, role)
    })
}
