use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

/// One POST as the collector saw it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedPost {
    pub id: Uuid,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

/// What the collector answers to every accepted POST.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            status: 200,
            body: "ok".to_string(),
            delay: Duration::ZERO,
        }
    }
}

#[derive(Default)]
pub struct Collector {
    posts: RwLock<Vec<RecordedPost>>,
    reply: RwLock<Reply>,
    expected_authorization: RwLock<Option<String>>,
}

pub type Db = Arc<Collector>;

impl Collector {
    pub fn new() -> Db {
        Arc::new(Self::default())
    }

    pub async fn set_reply(&self, reply: Reply) {
        *self.reply.write().await = reply;
    }

    /// Answer 401 to any POST whose `Authorization` header differs.
    pub async fn require_authorization(&self, value: impl Into<String>) {
        *self.expected_authorization.write().await = Some(value.into());
    }

    pub async fn received(&self) -> Vec<RecordedPost> {
        self.posts.read().await.clone()
    }
}

pub fn app() -> Router {
    app_with(Collector::new())
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/v1/metrics", post(record_post).get(list_posts))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, Collector::new()).await
}

pub async fn serve(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

/// Start the collector on a random local port in a background thread with its
/// own runtime. Returns once the listener is bound.
pub fn spawn_background(db: Db) -> std::io::Result<SocketAddr> {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = std_listener.local_addr()?;
    std_listener.set_nonblocking(true)?;

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = TcpListener::from_std(std_listener).unwrap();
            serve(listener, db).await
        })
        .unwrap();
    });

    Ok(addr)
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn record_post(State(db): State<Db>, headers: HeaderMap, body: String) -> (StatusCode, String) {
    let authorization = header_text(&headers, header::AUTHORIZATION);
    if let Some(expected) = db.expected_authorization.read().await.as_ref() {
        if authorization.as_deref() != Some(expected.as_str()) {
            return (StatusCode::UNAUTHORIZED, "unauthorized".to_string());
        }
    }

    let recorded = RecordedPost {
        id: Uuid::new_v4(),
        authorization,
        user_agent: header_text(&headers, header::USER_AGENT),
        content_type: header_text(&headers, header::CONTENT_TYPE),
        body,
    };
    info!(id = %recorded.id, bytes = recorded.body.len(), "recorded post");
    db.posts.write().await.push(recorded);

    let reply = db.reply.read().await.clone();
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, reply.body)
}

async fn list_posts(State(db): State<Db>) -> Json<Vec<RecordedPost>> {
    Json(db.received().await)
}
