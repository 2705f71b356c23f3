#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use notegate::config::NotegateConfig;
use notegate::consent::ConsentSurface;
use notegate::error::{SearchError, StoreError};
use notegate::guard::ApprovalRequest;
use notegate::search::{SearchBackend, SearchHit, SearchMode};
use notegate::security::{PathValidator, ValidatedPath};
use notegate::server::ControlServer;
use notegate::store::{NoteMetadata, NoteStore};
use notegate::tasks::MarkdownTaskStore;
use notegate::tools::Collaborators;

pub const TOKEN: &str = "test-session-token";
pub const VAULT_ROOT: &str = "/vault";

/// Note store kept in memory. Counts writes so tests can assert nothing was touched.
#[derive(Default)]
pub struct MemoryNotes {
    notes: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryNotes {
    pub fn with_notes(notes: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut map = store.notes.lock().unwrap();
            for (path, text) in notes {
                map.insert(path.to_string(), text.to_string());
            }
        }
        store
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.notes.lock().unwrap().get(path).cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoteStore for MemoryNotes {
    async fn read(&self, path: &ValidatedPath) -> Result<String, StoreError> {
        self.get(path.as_str())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &ValidatedPath, content: &str) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.notes
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn create(&self, path: &ValidatedPath, content: &str) -> Result<(), StoreError> {
        let mut notes = self.notes.lock().unwrap();
        if notes.contains_key(path.as_str()) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        notes.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn exists(&self, path: &ValidatedPath) -> Result<bool, StoreError> {
        Ok(self.notes.lock().unwrap().contains_key(path.as_str()))
    }

    async fn list_markdown_files(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .notes
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.ends_with(".md"))
            .cloned()
            .collect())
    }

    async fn create_folder(&self, _path: &ValidatedPath) -> Result<(), StoreError> {
        Ok(())
    }

    async fn metadata(&self, path: &ValidatedPath) -> Result<NoteMetadata, StoreError> {
        let text = self.read(path).await?;
        Ok(NoteMetadata {
            size: text.len() as u64,
            modified: None,
        })
    }
}

/// Search backend with a fixed answer.
pub struct StaticSearch {
    pub available: bool,
    pub hits: Vec<SearchHit>,
    pub calls: AtomicUsize,
}

impl StaticSearch {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            hits: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            available: true,
            hits,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchBackend for StaticSearch {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn index(&self) -> Result<(), SearchError> {
        Ok(())
    }

    async fn search(
        &self,
        _query: &str,
        _mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(SearchError::Unavailable);
        }
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

/// Consent surface with a scripted answer. `None` never answers.
pub struct ScriptedConsent {
    answer: Option<bool>,
    presented: AtomicUsize,
}

impl ScriptedConsent {
    pub fn approve() -> Self {
        Self::answering(Some(true))
    }

    pub fn deny() -> Self {
        Self::answering(Some(false))
    }

    pub fn silent() -> Self {
        Self::answering(None)
    }

    fn answering(answer: Option<bool>) -> Self {
        Self {
            answer,
            presented: AtomicUsize::new(0),
        }
    }

    pub fn presented(&self) -> usize {
        self.presented.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsentSurface for ScriptedConsent {
    async fn present(&self, _request: &ApprovalRequest) -> bool {
        self.presented.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            Some(answer) => answer,
            None => std::future::pending().await,
        }
    }
}

/// Config for tests: in-memory vault root, ephemeral port, one-second approval window.
pub fn test_config() -> NotegateConfig {
    let mut config = NotegateConfig::default();
    config.vault.root = VAULT_ROOT.into();
    config.vault.name = "test-vault".into();
    config.server.port = 0;
    config.server.shutdown_grace_secs = 1;
    config.approval.timeout_secs = 1;
    config
}

pub struct Harness {
    pub server: ControlServer,
    pub notes: Arc<MemoryNotes>,
    pub search: Arc<StaticSearch>,
    pub consent: Arc<ScriptedConsent>,
}

impl Harness {
    pub fn new(config: NotegateConfig, notes: MemoryNotes, search: StaticSearch, consent: ScriptedConsent) -> Self {
        let notes = Arc::new(notes);
        let search = Arc::new(search);
        let consent = Arc::new(consent);
        let validator = PathValidator::new(config.resolved_vault_root());
        let collaborators = Collaborators {
            notes: notes.clone(),
            tasks: Arc::new(MarkdownTaskStore::new(notes.clone(), validator)),
            search: search.clone(),
        };
        let server = ControlServer::new(config, collaborators, consent.clone());
        Self {
            server,
            notes,
            search,
            consent,
        }
    }

    /// Default harness: a couple of notes, search unavailable, consent approves.
    pub fn basic() -> Self {
        Self::new(
            test_config(),
            MemoryNotes::with_notes(&[
                ("Daily/2024-01-01.md", "# New year\n"),
                ("Projects/notegate.md", "# Notegate\n- [ ] ship it\n"),
            ]),
            StaticSearch::unavailable(),
            ScriptedConsent::approve(),
        )
    }

    pub fn router(&self) -> Router {
        self.server.router(TOKEN)
    }
}

pub fn loopback_client() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 50_000))
}

/// Build a request as it would arrive from `client`, with the session token.
pub fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    request_from(loopback_client(), method, uri, body, Some(TOKEN))
}

pub fn request_from(
    client: SocketAddr,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let mut request = builder.body(body).unwrap();
    request.extensions_mut().insert(ConnectInfo(client));
    request
}

pub fn call(tool: &str, arguments: Value) -> Request<Body> {
    request(
        Method::POST,
        "/mcp/call",
        Some(serde_json::json!({ "tool": tool, "arguments": arguments })),
    )
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// The text of the first content block of a tool response.
pub fn result_text(body: &Value) -> &str {
    body["content"][0]["text"].as_str().unwrap()
}
