//! The loopback control server.
//!
//! [`ControlServer`] owns the session token, the approval guard, and the audit
//! trail, and serves the HTTP API on `127.0.0.1` only. Every start mints a new
//! token; clients must re-fetch it from `GET /auth/token` after a restart.
//!
//! Stopping force-denies pending approvals before the listener closes.
//! Collaborator calls already in flight are not cancelled; `stop` waits for
//! them up to the configured grace period, then aborts the server task and
//! leaves them to finish in the background.

pub mod gate;
pub mod rate_limit;
pub mod routes;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::Router;
use base64::Engine;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audit::AuditLogger;
use crate::config::NotegateConfig;
use crate::consent::{self, ConsentSurface};
use crate::error::ServerError;
use crate::guard::OperationGuard;
use crate::search::{CliSearch, SearchBackend};
use crate::security::PathValidator;
use crate::store::{FsNoteStore, NoteStore};
use crate::tasks::{MarkdownTaskStore, TaskStore};
use crate::tools::{Collaborators, ToolSettings, VaultTools};
use rate_limit::RateLimiter;

pub use gate::ClientInfo;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub(crate) token: Arc<str>,
    pub(crate) store_name: Arc<str>,
    pub(crate) tools: VaultTools,
    pub(crate) audit: Arc<AuditLogger>,
    pub(crate) rate_limiter: Arc<RateLimiter>,
    pub(crate) extra_origins: Arc<[String]>,
    pub(crate) max_body_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct Running {
    addr: SocketAddr,
    token: String,
    shutdown: CancellationToken,
    handle: JoinHandle<std::io::Result<()>>,
}

pub struct ControlServer {
    config: Arc<NotegateConfig>,
    tools: VaultTools,
    guard: OperationGuard,
    audit: Arc<AuditLogger>,
    search: Arc<dyn SearchBackend>,
    state: Mutex<ServerState>,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl ControlServer {
    pub fn new(
        config: NotegateConfig,
        collaborators: Collaborators,
        consent: Arc<dyn ConsentSurface>,
    ) -> Self {
        let audit = Arc::new(AuditLogger::new(&config.audit));
        let guard = OperationGuard::new(
            config.approval.require_approval,
            config.approval.timeout(),
            consent,
            Arc::clone(&audit),
        );
        let validator = validator_for(&config);
        let search = Arc::clone(&collaborators.search);
        let tools = VaultTools::new(
            collaborators,
            validator,
            guard.clone(),
            Arc::clone(&audit),
            ToolSettings {
                default_search_limit: config.search.default_limit,
                task_note: config.vault.task_note.clone(),
            },
        );

        Self {
            config: Arc::new(config),
            tools,
            guard,
            audit,
            search,
            state: Mutex::new(ServerState::Stopped),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Wire up the filesystem vault, markdown tasks, CLI search, and the
    /// configured consent surface.
    pub fn from_config(config: NotegateConfig) -> Result<Self> {
        let root = config.resolved_vault_root();
        let notes: Arc<dyn NoteStore> = Arc::new(
            FsNoteStore::open(&root)
                .with_context(|| format!("vault root not usable: {}", root.display()))?,
        );
        let tasks: Arc<dyn TaskStore> = Arc::new(MarkdownTaskStore::new(
            Arc::clone(&notes),
            validator_for(&config),
        ));
        let search: Arc<dyn SearchBackend> = Arc::new(CliSearch::from_config(&config.search));
        let consent = consent::from_config(&config.approval.consent)?;

        Ok(Self::new(
            config,
            Collaborators {
                notes,
                tasks,
                search,
            },
            consent,
        ))
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: ServerState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
        tracing::debug!(state = ?next, "server state");
    }

    pub fn guard(&self) -> &OperationGuard {
        &self.guard
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.addr)
    }

    /// Build the routed application for a given session token.
    pub fn router(&self, token: &str) -> Router {
        let server = &self.config.server;
        routes::router(AppState {
            token: Arc::from(token),
            store_name: Arc::from(self.config.store_name()),
            tools: self.tools.clone(),
            audit: Arc::clone(&self.audit),
            rate_limiter: Arc::new(RateLimiter::new(
                server.rate_limit_requests,
                server.rate_limit_window(),
            )),
            extra_origins: server.extra_origins.clone().into(),
            max_body_bytes: server.max_body_bytes,
        })
    }

    /// Bind the loopback listener and start serving. A no-op returning the
    /// current address if already running.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            tracing::debug!(addr = %current.addr, "start requested while running");
            return Ok(current.addr);
        }
        self.set_state(ServerState::Starting);

        let token = generate_token();
        self.refresh_search().await;

        let port = self.config.server.port;
        let listener = match TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
            Ok(listener) => listener,
            Err(source) => {
                self.set_state(ServerState::Stopped);
                return Err(ServerError::Bind { port, source });
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                self.set_state(ServerState::Stopped);
                return Err(ServerError::Bind { port, source });
            }
        };

        let app = self.router(&token);
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
        });

        *running = Some(Running {
            addr,
            token,
            shutdown,
            handle,
        });
        self.set_state(ServerState::Running);
        tracing::info!(addr = %addr, store = %self.config.store_name(), "control server listening");
        Ok(addr)
    }

    /// Deny pending approvals, close the listener, and wait for it to finish.
    /// Idempotent.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let mut running = self.running.lock().await;
        let Some(current) = running.take() else {
            return Ok(());
        };
        self.set_state(ServerState::Stopping);

        let denied = self.guard.cancel_all();
        tracing::info!(addr = %current.addr, denied, "stopping control server");
        current.shutdown.cancel();

        let grace = self.config.server.shutdown_grace();
        let mut handle = current.handle;
        let result = match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ServerError::Task(e.to_string())),
            Ok(Err(e)) => Err(ServerError::Task(e.to_string())),
            Err(_) => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "in-flight requests outlived the grace period, aborting"
                );
                handle.abort();
                Ok(())
            }
        };

        drop(current.token);
        self.set_state(ServerState::Stopped);
        tracing::info!("control server stopped");
        result
    }

    async fn refresh_search(&self) {
        if !self.search.is_available().await {
            tracing::warn!("search executable not available, search_vault will report setup steps");
            return;
        }
        if self.config.search.index_on_start {
            let search = Arc::clone(&self.search);
            tokio::spawn(async move {
                if let Err(e) = search.index().await {
                    tracing::warn!(error = %e, "background index failed");
                }
            });
        }
    }
}

fn validator_for(config: &NotegateConfig) -> PathValidator {
    PathValidator::new(config.resolved_vault_root()).with_extensions(
        config.vault.allowed_extensions.iter().cloned(),
        config.vault.default_extension.clone(),
    )
}

/// 256 random bits, URL-safe base64.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
