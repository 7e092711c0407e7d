//! The `BrainClient` boundary front-ends talk to.
//!
//! A process either owns the brain ([`LocalBrainClient`]) or shares one owned by a
//! `borgd` gateway ([`RemoteBrainClient`]). The choice is made once at startup from
//! [`ClientConfig`]; front-ends only ever see `dyn BrainClient`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::brain::{Brain, BrainStats};
use crate::config::BrainConfig;
use crate::error::BrainError;
use crate::paths::AppPaths;

/// The single authoritative brain of a process, serialized behind one lock.
pub type SharedBrain = Arc<Mutex<Brain>>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, timeout, or a broken connection to the gateway.
    #[error("brain gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway failed internally (HTTP 5xx). The call failed; the caller may go on.
    #[error("brain gateway internal error (HTTP {0})")]
    RemoteInternal(u16),

    /// The gateway rejected the request (non-2xx, non-5xx): client and gateway disagree.
    #[error("brain gateway rejected the request (HTTP {0})")]
    RemoteClient(u16),

    #[error(transparent)]
    Brain(#[from] BrainError),
}

impl ClientError {
    /// Failures that indicate a broken contract or a corrupt brain rather than a bad moment.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::RemoteClient(_) => true,
            ClientError::Brain(e) => matches!(e, BrainError::ContextNotFound(_)),
            _ => false,
        }
    }
}

#[async_trait]
pub trait BrainClient: Send + Sync {
    async fn learn(&self, text: &str) -> Result<(), ClientError>;

    /// `Ok(None)` is a valid outcome: the brain had nothing to say.
    async fn reply(&self, text: &str) -> Result<Option<String>, ClientError>;

    async fn save_all(&self) -> Result<(), ClientError>;

    async fn stats(&self) -> Result<BrainStats, ClientError>;
}

/// Direct calls into an in-process brain.
#[derive(Debug, Clone)]
pub struct LocalBrainClient {
    brain: SharedBrain,
    path: Option<PathBuf>,
}

impl LocalBrainClient {
    /// An in-memory brain that is never persisted.
    pub fn new(brain: Brain) -> Self {
        Self {
            brain: Arc::new(Mutex::new(brain)),
            path: None,
        }
    }

    /// Load the brain at `path`, or start a fresh one there if the file does not exist yet.
    pub fn open(path: &Path, cfg: BrainConfig) -> Result<Self, BrainError> {
        let brain = if path.exists() {
            Brain::load_json(path, cfg)?
        } else {
            info!("No brain at {:?}; starting with a fresh brain", path);
            Brain::new(cfg)
        };
        Ok(Self {
            brain: Arc::new(Mutex::new(brain)),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn shared(&self) -> SharedBrain {
        Arc::clone(&self.brain)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[async_trait]
impl BrainClient for LocalBrainClient {
    async fn learn(&self, text: &str) -> Result<(), ClientError> {
        self.brain.lock().await.learn(text);
        Ok(())
    }

    async fn reply(&self, text: &str) -> Result<Option<String>, ClientError> {
        Ok(self.brain.lock().await.reply(text)?)
    }

    async fn save_all(&self) -> Result<(), ClientError> {
        let brain = self.brain.lock().await;
        match &self.path {
            Some(path) => brain.save_json(path)?,
            None => debug!("in-memory brain; nothing to save"),
        }
        Ok(())
    }

    async fn stats(&self) -> Result<BrainStats, ClientError> {
        Ok(self.brain.lock().await.stats())
    }
}

/// Calls into a shared brain owned by a `borgd` gateway.
#[derive(Debug, Clone)]
pub struct RemoteBrainClient {
    http: reqwest::Client,
    base: String,
}

impl RemoteBrainClient {
    /// Build a client and probe `GET /` so a missing gateway is reported up front.
    pub async fn connect(server: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let client = Self {
            http,
            base: base_url(server),
        };
        let resp = client.http.get(client.url("")).send().await?;
        check_status(resp.status())?;
        info!("Connected to brain gateway at {}", client.base);
        Ok(client)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base, route)
    }

    async fn post_body(&self, route: &str, body: &str) -> Result<reqwest::Response, ClientError> {
        let resp = self
            .http
            .post(self.url(route))
            .form(&[("body", body)])
            .send()
            .await?;
        check_status(resp.status())?;
        Ok(resp)
    }
}

fn base_url(server: &str) -> String {
    let server = server.trim_end_matches('/');
    if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("http://{server}")
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), ClientError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() {
        error!("Internal error in brain gateway (HTTP {}); see gateway logs", status);
        Err(ClientError::RemoteInternal(status.as_u16()))
    } else {
        Err(ClientError::RemoteClient(status.as_u16()))
    }
}

#[async_trait]
impl BrainClient for RemoteBrainClient {
    async fn learn(&self, text: &str) -> Result<(), ClientError> {
        self.post_body("learn", text).await?;
        Ok(())
    }

    async fn reply(&self, text: &str) -> Result<Option<String>, ClientError> {
        let body = self.post_body("reply", text).await?.text().await?;
        Ok(Some(body).filter(|b| !b.is_empty()))
    }

    async fn save_all(&self) -> Result<(), ClientError> {
        let resp = self.http.post(self.url("save")).send().await?;
        check_status(resp.status())
    }

    async fn stats(&self) -> Result<BrainStats, ClientError> {
        let resp = self.http.get(self.url("stats")).send().await?;
        check_status(resp.status())?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body).map_err(BrainError::from)?)
    }
}

/// Front-end settings that pick the brain a process talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Share a brain through a gateway instead of owning one.
    pub multiplex: bool,
    /// Gateway address, `host:port` or a full URL.
    pub multiplex_server: String,
    /// Brain file for local mode; defaults to the current brain in the data directory.
    pub brain: Option<PathBuf>,
    pub timeout_secs: u64,
    pub brain_settings: BrainConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            multiplex: false,
            multiplex_server: "localhost:2001".to_string(),
            brain: None,
            timeout_secs: 10,
            brain_settings: BrainConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Read a JSON config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, BrainError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn connect(&self, paths: &AppPaths) -> Result<Arc<dyn BrainClient>, ClientError> {
        if self.multiplex {
            let timeout = Duration::from_secs(self.timeout_secs.max(1));
            let remote = RemoteBrainClient::connect(&self.multiplex_server, timeout).await?;
            return Ok(Arc::new(remote));
        }
        let path = self.brain.clone().unwrap_or_else(|| paths.current_brain());
        Ok(Arc::new(LocalBrainClient::open(
            &path,
            self.brain_settings.clone(),
        )?))
    }
}
