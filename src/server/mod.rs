//! TCP Server for abkrdb
//!
//! One connection carries one request: the client writes its request and
//! half-closes, the server answers with one response frame and closes. The
//! accept loop handles a connection completely before accepting the next,
//! and keeps a single [`Session`] across connections.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::dispatcher::{Dispatcher, Session};
use crate::error::{Error, Result};
use crate::protocol::Response;
use crate::storage::{DocumentStore, MemoryStore};

/// Default server port
pub const DEFAULT_PORT: u16 = 43569;

/// Default upper bound on a request body
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory holding catalog files
    pub data_dir: PathBuf,
    /// Snapshot file of the document store
    pub store_path: Option<PathBuf>,
    /// Run the store purely in memory when no snapshot file is given
    pub memory: bool,
    /// Largest request accepted, in bytes
    pub max_request_bytes: usize,
    /// How long to wait for a client to finish its request
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("data"),
            store_path: None,
            memory: false,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Create a new server config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host address
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the catalog directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the store snapshot file
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Enable or disable the in-memory store
    pub fn memory(mut self, memory: bool) -> Self {
        self.memory = memory;
        self
    }

    /// Set the request size limit
    pub fn max_request_bytes(mut self, limit: usize) -> Self {
        self.max_request_bytes = limit;
        self
    }

    /// Set the request read timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Get the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Open the configured document store
    pub fn open_store(&self) -> Result<Arc<dyn DocumentStore>> {
        match (&self.store_path, self.memory) {
            (Some(path), _) => Ok(Arc::new(MemoryStore::open(path)?)),
            (None, true) => Ok(Arc::new(MemoryStore::new())),
            (None, false) => Err(Error::Storage(
                "no store configured: give a snapshot path or enable memory mode".to_string(),
            )),
        }
    }
}

/// abkrdb TCP Server
pub struct Server {
    config: ServerConfig,
    dispatcher: Dispatcher,
}

impl Server {
    /// Create a server over an existing catalog and store
    pub fn new(config: ServerConfig, catalog: Arc<Catalog>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::new(catalog, store),
        }
    }

    /// Open the catalog and store named by the config
    pub fn open(config: ServerConfig) -> Result<Self> {
        let store = config.open_store()?;
        let catalog = Arc::new(Catalog::open(&config.data_dir)?);
        Ok(Self::new(config, catalog, store))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        info!(address = %listener.local_addr()?, "abkrdb server listening");
        Ok(listener)
    }

    /// Serve connections until `shutdown` resolves
    pub async fn run_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut session = Session::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "client connected");
                        if let Err(e) = self.handle_connection(stream, &mut session).await {
                            warn!(%peer, error = %e, "connection error");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
                _ = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Serve connections forever
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.run_until(listener, std::future::pending()).await
    }

    /// Read one request, answer it and close the connection
    async fn handle_connection(&self, mut stream: TcpStream, session: &mut Session) -> Result<()> {
        let response = match self.read_request(&mut stream).await {
            Ok(request) => self.dispatcher.handle_request(session, request.trim()),
            Err(e) => {
                warn!(error = %e, "unreadable request");
                Response::from(e)
            }
        };

        stream.write_all(&response.encode()).await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn read_request(&self, stream: &mut TcpStream) -> Result<String> {
        let limit = self.config.max_request_bytes;
        let mut buf = Vec::new();
        let mut limited = (&mut *stream).take(limit as u64 + 1);
        let read = limited.read_to_end(&mut buf);

        tokio::time::timeout(self.config.request_timeout, read)
            .await
            .map_err(|_| Error::Protocol("timed out waiting for request".to_string()))??;

        if buf.len() > limit {
            return Err(Error::Protocol(format!(
                "request exceeds {} bytes",
                limit
            )));
        }
        String::from_utf8(buf).map_err(|_| Error::Protocol("request is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::new()
            .host("0.0.0.0")
            .port(9000)
            .data_dir("/tmp/abkr")
            .memory(true)
            .max_request_bytes(64);
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/abkr"));
        assert_eq!(config.max_request_bytes, 64);
        assert!(config.open_store().is_ok());
    }

    #[test]
    fn test_store_required() {
        let config = ServerConfig::new();
        assert!(matches!(config.open_store(), Err(Error::Storage(_))));
    }
}
