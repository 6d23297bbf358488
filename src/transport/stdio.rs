use crate::config::BackendConfig;
use crate::core::protocol::{JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::core::request_id::SharedRequestIdGenerator;
use crate::transport::traits::Transport;
use crate::utils::errors::{McpError, McpResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// How long a single request may wait for its response
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stdio transport: a child process speaking newline-delimited JSON-RPC.
/// The child is killed when the transport is dropped, so an abandoned
/// connect attempt does not leave a process behind.
pub struct StdioTransport {
    name: String,
    child: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<ChildStdin>>,
    pending: Arc<DashMap<RequestId, oneshot::Sender<JsonRpcResponse>>>,
    is_connected: Arc<RwLock<bool>>,
    request_id_gen: SharedRequestIdGenerator,
}

impl StdioTransport {
    /// Spawn the backend process described by `config`
    pub async fn spawn(config: &BackendConfig) -> McpResult<Self> {
        let command = shellexpand::tilde(&config.command).to_string();
        let mut child = Command::new(&command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                McpError::TransportError(format!("Failed to spawn '{}': {}", command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::TransportError("Failed to open stdin".to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::TransportError("Failed to open stdout".to_string()))?;

        let transport = Self {
            name: config.name.clone(),
            child: Arc::new(Mutex::new(child)),
            stdin: Arc::new(Mutex::new(stdin)),
            pending: Arc::new(DashMap::new()),
            is_connected: Arc::new(RwLock::new(true)),
            request_id_gen: SharedRequestIdGenerator::new(),
        };

        transport.start_reader(stdout);

        Ok(transport)
    }

    fn start_reader(&self, stdout: ChildStdout) {
        let pending = self.pending.clone();
        let is_connected = self.is_connected.clone();
        let name = self.name.clone();

        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                debug!("[{}] Received: {}", name, line);

                match serde_json::from_str::<JsonRpcResponse>(&line) {
                    Ok(response) => {
                        if let Some(id) = response.id.clone() {
                            if let Some((_, tx)) = pending.remove(&id) {
                                let _ = tx.send(response);
                            } else {
                                debug!("[{}] Response with unknown id: {:?}", name, id);
                            }
                        }
                    }
                    Err(e) => {
                        debug!("[{}] Ignoring non-response line: {}", name, e);
                    }
                }
            }

            info!("[{}] Stdio reader task ended", name);
            *is_connected.write().await = false;
            pending.clear();
        });
    }

    async fn write_line(&self, json: &str) -> std::io::Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send_request(&self, mut request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        if !self.is_connected().await {
            return Err(McpError::TransportError(format!(
                "Backend '{}' is not connected",
                self.name
            )));
        }

        let request_id = request
            .id
            .get_or_insert_with(|| self.request_id_gen.next_id())
            .clone();

        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        // The reader may have exited and cleared `pending` before the insert
        if !self.is_connected().await {
            self.pending.remove(&request_id);
            return Err(McpError::TransportError(format!(
                "Backend '{}' is not connected",
                self.name
            )));
        }

        let json = serde_json::to_string(&request)?;
        debug!("[{}] Sending: {}", self.name, json);

        if let Err(e) = self.write_line(&json).await {
            self.pending.remove(&request_id);
            return Err(McpError::Io(e));
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(McpError::TransportError("Response channel closed".to_string())),
            Err(_) => {
                self.pending.remove(&request_id);
                Err(McpError::Timeout(REQUEST_TIMEOUT.as_millis() as u64))
            }
        }
    }

    async fn send_notification(&self, mut request: JsonRpcRequest) -> McpResult<()> {
        if !self.is_connected().await {
            return Err(McpError::TransportError(format!(
                "Backend '{}' is not connected",
                self.name
            )));
        }

        request.id = None;
        let json = serde_json::to_string(&request)?;
        debug!("[{}] Sending notification: {}", self.name, json);

        self.write_line(&json).await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        *self.is_connected.read().await
    }

    async fn close(&self) -> McpResult<()> {
        let mut child = self.child.lock().await;

        if let Err(e) = child.start_kill() {
            warn!("[{}] Failed to kill child process: {}", self.name, e);
        }

        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) => info!("[{}] Child process exited with: {:?}", self.name, status),
            Ok(Err(e)) => error!("[{}] Failed to wait for child: {}", self.name, e),
            Err(_) => warn!("[{}] Timeout waiting for child process", self.name),
        }

        *self.is_connected.write().await = false;
        self.pending.clear();
        Ok(())
    }
}
