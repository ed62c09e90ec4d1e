//! Async Redis client
//!
//! One lazily opened connection guarded by a `tokio::sync::Mutex`; commands
//! are strict request/response. A failed round trip drops the connection so
//! the next command reconnects.

use crate::resp::RespValue;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use vanity_config::StoreEndpoint;
use vanity_experiment::StoreError;

/// Default connect and per-command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 4096;

#[derive(Debug)]
struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl Connection {
    async fn exchange(&mut self, server: &str, args: &[&[u8]]) -> Result<RespValue, StoreError> {
        let request = RespValue::command(args).encode();
        self.stream
            .write_all(&request)
            .await
            .map_err(|e| StoreError::connectivity(server, e))?;

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let decoded =
                RespValue::decode(&self.buffer).map_err(|e| StoreError::Protocol(e.to_string()))?;
            if let Some((value, used)) = decoded {
                self.buffer.drain(..used);
                return match value {
                    RespValue::Error(message) => Err(StoreError::Server(message)),
                    value => Ok(value),
                };
            }

            let read = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(|e| StoreError::connectivity(server, e))?;
            if read == 0 {
                return Err(StoreError::connectivity(
                    server,
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by server"),
                ));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}

/// Redis client bound to one endpoint
#[derive(Debug)]
pub struct RedisClient {
    endpoint: StoreEndpoint,
    timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

impl RedisClient {
    /// Create client; no connection is made until the first command
    #[inline]
    #[must_use]
    pub fn new(endpoint: StoreEndpoint) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create client with a connect/command timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(endpoint: StoreEndpoint, timeout: Duration) -> Self {
        Self {
            endpoint,
            timeout,
            connection: Mutex::new(None),
        }
    }

    /// Endpoint this client talks to
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &StoreEndpoint {
        &self.endpoint
    }

    /// Connect/command timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one command
    ///
    /// # Errors
    /// - `StoreError::Connectivity` / `StoreError::Timeout` when the server
    ///   cannot be reached or does not answer in time
    /// - `StoreError::Server` for `-ERR` replies
    /// - `StoreError::Protocol` for undecodable replies
    pub async fn cmd(&self, args: &[&[u8]]) -> Result<RespValue, StoreError> {
        let mut guard = self.connection.lock().await;
        let mut connection = match guard.take() {
            Some(connection) => connection,
            None => self.connect().await?,
        };

        let server = self.endpoint.server();
        let result = match tokio::time::timeout(self.timeout, connection.exchange(&server, args)).await
        {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error()),
        };

        match &result {
            Ok(_) | Err(StoreError::Server(_)) => *guard = Some(connection),
            Err(e) => tracing::warn!("Dropping connection to {}: {}", server, e),
        }
        result
    }

    /// Run a command, expecting `+OK`
    ///
    /// # Errors
    /// As [`cmd`](Self::cmd), plus `StoreError::Protocol` for any other reply.
    pub async fn cmd_ok(&self, args: &[&[u8]]) -> Result<(), StoreError> {
        let reply = self.cmd(args).await?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(unexpected(args, &reply))
        }
    }

    /// Run a command, expecting an integer reply
    ///
    /// # Errors
    /// As [`cmd`](Self::cmd), plus `StoreError::Protocol` for any other reply.
    pub async fn cmd_int(&self, args: &[&[u8]]) -> Result<i64, StoreError> {
        let reply = self.cmd(args).await?;
        reply.as_integer().ok_or_else(|| unexpected(args, &reply))
    }

    /// Run a command, expecting a bulk string or null reply
    ///
    /// # Errors
    /// As [`cmd`](Self::cmd), plus `StoreError::Protocol` for any other reply.
    pub async fn cmd_bulk(&self, args: &[&[u8]]) -> Result<Option<Vec<u8>>, StoreError> {
        match self.cmd(args).await? {
            RespValue::BulkString(payload) => Ok(payload),
            reply => Err(unexpected(args, &reply)),
        }
    }

    async fn connect(&self) -> Result<Connection, StoreError> {
        let server = self.endpoint.server();
        tracing::debug!("Connecting to redis at {}", server);

        let stream = tokio::time::timeout(
            self.timeout,
            TcpStream::connect((self.endpoint.host(), self.endpoint.port())),
        )
        .await
        .map_err(|_| self.timeout_error())?
        .map_err(|e| StoreError::connectivity(&server, e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| StoreError::connectivity(&server, e))?;

        let mut connection = Connection {
            stream,
            buffer: Vec::new(),
        };

        if let Some(password) = self.endpoint.password() {
            let reply = self
                .handshake(&mut connection, &server, &[b"AUTH", password.as_bytes()])
                .await?;
            if !reply.is_ok() {
                return Err(StoreError::Protocol(format!("AUTH replied {reply:?}")));
            }
        }
        if self.endpoint.database() != 0 {
            let database = self.endpoint.database().to_string();
            let reply = self
                .handshake(&mut connection, &server, &[b"SELECT", database.as_bytes()])
                .await?;
            if !reply.is_ok() {
                return Err(StoreError::Protocol(format!("SELECT replied {reply:?}")));
            }
        }
        Ok(connection)
    }

    async fn handshake(
        &self,
        connection: &mut Connection,
        server: &str,
        args: &[&[u8]],
    ) -> Result<RespValue, StoreError> {
        tokio::time::timeout(self.timeout, connection.exchange(server, args))
            .await
            .map_err(|_| self.timeout_error())?
    }

    fn timeout_error(&self) -> StoreError {
        StoreError::Timeout {
            endpoint: self.endpoint.server(),
            after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn unexpected(args: &[&[u8]], reply: &RespValue) -> StoreError {
    let command = args
        .first()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_default();
    StoreError::Protocol(format!("unexpected reply to {command}: {reply:?}"))
}
