//! One-shot TCP client used to talk to the remote process supervisor.
//!
//! Every command opens a fresh connection, writes the request, reads a single
//! reply chunk and drops the socket. There is no connection reuse and no retry
//! at this layer.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::trace;

/// Maximum number of reply bytes read per command
pub const REPLY_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {addr}: {reason}")]
    ConnectFailed { addr: String, reason: String },

    #[error("timed out after {timeout:?} waiting on {addr}")]
    Timeout { addr: String, timeout: Duration },

    #[error("i/o failure talking to {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Seam between the dispatcher and the network
pub trait Transport: Send + Sync {
    /// Send `message` to `host:port` and return the decoded reply
    fn send<'a>(
        &'a self,
        host: &'a str,
        port: u16,
        message: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, TransportError>>;
}

/// Plain TCP transport
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn send<'a>(
        &'a self,
        host: &'a str,
        port: u16,
        message: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, TransportError>> {
        exchange(host, port, message, timeout).boxed()
    }
}

/// Perform a single request/reply round trip.
///
/// `limit` bounds the whole call: connect, write and read share one deadline.
/// The stream is owned by this function, so it is closed on every return path.
async fn exchange(
    host: &str,
    port: u16,
    message: &str,
    limit: Duration,
) -> Result<String, TransportError> {
    let addr = format!("{}:{}", host, port);
    let deadline = Instant::now() + limit;

    let mut stream = match timeout_at(deadline, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(TransportError::ConnectFailed {
                addr,
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(TransportError::ConnectFailed {
                addr,
                reason: format!("no answer within {:?}", limit),
            })
        }
    };

    trace!(addr = %addr, bytes = message.len(), "connected, writing request");

    match timeout_at(deadline, stream.write_all(message.as_bytes())).await {
        Ok(Ok(())) => {}
        Ok(Err(source)) => return Err(TransportError::Io { addr, source }),
        Err(_) => {
            return Err(TransportError::Timeout {
                addr,
                timeout: limit,
            })
        }
    }

    let mut buffer = [0u8; REPLY_BUFFER_SIZE];
    let read = match timeout_at(deadline, stream.read(&mut buffer)).await {
        Ok(Ok(read)) => read,
        Ok(Err(source)) => return Err(TransportError::Io { addr, source }),
        Err(_) => {
            return Err(TransportError::Timeout {
                addr,
                timeout: limit,
            })
        }
    };

    trace!(addr = %addr, bytes = read, "reply received");

    // A chunk boundary can split a multi-byte character; keep what decodes
    Ok(String::from_utf8_lossy(&buffer[..read]).into_owned())
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport for exercising the dispatcher, poller and controller.

    use super::{Transport, TransportError};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Canned outcome for one call
    pub(crate) enum Reply {
        Text(String),
        Refused,
    }

    /// A call seen by the transport
    #[derive(Debug, Clone)]
    pub(crate) struct SentRequest {
        pub message: String,
        pub sent_at: Instant,
    }

    /// Replays queued replies, falling back to a fixed one when the queue is empty.
    /// Each call takes `delay` of (tokio) time before answering.
    pub(crate) struct ScriptedTransport {
        replies: Mutex<VecDeque<(Reply, Duration)>>,
        fallback: String,
        delay: Duration,
        sent: Mutex<Vec<SentRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(fallback: &str) -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                fallback: fallback.to_string(),
                delay: Duration::ZERO,
                sent: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn push(&self, reply: Reply, delay: Duration) {
            self.replies.lock().unwrap().push_back((reply, delay));
        }

        pub(crate) fn sent(&self) -> Vec<SentRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn send<'a>(
            &'a self,
            host: &'a str,
            port: u16,
            message: &'a str,
            timeout: Duration,
        ) -> BoxFuture<'a, Result<String, TransportError>> {
            self.sent.lock().unwrap().push(SentRequest {
                message: message.to_string(),
                sent_at: Instant::now(),
            });
            let next = self.replies.lock().unwrap().pop_front();
            let (reply, delay) =
                next.unwrap_or_else(|| (Reply::Text(self.fallback.clone()), self.delay));
            let addr = format!("{}:{}", host, port);

            async move {
                tokio::time::sleep(delay.min(timeout)).await;
                match reply {
                    Reply::Text(text) => Ok(text),
                    Reply::Refused => Err(TransportError::ConnectFailed {
                        addr,
                        reason: "connection refused".to_string(),
                    }),
                }
            }
            .boxed()
        }
    }
}
