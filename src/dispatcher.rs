use crate::protocol::{Command, Verb};
use crate::registry::TargetEntry;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Timeout applied to every connect, write and read
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Formats commands for a target and runs them over a transport.
///
/// Dispatch never fails: transport errors come back as `"Error: <description>"`
/// so they can be displayed exactly like a remote status.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Send `verb` to the target using the command payload in effect right now
    pub async fn dispatch(&self, target: &TargetEntry, verb: Verb) -> String {
        let command = Command::new(verb, target.command());
        self.send(target.address(), target.port(), &command).await
    }

    /// Send a prepared command to an explicit endpoint
    pub async fn send(&self, host: &str, port: u16, command: &Command) -> String {
        info!(
            host = %host,
            port = port,
            verb = %command.verb,
            payload = %command.payload,
            "Sending command"
        );

        match self
            .transport
            .send(host, port, &command.encode(), self.timeout)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(host = %host, port = port, verb = %command.verb, error = %e, "Command failed");
                format!("Error: {}", e)
            }
        }
    }
}
