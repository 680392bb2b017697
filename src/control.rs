//! Core facade handed to the presentation layer.
//!
//! Concurrent dispatches to the same target are not sequenced: whichever
//! reply is recorded last becomes the displayed status, even if it was sent
//! first. Every write also goes out as a `StatusEvent`, so observers see each
//! reply in arrival order.

use crate::dispatcher::Dispatcher;
use crate::protocol::Verb;
use crate::registry::{Registry, RegistryError, StatusEvent, TargetSnapshot};
use crate::tasks::{spawn_command, start_poll_task};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct Controller {
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    shutdown: watch::Sender<bool>,
    poll_tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Controller {
    pub fn new(registry: Arc<Registry>, dispatcher: Dispatcher) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            dispatcher,
            shutdown,
            poll_tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start one poll loop per target. Targets that already have one are skipped.
    pub fn start_polling(&self) {
        let mut tasks = match self.poll_tasks.lock() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        };

        for target in self.registry.targets() {
            if tasks.contains_key(target.id()) {
                continue;
            }
            info!(
                target_id = %target.id(),
                host = %target.address(),
                interval = target.poll_interval(),
                "Starting status polling"
            );
            let handle = start_poll_task(
                Arc::clone(target),
                self.dispatcher.clone(),
                self.shutdown.subscribe(),
            );
            tasks.insert(target.id().to_string(), handle);
        }
    }

    /// Number of live poll loops
    pub fn active_pollers(&self) -> usize {
        match self.poll_tasks.lock() {
            Ok(tasks) => tasks.values().filter(|h| !h.is_finished()).count(),
            Err(poisoned) => poisoned.into_inner().values().filter(|h| !h.is_finished()).count(),
        }
    }

    /// Fire-and-forget command; the reply lands in the target's status
    pub fn trigger_command(&self, id: &str, verb: Verb) -> Result<JoinHandle<()>, RegistryError> {
        let target = self.registry.get(id)?;
        Ok(spawn_command(target, self.dispatcher.clone(), verb))
    }

    pub fn get_status(&self, id: &str) -> Result<String, RegistryError> {
        Ok(self.registry.get(id)?.status())
    }

    pub fn set_poll_interval(&self, id: &str, input: &str) -> Result<u64, RegistryError> {
        self.registry.get(id)?.set_poll_interval(input)
    }

    pub fn set_command(&self, id: &str, command: String) -> Result<(), RegistryError> {
        self.registry.get(id)?.set_command(command);
        Ok(())
    }

    pub fn snapshot(&self, id: &str) -> Result<TargetSnapshot, RegistryError> {
        Ok(self.registry.get(id)?.snapshot())
    }

    pub fn snapshots(&self) -> Vec<TargetSnapshot> {
        self.registry.snapshots()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.registry.subscribe()
    }

    /// Receiver that flips to `true` once a stop has been requested
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Flip the stop signal without waiting. Poll loops stop scheduling ticks
    /// and event streams close.
    pub fn request_stop(&self) {
        // send_replace stores the value even when nobody is subscribed yet
        self.shutdown.send_replace(true);
    }

    /// Stop scheduling new polls and wait for in-flight ones to finish
    pub async fn shutdown(&self) {
        self.request_stop();

        let handles: Vec<_> = match self.poll_tasks.lock() {
            Ok(mut tasks) => tasks.drain().collect(),
            Err(poisoned) => poisoned.into_inner().drain().collect(),
        };

        for (id, handle) in handles {
            if let Err(e) = handle.await {
                error!(target_id = %id, "Poll task ended abnormally: {}", e);
            }
        }
    }
}
