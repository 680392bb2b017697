//! Target registry: the single owner of every remote-controllable script.
//!
//! Workers only ever write a target's `status`; the presentation side only
//! ever edits `command` and `poll_interval`. Each field is its own slot, so no
//! multi-field locking is needed.

use crate::config::HostConfig;
use crate::protocol::{StatusCategory, Verb};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Status shown before the first reply arrives
pub const INITIAL_STATUS: &str = "Unknown";

/// Capacity of the status change channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Target with id '{0}' not found")]
    UnknownTarget(String),

    #[error("Invalid interval '{0}', please enter a positive integer")]
    InvalidInterval(String),
}

/// Notification published every time a target's status is written
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub target_id: String,
    pub host_name: String,
    pub status: String,
    pub category: StatusCategory,
    /// Command that produced this status
    pub verb: Verb,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time copy of a target, for display
#[derive(Debug, Clone, Serialize)]
pub struct TargetSnapshot {
    pub id: String,
    pub host_name: String,
    pub address: String,
    pub port: u16,
    pub command: String,
    pub status: String,
    pub category: StatusCategory,
    pub poll_interval: u64,
}

/// One script on one remote host
#[derive(Debug)]
pub struct TargetEntry {
    id: String,
    host_name: String,
    address: String,
    port: u16,
    command: RwLock<String>,
    status: RwLock<String>,
    poll_interval: AtomicU64,
    events: broadcast::Sender<StatusEvent>,
}

impl TargetEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Command payload currently in effect
    pub fn command(&self) -> String {
        read_slot(&self.command)
    }

    pub fn set_command(&self, command: String) {
        write_slot(&self.command, command);
    }

    /// Last known raw status
    pub fn status(&self) -> String {
        read_slot(&self.status)
    }

    pub fn poll_interval(&self) -> u64 {
        self.poll_interval.load(Ordering::SeqCst)
    }

    /// Store a new status (last writer wins) and notify subscribers
    pub fn record_status(&self, verb: Verb, status: String) {
        let category = StatusCategory::classify(&status);
        debug!(
            target_id = %self.id,
            verb = %verb,
            category = ?category,
            "status updated: {}", status
        );
        write_slot(&self.status, status.clone());

        // No subscribers is fine; the slot above is the source of truth
        let _ = self.events.send(StatusEvent {
            target_id: self.id.clone(),
            host_name: self.host_name.clone(),
            status,
            category,
            verb,
            timestamp: Utc::now(),
        });
    }

    /// Validate and apply a new interval. Invalid input keeps the old value.
    pub fn set_poll_interval(&self, input: &str) -> Result<u64, RegistryError> {
        let seconds = parse_interval(input)?;
        self.poll_interval.store(seconds, Ordering::SeqCst);
        Ok(seconds)
    }

    pub fn snapshot(&self) -> TargetSnapshot {
        let status = self.status();
        TargetSnapshot {
            id: self.id.clone(),
            host_name: self.host_name.clone(),
            address: self.address.clone(),
            port: self.port,
            command: self.command(),
            category: StatusCategory::classify(&status),
            status,
            poll_interval: self.poll_interval(),
        }
    }
}

/// Parse user input as a strictly positive number of seconds
pub fn parse_interval(input: &str) -> Result<u64, RegistryError> {
    match input.trim().parse::<i64>() {
        Ok(seconds) if seconds > 0 => Ok(seconds as u64),
        _ => Err(RegistryError::InvalidInterval(input.to_string())),
    }
}

/// Fixed set of targets built at startup, in configuration order
pub struct Registry {
    targets: Vec<Arc<TargetEntry>>,
    by_id: HashMap<String, Arc<TargetEntry>>,
    events: broadcast::Sender<StatusEvent>,
}

impl Registry {
    pub fn from_hosts(hosts: &[HostConfig]) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut targets = Vec::new();

        for host in hosts {
            for script in &host.scripts {
                let id = if script.id.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    script.id.clone()
                };

                targets.push(Arc::new(TargetEntry {
                    id,
                    host_name: host.name.clone(),
                    address: host.address.clone(),
                    port: host.port,
                    command: RwLock::new(script.command.clone()),
                    status: RwLock::new(INITIAL_STATUS.to_string()),
                    poll_interval: AtomicU64::new(script.poll_interval),
                    events: events.clone(),
                }));
            }
        }

        let by_id = targets
            .iter()
            .map(|t| (t.id.clone(), Arc::clone(t)))
            .collect();

        Self {
            targets,
            by_id,
            events,
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<TargetEntry>, RegistryError> {
        self.by_id
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTarget(id.to_string()))
    }

    pub fn targets(&self) -> &[Arc<TargetEntry>] {
        &self.targets
    }

    pub fn snapshots(&self) -> Vec<TargetSnapshot> {
        self.targets.iter().map(|t| t.snapshot()).collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }
}

fn read_slot(slot: &RwLock<String>) -> String {
    // A panicked writer cannot leave a String half-written, so poison is ignored
    match slot.read() {
        Ok(value) => value.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write_slot(slot: &RwLock<String>, value: String) {
    match slot.write() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

#[cfg(test)]
pub(crate) fn test_registry(poll_interval: u64) -> Registry {
    use crate::config::ScriptConfig;

    Registry::from_hosts(&[HostConfig {
        name: "Pi 1".to_string(),
        address: "127.0.0.1".to_string(),
        port: 5005,
        scripts: vec![ScriptConfig {
            id: "cam".to_string(),
            command: "python /home/pi/camStreamer.py --port 5000".to_string(),
            poll_interval,
        }],
    }])
}
