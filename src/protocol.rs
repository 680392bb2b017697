//! Wire format shared with the remote process supervisor.
//!
//! A request is plain UTF-8 text `"<verb>:<payload>"`. Only the first colon
//! separates the verb from the payload, so payloads may contain colons of
//! their own. Replies are free-form text whose trailing words carry the run
//! state of the script.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Suffix the supervisor appends when a script is stopped
pub const NOT_RUNNING_SUFFIX: &str = "Not Running";
/// Suffix the supervisor appends when a script is alive
pub const RUNNING_SUFFIX: &str = "Running";

/// Action requested from the remote supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Start,
    Stop,
    Status,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Status => "status",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Verb::Start),
            "stop" => Ok(Verb::Stop),
            "status" => Ok(Verb::Status),
            other => Err(format!("Unknown verb: {}", other)),
        }
    }
}

/// One outbound instruction, built fresh for every dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub payload: String,
}

impl Command {
    pub fn new(verb: Verb, payload: impl Into<String>) -> Self {
        Self {
            verb,
            payload: payload.into(),
        }
    }

    /// Serialize to the request text sent on the wire
    pub fn encode(&self) -> String {
        format!("{}:{}", self.verb, self.payload)
    }

    /// Parse a request the way the supervisor does: split on the first colon only.
    /// Only the loopback supervisors in tests read requests.
    #[cfg(test)]
    pub(crate) fn decode(request: &str) -> Result<Self, String> {
        let (verb, payload) = request
            .split_once(':')
            .ok_or_else(|| format!("Missing ':' separator in request: {}", request))?;
        Ok(Self::new(verb.parse()?, payload))
    }
}

/// Presentation category derived from a raw status string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Running,
    NotRunning,
    Unknown,
}

impl StatusCategory {
    /// Classify a reply (or a locally synthesized error string).
    ///
    /// `"Not Running"` also ends with `"Running"`, so it must be matched first.
    pub fn classify(reply: &str) -> Self {
        if reply.ends_with(NOT_RUNNING_SUFFIX) {
            StatusCategory::NotRunning
        } else if reply.ends_with(RUNNING_SUFFIX) {
            StatusCategory::Running
        } else {
            StatusCategory::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_start_command() {
        let command = Command::new(Verb::Start, "runX --port 5000");
        assert_eq!(command.encode(), "start:runX --port 5000");
    }

    #[test]
    fn test_decode_splits_on_first_colon_only() {
        let command = Command::new(Verb::Status, "python cam.py --url http://10.0.0.5:8080");
        let decoded = Command::decode(&command.encode()).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn test_decode_empty_payload() {
        let decoded = Command::decode("stop:").unwrap();
        assert_eq!(decoded.verb, Verb::Stop);
        assert_eq!(decoded.payload, "");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Command::decode("status").is_err());
        assert!(Command::decode("restart:foo").is_err());
    }

    #[test]
    fn test_classify_not_running_takes_precedence() {
        assert_eq!(
            StatusCategory::classify("Camera Stream: Not Running"),
            StatusCategory::NotRunning
        );
        assert_eq!(StatusCategory::classify("Not Running"), StatusCategory::NotRunning);
    }

    #[test]
    fn test_classify_running() {
        assert_eq!(
            StatusCategory::classify("Camera Stream: Running"),
            StatusCategory::Running
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(StatusCategory::classify("Unknown"), StatusCategory::Unknown);
        assert_eq!(StatusCategory::classify(""), StatusCategory::Unknown);
        assert_eq!(
            StatusCategory::classify("Error: connection refused"),
            StatusCategory::Unknown
        );
        // Trailing text after the state word is not tolerated
        assert_eq!(StatusCategory::classify("Running\n"), StatusCategory::Unknown);
        assert_eq!(StatusCategory::classify("running"), StatusCategory::Unknown);
    }

    #[test]
    fn test_verb_round_trip_through_str() {
        for verb in [Verb::Start, Verb::Stop, Verb::Status] {
            assert_eq!(verb.as_str().parse::<Verb>().unwrap(), verb);
        }
    }
}
