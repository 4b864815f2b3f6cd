use pesa_types::request::Operation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-operation call deadlines, in seconds.
///
/// Auth calls get a longer default than payment calls. Any operation can be
/// overridden individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    #[serde(default = "defaults::default_secs")]
    pub default_secs: u64,
    #[serde(default = "defaults::auth_secs")]
    pub auth_secs: u64,
    #[serde(default)]
    pub operations: HashMap<Operation, u64>,
}

mod defaults {
    pub fn default_secs() -> u64 {
        10
    }

    pub fn auth_secs() -> u64 {
        30
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default_secs: defaults::default_secs(),
            auth_secs: defaults::auth_secs(),
            operations: HashMap::new(),
        }
    }
}

impl Timeouts {
    pub fn for_operation(&self, operation: Operation) -> Duration {
        let secs = match self.operations.get(&operation) {
            Some(secs) => *secs,
            None if operation == Operation::Auth => self.auth_secs,
            None => self.default_secs,
        };
        Duration::from_secs(secs)
    }
}
