use crate::api::constants::WILDCARD_METHOD;
use crate::api::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum RetryType {
    #[default]
    Failure = 0,
    Backup = 1,
}

/// Retry rule of one method. Exactly one of `failure_policy` and
/// `backup_policy` must be set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub enable: bool,
    #[serde(rename = "type", default)]
    pub retry_type: RetryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_policy: Option<BackupPolicy>,
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        let reason = match (&self.failure_policy, &self.backup_policy) {
            (Some(_), Some(_)) => "backup_policy and failure_policy must not be set at same time",
            (None, None) => "backup_policy and failure_policy must not be empty at same time",
            _ => return Ok(()),
        };
        Err(Error::Validation {
            subject: "retry policy".to_string(),
            reason: reason.to_string(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    pub stop_policy: StopPolicy,
    #[serde(rename = "backoff_policy", skip_serializing_if = "Option::is_none")]
    pub back_off_policy: Option<BackOffPolicy>,
    pub retry_same_node: bool,
    pub extra: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupPolicy {
    pub retry_delay_ms: u32,
    pub stop_policy: StopPolicy,
    pub retry_same_node: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopPolicy {
    pub max_retry_times: u32,
    pub max_duration_ms: u32,
    pub disable_chain_stop: bool,
    pub ddl_stop: bool,
    pub cb_policy: CbPolicy,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CbPolicy {
    pub error_rate: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackOffType {
    #[default]
    None,
    Fixed,
    Random,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BackOffPolicy {
    #[serde(rename = "backoff_type", default)]
    pub back_off_type: BackOffType,
    /// `fix_ms` for fixed backoff, `min_ms` and `max_ms` for random backoff.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cfg_items: HashMap<String, f64>,
}

pub trait RetryPolicySink: Send + Sync {
    /// Inserts or replaces the policy of `method`.
    fn notify_policy_change(&self, method: &str, policy: RetryPolicy);

    /// Drops the policy of `method`, it falls back to no retry.
    fn delete_policy(&self, method: &str);
}

/// Per-method retry policies, `*` matching methods without their own.
#[derive(Debug, Default)]
pub struct RetryContainer {
    policies: RwLock<HashMap<String, RetryPolicy>>,
}

impl RetryContainer {
    pub fn new() -> Self {
        RetryContainer::default()
    }

    /// Enabled policy for `method`, if any.
    pub fn policy(&self, method: &str) -> Option<RetryPolicy> {
        let policies = self.policies.read();
        policies
            .get(method)
            .or_else(|| policies.get(WILDCARD_METHOD))
            .filter(|policy| policy.enable)
            .cloned()
    }

    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.policies.read().keys().cloned().collect();
        methods.sort();
        methods
    }
}

impl RetryPolicySink for RetryContainer {
    fn notify_policy_change(&self, method: &str, policy: RetryPolicy) {
        self.policies.write().insert(method.to_string(), policy);
    }

    fn delete_policy(&self, method: &str) {
        self.policies.write().remove(method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAILURE: &str = r#"{
        "enable": true,
        "type": 0,
        "failure_policy": {
            "stop_policy": {"max_retry_times": 3, "max_duration_ms": 2000, "cb_policy": {"error_rate": 0.2}},
            "backoff_policy": {"backoff_type": "fixed", "cfg_items": {"fix_ms": 50}},
            "retry_same_node": false
        }
    }"#;

    #[test]
    fn test_decode_failure_policy() {
        let policy: RetryPolicy = serde_json::from_str(FAILURE).unwrap();
        assert!(policy.enable);
        assert_eq!(policy.retry_type, RetryType::Failure);
        let failure = policy.failure_policy.as_ref().unwrap();
        assert_eq!(failure.stop_policy.max_retry_times, 3);
        assert_eq!(failure.stop_policy.cb_policy.error_rate, 0.2);
        let backoff = failure.back_off_policy.as_ref().unwrap();
        assert_eq!(backoff.back_off_type, BackOffType::Fixed);
        assert_eq!(backoff.cfg_items.get("fix_ms"), Some(&50.0));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_decode_backup_policy() {
        let policy: RetryPolicy = serde_json::from_str(
            r#"{"enable": true, "type": 1, "backup_policy": {"retry_delay_ms": 100}}"#,
        )
        .unwrap();
        assert_eq!(policy.retry_type, RetryType::Backup);
        assert_eq!(policy.backup_policy.as_ref().unwrap().retry_delay_ms, 100);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_both_and_neither() {
        let mut policy = RetryPolicy {
            enable: true,
            failure_policy: Some(FailurePolicy::default()),
            backup_policy: Some(BackupPolicy::default()),
            ..Default::default()
        };
        assert!(matches!(policy.validate(), Err(Error::Validation { .. })));
        policy.failure_policy = None;
        policy.backup_policy = None;
        assert!(matches!(policy.validate(), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_container_wildcard_lookup() {
        let container = RetryContainer::new();
        let policy: RetryPolicy = serde_json::from_str(FAILURE).unwrap();
        container.notify_policy_change("*", policy.clone());
        assert_eq!(container.policy("Echo"), Some(policy.clone()));

        let disabled = RetryPolicy {
            enable: false,
            ..policy.clone()
        };
        container.notify_policy_change("Echo", disabled);
        assert_eq!(container.policy("Echo"), None);
        assert_eq!(container.methods(), vec!["*", "Echo"]);

        container.delete_policy("Echo");
        assert_eq!(container.policy("Echo"), Some(policy));
    }
}
