use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Condition type. `Ready` and `Synced` are managed by the engine; adapters
/// may publish their own types next to them.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionType(String);

impl ConditionType {
    pub const READY: &'static str = "Ready";
    pub const SYNCED: &'static str = "Synced";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn ready() -> Self {
        Self::new(Self::READY)
    }

    pub fn synced() -> Self {
        Self::new(Self::SYNCED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Well-known condition reasons.
pub mod reason {
    // Ready
    pub const AVAILABLE: &str = "Available";
    pub const CREATING: &str = "Creating";
    pub const UPDATING: &str = "Updating";
    pub const DELETING: &str = "Deleting";

    // Synced
    pub const RECONCILE_SUCCESS: &str = "ReconcileSuccess";
    pub const CONNECT_ERROR: &str = "ConnectError";
    pub const OBSERVE_ERROR: &str = "ObserveError";
    pub const CREATE_ERROR: &str = "CreateError";
    pub const UPDATE_ERROR: &str = "UpdateError";
    pub const DELETE_ERROR: &str = "DeleteError";
    pub const PUBLISH_ERROR: &str = "PublishError";
    pub const RECONCILE_TIMEOUT: &str = "ReconcileTimeout";
}

/// Typed status flag with a machine reason and a human message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub last_transition_time: Timestamp,
}

impl Condition {
    pub fn new(condition_type: ConditionType, status: ConditionStatus, reason: &str) -> Self {
        Self {
            condition_type,
            status,
            reason: reason.to_string(),
            message: String::new(),
            last_transition_time: Timestamp::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// The external resource is usable.
    pub fn available() -> Self {
        Self::new(ConditionType::ready(), ConditionStatus::True, reason::AVAILABLE)
    }

    pub fn creating() -> Self {
        Self::new(ConditionType::ready(), ConditionStatus::False, reason::CREATING)
    }

    pub fn updating() -> Self {
        Self::new(ConditionType::ready(), ConditionStatus::False, reason::UPDATING)
    }

    pub fn deleting() -> Self {
        Self::new(ConditionType::ready(), ConditionStatus::False, reason::DELETING)
    }

    /// The last reconcile completed without error.
    pub fn reconcile_success() -> Self {
        Self::new(
            ConditionType::synced(),
            ConditionStatus::True,
            reason::RECONCILE_SUCCESS,
        )
    }

    /// The last reconcile failed at the step named by `reason`.
    pub fn reconcile_error(reason: &str, message: impl Into<String>) -> Self {
        Self::new(ConditionType::synced(), ConditionStatus::False, reason).with_message(message)
    }

    /// Equal in everything but the transition time.
    pub fn equivalent(&self, other: &Condition) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// At most one condition per type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(Vec<Condition>);

impl ConditionSet {
    /// Insert or replace the condition of the same type.
    ///
    /// The previous transition time is kept when the status did not change,
    /// so a steady `Ready=True` keeps reporting when it first became true.
    pub fn set(&mut self, mut condition: Condition) {
        match self
            .0
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                *existing = condition;
            }
            None => self.0.push(condition),
        }
    }

    pub fn get(&self, condition_type: &str) -> Option<&Condition> {
        self.0
            .iter()
            .find(|c| c.condition_type.as_str() == condition_type)
    }

    pub fn is_true(&self, condition_type: &str) -> bool {
        self.get(condition_type)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    pub fn remove(&mut self, condition_type: &str) -> Option<Condition> {
        let idx = self
            .0
            .iter()
            .position(|c| c.condition_type.as_str() == condition_type)?;
        Some(self.0.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_by_type() {
        let mut set = ConditionSet::default();
        set.set(Condition::creating());
        set.set(Condition::reconcile_success());
        set.set(Condition::available());

        assert_eq!(set.len(), 2);
        assert!(set.is_true(ConditionType::READY));
        assert_eq!(
            set.get(ConditionType::READY).unwrap().reason,
            reason::AVAILABLE
        );
    }

    #[test]
    fn unchanged_status_keeps_transition_time() {
        let mut set = ConditionSet::default();
        let mut first = Condition::reconcile_success();
        first.last_transition_time = Timestamp::UNIX_EPOCH;
        set.set(first);

        set.set(Condition::reconcile_success());
        assert_eq!(
            set.get(ConditionType::SYNCED).unwrap().last_transition_time,
            Timestamp::UNIX_EPOCH
        );

        set.set(Condition::reconcile_error(reason::CREATE_ERROR, "boom"));
        let synced = set.get(ConditionType::SYNCED).unwrap();
        assert_ne!(synced.last_transition_time, Timestamp::UNIX_EPOCH);
        assert_eq!(synced.message, "boom");
    }

    #[test]
    fn adapter_defined_types_coexist() {
        let mut set = ConditionSet::default();
        set.set(Condition::available());
        set.set(Condition::new(
            ConditionType::new("NodepoolReady"),
            ConditionStatus::Unknown,
            "Scaling",
        ));
        assert_eq!(set.len(), 2);
        assert!(set.remove("NodepoolReady").is_some());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn serializes_type_field() {
        let json = serde_json::to_value(Condition::available()).unwrap();
        assert_eq!(json["type"], "Ready");
        assert_eq!(json["status"], "True");
        assert!(json.get("message").is_none());
    }
}
