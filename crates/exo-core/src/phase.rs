use std::fmt;

use serde::{Deserialize, Serialize};

use crate::condition::{reason, ConditionType};
use crate::record::ResourceRecord;

/// Lifecycle phase, derived from conditions and deletion metadata.
///
/// Never stored: every reconcile re-observes the remote and rewrites the
/// conditions this is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecyclePhase {
    Unobserved,
    Creating,
    Available,
    Updating,
    Deleting,
    Gone,
}

impl LifecyclePhase {
    pub fn of(record: &ResourceRecord) -> Self {
        if record.is_deleting() {
            return if record.has_finalizer() {
                Self::Deleting
            } else {
                Self::Gone
            };
        }

        let conditions = &record.status.conditions;
        match conditions.get(ConditionType::READY) {
            Some(_) if conditions.is_true(ConditionType::READY) => Self::Available,
            Some(ready) if ready.reason == reason::CREATING => Self::Creating,
            Some(ready) if ready.reason == reason::UPDATING => Self::Updating,
            Some(ready) if ready.reason == reason::DELETING => Self::Deleting,
            _ => Self::Unobserved,
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Unobserved => "Unobserved",
            Self::Creating => "Creating",
            Self::Available => "Available",
            Self::Updating => "Updating",
            Self::Deleting => "Deleting",
            Self::Gone => "Gone",
        };
        f.write_str(s)
    }
}
