use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Key uniquely identifying a managed resource instance.
///
/// Two resources of different kinds may share a name (e.g. an SKS cluster
/// and a database both called `prod`); they have distinct identities.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub kind: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

impl FromStr for ResourceIdentity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((kind, name)) if !kind.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(kind, name))
            }
            _ => Err(CoreError::InvalidIdentity(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let id = ResourceIdentity::new("SksCluster", "c1");
        assert_eq!(id.to_string(), "SksCluster/c1");
        assert_eq!("SksCluster/c1".parse::<ResourceIdentity>().unwrap(), id);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("c1".parse::<ResourceIdentity>().is_err());
        assert!("/c1".parse::<ResourceIdentity>().is_err());
        assert!("SksCluster/".parse::<ResourceIdentity>().is_err());
        assert!("a/b/c".parse::<ResourceIdentity>().is_err());
    }
}
