use serde::{Deserialize, Serialize};

/// Reference to another API object by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SksCluster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cni: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodepools: Vec<SksNodepool>,
}

impl SksCluster {
    pub fn nodepool(&self, name: &str) -> Option<&SksNodepool> {
        self.nodepools.iter().find(|np| np.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SksNodepool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<IdRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private_networks: Vec<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SksClusterList {
    #[serde(rename = "sks-clusters", default)]
    pub clusters: Vec<SksCluster>,
}

/// Asynchronous operation handle returned by every mutating call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Operation {
    pub id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub reference: Option<IdRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateSksCluster {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaleNodepool {
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_cluster_list() {
        let list: SksClusterList = serde_json::from_value(json!({
            "sks-clusters": [{
                "id": "abc",
                "name": "c1",
                "cni": "calico",
                "level": "pro",
                "endpoint": "https://abc.sks-ch-gva-2.exo.io",
                "nodepools": [{"id": "np1", "name": "workers", "size": 3, "instance-type": {"id": "it"}}]
            }]
        }))
        .unwrap();

        let cluster = &list.clusters[0];
        assert_eq!(cluster.id.as_deref(), Some("abc"));
        assert_eq!(cluster.nodepool("workers").unwrap().size, 3);
        assert!(cluster.nodepool("other").is_none());
    }

    #[test]
    fn nodepool_request_uses_kebab_case() {
        let np = SksNodepool {
            name: "workers".into(),
            size: 2,
            instance_type: Some(IdRef::new("it")),
            disk_size: Some(50),
            ..Default::default()
        };
        let value = serde_json::to_value(&np).unwrap();
        assert_eq!(value["instance-type"]["id"], "it");
        assert_eq!(value["disk-size"], 50);
        assert!(value.get("security-groups").is_none());
    }
}
