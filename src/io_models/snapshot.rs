use crate::models::ResourceKind;
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot file `{path}` cannot be read: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Snapshot file `{path}` is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Snapshot file `{path}` cannot be written: {source}")]
    Unwritable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A stored inventory snapshot for one service, keyed by resource id. Written
/// by the `inventory` operation, consumed by the cost engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub service: String,
    pub written_at: DateTime<Utc>,
    pub resources: BTreeMap<String, SnapshotRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub kind: ResourceKind,
    pub name: String,
    pub account_name: String,
    pub account_id: String,
    pub region: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: Option<String>,
    /// EC2 only.
    #[serde(default)]
    pub instance_type: Option<String>,
    /// EC2 only: sum of attached volume sizes.
    #[serde(default)]
    pub attached_volume_gb: Option<i64>,
    /// EKS only.
    #[serde(default)]
    pub nodegroups: Vec<NodeGroupSnapshot>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGroupSnapshot {
    pub name: String,
    pub desired_size: i32,
    #[serde(default)]
    pub instance_types: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl SnapshotRecord {
    pub fn from_instance(instance: &crate::inventory::Ec2Instance) -> (String, Self) {
        let resource = &instance.resource;
        (
            resource.id.clone(),
            SnapshotRecord {
                kind: resource.kind,
                name: resource.name.clone(),
                account_name: resource.account_name.clone(),
                account_id: resource.account_id.clone(),
                region: resource.region.clone(),
                created_at: resource.created_at,
                state: resource.state.clone(),
                instance_type: instance.instance_type.clone(),
                attached_volume_gb: None,
                nodegroups: Vec::new(),
                tags: resource.tags.clone(),
            },
        )
    }

    pub fn from_cluster(cluster: &crate::inventory::EksCluster) -> (String, Self) {
        let resource = &cluster.resource;
        (
            resource.id.clone(),
            SnapshotRecord {
                kind: resource.kind,
                name: resource.name.clone(),
                account_name: resource.account_name.clone(),
                account_id: resource.account_id.clone(),
                region: resource.region.clone(),
                created_at: resource.created_at,
                state: resource.state.clone(),
                instance_type: None,
                attached_volume_gb: None,
                nodegroups: cluster
                    .nodegroups
                    .iter()
                    .map(|ng| NodeGroupSnapshot {
                        name: ng.resource.name.clone(),
                        desired_size: ng.desired_size.unwrap_or(0),
                        instance_types: ng.instance_types.clone(),
                        created_at: ng.resource.created_at,
                    })
                    .collect(),
                tags: resource.tags.clone(),
            },
        )
    }
}

impl InventorySnapshot {
    pub fn new(service: impl Into<String>) -> Self {
        InventorySnapshot {
            service: service.into(),
            written_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SnapshotError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SnapshotError::Malformed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let unwritable = |source| SnapshotError::Unwritable {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(unwritable)?;
        }
        let payload = serde_json::to_string_pretty(self).expect("snapshot is always serializable");
        std::fs::write(path, payload).map_err(unwritable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> InventorySnapshot {
        let mut snapshot = InventorySnapshot::new("eks");
        snapshot.resources.insert(
            "eks-demo-abcd".to_string(),
            SnapshotRecord {
                kind: ResourceKind::Cluster,
                name: "eks-demo-abcd".to_string(),
                account_name: "sandbox".to_string(),
                account_id: "123456789012".to_string(),
                region: "us-east-1".to_string(),
                created_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
                state: Some("ACTIVE".to_string()),
                instance_type: None,
                attached_volume_gb: None,
                nodegroups: vec![NodeGroupSnapshot {
                    name: "ng-a".to_string(),
                    desired_size: 2,
                    instance_types: vec!["t3.medium".to_string()],
                    created_at: None,
                }],
                tags: BTreeMap::new(),
            },
        );
        snapshot
    }

    #[test]
    fn test_snapshot_round_trip_on_disk() {
        // setup:
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eks").join("inventory.json");
        let snapshot = sample();

        // execute:
        snapshot.save(&path).unwrap();
        let loaded = InventorySnapshot::load(&path).unwrap();

        // verify:
        assert_eq!(loaded.service, "eks");
        let record = loaded.resources.get("eks-demo-abcd").unwrap();
        assert_eq!(record.kind, ResourceKind::Cluster);
        assert_eq!(record.nodegroups.len(), 1);
        assert_eq!(record.nodegroups[0].desired_size, 2);
    }

    #[test]
    fn test_malformed_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();

        assert!(matches!(
            InventorySnapshot::load(&path),
            Err(SnapshotError::Malformed { .. })
        ));
    }
}
