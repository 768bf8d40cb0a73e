pub mod rates;

use crate::cloud::sdk::ec2::SweeperAwsSdkEc2;
use crate::cloud::sdk::eks::SweeperAwsSdkEks;
use crate::cloud::sdk::sdk_datetime_to_utc;
use crate::io_models::snapshot::SnapshotRecord;
use crate::models::{ResourceKind, ResourceRef};
use chrono::{DateTime, Utc};
use rates::RateTable;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hours in the provider's billing month, used to prorate monthly storage
/// rates.
const HOURS_PER_BILLING_MONTH: f64 = 730.0;

/// Accrued cost of one resource at `computed_at`. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub subject: ResourceRef,
    pub uptime_hours: f64,
    pub hourly_rate: f64,
    pub compute_cost: f64,
    pub storage_cost: f64,
    pub control_plane_cost: f64,
    pub total_cost: f64,
    pub computed_at: DateTime<Utc>,
    /// False when the control plane no longer knows the resource; no accrual
    /// is charged in that case.
    pub live_found: bool,
}

/// Live control-plane state of an instance at cost-computation time.
#[derive(Debug, Clone)]
pub struct LiveInstanceState {
    pub state: String,
    pub launch_time: Option<DateTime<Utc>>,
}

/// Live control-plane state of a cluster at cost-computation time.
#[derive(Debug, Clone, Default)]
pub struct LiveClusterState {
    pub created_at: Option<DateTime<Utc>>,
    /// Current desired size per nodegroup name.
    pub nodegroup_desired: BTreeMap<String, i32>,
}

fn money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn uptime_hours(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match since {
        Some(since) if since < now => (now - since).num_seconds() as f64 / 3600.0,
        _ => 0.0,
    }
}

fn subject_from_snapshot(id: &str, record: &SnapshotRecord) -> ResourceRef {
    ResourceRef {
        kind: record.kind,
        id: id.to_string(),
        name: record.name.clone(),
        account_name: record.account_name.clone(),
        account_id: record.account_id.clone(),
        region: record.region.clone(),
        tags: record.tags.clone(),
        created_at: record.created_at,
        state: record.state.clone(),
    }
}

/// Instance accrual: compute = uptime x type rate while running, storage =
/// attached GB prorated against the monthly gp3 rate. A snapshot entry the
/// control plane no longer knows accrues nothing.
pub fn compute_instance_cost(
    id: &str,
    record: &SnapshotRecord,
    live: Option<&LiveInstanceState>,
    table: &RateTable,
    now: DateTime<Utc>,
) -> CostRecord {
    let subject = subject_from_snapshot(id, record);
    let hourly_rate = record
        .instance_type
        .as_deref()
        .map(|t| table.instance_rate(t))
        .unwrap_or(0.0);

    let Some(live) = live else {
        // metadata keeps the snapshot launch time; accrual is zero
        return CostRecord {
            subject,
            uptime_hours: 0.0,
            hourly_rate,
            compute_cost: 0.0,
            storage_cost: 0.0,
            control_plane_cost: 0.0,
            total_cost: 0.0,
            computed_at: now,
            live_found: false,
        };
    };

    let launch_time = live.launch_time.or(record.created_at);
    let uptime = uptime_hours(launch_time, now);

    // compute accrual halts once the instance leaves the running state;
    // storage keeps accruing on the attached volumes
    let compute_cost = if live.state == "running" {
        money(uptime * hourly_rate)
    } else {
        0.0
    };
    let storage_cost = record
        .attached_volume_gb
        .map(|gb| money(gb as f64 * table.gp3_monthly_per_gb * (uptime / HOURS_PER_BILLING_MONTH)))
        .unwrap_or(0.0);

    CostRecord {
        subject,
        uptime_hours: money(uptime),
        hourly_rate,
        compute_cost,
        storage_cost,
        control_plane_cost: 0.0,
        total_cost: money(compute_cost + storage_cost),
        computed_at: now,
        live_found: true,
    }
}

/// Cluster accrual: control plane at the configured fixed rate, nodegroups at
/// the instance rule times the current desired size (live when available,
/// snapshot otherwise).
pub fn compute_cluster_cost(
    id: &str,
    record: &SnapshotRecord,
    live: Option<&LiveClusterState>,
    table: &RateTable,
    now: DateTime<Utc>,
) -> CostRecord {
    let subject = subject_from_snapshot(id, record);

    let Some(live) = live else {
        return CostRecord {
            subject,
            uptime_hours: 0.0,
            hourly_rate: table.cluster_control_plane_hourly,
            compute_cost: 0.0,
            storage_cost: 0.0,
            control_plane_cost: 0.0,
            total_cost: 0.0,
            computed_at: now,
            live_found: false,
        };
    };

    let created_at = live.created_at.or(record.created_at);
    let uptime = uptime_hours(created_at, now);
    let control_plane_cost = money(uptime * table.cluster_control_plane_hourly);

    let mut compute_cost = 0.0;
    for nodegroup in &record.nodegroups {
        let desired = live
            .nodegroup_desired
            .get(&nodegroup.name)
            .copied()
            .unwrap_or(nodegroup.desired_size);
        if desired <= 0 || nodegroup.instance_types.is_empty() {
            continue;
        }

        let nodegroup_uptime = uptime_hours(nodegroup.created_at.or(created_at), now);
        // spread across the declared types, the provider picks among them
        let per_node_rate = nodegroup
            .instance_types
            .iter()
            .map(|t| table.instance_rate(t))
            .sum::<f64>()
            / nodegroup.instance_types.len() as f64;
        compute_cost += nodegroup_uptime * per_node_rate * desired as f64;
    }
    let compute_cost = money(compute_cost);

    CostRecord {
        subject,
        uptime_hours: money(uptime),
        hourly_rate: table.cluster_control_plane_hourly,
        compute_cost,
        storage_cost: 0.0,
        control_plane_cost,
        total_cost: money(compute_cost + control_plane_cost),
        computed_at: now,
        live_found: true,
    }
}

/// Bulk live instance lookup: one region-wide describe, keyed by the ids the
/// snapshot asks about. Ids the control plane no longer knows stay absent.
pub async fn live_instance_states(
    config: &aws_types::SdkConfig,
    instance_ids: &[String],
) -> BTreeMap<String, LiveInstanceState> {
    let Ok(instances) = config.list_all_instances().await else {
        return BTreeMap::new();
    };

    let mut states = BTreeMap::new();
    for instance in instances {
        let Some(id) = instance.instance_id() else {
            continue;
        };
        if !instance_ids.iter().any(|wanted| wanted == id) {
            continue;
        }
        states.insert(
            id.to_string(),
            LiveInstanceState {
                state: instance
                    .state()
                    .and_then(|s| s.name())
                    .map(|n| n.as_str().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                launch_time: instance.launch_time().and_then(sdk_datetime_to_utc),
            },
        );
    }
    states
}

/// Bulk live cluster lookup with per-nodegroup desired sizes.
pub async fn live_cluster_states(
    config: &aws_types::SdkConfig,
    cluster_names: &[String],
) -> BTreeMap<String, LiveClusterState> {
    let mut states = BTreeMap::new();

    for cluster_name in cluster_names {
        let Ok(described) = config.describe_cluster(cluster_name).await else {
            continue;
        };
        let Some(cluster) = described.cluster else {
            continue;
        };

        let mut state = LiveClusterState {
            created_at: cluster.created_at().and_then(sdk_datetime_to_utc),
            nodegroup_desired: BTreeMap::new(),
        };

        if let Ok(names) = config.list_all_nodegroups(cluster_name).await {
            for name in names {
                if let Ok(output) = config.describe_nodegroup(cluster_name, &name).await {
                    if let Some(desired) = output
                        .nodegroup()
                        .and_then(|n| n.scaling_config())
                        .and_then(|s| s.desired_size())
                    {
                        state.nodegroup_desired.insert(name, desired);
                    }
                }
            }
        }

        states.insert(cluster_name.clone(), state);
    }

    states
}

/// Computes one record per snapshot entry. `live_instances` and
/// `live_clusters` map ids to live state; absence means not found live.
pub fn compute_costs(
    snapshot: &BTreeMap<String, SnapshotRecord>,
    live_instances: &BTreeMap<String, LiveInstanceState>,
    live_clusters: &BTreeMap<String, LiveClusterState>,
    table: &RateTable,
    now: DateTime<Utc>,
) -> Vec<CostRecord> {
    let mut records = Vec::with_capacity(snapshot.len());

    for (id, record) in snapshot {
        match record.kind {
            ResourceKind::Instance => {
                records.push(compute_instance_cost(id, record, live_instances.get(id), table, now));
            }
            ResourceKind::Cluster => {
                records.push(compute_cluster_cost(id, record, live_clusters.get(id), table, now));
            }
            _ => {}
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_models::snapshot::{NodeGroupSnapshot, SnapshotRecord};
    use chrono::Duration;
    use maplit::btreemap;

    fn table() -> RateTable {
        RateTable {
            instance_hourly: btreemap! {
                "t3.medium".to_string() => 0.0416,
                "m5.large".to_string() => 0.096,
            },
            cluster_control_plane_hourly: 0.65,
            gp3_monthly_per_gb: 0.08,
        }
    }

    fn instance_record(created_hours_ago: i64, now: DateTime<Utc>) -> SnapshotRecord {
        SnapshotRecord {
            kind: ResourceKind::Instance,
            name: "demo-runner".to_string(),
            account_name: "sandbox".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            created_at: Some(now - Duration::hours(created_hours_ago)),
            state: Some("running".to_string()),
            instance_type: Some("t3.medium".to_string()),
            attached_volume_gb: Some(100),
            nodegroups: vec![],
            tags: Default::default(),
        }
    }

    #[test]
    fn test_running_instance_accrues_compute_and_storage() {
        let now = Utc::now();
        let record = instance_record(10, now);
        let live = LiveInstanceState {
            state: "running".to_string(),
            launch_time: record.created_at,
        };

        let cost = compute_instance_cost("i-xyz", &record, Some(&live), &table(), now);

        assert!(cost.live_found);
        assert_eq!(cost.uptime_hours, 10.0);
        assert_eq!(cost.compute_cost, money(10.0 * 0.0416));
        assert_eq!(cost.storage_cost, money(100.0 * 0.08 * (10.0 / 730.0)));
        assert_eq!(cost.total_cost, money(cost.compute_cost + cost.storage_cost));
    }

    #[test]
    fn test_stopped_instance_accrues_storage_only() {
        let now = Utc::now();
        let record = instance_record(48, now);
        let live = LiveInstanceState {
            state: "stopped".to_string(),
            launch_time: record.created_at,
        };

        let cost = compute_instance_cost("i-xyz", &record, Some(&live), &table(), now);

        assert_eq!(cost.compute_cost, 0.0);
        assert!(cost.storage_cost > 0.0);
    }

    #[test]
    fn test_stale_snapshot_instance_accrues_nothing() {
        // snapshot 48h old, live describe no longer knows the id
        let now = Utc::now();
        let record = instance_record(48, now);

        let cost = compute_instance_cost("i-xyz", &record, None, &table(), now);

        assert!(!cost.live_found);
        assert_eq!(cost.total_cost, 0.0);
        // metadata still carries the snapshot launch time
        assert_eq!(cost.subject.created_at, record.created_at);
    }

    #[test]
    fn test_cluster_cost_uses_live_desired_size() {
        let now = Utc::now();
        let record = SnapshotRecord {
            kind: ResourceKind::Cluster,
            name: "eks-demo-abcd".to_string(),
            account_name: "sandbox".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            created_at: Some(now - Duration::hours(100)),
            state: Some("ACTIVE".to_string()),
            instance_type: None,
            attached_volume_gb: None,
            nodegroups: vec![NodeGroupSnapshot {
                name: "ng-a".to_string(),
                desired_size: 2,
                instance_types: vec!["m5.large".to_string()],
                created_at: Some(now - Duration::hours(100)),
            }],
            tags: Default::default(),
        };
        let live = LiveClusterState {
            created_at: record.created_at,
            // autoscaler grew the group since the snapshot
            nodegroup_desired: btreemap! { "ng-a".to_string() => 3 },
        };

        let cost = compute_cluster_cost("eks-demo-abcd", &record, Some(&live), &table(), now);

        assert_eq!(cost.control_plane_cost, money(100.0 * 0.65));
        assert_eq!(cost.compute_cost, money(100.0 * 0.096 * 3.0));
        assert_eq!(cost.total_cost, money(cost.control_plane_cost + cost.compute_cost));
    }

    #[test]
    fn test_cluster_absent_live_flags_not_found() {
        let now = Utc::now();
        let record = SnapshotRecord {
            kind: ResourceKind::Cluster,
            name: "eks-demo-abcd".to_string(),
            account_name: "sandbox".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            created_at: Some(now - Duration::hours(5)),
            state: None,
            instance_type: None,
            attached_volume_gb: None,
            nodegroups: vec![],
            tags: Default::default(),
        };

        let cost = compute_cluster_cost("eks-demo-abcd", &record, None, &table(), now);

        assert!(!cost.live_found);
        assert_eq!(cost.compute_cost, 0.0);
        assert_eq!(cost.total_cost, 0.0);
    }

    #[test]
    fn test_compute_costs_dispatches_by_kind() {
        let now = Utc::now();
        let snapshot = btreemap! {
            "i-xyz".to_string() => instance_record(10, now),
        };

        let records = compute_costs(&snapshot, &BTreeMap::new(), &BTreeMap::new(), &table(), now);

        assert_eq!(records.len(), 1);
        assert!(!records[0].live_found);
    }
}
