use crate::cloud::sdk::eks::SweeperAwsSdkEks;
use crate::cloud::sdk::sdk_datetime_to_utc;
use crate::events::{EngineEvent, EventDetails, EventMessage, InventoryStep, Stage, Transmitter};
use crate::inventory::{EksCluster, EksNodeGroup};
use crate::logger::Logger;
use crate::models::{AccountContext, ResourceKind, ResourceRef};
use aws_types::SdkConfig;
use std::collections::BTreeMap;

/// Discovers every cluster in the region and eagerly hydrates its nodegroups
/// with scaling config, instance types and status.
pub async fn discover_clusters(
    config: &SdkConfig,
    ctx: &AccountContext,
    logger: &dyn Logger,
) -> Result<Vec<EksCluster>, String> {
    let cluster_names = config.list_all_clusters().await.map_err(|e| format!("{e:?}"))?;

    let mut clusters = Vec::with_capacity(cluster_names.len());
    for cluster_name in cluster_names {
        let details = EventDetails::new(
            ctx,
            Stage::Inventory(InventoryStep::Discover),
            Transmitter::Resource(ResourceKind::Cluster, cluster_name.clone()),
        );

        let described = match config.describe_cluster(&cluster_name).await {
            Ok(output) => output,
            Err(e) => {
                logger.log(EngineEvent::Warning(
                    details,
                    EventMessage::new(
                        format!("cannot describe cluster {cluster_name}, skipping it"),
                        Some(format!("{e:?}")),
                    ),
                ));
                continue;
            }
        };
        let Some(cluster) = described.cluster else {
            continue;
        };

        let tags: BTreeMap<String, String> = cluster
            .tags()
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let mut resource = ResourceRef::new(ResourceKind::Cluster, cluster_name.clone(), cluster_name.clone(), ctx)
            .with_tags(tags)
            .with_created_at(cluster.created_at().and_then(sdk_datetime_to_utc));
        if let Some(status) = cluster.status() {
            resource = resource.with_state(status.as_str());
        }

        let nodegroups = hydrate_nodegroups(config, ctx, &cluster_name, logger).await;
        let addons = hydrate_addons(config, ctx, &cluster_name, logger).await;

        clusters.push(EksCluster {
            resource,
            vpc_id: cluster
                .resources_vpc_config()
                .and_then(|c| c.vpc_id())
                .map(str::to_string),
            version: cluster.version().map(str::to_string),
            nodegroups,
            addons,
        });
    }

    Ok(clusters)
}

async fn hydrate_nodegroups(
    config: &SdkConfig,
    ctx: &AccountContext,
    cluster_name: &str,
    logger: &dyn Logger,
) -> Vec<EksNodeGroup> {
    let details = EventDetails::new(
        ctx,
        Stage::Inventory(InventoryStep::Discover),
        Transmitter::Resource(ResourceKind::Cluster, cluster_name.to_string()),
    );

    let names = match config.list_all_nodegroups(cluster_name).await {
        Ok(names) => names,
        Err(e) => {
            logger.log(EngineEvent::Warning(
                details,
                EventMessage::new(
                    format!("cannot list nodegroups of {cluster_name}"),
                    Some(format!("{e:?}")),
                ),
            ));
            return Vec::new();
        }
    };

    let mut nodegroups = Vec::with_capacity(names.len());
    for nodegroup_name in names {
        let described = match config.describe_nodegroup(cluster_name, &nodegroup_name).await {
            Ok(output) => output,
            Err(e) => {
                logger.log(EngineEvent::Warning(
                    details.clone(),
                    EventMessage::new(
                        format!("cannot describe nodegroup {nodegroup_name} of {cluster_name}"),
                        Some(format!("{e:?}")),
                    ),
                ));
                continue;
            }
        };
        let Some(nodegroup) = described.nodegroup else {
            continue;
        };

        let tags: BTreeMap<String, String> = nodegroup
            .tags()
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let mut resource =
            ResourceRef::new(ResourceKind::NodeGroup, nodegroup_name.clone(), nodegroup_name.clone(), ctx)
                .with_tags(tags)
                .with_created_at(nodegroup.created_at().and_then(sdk_datetime_to_utc));
        if let Some(status) = nodegroup.status() {
            resource = resource.with_state(status.as_str());
        }

        let scaling = nodegroup.scaling_config();
        nodegroups.push(EksNodeGroup {
            resource,
            cluster_name: cluster_name.to_string(),
            desired_size: scaling.and_then(|s| s.desired_size()),
            min_size: scaling.and_then(|s| s.min_size()),
            max_size: scaling.and_then(|s| s.max_size()),
            instance_types: nodegroup.instance_types().to_vec(),
        });
    }

    nodegroups
}

async fn hydrate_addons(
    config: &SdkConfig,
    ctx: &AccountContext,
    cluster_name: &str,
    logger: &dyn Logger,
) -> Vec<ResourceRef> {
    match config.list_all_addons(cluster_name).await {
        Ok(names) => names
            .into_iter()
            .map(|addon_name| {
                ResourceRef::new(
                    ResourceKind::Addon,
                    format!("{cluster_name}/{addon_name}"),
                    addon_name,
                    ctx,
                )
            })
            .collect(),
        Err(e) => {
            let details = EventDetails::new(
                ctx,
                Stage::Inventory(InventoryStep::Discover),
                Transmitter::Resource(ResourceKind::Cluster, cluster_name.to_string()),
            );
            logger.log(EngineEvent::Warning(
                details,
                EventMessage::new(
                    format!("cannot list add-ons of {cluster_name}"),
                    Some(format!("{e:?}")),
                ),
            ));
            Vec::new()
        }
    }
}
