use crate::cloud::sdk::amp::SweeperAwsSdkAmp;
use crate::cloud::sdk::cloudwatch::SweeperAwsSdkCloudWatch;
use crate::cloud::sdk::eventbridge::SweeperAwsSdkEventBridge;
use crate::cloud::sdk::grafana::SweeperAwsSdkGrafana;
use crate::cloud::sdk::lambda::SweeperAwsSdkLambda;
use crate::cloud::sdk::logs::SweeperAwsSdkLogs;
use crate::events::{EngineEvent, EventDetails, EventMessage, InventoryStep, Stage, Transmitter};
use crate::inventory::{AlarmRecord, EventRuleRecord, FunctionRecord, LogGroupRecord, ScraperRecord, WorkspaceRecord};
use crate::logger::Logger;
use crate::models::{AccountContext, ResourceKind, ResourceRef};
use aws_types::SdkConfig;
use chrono::TimeZone;
use std::collections::BTreeMap;

fn tag_fetch_warning(
    ctx: &AccountContext,
    logger: &dyn Logger,
    kind: ResourceKind,
    id: &str,
    raw: String,
) {
    let details = EventDetails::new(
        ctx,
        Stage::Inventory(InventoryStep::Discover),
        Transmitter::Resource(kind, id.to_string()),
    );
    logger.log(EngineEvent::Warning(
        details,
        EventMessage::new(format!("cannot read tags of {kind} {id}"), Some(raw)),
    ));
}

pub async fn discover_functions(
    config: &SdkConfig,
    ctx: &AccountContext,
    logger: &dyn Logger,
) -> Result<Vec<FunctionRecord>, String> {
    let functions = config.list_all_functions().await.map_err(|e| format!("{e:?}"))?;

    let mut records = Vec::with_capacity(functions.len());
    for function in functions {
        let (Some(name), Some(arn)) = (function.function_name(), function.function_arn()) else {
            continue;
        };

        let tags: BTreeMap<String, String> = match config.list_function_tags(arn).await {
            Ok(tags) => tags.into_iter().collect(),
            Err(e) => {
                tag_fetch_warning(ctx, logger, ResourceKind::Function, name, format!("{e:?}"));
                BTreeMap::new()
            }
        };

        records.push(FunctionRecord {
            resource: ResourceRef::new(ResourceKind::Function, name.to_string(), name.to_string(), ctx)
                .with_tags(tags),
            arn: arn.to_string(),
        });
    }

    Ok(records)
}

pub async fn discover_event_rules(
    config: &SdkConfig,
    ctx: &AccountContext,
    logger: &dyn Logger,
) -> Result<Vec<EventRuleRecord>, String> {
    let rules = config.list_all_rules().await.map_err(|e| format!("{e:?}"))?;

    let mut records = Vec::with_capacity(rules.len());
    for rule in rules {
        let (Some(name), Some(arn)) = (rule.name(), rule.arn()) else {
            continue;
        };

        let tags: BTreeMap<String, String> = match config.list_rule_tags(arn).await {
            Ok(tags) => tags
                .iter()
                .map(|t| (t.key().to_string(), t.value().to_string()))
                .collect(),
            Err(e) => {
                tag_fetch_warning(ctx, logger, ResourceKind::EventRule, name, format!("{e:?}"));
                BTreeMap::new()
            }
        };

        records.push(EventRuleRecord {
            resource: ResourceRef::new(ResourceKind::EventRule, name.to_string(), name.to_string(), ctx)
                .with_tags(tags),
            arn: arn.to_string(),
            description: rule.description().unwrap_or_default().to_string(),
        });
    }

    Ok(records)
}

pub async fn discover_alarms(
    config: &SdkConfig,
    ctx: &AccountContext,
    logger: &dyn Logger,
) -> Result<Vec<AlarmRecord>, String> {
    let alarms = config.list_all_alarms().await.map_err(|e| format!("{e:?}"))?;

    let mut records = Vec::with_capacity(alarms.basic.len() + alarms.composite.len());

    for alarm in alarms.composite {
        let (Some(name), Some(arn)) = (alarm.alarm_name(), alarm.alarm_arn()) else {
            continue;
        };
        let tags = fetch_alarm_tags(config, ctx, logger, name, arn).await;

        records.push(AlarmRecord {
            resource: ResourceRef::new(ResourceKind::Alarm, name.to_string(), name.to_string(), ctx).with_tags(tags),
            arn: arn.to_string(),
            description: alarm.alarm_description().unwrap_or_default().to_string(),
            is_composite: true,
            dimensions: BTreeMap::new(),
        });
    }

    for alarm in alarms.basic {
        let (Some(name), Some(arn)) = (alarm.alarm_name(), alarm.alarm_arn()) else {
            continue;
        };
        let tags = fetch_alarm_tags(config, ctx, logger, name, arn).await;

        records.push(AlarmRecord {
            resource: ResourceRef::new(ResourceKind::Alarm, name.to_string(), name.to_string(), ctx).with_tags(tags),
            arn: arn.to_string(),
            description: alarm.alarm_description().unwrap_or_default().to_string(),
            is_composite: false,
            dimensions: alarm
                .dimensions()
                .iter()
                .map(|d| (d.name().unwrap_or_default().to_string(), d.value().unwrap_or_default().to_string()))
                .collect(),
        });
    }

    Ok(records)
}

async fn fetch_alarm_tags(
    config: &SdkConfig,
    ctx: &AccountContext,
    logger: &dyn Logger,
    name: &str,
    arn: &str,
) -> BTreeMap<String, String> {
    match config.list_alarm_tags(arn).await {
        Ok(tags) => tags
            .iter()
            .map(|t| (t.key().unwrap_or_default().to_string(), t.value().unwrap_or_default().to_string()))
            .collect(),
        Err(e) => {
            tag_fetch_warning(ctx, logger, ResourceKind::Alarm, name, format!("{e:?}"));
            BTreeMap::new()
        }
    }
}

pub async fn discover_log_groups(
    config: &SdkConfig,
    ctx: &AccountContext,
    _logger: &dyn Logger,
) -> Result<Vec<LogGroupRecord>, String> {
    let groups = config.list_log_groups(None).await.map_err(|e| format!("{e:?}"))?;

    let mut records = Vec::with_capacity(groups.len());
    for group in groups {
        let Some(name) = group.log_group_name() else {
            continue;
        };

        let created_at = group
            .creation_time()
            .and_then(|millis| chrono::Utc.timestamp_millis_opt(millis).single());
        records.push(LogGroupRecord {
            resource: ResourceRef::new(ResourceKind::LogGroup, name.to_string(), name.to_string(), ctx)
                .with_created_at(created_at),
        });
    }

    Ok(records)
}

pub async fn discover_scrapers(
    config: &SdkConfig,
    ctx: &AccountContext,
    _logger: &dyn Logger,
) -> Result<Vec<ScraperRecord>, String> {
    let scrapers = config.list_all_scrapers().await.map_err(|e| format!("{e:?}"))?;

    Ok(scrapers
        .into_iter()
        .map(|scraper| {
            let id = scraper.scraper_id().to_string();
            let name = scraper.alias().unwrap_or(scraper.scraper_id()).to_string();
            let tags: BTreeMap<String, String> = scraper
                .tags()
                .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();

            ScraperRecord {
                resource: ResourceRef::new(ResourceKind::Scraper, id, name, ctx).with_tags(tags),
            }
        })
        .collect())
}

pub async fn discover_workspaces(
    config: &SdkConfig,
    ctx: &AccountContext,
    _logger: &dyn Logger,
) -> Result<Vec<WorkspaceRecord>, String> {
    let workspaces = config.list_all_workspaces().await.map_err(|e| format!("{e:?}"))?;

    Ok(workspaces
        .into_iter()
        .map(|workspace| {
            let id = workspace.id().to_string();
            let name = workspace.name().unwrap_or(workspace.id()).to_string();
            let tags: BTreeMap<String, String> = workspace
                .tags()
                .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();

            WorkspaceRecord {
                resource: ResourceRef::new(ResourceKind::Workspace, id, name, ctx).with_tags(tags),
            }
        })
        .collect())
}
