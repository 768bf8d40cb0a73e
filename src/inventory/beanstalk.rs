use crate::cloud::sdk::beanstalk::SweeperAwsSdkBeanstalk;
use crate::cloud::sdk::sdk_datetime_to_utc;
use crate::events::{EngineEvent, EventDetails, EventMessage, InventoryStep, Stage, Transmitter};
use crate::inventory::{AppEnvironmentRecord, ApplicationRecord};
use crate::logger::Logger;
use crate::models::{AccountContext, ResourceKind, ResourceRef};
use aws_types::SdkConfig;

pub async fn discover_applications(
    config: &SdkConfig,
    ctx: &AccountContext,
    logger: &dyn Logger,
) -> Result<Vec<ApplicationRecord>, String> {
    let applications = config.list_applications().await.map_err(|e| format!("{e:?}"))?;

    let mut records = Vec::with_capacity(applications.len());
    for application in applications {
        let Some(application_name) = application.application_name() else {
            continue;
        };
        let details = EventDetails::new(
            ctx,
            Stage::Inventory(InventoryStep::Discover),
            Transmitter::Resource(ResourceKind::Application, application_name.to_string()),
        );

        let environments = match config.list_environments(application_name).await {
            Ok(environments) => environments
                .into_iter()
                .filter_map(|env| {
                    let id = env.environment_id()?.to_string();
                    let name = env.environment_name().unwrap_or(&id).to_string();

                    let mut resource = ResourceRef::new(ResourceKind::AppEnvironment, id, name, ctx)
                        .with_created_at(env.date_created().and_then(sdk_datetime_to_utc));
                    if let Some(status) = env.status() {
                        resource = resource.with_state(status.as_str());
                    }

                    Some(AppEnvironmentRecord {
                        resource,
                        application_name: application_name.to_string(),
                    })
                })
                .collect(),
            Err(e) => {
                logger.log(EngineEvent::Warning(
                    details.clone(),
                    EventMessage::new(
                        format!("cannot list environments of application {application_name}"),
                        Some(format!("{e:?}")),
                    ),
                ));
                Vec::new()
            }
        };

        let version_labels = match config.list_application_versions(application_name).await {
            Ok(versions) => versions
                .into_iter()
                .filter_map(|v| v.version_label().map(str::to_string))
                .collect(),
            Err(e) => {
                logger.log(EngineEvent::Warning(
                    details,
                    EventMessage::new(
                        format!("cannot list versions of application {application_name}"),
                        Some(format!("{e:?}")),
                    ),
                ));
                Vec::new()
            }
        };

        records.push(ApplicationRecord {
            resource: ResourceRef::new(
                ResourceKind::Application,
                application_name.to_string(),
                application_name.to_string(),
                ctx,
            )
            .with_created_at(application.date_created().and_then(sdk_datetime_to_utc)),
            environments,
            version_labels,
        });
    }

    Ok(records)
}
