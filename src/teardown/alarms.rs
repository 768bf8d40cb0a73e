use crate::cloud::sdk::cloudwatch::SweeperAwsSdkCloudWatch;
use crate::constants::ALARM_DELETE_BATCH_SIZE;
use crate::errors::EngineError;
use crate::events::{EngineEvent, EventDetails, EventMessage, Stage, TeardownStep, Transmitter};
use crate::logger::Logger;
use crate::models::{AccountContext, ResourceKind, ResourceRef, RunContext};
use crate::teardown::{with_transient_retries, OutcomeRecord, ResourceOutcome};
use aws_types::SdkConfig;

fn delete_details(ctx: &AccountContext, name: &str) -> EventDetails {
    EventDetails::new(
        ctx,
        Stage::Teardown(TeardownStep::Delete),
        Transmitter::Resource(ResourceKind::Alarm, name.to_string()),
    )
}

/// Deletes a run of alarms in batches of up to 100 names. A failed batch
/// falls back to one-by-one deletion so a single poisoned name cannot sink
/// its whole batch. `ResourceNotFound` is idempotent success.
pub async fn delete_alarms_batched(
    config: &SdkConfig,
    ctx: &AccountContext,
    alarms: Vec<ResourceRef>,
    run: &RunContext,
    logger: &dyn Logger,
) -> Vec<OutcomeRecord> {
    let mut outcomes = Vec::with_capacity(alarms.len());

    for batch in alarms.chunks(ALARM_DELETE_BATCH_SIZE) {
        let names: Vec<String> = batch.iter().map(|a| a.id.clone()).collect();
        let batch_details = delete_details(ctx, &names.join(","));

        let batch_result = with_transient_retries(&run.cancel, || {
            let names = names.clone();
            let batch_details = batch_details.clone();
            async move {
                config
                    .delete_alarm_batch(names)
                    .await
                    .map_err(|e| Box::new(EngineError::new_from_aws_sdk_error(batch_details, "DeleteAlarms", &e)))
            }
        })
        .await;

        match batch_result {
            Ok(_) => {
                for alarm in batch {
                    outcomes.push(OutcomeRecord::new(alarm.clone(), ResourceOutcome::Deleted));
                }
            }
            Err(err) if err.is_not_found() => {
                for alarm in batch {
                    outcomes.push(OutcomeRecord::new(alarm.clone(), ResourceOutcome::Deleted));
                }
            }
            Err(err) => {
                logger.log(EngineEvent::Warning(
                    batch_details,
                    EventMessage::new(
                        format!("batch delete of {} alarms failed, falling back to singles", batch.len()),
                        Some(err.to_string()),
                    ),
                ));
                for alarm in batch {
                    outcomes.push(OutcomeRecord::new(
                        alarm.clone(),
                        delete_single_alarm(config, ctx, alarm, run).await,
                    ));
                }
            }
        }
    }

    outcomes
}

pub async fn delete_single_alarm(
    config: &SdkConfig,
    ctx: &AccountContext,
    alarm: &ResourceRef,
    run: &RunContext,
) -> ResourceOutcome {
    let details = delete_details(ctx, &alarm.id);

    let result = with_transient_retries(&run.cancel, || {
        let details = details.clone();
        let name = alarm.id.clone();
        async move {
            config
                .delete_alarm_batch(vec![name])
                .await
                .map_err(|e| Box::new(EngineError::new_from_aws_sdk_error(details, "DeleteAlarms", &e)))
        }
    })
    .await;

    match result {
        Ok(_) => ResourceOutcome::Deleted,
        Err(err) if err.is_not_found() => ResourceOutcome::Deleted,
        Err(err) => ResourceOutcome::FailedPermanent {
            error: err.to_string(),
        },
    }
}
