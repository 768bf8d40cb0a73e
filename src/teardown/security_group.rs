use crate::classifier::TeardownTarget;
use crate::cloud::sdk::ec2::SweeperAwsSdkEc2;
use crate::constants::{
    SECURITY_GROUP_DELETE_MAX_ROUNDS, SECURITY_GROUP_ROUND_PAUSE, SECURITY_GROUP_RULE_PROPAGATION_PAUSE,
    SHARED_SECURITY_GROUP_INTERFACE_THRESHOLD,
};
use crate::errors::EngineError;
use crate::events::{EngineEvent, EventDetails, EventMessage, Stage, TeardownStep, Transmitter};
use crate::logger::Logger;
use crate::models::{AccountContext, ResourceKind, ResourceRef, RunContext};
use crate::teardown::{OutcomeRecord, ResourceOutcome};
use aws_sdk_ec2::types::IpPermission;
use aws_types::SdkConfig;

/// The provider's implicit allow-all egress rule; never revoked.
pub fn is_default_egress_rule(rule: &IpPermission) -> bool {
    rule.ip_protocol() == Some("-1")
        && rule.ip_ranges().len() == 1
        && rule.ip_ranges()[0].cidr_ip() == Some("0.0.0.0/0")
        && rule.user_id_group_pairs().is_empty()
        && rule.prefix_list_ids().is_empty()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StripSummary {
    pub revoked: usize,
    pub failed: usize,
    /// The group disappeared mid-pass; treated as a successful strip.
    pub group_missing: bool,
}

fn strip_details(ctx: &AccountContext, group_id: &str) -> EventDetails {
    EventDetails::new(
        ctx,
        Stage::Teardown(TeardownStep::StripRules),
        Transmitter::Resource(ResourceKind::SecurityGroup, group_id.to_string()),
    )
}

/// Revokes every ingress rule and every non-default egress rule of one
/// group, rule by rule so cross-references cannot wedge the whole pass.
/// `InvalidPermission.NotFound` counts as success, `InvalidGroupId.NotFound`
/// ends the pass successfully. A propagation pause follows any revocation.
pub async fn strip_rules(
    config: &SdkConfig,
    ctx: &AccountContext,
    group_id: &str,
    run: &RunContext,
    logger: &dyn Logger,
) -> Result<StripSummary, Box<EngineError>> {
    let details = strip_details(ctx, group_id);

    let group = config
        .get_security_group(group_id)
        .await
        .map_err(|e| Box::new(EngineError::new_from_aws_sdk_error(details.clone(), "DescribeSecurityGroups", &e)))?;
    let Some(group) = group else {
        return Ok(StripSummary {
            group_missing: true,
            ..Default::default()
        });
    };

    let mut summary = StripSummary::default();

    for rule in group.ip_permissions() {
        match config.revoke_ingress_rule(group_id, rule.clone()).await {
            Ok(_) => summary.revoked += 1,
            Err(e) => {
                let err = EngineError::new_from_aws_sdk_error(details.clone(), "RevokeSecurityGroupIngress", &e);
                match revoke_error_effect(&err) {
                    RevokeEffect::AlreadyGone => summary.revoked += 1,
                    RevokeEffect::GroupMissing => {
                        summary.group_missing = true;
                        return Ok(summary);
                    }
                    RevokeEffect::Failed => {
                        logger.log(EngineEvent::Warning(
                            details.clone(),
                            EventMessage::new("cannot revoke ingress rule".to_string(), Some(err.to_string())),
                        ));
                        summary.failed += 1;
                    }
                }
            }
        }
    }

    for rule in group.ip_permissions_egress() {
        if is_default_egress_rule(rule) {
            continue;
        }
        match config.revoke_egress_rule(group_id, rule.clone()).await {
            Ok(_) => summary.revoked += 1,
            Err(e) => {
                let err = EngineError::new_from_aws_sdk_error(details.clone(), "RevokeSecurityGroupEgress", &e);
                match revoke_error_effect(&err) {
                    RevokeEffect::AlreadyGone => summary.revoked += 1,
                    RevokeEffect::GroupMissing => {
                        summary.group_missing = true;
                        return Ok(summary);
                    }
                    RevokeEffect::Failed => {
                        logger.log(EngineEvent::Warning(
                            details.clone(),
                            EventMessage::new("cannot revoke egress rule".to_string(), Some(err.to_string())),
                        ));
                        summary.failed += 1;
                    }
                }
            }
        }
    }

    if summary.revoked > 0 {
        // let the revocations propagate before anyone tries a delete
        tokio::select! {
            _ = run.cancel.cancelled() => {}
            _ = tokio::time::sleep(SECURITY_GROUP_RULE_PROPAGATION_PAUSE) => {}
        }
    }

    Ok(summary)
}

enum RevokeEffect {
    AlreadyGone,
    GroupMissing,
    Failed,
}

fn revoke_error_effect(err: &EngineError) -> RevokeEffect {
    // NotFound covers both InvalidPermission.NotFound and
    // InvalidGroupId.NotFound; tell them apart on the raw code.
    if !err.is_not_found() {
        return RevokeEffect::Failed;
    }
    let raw = err
        .underlying_error()
        .map(|e| e.message_safe())
        .unwrap_or_default();
    if raw.contains("InvalidGroupId.NotFound") {
        RevokeEffect::GroupMissing
    } else {
        RevokeEffect::AlreadyGone
    }
}

/// Deletes a set of cross-referencing groups by iterating strip+delete
/// rounds. A group that still reports `DependencyViolation` stays in the
/// next round's list; survivors after the round cap are recorded as failed
/// with their residual rule counts.
pub async fn delete_security_groups_iteratively(
    config: &SdkConfig,
    ctx: &AccountContext,
    target: &TeardownTarget,
    groups: Vec<ResourceRef>,
    run: &RunContext,
    logger: &dyn Logger,
) -> Vec<OutcomeRecord> {
    let mut outcomes = Vec::with_capacity(groups.len());
    let mut remaining = groups;

    for round in 1..=SECURITY_GROUP_DELETE_MAX_ROUNDS {
        if remaining.is_empty() || run.is_cancelled() {
            break;
        }

        // strip phase first, across the whole list: cross-referencing
        // groups only become deletable once every side has lost its rules
        let mut gone_while_stripping: Vec<String> = Vec::new();
        for group in &remaining {
            match strip_rules(config, ctx, &group.id, run, logger).await {
                Ok(summary) if summary.group_missing => gone_while_stripping.push(group.id.clone()),
                Ok(_) => {}
                Err(err) => {
                    let details = EventDetails::new(
                        ctx,
                        Stage::Teardown(TeardownStep::StripRules),
                        Transmitter::Resource(ResourceKind::SecurityGroup, group.id.clone()),
                    );
                    logger.log(EngineEvent::Warning(
                        details,
                        EventMessage::new(
                            format!("rule strip failed for {} (round {round}), delete attempted anyway", group.id),
                            Some(err.to_string()),
                        ),
                    ));
                }
            }
        }

        let mut next_round = Vec::new();
        let mut deleted_this_round = 0usize;

        for group in remaining.drain(..) {
            let details = EventDetails::new(
                ctx,
                Stage::Teardown(TeardownStep::Delete),
                Transmitter::Resource(ResourceKind::SecurityGroup, group.id.clone()),
            );

            if gone_while_stripping.contains(&group.id) {
                outcomes.push(OutcomeRecord::new(group, ResourceOutcome::Deleted));
                deleted_this_round += 1;
                continue;
            }

            // live recheck: a group serving many interfaces is shared no
            // matter what classification thought
            match config.count_network_interfaces_using_group(&group.id).await {
                Ok(count) if count > SHARED_SECURITY_GROUP_INTERFACE_THRESHOLD => {
                    outcomes.push(OutcomeRecord::new(
                        group,
                        ResourceOutcome::SkippedShared {
                            reason: format!("still referenced by {count} network interfaces"),
                        },
                    ));
                    continue;
                }
                _ => {}
            }

            match config.delete_security_group(&group.id).await {
                Ok(_) => {
                    logger.log(EngineEvent::Info(
                        details,
                        EventMessage::new_from_safe(format!("deleted security group {} ({})", group.id, group.name)),
                    ));
                    outcomes.push(OutcomeRecord::new(group, ResourceOutcome::Deleted));
                    deleted_this_round += 1;
                }
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(details.clone(), "DeleteSecurityGroup", &e);
                    if err.is_not_found() {
                        outcomes.push(OutcomeRecord::new(group, ResourceOutcome::Deleted));
                        deleted_this_round += 1;
                    } else if err.is_dependency_violation() {
                        logger.log(EngineEvent::Info(
                            details,
                            EventMessage::new_from_safe(format!(
                                "security group {} still in use, queued for round {}",
                                group.id,
                                round + 1
                            )),
                        ));
                        next_round.push(group);
                    } else {
                        outcomes.push(OutcomeRecord::new(
                            group,
                            ResourceOutcome::FailedPermanent {
                                error: err.to_string(),
                            },
                        ));
                    }
                }
            }
        }

        remaining = next_round;
        if remaining.is_empty() {
            break;
        }

        if deleted_this_round == 0 {
            logger.log(EngineEvent::Info(
                EventDetails::new(ctx, Stage::Teardown(TeardownStep::Delete), Transmitter::Engine),
                EventMessage::new_from_safe(format!(
                    "round {round} deleted nothing, {} groups go into another strip pass",
                    remaining.len()
                )),
            ));
        }

        if round < SECURITY_GROUP_DELETE_MAX_ROUNDS {
            tokio::select! {
                _ = run.cancel.cancelled() => break,
                _ = tokio::time::sleep(SECURITY_GROUP_ROUND_PAUSE) => {}
            }
        }
    }

    // survivors failed for good; attach their residual rule counts
    for group in remaining {
        let residual = match config.get_security_group(&group.id).await {
            Ok(Some(live)) => format!(
                "{} ingress / {} egress rules left",
                live.ip_permissions().len(),
                live.ip_permissions_egress().len()
            ),
            _ => "residual rules unknown".to_string(),
        };
        outcomes.push(OutcomeRecord::new(
            group,
            ResourceOutcome::FailedPermanent {
                error: format!(
                    "still in use after {SECURITY_GROUP_DELETE_MAX_ROUNDS} strip+delete rounds against {}; {residual}",
                    target.match_name()
                ),
            },
        ));
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{IpRange, PrefixListId, UserIdGroupPair};

    fn allow_all_egress() -> IpPermission {
        IpPermission::builder()
            .ip_protocol("-1")
            .ip_ranges(IpRange::builder().cidr_ip("0.0.0.0/0").build())
            .build()
    }

    #[test]
    fn test_default_egress_rule_is_recognized() {
        assert!(is_default_egress_rule(&allow_all_egress()));
    }

    #[test]
    fn test_scoped_rules_are_not_default() {
        // narrower protocol
        let tcp = IpPermission::builder()
            .ip_protocol("tcp")
            .from_port(443)
            .to_port(443)
            .ip_ranges(IpRange::builder().cidr_ip("0.0.0.0/0").build())
            .build();
        assert!(!is_default_egress_rule(&tcp));

        // narrower peer
        let scoped = IpPermission::builder()
            .ip_protocol("-1")
            .ip_ranges(IpRange::builder().cidr_ip("10.0.0.0/8").build())
            .build();
        assert!(!is_default_egress_rule(&scoped));

        // group peer on top of the open range
        let with_peer = IpPermission::builder()
            .ip_protocol("-1")
            .ip_ranges(IpRange::builder().cidr_ip("0.0.0.0/0").build())
            .user_id_group_pairs(UserIdGroupPair::builder().group_id("sg-1").build())
            .build();
        assert!(!is_default_egress_rule(&with_peer));

        // prefix list on top of the open range
        let with_prefix = IpPermission::builder()
            .ip_protocol("-1")
            .ip_ranges(IpRange::builder().cidr_ip("0.0.0.0/0").build())
            .prefix_list_ids(PrefixListId::builder().prefix_list_id("pl-1").build())
            .build();
        assert!(!is_default_egress_rule(&with_prefix));

        // two open ranges is not the single default rule
        let doubled = IpPermission::builder()
            .ip_protocol("-1")
            .ip_ranges(IpRange::builder().cidr_ip("0.0.0.0/0").build())
            .ip_ranges(IpRange::builder().cidr_ip("0.0.0.0/0").build())
            .build();
        assert!(!is_default_egress_rule(&doubled));
    }
}
