use crate::errors::{EngineError, ErrorMessageVerbosity};
use crate::models::{AccountContext, ResourceKind};
use std::fmt::{Display, Formatter};

/// EngineEvent: represents an event happening in the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Debug(EventDetails, EventMessage),
    Info(EventDetails, EventMessage),
    Warning(EventDetails, EventMessage),
    Error(EngineError, Option<EventMessage>),
}

impl EngineEvent {
    pub fn get_details(&self) -> &EventDetails {
        match self {
            EngineEvent::Debug(details, _message) => details,
            EngineEvent::Info(details, _message) => details,
            EngineEvent::Warning(details, _message) => details,
            EngineEvent::Error(engine_error, _message) => engine_error.event_details(),
        }
    }

    pub fn message(&self, verbosity: EventMessageVerbosity) -> String {
        match self {
            EngineEvent::Debug(_details, message) => message.message(verbosity),
            EngineEvent::Info(_details, message) => message.message(verbosity),
            EngineEvent::Warning(_details, message) => message.message(verbosity),
            EngineEvent::Error(engine_error, _message) => engine_error.message(verbosity.into()),
        }
    }
}

/// EventMessageVerbosity: represents event message's verbosity from minimal to full verbosity.
pub enum EventMessageVerbosity {
    SafeOnly,
    FullDetails,
}

impl From<EventMessageVerbosity> for ErrorMessageVerbosity {
    fn from(verbosity: EventMessageVerbosity) -> Self {
        match verbosity {
            EventMessageVerbosity::SafeOnly => ErrorMessageVerbosity::SafeOnly,
            EventMessageVerbosity::FullDetails => ErrorMessageVerbosity::FullDetails,
        }
    }
}

/// EventMessage: an event message split into a safe part and full details
/// which may carry raw provider error text.
#[derive(Debug, Clone)]
pub struct EventMessage {
    safe_message: String,
    full_details: Option<String>,
}

impl EventMessage {
    pub fn new(safe_message: String, full_details: Option<String>) -> Self {
        EventMessage {
            safe_message,
            full_details,
        }
    }

    pub fn new_from_safe(safe_message: String) -> Self {
        EventMessage {
            safe_message,
            full_details: None,
        }
    }

    pub fn message(&self, verbosity: EventMessageVerbosity) -> String {
        match verbosity {
            EventMessageVerbosity::SafeOnly => self.safe_message.to_string(),
            EventMessageVerbosity::FullDetails => match &self.full_details {
                None => self.safe_message.to_string(),
                Some(details) => format!("{} / Full details: {}", self.safe_message, details),
            },
        }
    }
}

impl Display for EventMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // By default, expose only the safe message.
        f.write_str(self.message(EventMessageVerbosity::SafeOnly).as_str())
    }
}

/// Stage: which engine phase emitted the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Inventory(InventoryStep),
    Classification,
    Teardown(TeardownStep),
    Cost(CostStep),
}

impl Stage {
    pub fn sub_step_name(&self) -> String {
        match self {
            Stage::Inventory(step) => step.to_string(),
            Stage::Classification => "Classify".to_string(),
            Stage::Teardown(step) => step.to_string(),
            Stage::Cost(step) => step.to_string(),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Inventory(_) => "Inventory",
            Stage::Classification => "Classification",
            Stage::Teardown(_) => "Teardown",
            Stage::Cost(_) => "Cost",
        };
        write!(f, "{}:{}", name, self.sub_step_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum InventoryStep {
    Discover,
    Correlate,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TeardownStep {
    Plan,
    Detach,
    StripRules,
    RemoveTargets,
    Delete,
    AwaitAbsence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CostStep {
    LoadSnapshot,
    RateLookup,
    Compute,
}

/// Transmitter: who emitted the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transmitter {
    Engine,
    Resource(ResourceKind, String),
    Task(String),
}

impl Display for Transmitter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Transmitter::Engine => write!(f, "engine"),
            Transmitter::Resource(kind, id) => write!(f, "{}:{}", kind, id),
            Transmitter::Task(name) => write!(f, "task:{}", name),
        }
    }
}

/// EventDetails: identifies the (account, region) cell, the stage and the
/// transmitter for an event. Cloned liberally; keep it small.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    account_name: String,
    region: String,
    stage: Stage,
    transmitter: Transmitter,
}

impl EventDetails {
    pub fn new(ctx: &AccountContext, stage: Stage, transmitter: Transmitter) -> Self {
        EventDetails {
            account_name: ctx.account_name.clone(),
            region: ctx.region.clone(),
            stage,
            transmitter,
        }
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn transmitter(&self) -> &Transmitter {
        &self.transmitter
    }

    /// Same cell and transmitter, different stage.
    pub fn clone_changing_stage(&self, stage: Stage) -> Self {
        let mut details = self.clone();
        details.stage = stage;
        details
    }

    /// Same cell and stage, different transmitter.
    pub fn clone_changing_transmitter(&self, transmitter: Transmitter) -> Self {
        let mut details = self.clone();
        details.transmitter = transmitter;
        details
    }
}

impl Display for EventDetails {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] [{}] [{}]",
            self.account_name, self.region, self.stage, self.transmitter
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;

    fn details() -> EventDetails {
        EventDetails {
            account_name: "sandbox".to_string(),
            region: "us-east-1".to_string(),
            stage: Stage::Teardown(TeardownStep::Delete),
            transmitter: Transmitter::Resource(ResourceKind::Cluster, "eks-demo-abcd".to_string()),
        }
    }

    #[test]
    fn test_event_message_verbosity() {
        let message = EventMessage::new("safe".to_string(), Some("raw provider text".to_string()));

        assert_eq!(message.message(EventMessageVerbosity::SafeOnly), "safe");
        assert_eq!(
            message.message(EventMessageVerbosity::FullDetails),
            "safe / Full details: raw provider text"
        );
        // Display exposes the safe part only
        assert_eq!(message.to_string(), "safe");
    }

    #[test]
    fn test_event_details_display() {
        assert_eq!(
            details().to_string(),
            "[sandbox/us-east-1] [Teardown:Delete] [Cluster:eks-demo-abcd]"
        );
    }

    #[test]
    fn test_clone_changing_stage_keeps_cell() {
        let details = details().clone_changing_stage(Stage::Teardown(TeardownStep::AwaitAbsence));
        assert_eq!(details.account_name(), "sandbox");
        assert_eq!(details.stage(), &Stage::Teardown(TeardownStep::AwaitAbsence));
    }
}
