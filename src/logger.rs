use crate::events::{EngineEvent, EventMessageVerbosity};

#[derive(Debug, Clone)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

pub trait Logger: Send + Sync {
    fn log(&self, event: EngineEvent);
    fn clone_dyn(&self) -> Box<dyn Logger>;
}

impl Clone for Box<dyn Logger> {
    fn clone(&self) -> Self {
        self.clone_dyn()
    }
}

/// Forwards engine events to the tracing subscriber. Event details are
/// rendered as the line prefix so file logs stay grep-able per cell.
#[derive(Clone, Default)]
pub struct StdIoLogger {}

impl StdIoLogger {
    pub fn new() -> StdIoLogger {
        StdIoLogger {}
    }
}

impl Logger for StdIoLogger {
    fn log(&self, event: EngineEvent) {
        let details = event.get_details().clone();

        match &event {
            EngineEvent::Debug(_, _) => {
                debug!("{} {}", details, event.message(EventMessageVerbosity::FullDetails))
            }
            EngineEvent::Info(_, _) => {
                info!("{} {}", details, event.message(EventMessageVerbosity::SafeOnly))
            }
            EngineEvent::Warning(_, _) => {
                warn!("{} {}", details, event.message(EventMessageVerbosity::SafeOnly))
            }
            EngineEvent::Error(_, _) => {
                error!("{} {}", details, event.message(EventMessageVerbosity::FullDetails))
            }
        };
    }

    fn clone_dyn(&self) -> Box<dyn Logger> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventDetails, EventMessage, Stage, TeardownStep, Transmitter};
    use crate::models::AccountContext;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_stdio_logger_renders_cell_prefix() {
        // setup:
        let logger = StdIoLogger::new();
        let ctx = AccountContext {
            account_name: "sandbox".to_string(),
            account_id: "123456789012".to_string(),
            region: "eu-west-1".to_string(),
        };
        let details = EventDetails::new(&ctx, Stage::Teardown(TeardownStep::Delete), Transmitter::Engine);

        // execute:
        logger.log(EngineEvent::Info(
            details,
            EventMessage::new_from_safe("deleting nodegroup".to_string()),
        ));

        // verify:
        assert!(logs_contain("sandbox/eu-west-1"));
        assert!(logs_contain("deleting nodegroup"));
    }
}
