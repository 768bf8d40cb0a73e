use crate::events::EventDetails;
use std::fmt::{Display, Formatter};
use thiserror::Error;

use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};

/// ErrorMessageVerbosity: represents error message's verbosity from minimal to full verbosity.
pub enum ErrorMessageVerbosity {
    SafeOnly,
    FullDetails,
}

/// CommandError: lower-level error, mostly raw provider responses. The safe
/// message is what may land in reports; full details can carry provider text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct CommandError {
    /// full_details: full error message, may contain identifiers we do not want in every report.
    full_details: Option<String>,
    /// message_safe: error message suitable for reports and user-facing logs.
    message_safe: String,
}

impl CommandError {
    pub fn new(message_safe: String, message_raw: Option<String>) -> Self {
        CommandError {
            full_details: message_raw,
            message_safe,
        }
    }

    pub fn new_from_safe_message(message: String) -> Self {
        CommandError::new(message, None)
    }

    pub fn message_safe(&self) -> String {
        self.message_safe.to_string()
    }

    pub fn message_raw(&self) -> Option<String> {
        self.full_details.clone()
    }

    pub fn message(&self, verbosity: ErrorMessageVerbosity) -> String {
        match verbosity {
            ErrorMessageVerbosity::SafeOnly => self.message_safe.to_string(),
            ErrorMessageVerbosity::FullDetails => match &self.full_details {
                None => self.message(ErrorMessageVerbosity::SafeOnly),
                Some(full_details) => format!("{} / Full details: {}", self.message_safe, full_details),
            },
        }
    }
}

impl Default for CommandError {
    fn default() -> Self {
        Self {
            full_details: None,
            message_safe: "Unknown command error".to_string(),
        }
    }
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message(ErrorMessageVerbosity::SafeOnly).as_str())
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        CommandError::new("IO error".to_string(), Some(err.to_string()))
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::new("JSON error".to_string(), Some(err.to_string()))
    }
}

/// Tag: error category driving the retry / record decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Tag {
    /// Credential rejected: per-task fatal, other tasks continue.
    Auth,
    /// Throttling, 5xx, timeouts: retried with backoff, then demoted to permanent.
    Transient,
    /// Provider says the resource is still in use.
    DependencyViolation,
    /// Resource already gone: idempotent success at call sites that delete.
    NotFound,
    /// Malformed request: permanent.
    Validation,
    /// An absence waiter exceeded its bound.
    Timeout,
    /// Cooperative cancellation hit a suspension point.
    Cancelled,
    Unknown,
}

/// Maps a raw AWS error code onto the engine taxonomy. This is the single
/// place where provider code strings are interpreted; everything downstream
/// works on [Tag].
pub fn classify_aws_error_code(code: &str) -> Tag {
    if code.ends_with(".NotFound") {
        // EC2-style codes: InvalidGroupId.NotFound, InvalidPermission.NotFound, ...
        return Tag::NotFound;
    }

    match code {
        "ResourceNotFoundException" | "ResourceNotFoundFault" | "ResourceNotFound" | "NoSuchEntity"
        | "NotFoundException" => Tag::NotFound,
        "DependencyViolation" | "ResourceInUseException" | "ResourceInUse" | "DeleteConflict" => {
            Tag::DependencyViolation
        }
        "Throttling" | "ThrottlingException" | "RequestLimitExceeded" | "TooManyRequestsException" | "SlowDown"
        | "ServiceUnavailable" | "ServiceUnavailableException" | "InternalError" | "InternalFailure"
        | "InternalServerError" | "RequestTimeout" => Tag::Transient,
        "UnrecognizedClientException" | "InvalidClientTokenId" | "AuthFailure" | "AccessDenied"
        | "AccessDeniedException" | "SignatureDoesNotMatch" | "ExpiredToken" | "ExpiredTokenException"
        | "UnauthorizedOperation" => Tag::Auth,
        "ValidationError" | "ValidationException" | "InvalidParameterValue" | "InvalidParameterCombination"
        | "InvalidParameter" | "MalformedPolicyDocument" => Tag::Validation,
        _ => Tag::Unknown,
    }
}

/// EngineError: the engine's error type. Carries the event details of the
/// failing step so that reports can attribute it to an (account, region) cell.
#[derive(Debug, Clone, Error, PartialEq)]
pub struct EngineError {
    /// tag: error category.
    tag: Tag,
    /// event_details: context in which the error was triggered.
    event_details: EventDetails,
    /// user_log_message: message targeted toward operators.
    user_log_message: String,
    /// underlying_error: raw provider error.
    underlying_error: Option<CommandError>,
}

impl EngineError {
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn event_details(&self) -> &EventDetails {
        &self.event_details
    }

    pub fn user_log_message(&self) -> &str {
        &self.user_log_message
    }

    pub fn underlying_error(&self) -> Option<CommandError> {
        self.underlying_error.clone()
    }

    pub fn message(&self, verbosity: ErrorMessageVerbosity) -> String {
        match &self.underlying_error {
            Some(err) => format!("{}: {}", self.user_log_message, err.message(verbosity)),
            None => self.user_log_message.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.tag == Tag::Transient
    }

    pub fn is_not_found(&self) -> bool {
        self.tag == Tag::NotFound
    }

    pub fn is_dependency_violation(&self) -> bool {
        self.tag == Tag::DependencyViolation
    }

    fn new(
        event_details: EventDetails,
        tag: Tag,
        user_log_message: String,
        underlying_error: Option<CommandError>,
    ) -> Self {
        EngineError {
            event_details,
            tag,
            user_log_message,
            underlying_error,
        }
    }

    /// Creates a new error from a raw AWS SDK error, classifying its code at
    /// the client boundary.
    pub fn new_from_aws_sdk_error<E>(event_details: EventDetails, action: &str, err: &SdkError<E>) -> Self
    where
        E: ProvideErrorMetadata + std::fmt::Debug,
    {
        let tag = match err {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => Tag::Transient,
            _ => err.code().map(classify_aws_error_code).unwrap_or(Tag::Unknown),
        };
        let code = err.code().unwrap_or("unknown").to_string();

        EngineError::new(
            event_details,
            tag,
            format!("AWS API call `{action}` failed with code `{code}`"),
            Some(CommandError::new(
                format!("{action}: {code}"),
                Some(format!("{err:?}")),
            )),
        )
    }

    pub fn new_auth_error(event_details: EventDetails, message: String, raw: Option<String>) -> Self {
        EngineError::new(
            event_details,
            Tag::Auth,
            "Credentials were rejected by the provider".to_string(),
            Some(CommandError::new(message, raw)),
        )
    }

    pub fn new_timeout_error(event_details: EventDetails, what: String, waited: std::time::Duration) -> Self {
        EngineError::new(
            event_details,
            Tag::Timeout,
            format!("Timed out after {}s waiting for {}", waited.as_secs(), what),
            None,
        )
    }

    pub fn new_cancelled(event_details: EventDetails) -> Self {
        EngineError::new(
            event_details,
            Tag::Cancelled,
            "Operation cancelled before completion".to_string(),
            None,
        )
    }

    pub fn new_dependency_violation(event_details: EventDetails, message: String) -> Self {
        EngineError::new(event_details, Tag::DependencyViolation, message, None)
    }

    pub fn new_validation_error(event_details: EventDetails, message: String) -> Self {
        EngineError::new(event_details, Tag::Validation, message, None)
    }

    pub fn new_unknown(event_details: EventDetails, message: String, underlying: Option<CommandError>) -> Self {
        EngineError::new(event_details, Tag::Unknown, message, underlying)
    }

    /// Transient errors that exhausted their retry budget become permanent.
    pub fn into_permanent(mut self) -> Self {
        if self.tag == Tag::Transient {
            self.tag = Tag::Unknown;
            self.user_log_message = format!("{} (retries exhausted)", self.user_log_message);
        }
        self
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message(ErrorMessageVerbosity::FullDetails).as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventDetails, Stage, TeardownStep, Transmitter};
    use crate::models::AccountContext;

    fn event_details() -> EventDetails {
        let ctx = AccountContext {
            account_name: "sandbox".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
        };
        EventDetails::new(&ctx, Stage::Teardown(TeardownStep::Delete), Transmitter::Engine)
    }

    #[test]
    fn test_command_error_verbosity() {
        // setup:
        let command_err = CommandError::new("safe".to_string(), Some("raw".to_string()));

        // execute & verify:
        assert_eq!(command_err.message(ErrorMessageVerbosity::SafeOnly), "safe");
        assert_eq!(
            command_err.message(ErrorMessageVerbosity::FullDetails),
            "safe / Full details: raw"
        );
    }

    #[test]
    fn test_classify_aws_error_code() {
        struct TestCase<'a> {
            code: &'a str,
            expected: Tag,
        }

        let test_cases = vec![
            TestCase {
                code: "InvalidPermission.NotFound",
                expected: Tag::NotFound,
            },
            TestCase {
                code: "InvalidGroupId.NotFound",
                expected: Tag::NotFound,
            },
            TestCase {
                code: "ResourceNotFoundException",
                expected: Tag::NotFound,
            },
            TestCase {
                code: "NoSuchEntity",
                expected: Tag::NotFound,
            },
            TestCase {
                code: "DependencyViolation",
                expected: Tag::DependencyViolation,
            },
            TestCase {
                code: "ResourceInUseException",
                expected: Tag::DependencyViolation,
            },
            TestCase {
                code: "Throttling",
                expected: Tag::Transient,
            },
            TestCase {
                code: "RequestLimitExceeded",
                expected: Tag::Transient,
            },
            TestCase {
                code: "UnrecognizedClientException",
                expected: Tag::Auth,
            },
            TestCase {
                code: "AuthFailure",
                expected: Tag::Auth,
            },
            TestCase {
                code: "ValidationException",
                expected: Tag::Validation,
            },
            TestCase {
                code: "SomethingNew",
                expected: Tag::Unknown,
            },
        ];

        for tc in test_cases {
            assert_eq!(classify_aws_error_code(tc.code), tc.expected, "code: {}", tc.code);
        }
    }

    #[test]
    fn test_transient_demotion_to_permanent() {
        let err = EngineError::new(
            event_details(),
            Tag::Transient,
            "AWS API call `DeleteNodegroup` failed".to_string(),
            None,
        );
        assert!(err.is_transient());

        let err = err.into_permanent();
        assert!(!err.is_transient());
        assert_eq!(err.tag(), &Tag::Unknown);
        assert!(err.user_log_message().contains("retries exhausted"));
    }

    #[test]
    fn test_non_transient_is_not_demoted() {
        let err = EngineError::new(event_details(), Tag::Validation, "bad request".to_string(), None);
        let err = err.into_permanent();
        assert_eq!(err.tag(), &Tag::Validation);
    }
}
