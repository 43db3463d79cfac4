use thiserror::Error;

use crate::domain::ids::{QuestionId, QuoteId};
use crate::domain::quote::AggregatedStatus;
use crate::ports::{IntegrationError, RepositoryError, ServiceError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid answer for question {question_id}: {text}")]
    InvalidAnswer { question_id: QuestionId, text: String },
    #[error("question catalog integrity violation: {0}")]
    CatalogIntegrity(String),
    #[error("unsupported request: {0}")]
    UnsupportedRequest(String),
    #[error("agency location is misconfigured: {0}")]
    MisconfiguredAgent(String),
    #[error("no quotes possible: {0}")]
    NoQuotesPossible(String),
    #[error("quote {0} is already bound")]
    AlreadyBound(QuoteId),
    #[error("quote {quote_id} is not eligible for bind (status: {status})")]
    NotEligibleForBind { quote_id: QuoteId, status: AggregatedStatus },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedRequest(message.into())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(error) => Some(error),
            _ => None,
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(value: RepositoryError) -> Self {
        Self::ServiceUnavailable(value.to_string())
    }
}

impl From<ServiceError> for EngineError {
    fn from(value: ServiceError) -> Self {
        Self::ServiceUnavailable(value.to_string())
    }
}

impl From<IntegrationError> for EngineError {
    fn from(value: IntegrationError) -> Self {
        Self::Integration(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Validation messages are user-correctable and returned verbatim; everything else is masked.
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } | Self::Conflict { message, .. } => message.clone(),
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly.".to_owned()
            }
            Self::Internal { .. } => "An unexpected internal error occurred.".to_owned(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl EngineError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<EngineError> for InterfaceError {
    fn from(value: EngineError) -> Self {
        let correlation_id = "unassigned".to_owned();
        let message = value.to_string();
        match value {
            EngineError::Domain(
                DomainError::Validation(_)
                | DomainError::InvalidAnswer { .. }
                | DomainError::UnsupportedRequest(_)
                | DomainError::NoQuotesPossible(_),
            ) => Self::BadRequest { message, correlation_id },
            EngineError::Domain(
                DomainError::AlreadyBound(_) | DomainError::NotEligibleForBind { .. },
            ) => Self::Conflict { message, correlation_id },
            EngineError::Domain(DomainError::CatalogIntegrity(_))
            | EngineError::ServiceUnavailable(_)
            | EngineError::Integration(_) => Self::ServiceUnavailable { message, correlation_id },
            EngineError::Domain(DomainError::MisconfiguredAgent(_))
            | EngineError::Configuration(_) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::ids::QuoteId;
    use crate::domain::quote::AggregatedStatus;
    use crate::errors::{DomainError, EngineError, InterfaceError};

    #[test]
    fn validation_error_keeps_field_specific_message() {
        let interface = EngineError::from(DomainError::validation(
            "management_structure is required for Limited Liability Companies in Montana",
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert!(interface.user_message().contains("management_structure"));
    }

    #[test]
    fn bind_guards_map_to_conflict() {
        let already = EngineError::from(DomainError::AlreadyBound(QuoteId(9))).into_interface("r");
        assert!(matches!(already, InterfaceError::Conflict { .. }));

        let ineligible = EngineError::from(DomainError::NotEligibleForBind {
            quote_id: QuoteId(9),
            status: AggregatedStatus::Autodeclined,
        })
        .into_interface("r");
        assert!(matches!(ineligible, InterfaceError::Conflict { .. }));
        assert!(ineligible.user_message().contains("autodeclined"));
    }

    #[test]
    fn downstream_failure_is_masked() {
        let interface = EngineError::ServiceUnavailable("question service returned 502".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn misconfigured_agent_is_operator_facing() {
        let interface = EngineError::from(DomainError::MisconfiguredAgent(
            "no usable insurers".to_owned(),
        ))
        .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
        assert_eq!(interface.correlation_id(), "req-4");
    }
}
