use outbox_domain::error::OutboxError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(OutboxError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("subscriber already registered: event={event_name}, subscriber_id={subscriber_id}")]
    AlreadyRegisteredSubscriber {
        event_name: String,
        subscriber_id: String,
    },
}

/// 校验类领域错误提升为应用层错误，其余原样包装
impl From<OutboxError> for AppError {
    fn from(err: OutboxError) -> Self {
        match err {
            OutboxError::Validation { reason } => AppError::Validation(reason),
            OutboxError::DuplicateSubscriber {
                event_name,
                subscriber_id,
            } => AppError::AlreadyRegisteredSubscriber {
                event_name,
                subscriber_id,
            },
            other => AppError::Domain(other),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
