//! Outbox 领域层统一错误定义
//!
//! 覆盖校验、序列化、暂存存储、投递与配置等最小必要集合，
//! 便于在应用层统一转换为 `OutboxError`。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OutboxError {
    // --- 校验 ---
    #[error("validation error: {reason}")]
    Validation { reason: String },
    #[error("subscriber already registered: event={event_name}, subscriber_id={subscriber_id}")]
    DuplicateSubscriber {
        event_name: String,
        subscriber_id: String,
    },

    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    // --- 暂存存储 ---
    #[error("storage error: {reason}")]
    Storage { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },

    // --- 投递 ---
    #[error("delivery failed: event={event_name}, reason={reason}")]
    Delivery { event_name: String, reason: String },

    // --- 配置 ---
    #[error("invalid config: {reason}")]
    Config { reason: String },
}

impl OutboxError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    pub fn delivery(event_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Delivery {
            event_name: event_name.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// 统一 Result 类型别名
pub type OutboxResult<T> = Result<T, OutboxError>;

/// 事件名必须非空（去除首尾空白后）
pub fn ensure_event_name(event_name: &str) -> OutboxResult<()> {
    if event_name.trim().is_empty() {
        return Err(OutboxError::validation("event name must not be empty"));
    }
    Ok(())
}

// ---- Cross-crate conversions for infrastructure convenience ----
// 允许在存储实现中直接使用 `?` 将 sqlx 错误转换为 OutboxError

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for OutboxError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => OutboxError::NotFound {
                reason: "row not found".to_string(),
            },
            other => OutboxError::Storage {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_blank_event_name_is_rejected() {
        assert!(matches!(
            ensure_event_name(""),
            Err(OutboxError::Validation { .. })
        ));
        assert!(matches!(
            ensure_event_name("   "),
            Err(OutboxError::Validation { .. })
        ));
        assert!(ensure_event_name("order.placed").is_ok());
    }

    #[test]
    fn display_carries_event_name() {
        let err = OutboxError::delivery("order.placed", "boom");
        assert_eq!(
            err.to_string(),
            "delivery failed: event=order.placed, reason=boom"
        );
        assert!(!err.is_not_found());
    }
}
