//! 暂存任务模型（StagedJob）与事件消息（EventMessage）
//!
//! `EventMessage` 是投递层与订阅者看到的形态：事件名 + 不透明负载 + 不透明选项；
//! `StagedJob` 是其在暂存存储中的持久化形态，附带存储层分配的 `id` 与创建时间。
//!
//! 暂存任务只会被创建与删除，不会被原地修改；删除即代表投递成功。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// 投递选项：仅由投递层解释，本库不做任何解读
pub type EmitOptions = Map<String, Value>;

/// 一条待投递/正在投递的事件
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct EventMessage {
    /// 事件名，例如 `order.placed`
    #[builder(into)]
    event_name: String,
    /// 事件负载
    data: Value,
    /// 投递选项
    #[builder(default)]
    #[serde(default)]
    options: EmitOptions,
}

impl EventMessage {
    pub fn new(event_name: impl Into<String>, data: Value, options: EmitOptions) -> Self {
        Self {
            event_name: event_name.into(),
            data,
            options,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn options(&self) -> &EmitOptions {
        &self.options
    }
}

/// 暂存任务：尚未被确认投递成功的事件
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct StagedJob {
    /// 由存储层在持久化时分配
    id: Uuid,
    #[builder(into)]
    event_name: String,
    data: Value,
    #[builder(default)]
    #[serde(default)]
    options: EmitOptions,
    /// 创建时间，拉取时按其升序排列
    created_at: DateTime<Utc>,
}

impl StagedJob {
    /// 以存储层分配的 id 与时间戳持久化一条消息
    pub fn from_message(id: Uuid, created_at: DateTime<Utc>, message: EventMessage) -> Self {
        Self {
            id,
            event_name: message.event_name,
            data: message.data,
            options: message.options,
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 转换为交给投递层的消息
    pub fn to_message(&self) -> EventMessage {
        EventMessage {
            event_name: self.event_name.clone(),
            data: self.data.clone(),
            options: self.options.clone(),
        }
    }
}
