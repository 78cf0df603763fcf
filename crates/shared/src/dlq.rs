//! 死信队列
//!
//! 消息处理失败时，原始负载连同失败原因一起写入死信 topic，而非直接丢弃。
//! 连接器本身不做重试，死信 topic 的重放由运维工具或上游系统负责。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConnectorError;
use crate::kafka::KafkaProducer;

// ---------------------------------------------------------------------------
// DeadLetterMessage — 死信消息信封
// ---------------------------------------------------------------------------

/// 死信消息信封
///
/// 记录原始消息在源 topic 中的位置，便于排查时回溯到具体 offset。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    /// 原始消息标识，取 Kafka key，缺失时退化为 topic/partition/offset
    pub message_id: String,
    pub source_topic: String,
    pub partition: i32,
    pub offset: i64,
    /// 原始消息内容（UTF-8 解码失败时做有损转换）
    pub payload: String,
    /// 失败原因
    pub error: String,
    pub failed_at: DateTime<Utc>,
    /// 来源服务
    pub source_service: String,
}

impl DeadLetterMessage {
    pub fn new(
        message_id: impl Into<String>,
        source_topic: impl Into<String>,
        partition: i32,
        offset: i64,
        payload: impl Into<String>,
        error: impl Into<String>,
        source_service: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            source_topic: source_topic.into(),
            partition,
            offset,
            payload: payload.into(),
            error: error.into(),
            failed_at: Utc::now(),
            source_service: source_service.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// DlqProducer — 将失败消息发送到死信队列
// ---------------------------------------------------------------------------

/// DLQ 生产者
#[derive(Clone)]
pub struct DlqProducer {
    producer: KafkaProducer,
    topic: String,
    source_service: String,
}

impl DlqProducer {
    pub fn new(producer: KafkaProducer, topic: &str, source_service: &str) -> Self {
        Self {
            producer,
            topic: topic.to_string(),
            source_service: source_service.to_string(),
        }
    }

    pub fn source_service(&self) -> &str {
        &self.source_service
    }

    /// 将失败消息发送到死信队列
    pub async fn send(&self, message: &DeadLetterMessage) -> Result<(), ConnectorError> {
        self.producer
            .send_json(&self.topic, &message.message_id, message)
            .await?;

        warn!(
            message_id = %message.message_id,
            source_topic = %message.source_topic,
            offset = message.offset,
            error = %message.error,
            "消息已发送到死信队列"
        );

        Ok(())
    }
}
