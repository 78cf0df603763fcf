//! 统一错误处理模块
//!
//! 定义连接器各组件共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 连接器基础设施错误类型
#[derive(Debug, Error)]
pub enum ConnectorError {
    // ==================== 队列错误 ====================
    #[error("Kafka 错误: {0}")]
    Kafka(String),

    #[error("消息解码失败: {0}")]
    Decode(String),

    // ==================== 配置错误 ====================
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 序列化错误 ====================
    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// 获取错误码，用于日志字段和指标标签
    pub fn code(&self) -> &'static str {
        match self {
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
