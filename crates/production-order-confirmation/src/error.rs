//! 连接器服务专用错误类型
//!
//! 在共享库 ConnectorError 基础上定义本服务特有的错误变体。
//! 单条消息的错误只影响该消息的确认结果，不会终止消费循环。

use erp_shared::error::ConnectorError;

/// 生产订单确认处理错误
#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    /// ERP 响应不是预期的 OData 结构
    #[error("消息格式错误: {0}")]
    MalformedPayload(String),

    /// 提取、解析或派发过程中发生 panic，已在处理边界被捕获
    #[error("处理过程中发生 panic: {0}")]
    Panicked(String),

    /// 单个 accepter 的 ERP API 调用失败，只在 API 调用任务内部记录
    #[error("ERP API 调用失败: accepter={accepter}, {message}")]
    ApiCall { accepter: String, message: String },

    #[error("未知的 accepter: {0}")]
    UnknownAccepter(String),

    /// 透传共享库错误
    #[error(transparent)]
    Shared(#[from] ConnectorError),
}

impl ConfirmationError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::Panicked(_) => "PANICKED",
            Self::ApiCall { .. } => "API_CALL_FAILED",
            Self::UnknownAccepter(_) => "UNKNOWN_ACCEPTER",
            Self::Shared(e) => e.code(),
        }
    }
}
