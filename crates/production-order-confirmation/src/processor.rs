//! 确认事件处理步骤
//!
//! 对单条消息依次执行：提取标识字段 -> 解析 accepter -> 派发 API 读取。
//! 派发是提交即返回的：每个 accepter 的读取在后台独立运行，
//! 其成败不影响本步骤的返回值，因此消息确认先于读取完成。
//!
//! 本步骤是唯一的故障隔离边界：提取、解析、派发过程中的任何 panic
//! 都在这里被捕获并转换为 `ConfirmationError::Panicked`，消费循环不会因单条坏消息崩溃。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use erp_shared::queue::Payload;
use tracing::debug;

use crate::accepter::resolve_accepters;
use crate::error::ConfirmationError;
use crate::sdc::{
    ConfirmationKey, WorkflowMetadata, extract_key, extract_metadata, requested_accepters,
};

/// 一次派发请求：五个标识字段 + 解析后的 accepter 列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub key: ConfirmationKey,
    pub metadata: WorkflowMetadata,
    pub accepters: Vec<String>,
}

/// API 调用方的派发接口
///
/// 实现必须立即返回：每个 accepter 的读取提交到后台任务执行，
/// 读取失败由实现自行记录，不向调用方汇报。
#[cfg_attr(test, mockall::automock)]
pub trait ConfirmationDispatcher: Send + Sync {
    fn dispatch(&self, request: DispatchRequest);
}

/// 确认事件处理器
///
/// 派发器以 trait object 持有，在所有消息间只读共享。
pub struct ConfirmationProcessor {
    dispatcher: Arc<dyn ConfirmationDispatcher>,
}

impl ConfirmationProcessor {
    pub fn new(dispatcher: Arc<dyn ConfirmationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// 处理一条消息负载，返回实际派发的 accepter 列表
    pub fn process(&self, data: &Payload) -> Result<Vec<String>, ConfirmationError> {
        let dispatcher = &self.dispatcher;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Vec<String>, ConfirmationError> {
            let key = extract_key(data)?;
            let requested = requested_accepters(data)?;
            let metadata = extract_metadata(data)?;
            let accepters = resolve_accepters(&requested);

            debug!(
                order_id = %key.order_id,
                requested = ?requested,
                resolved = ?accepters,
                "accepter 解析完成"
            );

            dispatcher.dispatch(DispatchRequest {
                key,
                metadata,
                accepters: accepters.clone(),
            });

            Ok(accepters)
        }));

        match outcome {
            Ok(result) => result,
            Err(panic_payload) => Err(ConfirmationError::Panicked(panic_message(
                panic_payload.as_ref(),
            ))),
        }
    }
}

/// 从 panic 负载中提取可读信息
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
