//! 消费循环
//!
//! 从队列迭代器逐条拉取消息，交给 ConfirmationProcessor 处理，
//! 并按处理结果确认或拒绝消息：
//! - 处理成功 -> success()
//! - 处理失败 -> fail()（Kafka 实现写入死信 topic），记录日志后继续下一条
//!
//! 单条消息的失败从不中断循环；只有获取迭代器失败才会向上返回错误。

use erp_shared::kafka::KafkaQueueClient;
use erp_shared::observability::metrics;
use erp_shared::queue::{MessageIterator, QueueMessage};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::ConfirmationError;
use crate::processor::ConfirmationProcessor;

/// 一次消费循环的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeSummary {
    pub succeeded: u64,
    pub failed: u64,
    /// success()/fail() 本身出错的次数
    pub ack_errors: u64,
}

/// 确认事件消费者
///
/// 组合 KafkaQueueClient（消息拉取与确认）和 ConfirmationProcessor（业务处理）。
pub struct ConfirmationConsumer {
    queue: KafkaQueueClient,
    processor: ConfirmationProcessor,
}

impl ConfirmationConsumer {
    pub fn new(queue: KafkaQueueClient, processor: ConfirmationProcessor) -> Self {
        Self { queue, processor }
    }

    /// 获取迭代器并运行消费循环，直到收到 shutdown 信号
    ///
    /// 获取迭代器失败属于启动期致命错误，直接返回给调用方。
    pub async fn run(
        self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<ConsumeSummary, ConfirmationError> {
        let iterator = self.queue.iterator(shutdown)?;

        info!("确认事件消费者已启动");
        let summary = consume(iterator, &self.processor).await;
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            ack_errors = summary.ack_errors,
            "确认事件消费者已停止"
        );

        Ok(summary)
    }
}

/// 消费循环本体
///
/// 消息严格按顺序逐条处理；迭代器结束后调用 stop() 释放订阅。
pub async fn consume<I>(mut iterator: I, processor: &ConfirmationProcessor) -> ConsumeSummary
where
    I: MessageIterator,
{
    let mut summary = ConsumeSummary::default();

    while let Some(message) = iterator.next().await {
        let outcome = message
            .data()
            .map_err(ConfirmationError::from)
            .and_then(|data| processor.process(data));

        match outcome {
            Ok(accepters) => {
                debug!(accepters = ?accepters, "确认事件已派发");

                match message.success().await {
                    Ok(()) => {
                        summary.succeeded += 1;
                        metrics::record_message("success");
                    }
                    Err(e) => {
                        summary.ack_errors += 1;
                        metrics::record_message("ack_error");
                        warn!(error = %e, "确认消息失败");
                    }
                }
            }
            Err(e) => {
                summary.failed += 1;
                metrics::record_message("fail");
                error!(error = %e, code = e.code(), "处理确认事件失败");

                if let Err(ack_err) = message.fail(&e.to_string()).await {
                    summary.ack_errors += 1;
                    warn!(error = %ack_err, "拒绝消息失败");
                }
            }
        }
    }

    iterator.stop().await;
    summary
}
