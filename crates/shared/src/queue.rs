//! 队列消息抽象
//!
//! 消费循环只依赖这两个 trait，不关心底层是 Kafka 还是测试用的内存队列。
//! 确认操作按值消费消息，保证每条消息恰好确认一次。

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ConnectorError;

/// 解码后的消息负载：JSON 对象的键值映射
pub type Payload = Map<String, Value>;

/// 单条待确认的队列消息
#[async_trait]
pub trait QueueMessage: Send + Sized {
    /// 解码后的负载；负载不是合法 JSON 对象时返回解码错误
    fn data(&self) -> Result<&Payload, ConnectorError>;

    /// 处理成功，确认消息
    async fn success(self) -> Result<(), ConnectorError>;

    /// 处理失败，交由队列客户端决定后续投递方式
    async fn fail(self, reason: &str) -> Result<(), ConnectorError>;
}

/// 逐条拉取消息的迭代器
#[async_trait]
pub trait MessageIterator: Send {
    type Message: QueueMessage;

    /// 阻塞等待下一条消息，迭代器被停止或耗尽时返回 None
    async fn next(&mut self) -> Option<Self::Message>;

    /// 停止拉取并释放订阅
    async fn stop(&mut self);
}
