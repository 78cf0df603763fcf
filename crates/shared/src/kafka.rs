//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为连接器使用的 Producer 与队列迭代器，
//! 统一消息解码、偏移提交、死信投递和优雅关闭语义。
//!
//! 偏移采用手动存储 + 自动提交：只有在消息被确认（成功或写入死信）后才存储偏移，
//! 进程异常退出时未确认的消息会被重新投递。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::dlq::{DeadLetterMessage, DlqProducer};
use crate::error::ConnectorError;
use crate::queue::{MessageIterator, Payload, QueueMessage};

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl ConsumerMessage {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
        }
    }

    /// 消息标识：优先使用 key，否则使用 topic/partition/offset 坐标
    pub fn message_id(&self) -> String {
        match &self.key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => format!("{}/{}/{}", self.topic, self.partition, self.offset),
        }
    }

    /// 将 JSON 负载解码为对象映射
    ///
    /// 连接器只接受 JSON 对象形态的负载，数组或标量视为解码失败。
    pub fn decode_object(&self) -> Result<Payload, ConnectorError> {
        let value: serde_json::Value = serde_json::from_slice(&self.payload)
            .map_err(|e| ConnectorError::Decode(format!("负载不是合法 JSON: {e}")))?;

        match value {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(ConnectorError::Decode(format!(
                "负载不是 JSON 对象: {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// 封装 `FutureProducer` 并提供 JSON 发送方法，
/// `FutureProducer` 内部是 Arc 包装的，clone 开销很小。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    /// 根据配置创建生产者
    ///
    /// `message.timeout.ms` 设为 5 秒，超时的结果由调用方记录日志后丢弃。
    pub fn new(config: &KafkaConfig) -> Result<Self, ConnectorError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| ConnectorError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self { producer })
    }

    /// 发送原始字节消息
    pub async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<(i32, i64), ConnectorError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let delivery = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| ConnectorError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic,
            key,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }

    /// 将值序列化为 JSON 后发送
    pub async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(i32, i64), ConnectorError> {
        let payload = serde_json::to_vec(value)?;

        self.send(topic, key, &payload).await
    }
}

// ---------------------------------------------------------------------------
// KafkaQueueClient
// ---------------------------------------------------------------------------

/// Kafka 队列客户端
///
/// 持有 `StreamConsumer`，按配置的源 topic 产出消息迭代器。
pub struct KafkaQueueClient {
    consumer: Arc<StreamConsumer>,
    source_topic: String,
    dlq: DlqProducer,
}

impl KafkaQueueClient {
    /// 创建消费者
    ///
    /// 关闭 `enable.auto.offset.store`，偏移只在消息确认时存储，
    /// 由后台自动提交线程统一提交。
    pub fn new(config: &KafkaConfig, dlq: DlqProducer) -> Result<Self, ConnectorError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .create()
            .map_err(|e| ConnectorError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            "Kafka 消费者已初始化"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
            source_topic: config.source_topic.clone(),
            dlq,
        })
    }

    /// 订阅源 topic 并返回消息迭代器
    ///
    /// shutdown 变为 `true` 时迭代器结束。
    pub fn iterator(&self, shutdown: watch::Receiver<bool>) -> Result<KafkaIterator, ConnectorError> {
        self.consumer
            .subscribe(&[self.source_topic.as_str()])
            .map_err(|e| ConnectorError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(topic = %self.source_topic, "已订阅 Kafka topic");

        Ok(KafkaIterator {
            consumer: Arc::clone(&self.consumer),
            dlq: self.dlq.clone(),
            shutdown,
        })
    }
}

// ---------------------------------------------------------------------------
// KafkaIterator
// ---------------------------------------------------------------------------

/// 基于 `watch` channel 关闭语义的消息迭代器
pub struct KafkaIterator {
    consumer: Arc<StreamConsumer>,
    dlq: DlqProducer,
    shutdown: watch::Receiver<bool>,
}

#[async_trait]
impl MessageIterator for KafkaIterator {
    type Message = KafkaDelivery;

    /// 使用 `tokio::select!` 同时监听消息和关闭信号：
    /// - 收到关闭信号（或发送端已销毁）时返回 None
    /// - 接收出错只记录日志并继续等待，避免单次网络抖动终止消费
    async fn next(&mut self) -> Option<KafkaDelivery> {
        loop {
            if *self.shutdown.borrow() {
                info!("收到关闭信号，停止拉取 Kafka 消息");
                return None;
            }

            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        warn!("关闭信号发送端已销毁，停止拉取 Kafka 消息");
                        return None;
                    }
                }

                received = self.consumer.recv() => {
                    match received {
                        Ok(borrowed_msg) => {
                            let message = ConsumerMessage::from_borrowed(&borrowed_msg);
                            debug!(
                                topic = %message.topic,
                                partition = message.partition,
                                offset = message.offset,
                                "收到 Kafka 消息"
                            );
                            return Some(KafkaDelivery::new(
                                Arc::clone(&self.consumer),
                                self.dlq.clone(),
                                message,
                            ));
                        }
                        Err(e) => {
                            error!(error = %e, "接收 Kafka 消息出错");
                        }
                    }
                }
            }
        }
    }

    async fn stop(&mut self) {
        self.consumer.unsubscribe();
        info!("Kafka 消费者已取消订阅");
    }
}

// ---------------------------------------------------------------------------
// KafkaDelivery
// ---------------------------------------------------------------------------

/// 一条已投递、待确认的 Kafka 消息
pub struct KafkaDelivery {
    consumer: Arc<StreamConsumer>,
    dlq: DlqProducer,
    message: ConsumerMessage,
    payload: Result<Payload, String>,
}

impl KafkaDelivery {
    fn new(consumer: Arc<StreamConsumer>, dlq: DlqProducer, message: ConsumerMessage) -> Self {
        // 解码在收到时完成一次，data() 只返回借用
        let payload = message.decode_object().map_err(|e| e.to_string());
        Self {
            consumer,
            dlq,
            message,
            payload,
        }
    }

    /// 存储下一条待消费的偏移（当前 offset + 1）
    fn store_offset(&self) -> Result<(), ConnectorError> {
        self.consumer
            .store_offset(
                &self.message.topic,
                self.message.partition,
                self.message.offset + 1,
            )
            .map_err(|e| ConnectorError::Kafka(format!("存储偏移失败: {e}")))
    }
}

#[async_trait]
impl QueueMessage for KafkaDelivery {
    fn data(&self) -> Result<&Payload, ConnectorError> {
        self.payload
            .as_ref()
            .map_err(|e| ConnectorError::Decode(e.clone()))
    }

    async fn success(self) -> Result<(), ConnectorError> {
        self.store_offset()?;
        debug!(
            partition = self.message.partition,
            offset = self.message.offset,
            "消息已确认"
        );
        Ok(())
    }

    /// 写入死信 topic 后存储偏移
    ///
    /// 死信写入失败时仍然存储偏移，让消费继续前进；错误返回给调用方记录。
    async fn fail(self, reason: &str) -> Result<(), ConnectorError> {
        let dead_letter = DeadLetterMessage::new(
            self.message.message_id(),
            self.message.topic.clone(),
            self.message.partition,
            self.message.offset,
            String::from_utf8_lossy(&self.message.payload).into_owned(),
            reason,
            self.dlq.source_service(),
        );

        let sent = self.dlq.send(&dead_letter).await;
        self.store_offset()?;
        sent
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
