//! 生产订单确认读取连接器
//!
//! 消费 Kafka 中的生产订单确认事件，提取订单标识字段，
//! 按请求的 accepter 集合向 ERP OData API 并发发起读取，
//! 并根据派发结果确认或拒绝原始消息。

pub mod accepter;
pub mod api_caller;
pub mod consumer;
pub mod error;
pub mod processor;
pub mod sdc;
