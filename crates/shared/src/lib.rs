//! 共享库
//!
//! 包含连接器共用的配置、错误处理、Kafka 队列客户端、死信信封与可观测性等基础设施代码。

pub mod config;
pub mod dlq;
pub mod error;
pub mod kafka;
pub mod observability;
pub mod queue;
