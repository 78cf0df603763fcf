//! 生产订单确认读取服务
//!
//! 消费 Kafka 确认事件，按 accepter 调用 SAP 生产订单确认 API，
//! 读取结果发布到目标 topic，处理失败的消息写入死信 topic。

use std::sync::Arc;

use anyhow::Result;
use erp_shared::config::AppConfig;
use erp_shared::dlq::DlqProducer;
use erp_shared::kafka::{KafkaProducer, KafkaQueueClient};
use erp_shared::observability;
use production_order_confirmation::api_caller::{KafkaResultPublisher, SapApiCaller};
use production_order_confirmation::consumer::ConfirmationConsumer;
use production_order_confirmation::processor::ConfirmationProcessor;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

const SERVICE_NAME: &str = "production-order-confirmation";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // 1. 加载配置，配置错误直接退出
    let config = AppConfig::load(SERVICE_NAME)?;

    // 2. 初始化可观测性
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting {}...", SERVICE_NAME);
    info!(
        environment = %config.environment,
        source_topic = %config.kafka.source_topic,
        destination_topic = %config.kafka.destination_topic,
        "Configuration loaded"
    );

    // 3. 初始化 Kafka 生产者、死信队列与消费者
    let producer = KafkaProducer::new(&config.kafka)?;
    let dlq = DlqProducer::new(
        producer.clone(),
        &config.kafka.dead_letter_topic,
        &config.service_name,
    );
    let queue = KafkaQueueClient::new(&config.kafka, dlq)?;

    // 4. 组装 API 调用方与处理器
    let publisher = KafkaResultPublisher::new(producer, &config.kafka.destination_topic);
    let caller = SapApiCaller::new(&config.erp, Arc::new(publisher))?;
    let processor = ConfirmationProcessor::new(Arc::new(caller));
    let consumer = ConfirmationConsumer::new(queue, processor);

    // 5. 关闭信号通过 watch channel 广播给消费循环
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    // 6. 运行消费循环直到关闭
    let summary = consumer.run(shutdown_rx).await?;

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        ack_errors = summary.ack_errors,
        "{} stopped",
        SERVICE_NAME
    );
    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
