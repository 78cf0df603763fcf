//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 与 `/health` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册指标描述，出现在 /metrics 端点的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "confirmation_messages_total",
        "Total number of consumed confirmation messages by outcome"
    );
    metrics::describe_counter!(
        "confirmation_accepter_dispatches_total",
        "Total number of accepter fetches dispatched"
    );
    metrics::describe_counter!("erp_api_requests_total", "Total number of ERP API requests");
    metrics::describe_histogram!(
        "erp_api_request_duration_seconds",
        "ERP API request duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录一条消息的处理结果（success / fail / ack_error）
#[inline]
pub fn record_message(outcome: &str) {
    metrics::counter!(
        "confirmation_messages_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录一次 accepter 派发
#[inline]
pub fn record_dispatch(accepter: &str) {
    metrics::counter!(
        "confirmation_accepter_dispatches_total",
        "accepter" => accepter.to_string()
    )
    .increment(1);
}

/// 记录 ERP API 请求
#[inline]
pub fn record_api_request(accepter: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "erp_api_requests_total",
        "accepter" => accepter.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "erp_api_request_duration_seconds",
        "accepter" => accepter.to_string()
    )
    .record(duration_secs);
}
