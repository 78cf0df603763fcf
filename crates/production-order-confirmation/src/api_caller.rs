//! ERP API 调用方
//!
//! 为每个 accepter 向 SAP `API_PROD_ORDER_CONFIRMATION_2_SRV` 发起一次 OData 读取，
//! 并把读取结果发布到目标 topic。
//!
//! 派发是提交即返回的：`dispatch` 为每个 accepter 启动一个独立的 tokio 任务后立即返回，
//! 任务内部的 HTTP、解码、发布错误只记录日志，不会回传给消息处理步骤。

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use erp_shared::config::ErpApiConfig;
use erp_shared::error::ConnectorError;
use erp_shared::kafka::KafkaProducer;
use erp_shared::observability::metrics;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::accepter::Accepter;
use crate::error::ConfirmationError;
use crate::processor::{ConfirmationDispatcher, DispatchRequest};
use crate::sdc::{ConfirmationKey, WorkflowMetadata};

const SERVICE_PATH: &str = "API_PROD_ORDER_CONFIRMATION_2_SRV";

/// 一次 OData 读取请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ODataRequest {
    pub entity_set: &'static str,
    pub filter: String,
}

/// 发布到目标 topic 的读取结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationReadResult {
    pub result_id: String,
    pub accepter: String,
    #[serde(flatten)]
    pub key: ConfirmationKey,
    #[serde(flatten)]
    pub metadata: WorkflowMetadata,
    pub records: Vec<Value>,
    pub fetched_at: DateTime<Utc>,
}

/// 按 accepter 构造 OData 请求
pub fn build_request(accepter: Accepter, key: &ConfirmationKey) -> ODataRequest {
    let (entity_set, conditions): (&'static str, Vec<(&str, &String)>) = match accepter {
        Accepter::ConfByOrderId => ("ProdnOrdConf2", vec![("OrderID", &key.order_id)]),
        Accepter::ConfByOrderIdConfGroup => (
            "ProdnOrdConf2",
            vec![
                ("OrderID", &key.order_id),
                ("ConfirmationGroup", &key.confirmation_group),
            ],
        ),
        Accepter::ConfByOrderIdSeqOp => (
            "ProdnOrdConf2",
            vec![
                ("OrderID", &key.order_id),
                ("Sequence", &key.sequence),
                ("OrderOperation", &key.order_operation),
            ],
        ),
        Accepter::MaterialMovements => {
            ("ProdnOrdConfMatlDocItm", vec![("OrderID", &key.order_id)])
        }
        Accepter::BatchCharacteristic => ("ProdnOrdConfBatchCharc", vec![("Batch", &key.batch)]),
    };

    let filter = conditions
        .into_iter()
        .map(|(field, value)| format!("{field} eq '{}'", escape_literal(value)))
        .collect::<Vec<_>>()
        .join(" and ");

    ODataRequest { entity_set, filter }
}

/// OData 字符串字面量中的单引号需要双写
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// 解析 OData v2 响应
///
/// 集合查询返回 `{"d":{"results":[...]}}`，单实体查询返回 `{"d":{...}}`。
pub fn parse_odata_records(body: Value) -> Result<Vec<Value>, ConfirmationError> {
    let Value::Object(mut envelope) = body else {
        return Err(ConfirmationError::MalformedPayload(
            "OData 响应不是 JSON 对象".to_string(),
        ));
    };

    match envelope.remove("d") {
        Some(Value::Object(mut d)) => match d.remove("results") {
            Some(Value::Array(results)) => Ok(results),
            Some(other) => Err(ConfirmationError::MalformedPayload(format!(
                "OData results 不是数组: {other}"
            ))),
            None => Ok(vec![Value::Object(d)]),
        },
        _ => Err(ConfirmationError::MalformedPayload(
            "OData 响应缺少 d 字段".to_string(),
        )),
    }
}

/// 读取结果的发布接口
///
/// 生产环境写入 Kafka 目标 topic，测试中可以替换为内存实现。
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    async fn publish(
        &self,
        message_key: &str,
        result: &ConfirmationReadResult,
    ) -> Result<(), ConfirmationError>;
}

/// 把读取结果写入 Kafka 目标 topic
pub struct KafkaResultPublisher {
    producer: KafkaProducer,
    topic: String,
}

impl KafkaResultPublisher {
    pub fn new(producer: KafkaProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl ResultPublisher for KafkaResultPublisher {
    async fn publish(
        &self,
        message_key: &str,
        result: &ConfirmationReadResult,
    ) -> Result<(), ConfirmationError> {
        self.producer
            .send_json(&self.topic, message_key, result)
            .await?;
        Ok(())
    }
}

/// SAP 生产订单确认 API 调用方
///
/// `reqwest::Client` 与发布器内部均为 Arc，每个后台任务持有一份 clone。
#[derive(Clone)]
pub struct SapApiCaller {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    publisher: Arc<dyn ResultPublisher>,
}

impl SapApiCaller {
    pub fn new(
        config: &ErpApiConfig,
        publisher: Arc<dyn ResultPublisher>,
    ) -> Result<Self, ConfirmationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ConnectorError::Internal(format!("创建 HTTP 客户端失败: {e}")))?;

        info!(base_url = %config.base_url, "ERP API 调用方已初始化");

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            publisher,
        })
    }

    fn url(&self, request: &ODataRequest) -> String {
        format!("{}/{SERVICE_PATH}/{}", self.base_url, request.entity_set)
    }

    /// 执行一次读取，返回 OData 记录列表
    async fn fetch(
        &self,
        accepter: Accepter,
        key: &ConfirmationKey,
    ) -> Result<Vec<Value>, ConfirmationError> {
        let request = build_request(accepter, key);
        let api_error = |message: String| ConfirmationError::ApiCall {
            accepter: accepter.to_string(),
            message,
        };

        let mut builder = self
            .client
            .get(self.url(&request))
            .header("Accept", "application/json")
            .query(&[("$filter", request.filter.as_str()), ("$format", "json")]);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("APIKey", api_key);
        }

        let start = Instant::now();
        let response = builder.send().await;
        let elapsed = start.elapsed().as_secs_f64();

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                metrics::record_api_request(accepter.as_str(), "error", elapsed);
                return Err(api_error(format!("请求失败: {e}")));
            }
        };

        let status = response.status();
        metrics::record_api_request(accepter.as_str(), status.as_str(), elapsed);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(format!("HTTP {status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| api_error(format!("响应解码失败: {e}")))?;

        parse_odata_records(body)
    }

    /// 读取并发布一个 accepter 的结果
    ///
    /// `dispatch` 的每个后台任务执行的就是这一步。
    pub async fn fetch_and_publish(
        &self,
        accepter: Accepter,
        key: ConfirmationKey,
        metadata: WorkflowMetadata,
    ) -> Result<(), ConfirmationError> {
        let records = self.fetch(accepter, &key).await?;
        debug!(
            accepter = %accepter,
            order_id = %key.order_id,
            count = records.len(),
            "ERP 读取完成"
        );

        let result = ConfirmationReadResult {
            result_id: Uuid::now_v7().to_string(),
            accepter: accepter.to_string(),
            key,
            metadata,
            records,
            fetched_at: Utc::now(),
        };

        let message_key = if result.key.order_id.is_empty() {
            result.result_id.clone()
        } else {
            result.key.order_id.clone()
        };

        self.publisher.publish(&message_key, &result).await
    }
}

impl ConfirmationDispatcher for SapApiCaller {
    fn dispatch(&self, request: DispatchRequest) {
        for name in &request.accepters {
            let accepter = match Accepter::from_str(name) {
                Ok(accepter) => accepter,
                Err(e) => {
                    warn!(error = %e, order_id = %request.key.order_id, "跳过未知的 accepter");
                    continue;
                }
            };
            metrics::record_dispatch(accepter.as_str());

            let caller = self.clone();
            let key = request.key.clone();
            let metadata = request.metadata.clone();

            tokio::spawn(async move {
                let order_id = key.order_id.clone();
                if let Err(e) = caller.fetch_and_publish(accepter, key, metadata).await {
                    error!(
                        accepter = %accepter,
                        order_id = %order_id,
                        error = %e,
                        code = e.code(),
                        "ERP 读取失败"
                    );
                }
            });
        }
    }
}
