//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。
//! 配置只在启动时加载一次，之后以不可变结构体显式传入各组件。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Kafka 配置
///
/// source_topic 对应上游投递确认事件的队列，destination_topic 接收 API 读取结果，
/// dead_letter_topic 存放处理失败的原始消息。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: String,
    pub consumer_group: String,
    pub auto_offset_reset: String,
    pub source_topic: String,
    pub destination_topic: String,
    pub dead_letter_topic: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            consumer_group: "production-order-confirmation".to_string(),
            auto_offset_reset: "earliest".to_string(),
            source_topic: "erp.production-order-confirmation.requests".to_string(),
            destination_topic: "erp.production-order-confirmation.results".to_string(),
            dead_letter_topic: "erp.production-order-confirmation.dlq".to_string(),
        }
    }
}

/// ERP API 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErpApiConfig {
    pub base_url: String,
    /// 沙箱环境需要的 APIKey 请求头，生产环境通常走网关鉴权，可留空
    pub api_key: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for ErpApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.api.sap.com/s4hanacloud/sap/opu/odata/sap".to_string(),
            api_key: None,
            request_timeout_seconds: 30,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，用于标识日志和指标的来源
    pub service_name: String,
    pub log_level: String,
    /// 是否输出 JSON 结构化日志
    pub json_logs: bool,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    /// 注入服务名，配置文件中通常不重复填写
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub kafka: KafkaConfig,
    pub erp: ErpApiConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（ERP_ 前缀，双下划线分隔层级，如 ERP_KAFKA__SOURCE_TOPIC -> kafka.source_topic）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("ERP_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            // 字段名本身含下划线（source_topic），因此层级分隔符使用双下划线
            .add_source(
                Environment::with_prefix("ERP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}
