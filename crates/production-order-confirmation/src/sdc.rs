//! 确认事件的结构化数据（SDC）映射
//!
//! 把解码后的消息负载映射为类型化的确认记录。映射是宽容的，不做任何校验：
//! 缺失字段和 null 一律视为空字符串或空列表，数字与布尔值转换为字符串，
//! 类型不符的字段（如字符串字段里出现对象）记录告警后按空值处理。

use erp_shared::queue::Payload;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ConfirmationError;

/// 确认事件的结构化记录
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfirmationSdc {
    #[serde(rename = "ConnectionKey", deserialize_with = "lenient_opt_string")]
    pub connection_key: Option<String>,
    #[serde(rename = "RedisKey", deserialize_with = "lenient_opt_string")]
    pub redis_key: Option<String>,
    #[serde(rename = "Filepath", deserialize_with = "lenient_opt_string")]
    pub filepath: Option<String>,
    #[serde(
        rename = "ProductionOrderConfirmation",
        deserialize_with = "lenient_struct"
    )]
    pub production_order_confirmation: ProductionOrderConfirmation,
    /// 调用方请求的 accepter 列表，可以为空
    #[serde(rename = "Accepter", deserialize_with = "lenient_string_list")]
    pub accepter: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProductionOrderConfirmation {
    #[serde(rename = "OrderID", deserialize_with = "lenient_string")]
    pub order_id: String,
    #[serde(rename = "ConfirmationGroup", deserialize_with = "lenient_string")]
    pub confirmation_group: String,
    #[serde(rename = "Sequence", deserialize_with = "lenient_string")]
    pub sequence: String,
    #[serde(rename = "OrderOperation", deserialize_with = "lenient_string")]
    pub order_operation: String,
    #[serde(rename = "MaterialMovements", deserialize_with = "lenient_struct")]
    pub material_movements: MaterialMovements,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MaterialMovements {
    #[serde(rename = "Batch", deserialize_with = "lenient_string")]
    pub batch: String,
}

/// 定位一次确认读取的五个标识字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfirmationKey {
    #[serde(rename = "OrderID")]
    pub order_id: String,
    #[serde(rename = "Batch")]
    pub batch: String,
    #[serde(rename = "ConfirmationGroup")]
    pub confirmation_group: String,
    #[serde(rename = "Sequence")]
    pub sequence: String,
    #[serde(rename = "OrderOperation")]
    pub order_operation: String,
}

/// 上游工作流的关联信息，原样回写到每条读取结果中
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowMetadata {
    #[serde(rename = "ConnectionKey", skip_serializing_if = "Option::is_none")]
    pub connection_key: Option<String>,
    #[serde(rename = "RedisKey", skip_serializing_if = "Option::is_none")]
    pub redis_key: Option<String>,
    #[serde(rename = "Filepath", skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
}

impl ConfirmationSdc {
    /// 从解码后的负载构造确认记录
    pub fn from_payload(payload: &Payload) -> Result<Self, ConfirmationError> {
        serde_json::from_value(Value::Object(payload.clone()))
            .map_err(|e| ConfirmationError::MalformedPayload(e.to_string()))
    }

    pub fn key(&self) -> ConfirmationKey {
        let conf = &self.production_order_confirmation;
        ConfirmationKey {
            order_id: conf.order_id.clone(),
            batch: conf.material_movements.batch.clone(),
            confirmation_group: conf.confirmation_group.clone(),
            sequence: conf.sequence.clone(),
            order_operation: conf.order_operation.clone(),
        }
    }

    pub fn metadata(&self) -> WorkflowMetadata {
        WorkflowMetadata {
            connection_key: self.connection_key.clone(),
            redis_key: self.redis_key.clone(),
            filepath: self.filepath.clone(),
        }
    }
}

/// 提取五个标识字段
pub fn extract_key(payload: &Payload) -> Result<ConfirmationKey, ConfirmationError> {
    ConfirmationSdc::from_payload(payload).map(|sdc| sdc.key())
}

/// 提取调用方请求的 accepter 列表（未经 "All" 展开）
pub fn requested_accepters(payload: &Payload) -> Result<Vec<String>, ConfirmationError> {
    ConfirmationSdc::from_payload(payload).map(|sdc| sdc.accepter)
}

/// 提取上游工作流的关联信息
pub fn extract_metadata(payload: &Payload) -> Result<WorkflowMetadata, ConfirmationError> {
    ConfirmationSdc::from_payload(payload).map(|sdc| sdc.metadata())
}

// ---------------------------------------------------------------------------
// 宽容的反序列化辅助函数
// ---------------------------------------------------------------------------

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other @ (Value::Array(_) | Value::Object(_)) => {
            warn!(value = %other, "字符串字段类型不符，按空字符串处理");
            String::new()
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(scalar_to_string)
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        other => Ok(Some(scalar_to_string(other))),
    }
}

fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.into_iter().map(scalar_to_string).collect()),
        // 单个字符串视为只有一个元素的列表
        Value::String(s) => Ok(vec![s]),
        other => {
            warn!(value = %other, "Accepter 类型不符，按空列表处理");
            Ok(Vec::new())
        }
    }
}

/// 嵌套对象缺失、为 null 或类型不符时取默认值
fn lenient_struct<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(T::default()),
        value @ Value::Object(_) => Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "嵌套字段映射失败，按默认值处理");
            T::default()
        })),
        other => {
            warn!(value = %other, "嵌套字段类型不符，按默认值处理");
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("测试负载必须是 JSON 对象"),
        }
    }

    fn full_payload() -> Payload {
        payload(json!({
            "ConnectionKey": "production_order_confirmation",
            "RedisKey": "abcdefg",
            "Filepath": "/var/lib/aion/Data/rededge_sdc/abcdef.json",
            "ProductionOrderConfirmation": {
                "OrderID": "1000001",
                "ConfirmationGroup": "1",
                "Sequence": "0",
                "OrderOperation": "0010",
                "MaterialMovements": {
                    "Batch": "0000000123"
                }
            },
            "Accepter": ["MaterialMovements"]
        }))
    }

    #[test]
    fn test_extract_full_payload() {
        let sdc = ConfirmationSdc::from_payload(&full_payload()).unwrap();
        let key = sdc.key();

        assert_eq!(key.order_id, "1000001");
        assert_eq!(key.batch, "0000000123");
        assert_eq!(key.confirmation_group, "1");
        assert_eq!(key.sequence, "0");
        assert_eq!(key.order_operation, "0010");
        assert_eq!(sdc.accepter, vec!["MaterialMovements".to_string()]);

        let metadata = sdc.metadata();
        assert_eq!(
            metadata.connection_key.as_deref(),
            Some("production_order_confirmation")
        );
        assert_eq!(metadata.redis_key.as_deref(), Some("abcdefg"));
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let sdc = ConfirmationSdc::from_payload(&payload(json!({
            "ProductionOrderConfirmation": {"ConfirmationGroup": "2"}
        })))
        .unwrap();

        assert_eq!(sdc.key().order_id, "");
        assert_eq!(sdc.key().batch, "");
        assert_eq!(sdc.key().confirmation_group, "2");
        assert!(sdc.accepter.is_empty());
        assert_eq!(sdc.metadata(), WorkflowMetadata::default());
    }

    #[test]
    fn test_empty_payload_is_not_an_error() {
        let sdc = ConfirmationSdc::from_payload(&Payload::new()).unwrap();
        assert_eq!(sdc, ConfirmationSdc::default());
        assert_eq!(sdc.key(), ConfirmationKey::default());
    }

    #[test]
    fn test_nulls_are_tolerated() {
        let sdc = ConfirmationSdc::from_payload(&payload(json!({
            "ProductionOrderConfirmation": {
                "OrderID": null,
                "MaterialMovements": null
            },
            "Accepter": null
        })))
        .unwrap();

        assert_eq!(sdc.key().order_id, "");
        assert_eq!(sdc.key().batch, "");
        assert!(sdc.accepter.is_empty());

        let sdc = ConfirmationSdc::from_payload(&payload(json!({
            "ProductionOrderConfirmation": null
        })))
        .unwrap();
        assert_eq!(sdc.key(), ConfirmationKey::default());
    }

    #[test]
    fn test_scalars_are_stringified() {
        let key = extract_key(&payload(json!({
            "ProductionOrderConfirmation": {
                "OrderID": 1000001,
                "Sequence": 0,
                "ConfirmationGroup": true
            }
        })))
        .unwrap();

        assert_eq!(key.order_id, "1000001");
        assert_eq!(key.sequence, "0");
        assert_eq!(key.confirmation_group, "true");
    }

    #[test]
    fn test_structured_value_in_string_field_becomes_empty() {
        let key = extract_key(&payload(json!({
            "ProductionOrderConfirmation": {
                "OrderID": {"nested": 1},
                "Sequence": [1, 2],
                "OrderOperation": "0010"
            }
        })))
        .unwrap();

        assert_eq!(key.order_id, "");
        assert_eq!(key.sequence, "");
        assert_eq!(key.order_operation, "0010");
    }

    #[test]
    fn test_mistyped_nested_objects_fall_back_to_default() {
        let data = payload(json!({
            "ConnectionKey": {"k": "v"},
            "ProductionOrderConfirmation": "1000001",
            "Accepter": ["MaterialMovements"]
        }));

        assert_eq!(extract_key(&data).unwrap(), ConfirmationKey::default());
        assert_eq!(
            extract_metadata(&data).unwrap().connection_key.as_deref(),
            Some("")
        );
        assert_eq!(
            requested_accepters(&data).unwrap(),
            vec!["MaterialMovements".to_string()]
        );

        let key = extract_key(&payload(json!({
            "ProductionOrderConfirmation": {
                "OrderID": "1000001",
                "MaterialMovements": ["0000000123"]
            }
        })))
        .unwrap();
        assert_eq!(key.order_id, "1000001");
        assert_eq!(key.batch, "");
    }

    #[test]
    fn test_requested_accepters_shapes() {
        assert_eq!(
            requested_accepters(&payload(json!({"Accepter": ["All", "MaterialMovements"]})))
                .unwrap(),
            vec!["All".to_string(), "MaterialMovements".to_string()]
        );
        assert_eq!(
            requested_accepters(&payload(json!({"Accepter": "ConfByOrderID"}))).unwrap(),
            vec!["ConfByOrderID".to_string()]
        );
        assert!(requested_accepters(&payload(json!({"Accepter": []}))).unwrap().is_empty());
        assert!(
            requested_accepters(&payload(json!({"Accepter": {"x": 1}})))
                .unwrap()
                .is_empty()
        );
        assert!(requested_accepters(&payload(json!({"Accepter": 42}))).unwrap().is_empty());
        assert_eq!(
            requested_accepters(&payload(json!({"Accepter": [{"x": 1}, "BatchCharacteristic"]})))
                .unwrap(),
            vec![String::new(), "BatchCharacteristic".to_string()]
        );
    }

    #[test]
    fn test_extraction_is_referentially_transparent() {
        let data = full_payload();
        assert_eq!(extract_key(&data).unwrap(), extract_key(&data).unwrap());
        assert_eq!(
            requested_accepters(&data).unwrap(),
            requested_accepters(&data).unwrap()
        );
    }

    #[test]
    fn test_key_serializes_with_erp_field_names() {
        let key = extract_key(&full_payload()).unwrap();
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["OrderID"], "1000001");
        assert_eq!(json["Batch"], "0000000123");
        assert_eq!(json["OrderOperation"], "0010");
    }
}
