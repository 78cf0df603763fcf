//! 可观测性与配置集成测试
//!
//! 未安装全局 recorder 时，指标记录函数应当是无副作用的空操作。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use erp_shared::observability::metrics::{record_api_request, record_dispatch, record_message};

    #[test]
    fn test_record_message_outcomes() {
        record_message("success");
        record_message("fail");
        record_message("ack_error");
    }

    #[test]
    fn test_record_dispatch() {
        for accepter in [
            "ConfByOrderID",
            "MaterialMovements",
            "BatchCharacteristic",
            "ConfByOrderIDConfGroup",
            "ConfByOrderIDSeqOp",
        ] {
            record_dispatch(accepter);
        }
    }

    #[test]
    fn test_record_api_request() {
        record_api_request("ConfByOrderID", "200", 0.12);
        record_api_request("MaterialMovements", "503", 1.5);
        record_api_request("BatchCharacteristic", "error", 30.0);
    }

    #[test]
    fn test_metrics_with_edge_cases() {
        record_dispatch("");
        record_api_request("Unknown", "", 0.0);
        record_api_request("ConfByOrderID", "200", f64::MAX);
    }
}

// ============================================================================
// 日志过滤器测试
// ============================================================================

mod tracing_tests {
    use erp_shared::config::ObservabilityConfig;
    use erp_shared::observability::tracing::build_filter;

    #[test]
    fn test_invalid_log_level_falls_back() {
        let config = ObservabilityConfig {
            log_level: "not a [valid filter".to_string(),
            ..Default::default()
        };
        // 无效表达式不应 panic
        let _ = build_filter(&config);
    }

    #[test]
    fn test_directive_log_level() {
        let config = ObservabilityConfig {
            log_level: "info,production_order_confirmation=debug".to_string(),
            ..Default::default()
        };
        let _ = build_filter(&config);
    }
}

// ============================================================================
// 配置测试
// ============================================================================

mod config_tests {
    use erp_shared::config::{AppConfig, ObservabilityConfig};

    #[test]
    fn test_default_observability_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "unknown-service");
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_with_service_name() {
        let config = ObservabilityConfig::default().with_service_name("production-order-confirmation");
        assert_eq!(config.service_name, "production-order-confirmation");
    }

    #[test]
    fn test_app_config_defaults_are_usable() {
        let config = AppConfig::default();
        assert!(!config.kafka.source_topic.is_empty());
        assert!(!config.kafka.destination_topic.is_empty());
        assert!(!config.kafka.dead_letter_topic.is_empty());
        assert_ne!(config.kafka.source_topic, config.kafka.dead_letter_topic);
        assert!(config.erp.api_key.is_none());
        assert!(config.erp.request_timeout_seconds > 0);
    }
}

// ============================================================================
// 死信信封测试
// ============================================================================

mod dlq_tests {
    use erp_shared::dlq::DeadLetterMessage;

    #[test]
    fn test_envelope_serializes_camel_case() {
        let msg = DeadLetterMessage::new(
            "order-1",
            "erp.production-order-confirmation.requests",
            2,
            41,
            r#"{"Accepter":["All"]}"#,
            "处理过程中发生 panic: boom",
            "production-order-confirmation",
        );

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["messageId"], "order-1");
        assert_eq!(json["sourceTopic"], "erp.production-order-confirmation.requests");
        assert_eq!(json["partition"], 2);
        assert_eq!(json["offset"], 41);
        assert_eq!(json["sourceService"], "production-order-confirmation");
        assert!(json.get("failedAt").is_some());

        let back: DeadLetterMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.error, "处理过程中发生 panic: boom");
    }
}

// ============================================================================
// Guard 测试
// ============================================================================

mod guard_tests {
    use erp_shared::observability::ObservabilityGuard;

    #[test]
    fn test_empty_guard() {
        let guard = ObservabilityGuard::empty();
        drop(guard);
    }
}
