#[cfg(test)]
mod error_tests {
    use crate::*;

    #[test]
    fn test_orchestrator_error_display() {
        let validation = OrchestratorError::validation("task_sequence 不能为空");
        assert_eq!(validation.to_string(), "数据验证失败: task_sequence 不能为空");

        let duplicate = OrchestratorError::duplicate_pipeline("p1");
        assert_eq!(duplicate.to_string(), "流水线已存在: p1");

        let not_found = OrchestratorError::pipeline_not_found("p2");
        assert_eq!(not_found.to_string(), "流水线未找到: p2");

        let coded = OrchestratorError::from(CodedError::upstream("HTTP 404"));
        assert_eq!(coded.to_string(), "推理后端错误: [GATEWAY-102] HTTP 404");
    }

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::Connection.as_str(), "GATEWAY-101");
        assert_eq!(ErrorCode::Upstream.as_str(), "GATEWAY-102");
        assert_eq!(ErrorCode::Timeout.as_str(), "GATEWAY-103");
        assert_eq!(ErrorCode::NotReady.as_str(), "GATEWAY-107");

        let json = serde_json::to_string(&ErrorCode::Timeout).unwrap();
        assert_eq!(json, "\"GATEWAY-103\"");
    }

    #[test]
    fn test_step_annotation_keeps_root_cause() {
        let err = OrchestratorError::from(CodedError::timeout("20000ms"))
            .at_step(1, "nmt");

        match &err {
            OrchestratorError::StepFailed {
                step_index,
                task_type,
                ..
            } => {
                assert_eq!(*step_index, 1);
                assert_eq!(task_type, "nmt");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let coded = err.coded().expect("root cause should be a gateway error");
        assert_eq!(coded.code, ErrorCode::Timeout);
        assert!(!err.is_client_error());
        assert_eq!(err.user_message(), "推理后端响应超时");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(OrchestratorError::validation("bad").is_client_error());
        assert!(OrchestratorError::duplicate_pipeline("p").is_client_error());
        assert!(OrchestratorError::validation("no backend")
            .at_step(0, "asr")
            .is_client_error());
        assert!(!OrchestratorError::Internal("boom".into()).is_client_error());
        assert!(!OrchestratorError::from(CodedError::connection("refused")).is_client_error());
    }

    #[test]
    fn test_capture_records_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let coded = CodedError::capture(ErrorCode::Connection, "连接失败", &io);

        assert_eq!(coded.code, ErrorCode::Connection);
        assert_eq!(coded.message, "连接失败");
        assert!(coded.trace.contains("refused"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let converted: OrchestratorError = err.into();
        assert!(matches!(converted, OrchestratorError::Serialization(_)));
    }
}
