use careerflow_sdk::errors::{EngineError, EngineErrorExt};
use careerflow_sdk::models::truncate_at_boundary;
use careerflow_sdk::types::{Diagnostic, TaskType};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_error_user_hint_completeness(detail in "\\PC*", stage in 0..10usize) {
        let errs = vec![
            EngineError::UnknownTaskType(detail.clone()),
            EngineError::MissingContext {
                stage,
                capability: "research".to_string(),
                field: detail.clone(),
            },
            EngineError::AgentFailed { agent: "a".to_string(), reason: detail.clone() },
            EngineError::StageTimeout(stage as u64, detail.clone()),
            EngineError::StoreTimeout(stage as u64, detail.clone()),
            EngineError::Cancelled(stage),
            EngineError::SessionExpired(detail.clone()),
            EngineError::SessionNotFound(detail.clone()),
            EngineError::SessionBusy(detail.clone()),
            EngineError::PersistenceWarning { artifact: "profile".to_string(), reason: detail.clone() },
            EngineError::InvalidInput(detail.clone()),
            EngineError::Config(detail.clone()),
            EngineError::Database(detail.clone()),
            EngineError::Internal(detail.clone()),
        ];

        for err in errs {
            prop_assert!(!err.user_hint().is_empty());

            let diagnostic = Diagnostic::from_error(&err);
            prop_assert_eq!(diagnostic.kind, err.kind());
            prop_assert_eq!(diagnostic.message, err.to_string());
        }
    }

    #[test]
    fn test_task_type_parse_accepts_only_known_names(name in "[a-z_]{0,20}") {
        match name.parse::<TaskType>() {
            Ok(task_type) => prop_assert_eq!(task_type.as_str(), name.as_str()),
            Err(e) => prop_assert!(TaskType::ALL.iter().all(|t| t.as_str() != name), "{}", e),
        }
    }

    #[test]
    fn test_truncate_never_splits_characters(text in "\\PC{0,200}", max in 0..300usize) {
        let mut truncated = text.clone();
        truncate_at_boundary(&mut truncated, max);
        prop_assert!(truncated.len() <= max);
        prop_assert!(text.starts_with(truncated.as_str()));
        if text.len() <= max {
            prop_assert_eq!(&truncated, &text);
        }
    }
}
