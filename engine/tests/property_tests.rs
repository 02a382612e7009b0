use careerflow_engine::config::{BusyPolicy, Config};
use careerflow_engine::memory::{ContextStore, InMemorySessionStore, WorkspaceLog};
use careerflow_engine::router::TaskRouter;
use careerflow_sdk::errors::{EngineErrorExt, ErrorKind};
use careerflow_sdk::types::{Capability, ContextMap, TaskType, WorkspaceEntry};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn test_config_parsing_keeps_values(
        log_level in "error|warn|info|debug|trace",
        ttl_secs in 1..=86_400u64,
        stage_timeout in 1..=600u64,
        busy in "reject|queue",
        applications in 1..=10usize,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let toml = format!(
            r#"
[core]
log_level = "{log_level}"
data_dir = "{}"

[session]
ttl_secs = {ttl_secs}
backend = "memory"

[orchestrator]
stage_timeout_secs = {stage_timeout}
busy_policy = "{busy}"
applications_per_journey = {applications}
"#,
            temp_dir.path().display()
        );

        let config = Config::from_toml_str(&toml).unwrap();
        prop_assert_eq!(config.core.log_level, log_level);
        prop_assert_eq!(config.session.ttl(), Duration::from_secs(ttl_secs));
        prop_assert_eq!(config.orchestrator.stage_timeout_secs, stage_timeout);
        prop_assert_eq!(config.orchestrator.applications_per_journey, applications);
        let expected = if busy == "queue" { BusyPolicy::Queue } else { BusyPolicy::Reject };
        prop_assert_eq!(config.orchestrator.busy_policy, expected);
        // Unset values fall back to defaults
        prop_assert_eq!(config.orchestrator.store_timeout_secs, 5);
    }

    #[test]
    fn test_router_rejects_every_unknown_task_type(task_type in "[a-zA-Z_ ]{0,24}") {
        let known = TaskType::ALL.iter().any(|t| t.as_str() == task_type);
        let resolved = TaskRouter::default().resolve(&task_type);
        if known {
            prop_assert!(resolved.is_ok());
        } else {
            prop_assert_eq!(resolved.unwrap_err().kind(), ErrorKind::UnknownTaskType);
        }
    }

    #[test]
    fn test_router_fan_out_is_at_least_one(n in 0..100usize) {
        let plan = TaskRouter::new(n).plan(TaskType::FullJourney);
        let personalize = plan
            .stages
            .iter()
            .find(|s| s.capability == Capability::Personalize)
            .unwrap();
        prop_assert_eq!(personalize.fan_out, Some(n.max(1)));
    }

    #[test]
    fn test_context_reads_are_last_writer_wins(
        writes in prop::collection::vec((0..5usize, any::<i64>()), 1..40),
    ) {
        let fields = ["profile", "strategy", "job_matches", "applications", "notes"];
        let store = InMemorySessionStore::new(Duration::from_secs(600));

        let context = runtime().block_on(async {
            store.ensure("s1").await.unwrap();
            for (field, value) in &writes {
                store.put("s1", fields[*field], json!(value)).await.unwrap();
            }
            store.get_all("s1").await.unwrap()
        });

        let mut expected = HashMap::new();
        for (field, value) in &writes {
            expected.insert(fields[*field], json!(value));
        }
        prop_assert_eq!(context.len(), expected.len());
        for (field, value) in &expected {
            prop_assert_eq!(context.get(*field), Some(value));
        }
    }

    #[test]
    fn test_fragment_merge_overrides_only_written_fields(
        first in prop::collection::hash_map("[a-d]", any::<u8>(), 1..4),
        second in prop::collection::hash_map("[a-d]", any::<u8>(), 0..4),
    ) {
        let store = InMemorySessionStore::new(Duration::from_secs(600));
        let to_map = |m: &HashMap<String, u8>| -> ContextMap {
            m.iter().map(|(k, v)| (k.clone(), json!(v))).collect()
        };

        let context = runtime().block_on(async {
            store.ensure("s1").await.unwrap();
            store.put_fields("s1", to_map(&first), false).await.unwrap();
            store.put_fields("s1", to_map(&second), true).await.unwrap();
            store.get_all("s1").await.unwrap()
        });

        for (field, value) in context.iter() {
            let expected = second.get(field).or_else(|| first.get(field)).unwrap();
            prop_assert_eq!(value, &json!(expected));
        }
        let union: std::collections::HashSet<_> = first.keys().chain(second.keys()).collect();
        prop_assert_eq!(context.len(), union.len());
    }

    #[test]
    fn test_workspace_log_keeps_append_order(count in 1..30usize) {
        let store = InMemorySessionStore::new(Duration::from_secs(600));

        let entries = runtime().block_on(async {
            store.ensure("s1").await.unwrap();
            for i in 0..count {
                let entry = WorkspaceEntry::new("s1", "agent", Capability::Research, json!(i));
                store.append("s1", entry).await.unwrap();
            }
            store.read_all("s1").await.unwrap()
        });

        prop_assert_eq!(entries.len(), count);
        for (i, entry) in entries.iter().enumerate() {
            prop_assert_eq!(&entry.payload, &json!(i));
        }
    }
}
