//! Configuration Tests

#[cfg(test)]
mod tests {
    use crate::config::{ConfigError, from_yaml_str, load};
    use crate::membership::types::NodeId;
    use crate::tasks::naming::ExtensionPolicy;
    use std::path::PathBuf;
    use std::time::Duration;

    const FULL: &str = r#"
farm:
  node_id: 1
  members: ["10.0.0.1:7400", "10.0.0.2:7400"]
  retry_backoff_ms: 250
worker_threads: 8
transport:
  base_url: "http://service:8080/api"
  timeout_secs: 10
pipelines:
  - input_folder: /data/in
    processed_folder: /data/processed
    ack_folder: /data/ack
    ack_ok_folder: /data/ack/ok
    ack_failed_folder: /data/ack/failed
    input_interval_secs: 120
    output_folder: /data/out
    output_interval_secs: 90
    message_types: ["ORDERS", "INVOIC"]
    extension: edi
    post_process:
      on_sent: "notify {path} {status}"
      on_failed: null
  - output_folder: /data/out2
    extension: none
retention:
  days: 30
  backup_folder: /data/backup
"#;

    // ============================================================
    // PARSING
    // ============================================================

    #[test]
    fn test_full_configuration() {
        let settings = from_yaml_str(FULL).unwrap();

        assert_eq!(settings.farm.local_node_id(), Some(NodeId(1)));
        assert_eq!(settings.farm.self_address(), Some("10.0.0.1:7400"));
        assert_eq!(settings.farm.retry_backoff(), Duration::from_millis(250));
        assert_eq!(settings.worker_threads, 8);
        assert_eq!(settings.transport.timeout(), Duration::from_secs(10));

        let first = &settings.pipelines[0];
        assert_eq!(first.input_interval(), Duration::from_secs(120));
        assert_eq!(first.output_interval(), Duration::from_secs(90));
        assert_eq!(first.message_types, vec!["ORDERS", "INVOIC"]);
        assert_eq!(first.extension, ExtensionPolicy::Fixed("edi".to_string()));

        let folders = first.input_folders().unwrap();
        assert_eq!(folders.input, PathBuf::from("/data/in"));
        assert_eq!(folders.ack_ok, Some(PathBuf::from("/data/ack/ok")));

        let hooks = first.post_process.hooks();
        assert!(hooks.on_sent.is_some());
        assert!(hooks.on_failed.is_none());
        assert!(hooks.on_received.is_none());

        let second = &settings.pipelines[1];
        assert!(second.input_folders().is_none());
        assert_eq!(second.extension, ExtensionPolicy::None);

        assert_eq!(settings.retention.days, 30);
        assert_eq!(settings.retention.interval(), Duration::from_secs(86400));
        assert_eq!(settings.retention_folders().len(), 6);
    }

    #[test]
    fn test_defaults_mean_single_mode() {
        let settings = from_yaml_str(
            "transport:\n  base_url: http://service\npipelines:\n  - output_folder: /out\n",
        )
        .unwrap();

        assert!(settings.farm.local_node_id().is_none());
        assert!(settings.farm.self_address().is_none());
        assert_eq!(settings.worker_threads, 4);
        assert_eq!(settings.retention.days, 0);
        assert_eq!(settings.pipelines[0].extension, ExtensionPolicy::Auto);
        assert_eq!(settings.pipelines[0].output_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_short_intervals_are_raised() {
        let settings = from_yaml_str(
            "transport:\n  base_url: http://service\npipelines:\n  - input_folder: /in\n    input_interval_secs: 5\n",
        )
        .unwrap();

        assert_eq!(settings.pipelines[0].input_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_file_with_node_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("magic-folder.yaml");
        std::fs::write(&path, FULL).unwrap();

        let settings = load(&path, Some(2)).unwrap();
        assert_eq!(settings.farm.local_node_id(), Some(NodeId(2)));
        assert_eq!(settings.farm.self_address(), Some("10.0.0.2:7400"));

        let missing = load(&dir.path().join("absent.yaml"), None);
        assert!(matches!(missing, Err(ConfigError::Load(_))));
    }

    // ============================================================
    // VALIDATION
    // ============================================================

    #[test]
    fn test_node_id_beyond_members() {
        let result = from_yaml_str("farm:\n  node_id: 3\n  members: [\"a:1\", \"b:1\"]\n");
        assert!(matches!(
            result,
            Err(ConfigError::NodeIdOutOfRange { node_id: 3, members: 2 })
        ));
    }

    #[test]
    fn test_member_must_be_host_port() {
        for bad in ["localhost", ":7400", "host:http", "host:0"] {
            let yaml = format!("farm:\n  node_id: 1\n  members: [\"{}\"]\n", bad);
            assert!(
                matches!(from_yaml_str(&yaml), Err(ConfigError::InvalidMember(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_pipeline_needs_base_url() {
        let result = from_yaml_str("pipelines:\n  - input_folder: /in\n");
        assert!(matches!(result, Err(ConfigError::MissingBaseUrl)));
    }

    #[test]
    fn test_pipeline_needs_a_folder() {
        let result = from_yaml_str(
            "transport:\n  base_url: http://service\npipelines:\n  - output_folder: /out\n  - message_types: [ORDERS]\n",
        );
        assert!(matches!(result, Err(ConfigError::EmptyPipeline(1))));
    }

    #[test]
    fn test_zero_worker_threads() {
        let result = from_yaml_str("worker_threads: 0\n");
        assert!(matches!(result, Err(ConfigError::NoWorkerThreads)));
    }
}
