use std::io::Write;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{EngineError, GroupId, LogFormat, Verbosity};
use flow_engine::{Graph, NodeRole};

use crate::fixtures::Recorder;

const ENGINE_TOML: &str = r#"
ring_depth = 2
default_verbosity = "high"
debug_timings = true
timing_history = 16

[logging]
format = "pretty"
level = "debug"
"#;

#[test]
fn test_config_drives_graph_settings() {
    let config = ConfigLoader::load_from_str(ENGINE_TOML, ConfigFormat::Toml).unwrap();
    assert_eq!(config.logging.format, LogFormat::Pretty);

    let mut graph = Graph::new(config);
    let (first, first_calls) = Recorder::new("First");
    let (second, _) = Recorder::new("Second");
    let first = graph.add_node(first).unwrap();
    let second = graph.add_node(second).unwrap();
    graph.connect(first, "Out", second, GroupId::IMMEDIATE).unwrap();

    let node = graph.node(first).unwrap();
    assert_eq!(node.role(), NodeRole::Filter);
    assert_eq!(node.verbosity(), Verbosity::High);
    assert_eq!(node.output("Out").unwrap().depth(), 2);

    // debug_timings: processing indices follow execution order
    graph.node(second).unwrap().set_counter(1);
    node.process_frame(0);
    graph.node(second).unwrap().process_frame(1);
    assert_eq!(first_calls.lock().unwrap().len(), 1);
    assert_eq!(node.timing_snapshot().last_processing_index, Some(0));
    assert_eq!(
        graph
            .node(second)
            .unwrap()
            .timing_snapshot()
            .last_processing_index,
        Some(1)
    );
}

#[test]
fn test_config_file_round_trip() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(ENGINE_TOML.as_bytes()).unwrap();

    let config = ConfigLoader::load_from_path(file.path()).unwrap();
    let json = ConfigLoader::to_json(&config).unwrap();
    let reparsed = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
    assert_eq!(config, reparsed);
    assert_eq!(reparsed.timing_history, 16);
}

#[test]
fn test_invalid_depth_rejected_before_build() {
    let err = ConfigLoader::load_from_str("ring_depth = 0", ConfigFormat::Toml).unwrap_err();
    assert!(matches!(err, EngineError::ConfigValidation { .. }));
    assert!(!err.is_wiring());
}
