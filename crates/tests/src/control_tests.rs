use std::sync::{Arc, Mutex};

use contracts::{
    ArmState, EngineConfig, FrameId, GroupId, ImageFrame, ParamValue, ParameterSet, ResultFrame,
    SensorId, SensorSelector,
};
use flow_engine::{
    AnyChannel, Channel, CollectSensorIds, CollectTiming, CountProcessedFrames, Graph, GraphOp,
    IndexNodes, NodeId, ResultNode, SinkNode, SourceNode, WireSensor, RESULT_OUTPUT,
};
use observability::TimingAggregator;

use crate::fixtures::{flat_image, Brightness, Recorder};

struct Inspection {
    graph: Graph,
    camera: NodeId,
    brightness: NodeId,
    verdict: NodeId,
    store: NodeId,
    results: Arc<Mutex<Vec<(FrameId, ResultFrame)>>>,
}

/// camera -> brightness -> verdict -> store
fn inspection(config: EngineConfig) -> Inspection {
    let mut graph = Graph::new(config);
    let store_results = Arc::new(Mutex::new(Vec::new()));

    let store = {
        let results = store_results.clone();
        graph
            .add_node(SinkNode::new("Store", move |frame, result: ResultFrame| {
                results.lock().unwrap().push((frame, result));
            }))
            .unwrap()
    };
    let verdict = graph
        .add_node(ResultNode::new("Verdict", |_, mean: &f64| {
            if *mean > 128.0 {
                ResultFrame::io("brightness", vec![*mean])
            } else {
                ResultFrame::nio("brightness", vec![*mean])
            }
        }))
        .unwrap();
    let brightness = graph.add_node(Brightness::new()).unwrap();
    let camera = graph
        .add_node(SourceNode::<ImageFrame>::new(
            "Camera",
            "Image",
            SensorSelector::Id(SensorId(0)),
        ))
        .unwrap();

    graph
        .connect(camera, "Image", brightness, GroupId::IMMEDIATE)
        .unwrap();
    graph
        .connect(brightness, "Mean", verdict, GroupId::IMMEDIATE)
        .unwrap();
    graph
        .connect(verdict, RESULT_OUTPUT, store, GroupId::IMMEDIATE)
        .unwrap();

    Inspection {
        graph,
        camera,
        brightness,
        verdict,
        store,
        results: store_results,
    }
}

fn wire_camera(graph: &Graph) -> Arc<Channel<ImageFrame>> {
    let feed = Arc::new(Channel::<ImageFrame>::new("Sensor0", graph.config().ring_depth));
    let mut wire = WireSensor::new(feed.clone(), SensorId(0));
    graph.apply(&mut wire);
    assert_eq!(wire.finish().unwrap(), 1);
    feed
}

#[test]
fn test_inspection_cycle() {
    let Inspection {
        graph,
        camera,
        brightness,
        verdict,
        store,
        results,
    } = inspection(EngineConfig::default());

    assert_eq!(
        graph.topological_order(),
        vec![camera, brightness, verdict, store]
    );
    let mut index = IndexNodes::new();
    graph
        .apply_in_order(&mut index, &graph.topological_order())
        .unwrap();
    assert_eq!(graph.node(camera).unwrap().name_in_graph(), "Camera0_0");
    assert_eq!(graph.node(store).unwrap().name_in_graph(), "Store0_3");

    graph.apply(&mut GraphOp::Initialize);
    graph.arm(ArmState::CycleStart);
    let feed = wire_camera(&graph);

    for frame in 0..6 {
        let level = if frame % 2 == 0 { 200 } else { 50 };
        feed.write(frame, flat_image(SensorId(0), 4, 4, level));
    }

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|(frame, r)| r.is_nio == (frame % 2 == 1)));
    assert!((results[0].1.values[0] - 200.0).abs() < 1e-9);

    let mut counts = CountProcessedFrames::new();
    graph.apply(&mut counts);
    assert!(counts.is_uniform());
    assert_eq!(counts.slowest(), Some(6));
}

#[test]
fn test_missing_image_skipped_graph_wide() {
    let Inspection { graph, results, .. } = inspection(EngineConfig::default());
    let feed = wire_camera(&graph);

    feed.write(0, flat_image(SensorId(0), 2, 2, 10));
    // Frame 1 never arrives from the camera.
    graph.apply(&mut GraphOp::SkipFrame(1));
    feed.write(2, flat_image(SensorId(0), 2, 2, 250));

    let frames: Vec<FrameId> = results.lock().unwrap().iter().map(|(f, _)| *f).collect();
    assert_eq!(frames, vec![0, 2]);

    let mut timing = CollectTiming::new();
    graph.apply(&mut timing);
    let report = timing.into_report();
    assert_eq!(report.nodes.len(), 4);
    assert!(report.nodes.iter().all(|n| n.processed == 2 && n.skipped == 1));
}

#[test]
fn test_parameters_reach_matching_nodes() {
    let Inspection {
        graph,
        brightness,
        results,
        ..
    } = inspection(EngineConfig::default());
    let feed = wire_camera(&graph);
    feed.write(0, flat_image(SensorId(0), 2, 2, 100));
    assert_eq!(
        graph.node(brightness).unwrap().timing_snapshot().processed,
        1
    );

    let params = ParameterSet::new()
        .with("Scale", ParamValue::Float(2.0))
        .with("Unrelated", ParamValue::Text("ignored".into()));
    graph.apply(&mut GraphOp::SetParameters(params));
    assert_eq!(
        graph.node(brightness).unwrap().timing_snapshot().processed,
        0
    );

    feed.write(1, flat_image(SensorId(0), 2, 2, 100));
    let results = results.lock().unwrap();
    assert!(results[0].1.is_nio);
    assert!(!results[1].1.is_nio);
    assert!((results[1].1.values[0] - 200.0).abs() < 1e-9);
}

#[test]
fn test_timing_reports_fold_across_cycles() {
    let Inspection { graph, .. } = inspection(EngineConfig::default());
    graph.apply(&mut IndexNodes::new());
    graph.apply(&mut GraphOp::SetAlwaysEnableTiming(true));
    let feed = wire_camera(&graph);
    let mut aggregator = TimingAggregator::new();

    for _cycle in 0..3 {
        graph.arm(ArmState::CycleStart);
        for frame in 0..4 {
            feed.write(frame, flat_image(SensorId(0), 8, 8, 128));
        }
        let mut timing = CollectTiming::new();
        graph.apply(&mut timing);
        aggregator.update(&timing.into_report());
        graph.apply(&mut GraphOp::LogProcessingTime);
        graph.apply(&mut GraphOp::SetParameters(ParameterSet::new()));
    }

    let summary = aggregator.summary();
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.total_processed, 3 * 4 * 4);
    assert_eq!(summary.total_skipped, 0);
    assert_eq!(summary.nodes.len(), 4);
    assert!(summary.to_string().contains("Camera0_3"));
}

#[test]
fn test_sensor_wiring_by_id() {
    let mut graph = Graph::new(EngineConfig::default());
    for sensor in [0, 1, 1] {
        graph
            .add_node(SourceNode::<ImageFrame>::new(
                "Camera",
                "Image",
                SensorSelector::Id(SensorId(sensor)),
            ))
            .unwrap();
    }
    graph
        .add_node(SourceNode::<ImageFrame>::new("Any", "Image", SensorSelector::Any))
        .unwrap();
    graph.add_node(Brightness::new()).unwrap();

    let mut ids = CollectSensorIds::new();
    graph.apply(&mut ids);
    assert_eq!(ids.ids().len(), 2);
    assert_eq!(ids.wildcard_sources(), 1);

    let feed = Arc::new(Channel::<ImageFrame>::new("Sensor1", 4));
    let mut wire = WireSensor::new(feed.clone(), SensorId(1));
    graph.apply(&mut wire);
    assert_eq!(wire.wired(), 3);
    assert_eq!(feed.target_count(), 3);
}

#[test]
fn test_lifecycle_hooks_and_dispose_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new(EngineConfig::default());
    let sink = graph
        .add_node(Recorder::new("Sink").0.with_lifecycle(log.clone()))
        .unwrap();
    let source = graph
        .add_node(Recorder::new("Source").0.with_lifecycle(log.clone()))
        .unwrap();
    graph.connect(source, "Out", sink, GroupId::IMMEDIATE).unwrap();

    graph.apply(&mut GraphOp::Initialize);
    graph.arm(ArmState::SeriesStart);
    graph.dispose();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "Sink:init",
            "Source:init",
            "Sink:arm(SeriesStart)",
            "Source:arm(SeriesStart)",
            "Sink:dispose",
            "Source:dispose",
        ]
    );
}
