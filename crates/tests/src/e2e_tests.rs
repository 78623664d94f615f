use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use contracts::{ArmState, ChannelName, EngineConfig, FrameId, GroupId};
use flow_engine::{Channel, Graph, GraphOp, NodeId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::fixtures::{config_with_depth, Call, CallLog, Recorder};

/// One recorder node fed by external channels through group 1
fn joined(
    config: EngineConfig,
    names: &[&str],
) -> (Graph, NodeId, Vec<Arc<Channel<i64>>>, CallLog) {
    let depth = config.ring_depth;
    let mut graph = Graph::new(config);
    let (recorder, calls) = Recorder::new("Join");
    let id = graph.add_node(recorder).unwrap();
    let node = graph.node(id).unwrap().clone();
    let channels: Vec<_> = names
        .iter()
        .map(|name| Arc::new(Channel::<i64>::new(*name, depth)))
        .collect();
    for channel in &channels {
        node.connect(channel.clone(), GroupId(1)).unwrap();
    }
    (graph, id, channels, calls)
}

#[test]
fn test_two_sources_one_barrier() {
    let (graph, id, channels, calls) = joined(EngineConfig::default(), &["A", "B"]);
    let node = graph.node(id).unwrap();
    node.set_counter(10);

    channels[0].write(10, 1);
    assert!(calls.lock().unwrap().is_empty());
    channels[1].write(10, 2);

    let calls = calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![Call::Group {
            frame: 10,
            group: GroupId(1),
            member_count: 2,
            values: vec![(ChannelName::from("A"), 1), (ChannelName::from("B"), 2)],
        }]
    );
    assert_eq!(node.frame_counter(), 11);
    assert!(node.groups_idle());
}

#[test]
fn test_missing_frame_recovered_by_slot_reset() {
    let (graph, id, channels, calls) = joined(config_with_depth(4), &["A", "B"]);
    let node = graph.node(id).unwrap();
    let group = node.group(GroupId(1)).unwrap();
    node.set_counter(10);

    channels[0].write(10, 1);
    channels[1].write(11, 2);
    assert_eq!(group.pending(10), 1);
    assert_eq!(group.pending(11), 1);

    // B's frame 10 never arrives.
    graph.apply(&mut GraphOp::ResetSignalCounters(Some(10)));
    assert_eq!(group.pending(10), 0);
    assert_eq!(group.pending(11), 1);

    graph.apply(&mut GraphOp::SkipFrame(10));
    channels[0].write(11, 3);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].frame(), 11);
    assert!(matches!(&calls[0], Call::Group { values, .. } if values.len() == 2));
    assert_eq!(node.frame_counter(), 12);
    assert!(node.groups_idle());
}

#[test]
fn test_stale_signal_evicted_by_newer_frame() {
    let (graph, id, channels, calls) = joined(config_with_depth(1), &["A", "B"]);
    let node = graph.node(id).unwrap();
    let group = node.group(GroupId(1)).unwrap();
    node.set_counter(6);

    channels[0].write(5, 1);
    channels[1].write(6, 2);
    // A's frame-5 flag was dropped, B's frame 6 waits alone.
    assert_eq!(group.pending(6), 1);
    assert!(calls.lock().unwrap().is_empty());

    channels[0].write(6, 3);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].frame(), 6);
    assert!(matches!(&calls[0], Call::Group { values, .. }
        if *values == vec![(ChannelName::from("A"), 3), (ChannelName::from("B"), 2)]));
}

#[test]
fn test_producer_and_workers_keep_frame_order() {
    let mut graph = Graph::new(EngineConfig::default());
    let (recorder, calls) = Recorder::new("Ordered");
    let id = graph.add_node(recorder).unwrap();
    let node = graph.node(id).unwrap().clone();
    let input = Arc::new(Channel::<i64>::new("In", 4));
    node.connect(input.clone(), GroupId::IMMEDIATE).unwrap();
    node.set_counter(1);

    let workers: Vec<_> = [52, 50, 51]
        .into_iter()
        .map(|frame| {
            let node = node.clone();
            thread::spawn(move || node.process_frame(frame))
        })
        .collect();

    let producer = {
        let input = input.clone();
        thread::spawn(move || {
            for frame in (1..=49).chain(53..=100) {
                input.write(frame, frame as i64);
            }
        })
    };

    producer.join().unwrap();
    for worker in workers {
        assert!(worker.join().unwrap());
    }

    let order: Vec<FrameId> = calls.lock().unwrap().iter().map(Call::frame).collect();
    assert_eq!(order, (1..=100).collect::<Vec<_>>());
    assert_eq!(node.frame_counter(), 101);
}

#[test]
fn test_skip_frame_unblocks_waiter() {
    let mut graph = Graph::new(EngineConfig::default());
    let (recorder, calls) = Recorder::new("Skipper");
    let id = graph.add_node(recorder).unwrap();
    let node = graph.node(id).unwrap().clone();
    let (downstream, out_calls) = Recorder::new("Downstream");
    let downstream = graph.add_node(downstream).unwrap();
    graph.connect(id, "Out", downstream, GroupId::IMMEDIATE).unwrap();
    node.set_counter(6);

    let (tx, rx) = mpsc::channel();
    let waiter = {
        let node = node.clone();
        thread::spawn(move || tx.send(node.synchronize_on_frame(8)).unwrap())
    };
    thread::sleep(Duration::from_millis(10));
    assert!(rx.try_recv().is_err());

    node.skip_frame(7);
    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    waiter.join().unwrap();

    assert_eq!(node.frame_counter(), 8);
    assert!(calls.lock().unwrap().is_empty());
    assert!(out_calls.lock().unwrap().is_empty());
    assert_eq!(graph.node(downstream).unwrap().frame_counter(), 0);
}

#[test]
fn test_arm_twenty_node_graph() {
    let mut graph = Graph::new(EngineConfig::default());
    let mut ids = Vec::new();
    for _ in 0..20 {
        ids.push(graph.add_node(Recorder::new("Stage").0).unwrap());
    }
    // Every node joins the outputs of its two predecessors.
    for (i, &id) in ids.iter().enumerate().skip(2) {
        graph.connect(ids[i - 2], "Out", id, GroupId(1)).unwrap();
        graph.connect(ids[i - 1], "Out", id, GroupId(1)).unwrap();
    }
    graph.apply(&mut GraphOp::SetCounter(3));

    // Leave half-signaled barriers everywhere: only the even nodes publish.
    for &id in ids.iter().step_by(2) {
        let out = graph.node(id).unwrap().output_typed::<i64>("Out").unwrap();
        out.write(9, 1);
    }
    assert!(graph.nodes().any(|(_, node)| !node.groups_idle()));

    graph.arm(ArmState::CycleStart);

    for (_, node) in graph.nodes() {
        assert_eq!(node.frame_counter(), 0);
        assert!(node.groups_idle());
    }
    // Idempotent on an idle graph.
    graph.apply(&mut GraphOp::ResetSignalCounters(None));
    assert!(graph.nodes().all(|(_, node)| node.groups_idle() && node.frame_counter() == 0));
}

#[test]
fn test_barrier_ignores_arrival_order() {
    let (graph, id, channels, calls) = joined(EngineConfig::default(), &["A", "B", "C", "D", "E"]);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut order: Vec<usize> = (0..channels.len()).collect();

    for frame in 0..64 {
        order.shuffle(&mut rng);
        for &member in &order {
            channels[member].write(frame, member as i64 + 1);
        }
    }

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 64);
    for (frame, call) in calls.iter().enumerate() {
        match call {
            Call::Group {
                frame: f,
                member_count,
                values,
                ..
            } => {
                assert_eq!(*f, frame as FrameId);
                assert_eq!(*member_count, 5);
                assert_eq!(values.iter().map(|(_, v)| v).sum::<i64>(), 15);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }
    assert_eq!(graph.node(id).unwrap().frame_counter(), 64);
}

#[test]
fn test_barrier_with_concurrent_producers() {
    let (graph, id, channels, calls) = joined(EngineConfig::default(), &["A", "B", "C"]);
    let frames = 200;
    let lockstep = Arc::new(Barrier::new(channels.len()));

    let producers: Vec<_> = channels
        .iter()
        .cloned()
        .map(|channel| {
            let lockstep = lockstep.clone();
            thread::spawn(move || {
                for frame in 0..frames {
                    channel.write(frame, 1);
                    lockstep.wait();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let calls = calls.lock().unwrap();
    let fired: Vec<FrameId> = calls.iter().map(Call::frame).collect();
    assert_eq!(fired, (0..frames).collect::<Vec<_>>());
    assert_eq!(graph.node(id).unwrap().frame_counter(), frames);
    assert!(graph.node(id).unwrap().groups_idle());
}
