use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
};

use edgetap::{
    device::{encode_input_event, DeviceSink, DeviceSource},
    dispatch::{ActionSpec, LogSink},
    error::ConfigError,
    event::{flatten_frames, EventKind, Frames},
    gesture::{ActionSource, GestureConfig, GestureName},
    pipeline::Pipeline,
    synth::TrajectoryGenerator,
    trace::{decode, encode, TraceReader, TraceWriter},
};

const LEFT_WITH_RECORDED_ACTION: &str = r#"
[screen]
width = 1404
height = 1872

[[gestures]]
name = "left"
rect = { x_min = 0, y_min = 0, x_max = 500, y_max = 1001 }

[actions.left]
trace = "captured/next.taptrace"
"#;

#[test]
fn recorded_trace_retriggers_on_replay() {
    let config = GestureConfig::default();
    let frames = TrajectoryGenerator::new(&config)
        .generate("double_tap_right")
        .expect("known trajectory");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.taptrace");

    let recorded = {
        let file = File::create(&path).expect("create trace");
        let mut recorder = TraceWriter::new(BufWriter::new(file));
        let mut sink = LogSink::new();
        let summary = Pipeline::new(&config)
            .run(frames.clone().into_iter().map(Ok), &mut sink, Some(&mut recorder))
            .expect("live run");
        recorder.finish().expect("finish trace");
        summary
    };
    assert_eq!(recorded.gestures.len(), 1);
    assert_eq!(fs::read(&path).expect("read trace"), encode(&frames).expect("encodes"));

    let replay = TraceReader::new(BufReader::new(File::open(&path).expect("open trace")));
    let mut sink = LogSink::new();
    let replayed = Pipeline::new(&config)
        .run(replay, &mut sink, None::<&mut TraceWriter<File>>)
        .expect("replay run");

    assert_eq!(replayed.gestures, recorded.gestures);
    assert_eq!(sink.lines(), &["gesture right".to_owned()]);
}

#[test]
fn truncated_trace_file_fails_the_replay() {
    let config = GestureConfig::default();
    let frames = TrajectoryGenerator::new(&config)
        .generate("double_tap_left")
        .expect("known trajectory");
    let mut bytes = encode(&frames).expect("encodes");
    bytes.truncate(bytes.len() - 7);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cut.taptrace");
    fs::write(&path, &bytes).expect("write trace");

    let replay = TraceReader::new(File::open(&path).expect("open trace"));
    let mut sink = LogSink::new();
    let err = Pipeline::new(&config)
        .run(replay, &mut sink, None::<&mut TraceWriter<File>>)
        .expect_err("truncated trace must fail");
    assert!(err.to_string().contains("truncated"), "{err}");
    // The first tap was complete; its pairing tap never arrived.
    assert!(sink.lines().is_empty());
}

#[test]
fn device_stream_drives_a_device_sink() {
    let config = GestureConfig::default();
    let frames = TrajectoryGenerator::new(&config)
        .generate("double_tap_top")
        .expect("known trajectory");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("event0");
    {
        let mut file = BufWriter::new(File::create(&path).expect("create device dump"));
        for event in flatten_frames(&frames) {
            file.write_all(&encode_input_event(&event)).expect("write event");
        }
        file.flush().expect("flush");
    }

    let source = Frames::new(DeviceSource::new(BufReader::new(
        File::open(&path).expect("open device dump"),
    )));
    let mut sink = DeviceSink::new(Vec::new());
    let summary = Pipeline::new(&config)
        .run(source, &mut sink, None::<&mut TraceWriter<File>>)
        .expect("device run");
    assert_eq!(summary.frames, frames.len() as u64);
    assert_eq!(summary.gestures.len(), 1);
    assert_eq!(summary.gestures[0].name, GestureName::Top);

    let written = sink.into_inner();
    let swipe: Vec<_> = Frames::new(DeviceSource::new(written.as_slice()))
        .collect::<Result<_, _>>()
        .expect("swipe parses back into frames");
    let swipe = swipe.iter().flat_map(|frame| frame.events()).collect::<Vec<_>>();
    let top = config.actions[&GestureName::Top]
        .swipe()
        .copied()
        .expect("top is a swipe");
    assert_eq!(swipe[0].kind, EventKind::TrackingId);
    assert_eq!(swipe[0].value, top.tracking_id);
    let xs: Vec<i32> = swipe
        .iter()
        .filter(|event| event.kind == EventKind::AbsX)
        .map(|event| event.value)
        .collect();
    assert_eq!(xs.first().copied(), Some(top.from.0));
    assert_eq!(xs.last().copied(), Some(top.to.0));
}

#[test]
fn recorded_trace_bound_as_an_action_is_replayed() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("captured")).expect("mkdir");
    let captured = TrajectoryGenerator::new(&GestureConfig::default())
        .generate("tap_top")
        .expect("known trajectory");
    let bytes = encode(&captured).expect("encodes");
    fs::write(dir.path().join("captured/next.taptrace"), &bytes).expect("write trace");
    let config_path = dir.path().join("gestures.toml");
    fs::write(&config_path, LEFT_WITH_RECORDED_ACTION).expect("write config");

    let config = GestureConfig::load(&config_path).expect("config with trace action loads");
    assert!(matches!(
        &config.actions[&GestureName::Left],
        ActionSource::Recorded(recorded) if recorded.frames.len() == captured.len()
    ));

    let frames = TrajectoryGenerator::new(&config)
        .generate("double_tap_left")
        .expect("known trajectory");
    let mut sink = LogSink::new();
    let summary = Pipeline::new(&config)
        .run(frames.into_iter().map(Ok), &mut sink, None::<&mut TraceWriter<File>>)
        .expect("run");

    assert_eq!(summary.gestures.len(), 1);
    let expected = ActionSpec::recorded(&decode(&bytes).expect("decodes"))
        .rebased(summary.gestures[0].at);
    assert_eq!(sink.events(), expected.as_slice());
    assert!(sink
        .events()
        .iter()
        .any(|event| event.kind == EventKind::Pressure));
}

#[test]
fn broken_action_trace_fails_the_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("gestures.toml");
    fs::write(&config_path, LEFT_WITH_RECORDED_ACTION).expect("write config");

    let err = GestureConfig::load(&config_path).expect_err("missing trace");
    assert!(matches!(err, ConfigError::Io { .. }), "{err}");

    fs::create_dir(dir.path().join("captured")).expect("mkdir");
    fs::write(dir.path().join("captured/next.taptrace"), b"TAPTRACE").expect("write trace");
    let err = GestureConfig::load(&config_path).expect_err("truncated trace");
    assert!(matches!(err, ConfigError::Trace { .. }), "{err}");

    fs::write(dir.path().join("captured/next.taptrace"), encode(&[]).expect("encodes"))
        .expect("write trace");
    match GestureConfig::load(&config_path) {
        Err(ConfigError::Validation(msg)) => assert!(msg.contains("no touch contact"), "{msg}"),
        other => panic!("expected validation error, got {other:?}"),
    }
}
