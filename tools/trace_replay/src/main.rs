use std::{
    env,
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    process,
    time::Duration,
};

use edgetap::{
    dispatch::LogSink,
    gesture::{GestureConfig, GestureName},
    pipeline::Pipeline,
    synth::TrajectoryGenerator,
    trace::{encode, TraceReader},
    Frame, MalformedStreamError,
};

enum Input {
    Trace(PathBuf),
    Generate(String),
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(usage());
    }

    let mut input: Option<Input> = None;
    let mut expect_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut write_path: Option<PathBuf> = None;

    let mut idx = 1usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--expect" => {
                idx += 1;
                let Some(path) = args.get(idx) else {
                    return Err("missing path after --expect".into());
                };
                expect_path = Some(PathBuf::from(path));
            }
            "--config" => {
                idx += 1;
                let Some(path) = args.get(idx) else {
                    return Err("missing path after --config".into());
                };
                config_path = Some(PathBuf::from(path));
            }
            "--generate" => {
                idx += 1;
                let Some(name) = args.get(idx) else {
                    return Err("missing trajectory name after --generate".into());
                };
                if input.is_some() {
                    return Err("multiple inputs provided".into());
                }
                input = Some(Input::Generate(name.clone()));
            }
            "--write" => {
                idx += 1;
                let Some(path) = args.get(idx) else {
                    return Err("missing path after --write".into());
                };
                write_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{}", usage());
                return Ok(());
            }
            value if value.starts_with('-') => {
                return Err(format!("unknown argument: {value}"));
            }
            value => {
                if input.is_some() {
                    return Err("multiple inputs provided".into());
                }
                input = Some(Input::Trace(PathBuf::from(value)));
            }
        }
        idx += 1;
    }

    let config = match &config_path {
        Some(path) => GestureConfig::load(path).map_err(|e| e.to_string())?,
        None => GestureConfig::default(),
    };
    let frames = match input.ok_or_else(usage)? {
        Input::Trace(path) => read_trace(&path)?,
        Input::Generate(name) => TrajectoryGenerator::new(&config)
            .generate(&name)
            .map_err(|e| e.to_string())?,
    };

    if let Some(path) = &write_path {
        let bytes = encode(&frames).map_err(|e| format!("failed to encode trace: {e}"))?;
        fs::write(path, bytes).map_err(|e| format!("failed to write {}: {e}", path.display()))?;
    }

    let mut pipeline = Pipeline::new(&config);
    let mut sink = LogSink::new();
    let mut gestures: Vec<GestureName> = Vec::new();

    println!("event,ms,kind,slot,x,y,down_x,down_y,duration_ms");
    for frame in &frames {
        let outcome = pipeline
            .process_frame(frame, &mut sink)
            .map_err(|e| e.to_string())?;
        for candidate in &outcome.candidates {
            println!(
                "event,{},contact,{},{},{},{},{},{}",
                millis(candidate.up_at),
                candidate.slot,
                candidate.up_x,
                candidate.up_y,
                candidate.down_x,
                candidate.down_y,
                millis(candidate.duration())
            );
        }
        for gesture in &outcome.gestures {
            println!("event,{},{},,,,,,", millis(gesture.at), gesture.name);
            gestures.push(gesture.name);
        }
    }

    if let Some(expect_path) = expect_path {
        let expected = parse_expected_gestures(&expect_path)?;
        if gestures != expected {
            eprintln!("expected gestures: {}", join(&expected));
            eprintln!("actual gestures:   {}", join(&gestures));
            return Err("gesture sequence mismatch".into());
        }
    }

    Ok(())
}

fn usage() -> String {
    "usage: trace_replay <trace.taptrace | --generate name> [--config gestures.toml] [--expect expected_gestures.txt] [--write out.taptrace]".to_string()
}

fn millis(value: Duration) -> u128 {
    value.as_millis()
}

fn join(names: &[GestureName]) -> String {
    names
        .iter()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn read_trace(path: &Path) -> Result<Vec<Frame>, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    TraceReader::new(BufReader::new(file))
        .collect::<Result<Vec<Frame>, MalformedStreamError>>()
        .map_err(|e| format!("{}: {e}", path.display()))
}

fn parse_expected_gestures(path: &Path) -> Result<Vec<GestureName>, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    let reader = BufReader::new(file);

    let mut names = Vec::new();
    for (line_no, line_result) in reader.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line_result
            .map_err(|e| format!("failed to read {}:{}: {e}", path.display(), line_no))?;
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }

        let name = token.to_ascii_lowercase().parse::<GestureName>().map_err(|e| {
            format!("{}:{} invalid expected gesture: {e}", path.display(), line_no)
        })?;
        names.push(name);
    }

    Ok(names)
}
