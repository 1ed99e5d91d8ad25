use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use super::types::GestureName;
use crate::{
    error::ConfigError,
    event::{EventKind, Frame},
    trace::decode,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

/// Half-open rectangle: `x_min <= x < x_max`, `y_min <= y < y_max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rect {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl Rect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.x_min..self.x_max).contains(&x) && (self.y_min..self.y_max).contains(&y)
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x_min < other.x_max
            && other.x_min < self.x_max
            && self.y_min < other.y_max
            && other.y_min < self.y_max
    }

    fn centre(&self) -> (i32, i32) {
        (
            self.x_min + (self.x_max - self.x_min) / 2,
            self.y_min + (self.y_max - self.y_min) / 2,
        )
    }
}

/// Screen area closest to one edge, in raw panel coordinates: `Top` is the
/// `y = 0` edge whatever way up the device is held. On panels whose y axis
/// grows towards the physical top (the built-in rect layout assumes one),
/// `quadrant = "top"` covers the physical bottom; use a `rect` there instead.
/// Points on a diagonal go to the first quadrant in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quadrant {
    Left,
    Right,
    Top,
    Bottom,
}

impl Quadrant {
    pub fn of(screen: ScreenSize, x: i32, y: i32) -> Option<Quadrant> {
        if !(0..screen.width).contains(&x) || !(0..screen.height).contains(&y) {
            return None;
        }
        let distances = [
            (Quadrant::Left, x),
            (Quadrant::Right, screen.width - 1 - x),
            (Quadrant::Top, y),
            (Quadrant::Bottom, screen.height - 1 - y),
        ];
        let mut best = distances[0];
        for candidate in &distances[1..] {
            if candidate.1 < best.1 {
                best = *candidate;
            }
        }
        Some(best.0)
    }

    /// A point well inside the quadrant: on its axis, one sixth of the
    /// shorter screen side in from its edge.
    fn centre(self, screen: ScreenSize) -> (i32, i32) {
        let (w, h) = (screen.width, screen.height);
        let inset = w.min(h) / 6;
        match self {
            Quadrant::Left => (inset, h / 2),
            Quadrant::Right => (w - 1 - inset, h / 2),
            Quadrant::Top => (w / 2, inset),
            Quadrant::Bottom => (w / 2, h - 1 - inset),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Geometry {
    Rect(Rect),
    Quadrant(Quadrant),
}

impl Geometry {
    pub fn contains(&self, screen: ScreenSize, x: i32, y: i32) -> bool {
        match self {
            Geometry::Rect(rect) => rect.contains(x, y),
            Geometry::Quadrant(quadrant) => Quadrant::of(screen, x, y) == Some(*quadrant),
        }
    }

    pub fn centre(&self, screen: ScreenSize) -> (i32, i32) {
        match self {
            Geometry::Rect(rect) => rect.centre(),
            Geometry::Quadrant(quadrant) => quadrant.centre(screen),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapThresholds {
    pub max_tap_duration: Duration,
    pub max_tap_displacement: u32,
    pub max_inter_tap_gap: Duration,
    pub max_inter_tap_displacement: u32,
}

impl Default for TapThresholds {
    fn default() -> Self {
        Self {
            max_tap_duration: Duration::from_millis(300),
            max_tap_displacement: 40,
            max_inter_tap_gap: Duration::from_millis(700),
            max_inter_tap_displacement: 150,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GestureSpec {
    pub name: GestureName,
    pub geometry: Geometry,
    pub thresholds: TapThresholds,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwipeSpec {
    pub from: (i32, i32),
    pub to: (i32, i32),
    pub duration: Duration,
    pub steps: u16,
    pub tracking_id: i32,
    pub pressure: i32,
}

/// A captured touch sequence replayed as an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedAction {
    pub path: PathBuf,
    pub frames: Vec<Frame>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionSource {
    Swipe(SwipeSpec),
    Recorded(RecordedAction),
}

impl ActionSource {
    pub fn swipe(&self) -> Option<&SwipeSpec> {
        match self {
            ActionSource::Swipe(swipe) => Some(swipe),
            ActionSource::Recorded(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GestureConfig {
    pub screen: ScreenSize,
    pub gestures: Vec<GestureSpec>,
    pub actions: BTreeMap<GestureName, ActionSource>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        let screen = ScreenSize {
            width: 1404,
            height: 1872,
        };
        let thresholds = TapThresholds::default();
        let gesture = |name, rect| GestureSpec {
            name,
            geometry: Geometry::Rect(rect),
            thresholds,
        };
        let swipe = |from, to| {
            ActionSource::Swipe(SwipeSpec {
                from,
                to,
                duration: Duration::from_millis(300),
                steps: 24,
                tracking_id: 0x7fff,
                pressure: 70,
            })
        };

        Self {
            screen,
            gestures: vec![
                gesture(
                    GestureName::Left,
                    Rect {
                        x_min: 0,
                        y_min: 0,
                        x_max: 500,
                        y_max: 1001,
                    },
                ),
                gesture(
                    GestureName::Right,
                    Rect {
                        x_min: 701,
                        y_min: 0,
                        x_max: 1404,
                        y_max: 1001,
                    },
                ),
                gesture(
                    GestureName::Top,
                    Rect {
                        x_min: 0,
                        y_min: 1201,
                        x_max: 1404,
                        y_max: 1872,
                    },
                ),
            ],
            actions: BTreeMap::from([
                (GestureName::Left, swipe((797, 758), (310, 806))),
                (GestureName::Right, swipe((415, 784), (978, 795))),
                (GestureName::Top, swipe((555, 1826), (507, 1346))),
            ]),
        }
    }
}

impl GestureConfig {
    /// Loads a config file. Relative action trace paths resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_toml_in(&raw, base)
    }

    /// Parses a config. Relative action trace paths resolve against the
    /// working directory.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Self::from_toml_in(raw, Path::new(""))
    }

    fn from_toml_in(raw: &str, base: &Path) -> Result<Self, ConfigError> {
        let file = parse_config_str(raw)?;
        let config = build_config(file, base)?;
        validate_config(&config)?;
        Ok(config)
    }

    pub fn spec(&self, name: GestureName) -> Option<&GestureSpec> {
        self.gestures.iter().find(|spec| spec.name == name)
    }

    /// Index of the first configured region containing the point.
    pub fn region_at(&self, x: i32, y: i32) -> Option<usize> {
        self.gestures
            .iter()
            .position(|spec| spec.geometry.contains(self.screen, x, y))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    screen: RawScreen,
    #[serde(default)]
    tap: RawTap,
    gestures: Vec<RawGesture>,
    #[serde(default)]
    actions: BTreeMap<String, RawAction>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScreen {
    width: i32,
    height: i32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTap {
    max_duration_ms: Option<u64>,
    max_displacement_px: Option<u32>,
    max_gap_ms: Option<u64>,
    max_pair_distance_px: Option<u32>,
}

impl RawTap {
    fn apply(&self, base: TapThresholds) -> TapThresholds {
        TapThresholds {
            max_tap_duration: self
                .max_duration_ms
                .map_or(base.max_tap_duration, Duration::from_millis),
            max_tap_displacement: self
                .max_displacement_px
                .unwrap_or(base.max_tap_displacement),
            max_inter_tap_gap: self
                .max_gap_ms
                .map_or(base.max_inter_tap_gap, Duration::from_millis),
            max_inter_tap_displacement: self
                .max_pair_distance_px
                .unwrap_or(base.max_inter_tap_displacement),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGesture {
    name: GestureName,
    rect: Option<Rect>,
    quadrant: Option<Quadrant>,
    #[serde(default)]
    tap: RawTap,
}

/// Either a straight swipe (`from`, `to`, `duration_ms`, `steps`) or a
/// recorded `trace`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAction {
    trace: Option<PathBuf>,
    from: Option<[i32; 2]>,
    to: Option<[i32; 2]>,
    duration_ms: Option<u64>,
    steps: Option<u16>,
    #[serde(default = "default_swipe_tracking_id")]
    tracking_id: i32,
    #[serde(default = "default_swipe_pressure")]
    pressure: i32,
}

impl RawAction {
    fn build(self, name: GestureName, base: &Path) -> Result<ActionSource, ConfigError> {
        let swipe_fields = self.from.is_some()
            || self.to.is_some()
            || self.duration_ms.is_some()
            || self.steps.is_some();
        if let Some(trace) = self.trace {
            if swipe_fields {
                return Err(ConfigError::Validation(format!(
                    "actions.{name} must set either `trace` or swipe fields, not both"
                )));
            }
            let path = base.join(trace);
            return load_recorded(&path).map(ActionSource::Recorded);
        }

        let required = |field: &str| {
            ConfigError::Validation(format!("actions.{name}.{field} is required"))
        };
        let from = self.from.ok_or_else(|| required("from"))?;
        let to = self.to.ok_or_else(|| required("to"))?;
        let duration_ms = self.duration_ms.ok_or_else(|| required("duration_ms"))?;
        let steps = self.steps.ok_or_else(|| required("steps"))?;
        Ok(ActionSource::Swipe(SwipeSpec {
            from: (from[0], from[1]),
            to: (to[0], to[1]),
            duration: Duration::from_millis(duration_ms),
            steps,
            tracking_id: self.tracking_id,
            pressure: self.pressure,
        }))
    }
}

fn load_recorded(path: &Path) -> Result<RecordedAction, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let frames = decode(&bytes).map_err(|source| ConfigError::Trace {
        path: path.display().to_string(),
        source,
    })?;
    Ok(RecordedAction {
        path: path.to_path_buf(),
        frames,
    })
}

fn default_swipe_tracking_id() -> i32 {
    0x7fff
}

fn default_swipe_pressure() -> i32 {
    70
}

pub fn parse_config_str(raw: &str) -> Result<ConfigFile, ConfigError> {
    toml::from_str(raw).map_err(|e| ConfigError::Parse(format!("invalid gesture config: {e}")))
}

fn build_config(file: ConfigFile, base: &Path) -> Result<GestureConfig, ConfigError> {
    let base_thresholds = file.tap.apply(TapThresholds::default());

    let mut gestures = Vec::with_capacity(file.gestures.len());
    for raw in file.gestures {
        let geometry = match (raw.rect, raw.quadrant) {
            (Some(rect), None) => Geometry::Rect(rect),
            (None, Some(quadrant)) => Geometry::Quadrant(quadrant),
            _ => {
                return Err(ConfigError::Validation(format!(
                    "gestures.{} must set exactly one of `rect` or `quadrant`",
                    raw.name
                )))
            }
        };
        gestures.push(GestureSpec {
            name: raw.name,
            geometry,
            thresholds: raw.tap.apply(base_thresholds),
        });
    }

    let mut actions = BTreeMap::new();
    for (key, raw) in file.actions {
        let name: GestureName = key
            .parse()
            .map_err(|e| ConfigError::Validation(format!("actions.{key}: {e}")))?;
        actions.insert(name, raw.build(name, base)?);
    }

    Ok(GestureConfig {
        screen: ScreenSize {
            width: file.screen.width,
            height: file.screen.height,
        },
        gestures,
        actions,
    })
}

pub fn validate_config(config: &GestureConfig) -> Result<(), ConfigError> {
    let fail = |msg: String| Err(ConfigError::Validation(msg));
    let screen = config.screen;

    if screen.width <= 0 || screen.height <= 0 {
        return fail("screen.width and screen.height must be > 0".into());
    }
    if config.gestures.is_empty() {
        return fail("at least one gesture must be configured".into());
    }

    for (idx, spec) in config.gestures.iter().enumerate() {
        let name = spec.name;
        let t = &spec.thresholds;
        if t.max_tap_duration.is_zero() {
            return fail(format!("gestures.{name}.tap.max_duration_ms must be > 0"));
        }
        if t.max_inter_tap_gap.is_zero() {
            return fail(format!("gestures.{name}.tap.max_gap_ms must be > 0"));
        }

        if let Geometry::Rect(rect) = spec.geometry {
            if rect.x_min >= rect.x_max || rect.y_min >= rect.y_max {
                return fail(format!("gestures.{name}.rect must not be empty"));
            }
            if rect.x_min < 0
                || rect.y_min < 0
                || rect.x_max > screen.width
                || rect.y_max > screen.height
            {
                return fail(format!("gestures.{name}.rect must lie within the screen"));
            }
        }

        for other in &config.gestures[..idx] {
            if other.name == name {
                return fail(format!("gesture `{name}` is configured more than once"));
            }
            match (other.geometry, spec.geometry) {
                (Geometry::Rect(a), Geometry::Rect(b)) if a.overlaps(&b) => {
                    return fail(format!(
                        "gestures.{name}.rect overlaps gestures.{}.rect",
                        other.name
                    ));
                }
                (Geometry::Quadrant(a), Geometry::Quadrant(b)) if a == b => {
                    return fail(format!(
                        "gestures.{name}.quadrant duplicates gestures.{}.quadrant",
                        other.name
                    ));
                }
                _ => {}
            }
        }

        if !config.actions.contains_key(&name) {
            return fail(format!("gesture `{name}` has no entry in actions"));
        }
    }

    let inside = |(x, y): (i32, i32)| (0..screen.width).contains(&x) && (0..screen.height).contains(&y);
    for (name, action) in &config.actions {
        if config.spec(*name).is_none() {
            log::warn!("action `{name}` has no configured gesture and will never run");
        }
        let swipe = match action {
            ActionSource::Swipe(swipe) => swipe,
            ActionSource::Recorded(recorded) => {
                let touches = recorded.frames.iter().any(|frame| {
                    frame
                        .fields()
                        .iter()
                        .any(|event| event.kind == EventKind::TrackingId && event.value >= 0)
                });
                if !touches {
                    return fail(format!("actions.{name}.trace contains no touch contact"));
                }
                continue;
            }
        };
        if swipe.steps == 0 {
            return fail(format!("actions.{name}.steps must be > 0"));
        }
        if swipe.duration.is_zero() {
            return fail(format!("actions.{name}.duration_ms must be > 0"));
        }
        if swipe.tracking_id < 0 {
            return fail(format!("actions.{name}.tracking_id must be >= 0"));
        }
        if !inside(swipe.from) || !inside(swipe.to) {
            return fail(format!("actions.{name} endpoints must lie within the screen"));
        }
        if swipe.from == swipe.to {
            return fail(format!("actions.{name}.from and .to must differ"));
        }
    }

    Ok(())
}
