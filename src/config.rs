use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DEVICE: &str = "0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_INFERENCE_SIZE: u32 = 320;
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_COOLDOWN_SECS: f64 = 2.0;
const DEFAULT_TONE_HZ: u32 = 1000;
const DEFAULT_TONE_MS: u32 = 500;
const DEFAULT_BANNER_TEXT: &str = "WARNING: DRONE";

// COCO ids used by the stock YOLOv8 weights.
const COCO_AEROPLANE: u32 = 4;
const COCO_BIRD: u32 = 14;
const COCO_TV: u32 = 62;
const COCO_LAPTOP: u32 = 63;
const COCO_CELL_PHONE: u32 = 67;

#[derive(Debug, Deserialize, Default)]
struct GuardConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    classes: Option<ClassesConfigFile>,
    alert: Option<AlertConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    inference_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassesConfigFile {
    targets: Option<Vec<TargetClass>>,
    occluders: Option<Vec<OccluderClass>>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    cooldown_secs: Option<f64>,
    audio: Option<String>,
    tone_hz: Option<u32>,
    tone_ms: Option<u32>,
    banner_text: Option<String>,
}

/// Immutable runtime configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub classes: ClassTable,
    pub alert: AlertSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Device index (`"0"`), device node (`"/dev/video2"`) or `stub://name[?frames=N]`.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: PathBuf,
    pub inference_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub cooldown: Duration,
    pub audio: AudioMode,
    pub tone_hz: u32,
    pub tone_ms: u32,
    pub banner_text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioMode {
    Bell,
    Beep,
    None,
}

impl AudioMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bell" => Ok(AudioMode::Bell),
            "beep" => Ok(AudioMode::Beep),
            "none" | "off" => Ok(AudioMode::None),
            other => Err(anyhow!("unknown audio mode '{}' (bell|beep|none)", other)),
        }
    }
}

/// How a target class is handled once it is known not to be on a screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPriority {
    /// Marked and raises the alert.
    Alert,
    /// Marked only.
    Observe,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetClass {
    pub id: u32,
    pub label: String,
    pub priority: TargetPriority,
    /// Extra per-class floor on top of the detector confidence threshold.
    #[serde(default)]
    pub min_confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OccluderClass {
    pub id: u32,
    pub label: String,
}

/// Static class id membership table: targets and screen-like occluders.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTable {
    pub targets: Vec<TargetClass>,
    pub occluders: Vec<OccluderClass>,
}

impl ClassTable {
    pub fn target(&self, class_id: u32) -> Option<&TargetClass> {
        self.targets.iter().find(|t| t.id == class_id)
    }

    pub fn occluder(&self, class_id: u32) -> Option<&OccluderClass> {
        self.occluders.iter().find(|o| o.id == class_id)
    }

    pub fn target_label(&self, class_id: u32) -> &str {
        self.target(class_id)
            .map(|t| t.label.as_str())
            .unwrap_or("unknown")
    }

    fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(anyhow!("at least one target class is required"));
        }
        if !self
            .targets
            .iter()
            .any(|t| t.priority == TargetPriority::Alert)
        {
            return Err(anyhow!("at least one target class must have alert priority"));
        }
        let mut target_ids = HashSet::new();
        for target in &self.targets {
            if !target_ids.insert(target.id) {
                return Err(anyhow!("target class id {} listed twice", target.id));
            }
            if let Some(min) = target.min_confidence {
                validate_unit("min_confidence", min)?;
            }
        }
        let mut occluder_ids = HashSet::new();
        for occluder in &self.occluders {
            if target_ids.contains(&occluder.id) {
                return Err(anyhow!(
                    "class id {} cannot be both a target and an occluder",
                    occluder.id
                ));
            }
            if !occluder_ids.insert(occluder.id) {
                return Err(anyhow!("occluder class id {} listed twice", occluder.id));
            }
        }
        Ok(())
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self {
            targets: vec![
                TargetClass {
                    id: COCO_AEROPLANE,
                    label: "DRONE".to_string(),
                    priority: TargetPriority::Alert,
                    min_confidence: None,
                },
                TargetClass {
                    id: COCO_BIRD,
                    label: "BIRD".to_string(),
                    priority: TargetPriority::Observe,
                    min_confidence: None,
                },
            ],
            occluders: vec![
                OccluderClass {
                    id: COCO_TV,
                    label: "tv".to_string(),
                },
                OccluderClass {
                    id: COCO_LAPTOP,
                    label: "laptop".to_string(),
                },
                OccluderClass {
                    id: COCO_CELL_PHONE,
                    label: "cell phone".to_string(),
                },
            ],
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings {
                device: DEFAULT_DEVICE.to_string(),
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
                target_fps: DEFAULT_FPS,
            },
            detector: DetectorSettings {
                backend: DEFAULT_BACKEND.to_string(),
                model_path: PathBuf::from(DEFAULT_MODEL_PATH),
                inference_size: DEFAULT_INFERENCE_SIZE,
                confidence_threshold: DEFAULT_CONFIDENCE,
                iou_threshold: DEFAULT_IOU,
            },
            classes: ClassTable::default(),
            alert: AlertSettings {
                cooldown: Duration::from_secs_f64(DEFAULT_COOLDOWN_SECS),
                audio: AudioMode::Bell,
                tone_hz: DEFAULT_TONE_HZ,
                tone_ms: DEFAULT_TONE_MS,
                banner_text: DEFAULT_BANNER_TEXT.to_string(),
            },
        }
    }
}

impl GuardConfig {
    /// Defaults, then `DRONE_GUARD_CONFIG` file, then environment overrides.
    ///
    /// The result is not yet validated so callers can layer CLI flags on top
    /// before calling [`GuardConfig::validate`].
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DRONE_GUARD_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like [`GuardConfig::load`], with an explicit file path taking precedence.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => GuardConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: GuardConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let camera = file.camera.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let classes = file.classes.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();

        Ok(Self {
            camera: CameraSettings {
                device: camera.device.unwrap_or(defaults.camera.device),
                width: camera.width.unwrap_or(defaults.camera.width),
                height: camera.height.unwrap_or(defaults.camera.height),
                target_fps: camera.target_fps.unwrap_or(defaults.camera.target_fps),
            },
            detector: DetectorSettings {
                backend: detector.backend.unwrap_or(defaults.detector.backend),
                model_path: detector.model_path.unwrap_or(defaults.detector.model_path),
                inference_size: detector
                    .inference_size
                    .unwrap_or(defaults.detector.inference_size),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(defaults.detector.confidence_threshold),
                iou_threshold: detector
                    .iou_threshold
                    .unwrap_or(defaults.detector.iou_threshold),
            },
            classes: ClassTable {
                targets: classes.targets.unwrap_or(defaults.classes.targets),
                occluders: classes.occluders.unwrap_or(defaults.classes.occluders),
            },
            alert: AlertSettings {
                cooldown: match alert.cooldown_secs {
                    Some(secs) => cooldown_from_secs(secs)?,
                    None => defaults.alert.cooldown,
                },
                audio: match alert.audio.as_deref() {
                    Some(mode) => AudioMode::parse(mode)?,
                    None => defaults.alert.audio,
                },
                tone_hz: alert.tone_hz.unwrap_or(defaults.alert.tone_hz),
                tone_ms: alert.tone_ms.unwrap_or(defaults.alert.tone_ms),
                banner_text: alert.banner_text.unwrap_or(defaults.alert.banner_text),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(device) = non_empty_env("DRONE_GUARD_DEVICE") {
            self.camera.device = device;
        }
        if let Some(backend) = non_empty_env("DRONE_GUARD_BACKEND") {
            self.detector.backend = backend;
        }
        if let Some(model) = non_empty_env("DRONE_GUARD_MODEL") {
            self.detector.model_path = PathBuf::from(model);
        }
        if let Some(conf) = non_empty_env("DRONE_GUARD_CONFIDENCE") {
            self.detector.confidence_threshold = conf
                .parse()
                .map_err(|_| anyhow!("DRONE_GUARD_CONFIDENCE must be a number in [0, 1]"))?;
        }
        if let Some(iou) = non_empty_env("DRONE_GUARD_IOU") {
            self.detector.iou_threshold = iou
                .parse()
                .map_err(|_| anyhow!("DRONE_GUARD_IOU must be a number in [0, 1]"))?;
        }
        if let Some(size) = non_empty_env("DRONE_GUARD_INFERENCE_SIZE") {
            self.detector.inference_size = size
                .parse()
                .map_err(|_| anyhow!("DRONE_GUARD_INFERENCE_SIZE must be an integer"))?;
        }
        if let Some(cooldown) = non_empty_env("DRONE_GUARD_COOLDOWN_SECS") {
            let secs: f64 = cooldown
                .parse()
                .map_err(|_| anyhow!("DRONE_GUARD_COOLDOWN_SECS must be a number of seconds"))?;
            self.set_cooldown_secs(secs)?;
        }
        if let Some(audio) = non_empty_env("DRONE_GUARD_AUDIO") {
            self.alert.audio = AudioMode::parse(&audio)?;
        }
        Ok(())
    }

    pub fn set_cooldown_secs(&mut self, secs: f64) -> Result<()> {
        self.alert.cooldown = cooldown_from_secs(secs)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be >= 1"));
        }
        if self.detector.inference_size == 0 || self.detector.inference_size % 32 != 0 {
            return Err(anyhow!(
                "inference_size must be a positive multiple of 32 (got {})",
                self.detector.inference_size
            ));
        }
        validate_unit("confidence_threshold", self.detector.confidence_threshold)?;
        validate_unit("iou_threshold", self.detector.iou_threshold)?;
        self.classes.validate()?;
        Ok(())
    }
}

fn validate_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1] (got {})", name, value));
    }
    Ok(())
}

fn cooldown_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(anyhow!(
            "cooldown must be a non-negative number of seconds (got {})",
            secs
        ));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| anyhow!("cooldown of {} seconds is out of range: {}", secs, e))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<GuardConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
