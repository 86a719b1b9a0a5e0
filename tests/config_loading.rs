use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::Builder;

use drone_guard::config::{AudioMode, GuardConfig};
use drone_guard::TargetPriority;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DRONE_GUARD_CONFIG",
        "DRONE_GUARD_DEVICE",
        "DRONE_GUARD_BACKEND",
        "DRONE_GUARD_MODEL",
        "DRONE_GUARD_CONFIDENCE",
        "DRONE_GUARD_IOU",
        "DRONE_GUARD_INFERENCE_SIZE",
        "DRONE_GUARD_COOLDOWN_SECS",
        "DRONE_GUARD_AUDIO",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, body: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().expect("temp config");
    std::io::Write::write_all(&mut file, body.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_file_then_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "camera": { "device": "2", "width": 1280, "height": 720, "target_fps": 15 },
            "detector": { "backend": "tract", "model_path": "models/yolov8s.onnx", "inference_size": 640 },
            "alert": { "cooldown_secs": 4.0, "audio": "beep", "tone_hz": 1500 }
        }"#,
    );
    std::env::set_var("DRONE_GUARD_CONFIG", file.path());
    std::env::set_var("DRONE_GUARD_DEVICE", "stub://roof");
    std::env::set_var("DRONE_GUARD_COOLDOWN_SECS", "3.5");
    std::env::set_var("DRONE_GUARD_CONFIDENCE", "0.6");

    let cfg = GuardConfig::load().expect("load config");
    cfg.validate().expect("valid config");

    assert_eq!(cfg.camera.device, "stub://roof");
    assert_eq!((cfg.camera.width, cfg.camera.height), (1280, 720));
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(cfg.detector.model_path, Path::new("models/yolov8s.onnx"));
    assert_eq!(cfg.detector.inference_size, 640);
    assert!((cfg.detector.confidence_threshold - 0.6).abs() < f32::EPSILON);
    assert!((cfg.detector.iou_threshold - 0.45).abs() < f32::EPSILON);
    assert_eq!(cfg.alert.cooldown, Duration::from_millis(3500));
    assert_eq!(cfg.alert.audio, AudioMode::Beep);
    assert_eq!(cfg.alert.tone_hz, 1500);
    assert_eq!(cfg.alert.tone_ms, 500);

    clear_env();
}

#[test]
fn loads_toml_class_table() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
[classes]
targets = [
    { id = 4, label = "DRONE", priority = "alert" },
    { id = 14, label = "BIRD", priority = "observe", min_confidence = 0.7 },
]
occluders = [{ id = 62, label = "tv" }]
"#,
    );

    let cfg = GuardConfig::load_from(Some(file.path())).expect("load config");
    cfg.validate().expect("valid config");

    assert_eq!(cfg.classes.targets.len(), 2);
    assert_eq!(cfg.classes.target(4).unwrap().priority, TargetPriority::Alert);
    assert_eq!(cfg.classes.target(14).unwrap().min_confidence, Some(0.7));
    assert_eq!(cfg.classes.occluders.len(), 1);
    assert!(cfg.classes.occluder(63).is_none());
    assert_eq!(cfg.camera.device, "0");

    clear_env();
}

#[test]
fn rejects_bad_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DRONE_GUARD_COOLDOWN_SECS", "soon");
    assert!(GuardConfig::load().is_err());
    clear_env();

    std::env::set_var("DRONE_GUARD_AUDIO", "siren");
    assert!(GuardConfig::load().is_err());
    clear_env();

    std::env::set_var("DRONE_GUARD_INFERENCE_SIZE", "100");
    let cfg = GuardConfig::load().expect("parses");
    assert!(cfg.validate().is_err());

    clear_env();
}

#[test]
fn missing_or_malformed_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    assert!(GuardConfig::load_from(Some(Path::new("/nonexistent/drone_guard.json"))).is_err());
    let file = write_config(".json", "{ not json");
    assert!(GuardConfig::load_from(Some(file.path())).is_err());

    clear_env();
}

#[test]
fn bad_alert_values_in_file_are_rejected_like_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(".json", r#"{ "alert": { "cooldown_secs": -5.0 } }"#);
    assert!(GuardConfig::load_from(Some(file.path())).is_err());

    let file = write_config(".json", r#"{ "alert": { "audio": "siren" } }"#);
    assert!(GuardConfig::load_from(Some(file.path())).is_err());

    let file = write_config(".toml", "[alert]\ncooldown_secs = 1e20\n");
    assert!(GuardConfig::load_from(Some(file.path())).is_err());

    clear_env();
}

#[test]
fn huge_env_cooldown_is_an_error_not_a_crash() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DRONE_GUARD_COOLDOWN_SECS", "1e20");
    assert!(GuardConfig::load().is_err());

    clear_env();
}
