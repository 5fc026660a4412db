use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use road_damage_detect::config::{AppConfig, CONFIG_ENV};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        CONFIG_ENV,
        "ROAD_DAMAGE_MODEL",
        "ROAD_DAMAGE_CONFIDENCE",
        "ROAD_DAMAGE_CAMERA",
        "ROAD_DAMAGE_OUT_DIR",
        "ROAD_DAMAGE_FONT",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        r#"{
            "confidence": 0.4,
            "model": {
                "path": "weights/road.onnx",
                "input_size": 320,
                "iou_threshold": 0.5
            },
            "camera": {
                "device": "/dev/video2",
                "width": 1280,
                "height": 720,
                "target_fps": 15
            },
            "output": {
                "dir": "runs/today",
                "keep_frames": true
            }
        }"#,
    );

    std::env::set_var(CONFIG_ENV, file.path());
    std::env::set_var("ROAD_DAMAGE_CONFIDENCE", "0.6");
    std::env::set_var("ROAD_DAMAGE_CAMERA", "stub://bench");

    let cfg = AppConfig::load().expect("load config");

    assert_eq!(cfg.model.path, PathBuf::from("weights/road.onnx"));
    assert_eq!(cfg.model.input_size, 320);
    assert_eq!(cfg.model.iou_threshold, 0.5);
    assert_eq!(cfg.confidence.get(), 0.6);
    assert_eq!(cfg.camera.device, "stub://bench");
    assert_eq!((cfg.camera.width, cfg.camera.height), (1280, 720));
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.output.dir, PathBuf::from("runs/today"));
    assert!(cfg.output.keep_frames);

    clear_env();
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load defaults");
    assert_eq!(cfg.model.path, PathBuf::from("best.onnx"));
    assert_eq!(cfg.confidence.get(), 0.25);
    assert_eq!(cfg.camera.device, "/dev/video0");
    assert_eq!(cfg.output.dir, PathBuf::from("road_damage_out"));
    assert!(cfg.font_path.is_none());
}

#[test]
fn explicit_path_wins_over_config_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let from_env = config_file(r#"{"model": {"path": "env.onnx"}}"#);
    let explicit = config_file(r#"{"model": {"path": "explicit.onnx"}}"#);
    std::env::set_var(CONFIG_ENV, from_env.path());
    std::env::set_var("ROAD_DAMAGE_FONT", "/usr/share/fonts/road.ttf");

    let cfg = AppConfig::load_from(Some(explicit.path())).expect("load explicit");
    assert_eq!(cfg.model.path, PathBuf::from("explicit.onnx"));
    assert_eq!(cfg.font_path, Some(PathBuf::from("/usr/share/fonts/road.ttf")));

    clear_env();
}

#[test]
fn rejects_invalid_confidence_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ROAD_DAMAGE_CONFIDENCE", "1.5");
    assert!(AppConfig::load().is_err());

    std::env::set_var("ROAD_DAMAGE_CONFIDENCE", "high");
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains("ROAD_DAMAGE_CONFIDENCE"));

    clear_env();
}

#[test]
fn rejects_malformed_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(r#"{"camera": {"width": 0}}"#);
    assert!(AppConfig::load_from(Some(file.path())).is_err());

    let file = config_file("{ not json");
    let err = AppConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
