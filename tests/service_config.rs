use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use rrb_detect::config::ServiceConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "RRB_CONFIG",
        "RRB_API_ADDR",
        "RRB_MODEL_PATH",
        "RRB_POSE_MODEL_PATH",
        "RRB_LABEL_ENCODER_PATH",
        "RRB_UPLOAD_DIR",
        "RRB_SEQUENCE_LENGTH",
        "RRB_CONFIDENCE_THRESHOLD",
        "RRB_MIN_DETECTION_DURATION",
        "RRB_MAX_UPLOAD_BYTES",
        "RRB_MAX_CONCURRENT_REQUESTS",
        "RRB_ALLOWED_EXTENSIONS",
        "RRB_DEBUG",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ServiceConfig::load().expect("load defaults");
    assert_eq!(cfg.api_addr, "0.0.0.0:5000");
    assert_eq!(cfg.max_upload_size, 100 * 1024 * 1024);
    assert_eq!(cfg.allowed_extensions, vec!["mp4", "avi", "mov", "mkv", "webm"]);
    assert!(!cfg.expose_error_details);
    assert_eq!(cfg.max_concurrent_requests, 4);
    assert_eq!(cfg.detector.sequence_length, 30);
    assert_eq!(cfg.detector.image_size, 224);
    assert_eq!(cfg.detector.confidence_threshold, 0.7);
    assert_eq!(cfg.detector.min_detection_duration, 2.0);
    assert_eq!(cfg.categories.len(), 6);
}

#[test]
fn loads_config_from_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "api_addr": "127.0.0.1:8080",
        "upload_dir": "/var/tmp/rrb",
        "allowed_extensions": ["MP4", ".mov"],
        "max_upload_size": 1048576,
        "model": {
            "path": "models/v2.onnx",
            "label_encoder_path": "models/v2_labels.json"
        },
        "detection": {
            "sequence_length": 45,
            "confidence_threshold": 0.8,
            "min_detection_duration": 3.5,
            "max_frames": 9000
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("RRB_CONFIG", file.path());
    std::env::set_var("RRB_CONFIDENCE_THRESHOLD", "0.65");
    std::env::set_var("RRB_DEBUG", "true");

    let cfg = ServiceConfig::load().expect("load config");

    assert_eq!(cfg.api_addr, "127.0.0.1:8080");
    assert_eq!(cfg.upload_dir, PathBuf::from("/var/tmp/rrb"));
    assert_eq!(cfg.allowed_extensions, vec!["mp4", "mov"]);
    assert_eq!(cfg.max_upload_size, 1048576);
    assert_eq!(cfg.model_path, PathBuf::from("models/v2.onnx"));
    assert_eq!(cfg.label_encoder_path, PathBuf::from("models/v2_labels.json"));
    assert_eq!(cfg.detector.sequence_length, 45);
    assert_eq!(cfg.detector.confidence_threshold, 0.65);
    assert_eq!(cfg.detector.min_detection_duration, 3.5);
    assert_eq!(cfg.detector.max_frames, Some(9000));
    assert!(cfg.expose_error_details);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
api_addr = "127.0.0.1:9000"
categories = ["hand_flapping", "normal"]

[model]
path = "m.onnx"

[detection]
image_size = 256
normal_label = "typical"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("RRB_CONFIG", file.path());
    std::env::set_var("RRB_ALLOWED_EXTENSIONS", "mp4, webm");

    let cfg = ServiceConfig::load().expect("load config");
    assert_eq!(cfg.api_addr, "127.0.0.1:9000");
    assert_eq!(cfg.categories, vec!["hand_flapping", "normal"]);
    assert_eq!(cfg.model_path, PathBuf::from("m.onnx"));
    assert_eq!(cfg.detector.image_size, 256);
    assert_eq!(cfg.detector.normal_label, "typical");
    assert_eq!(cfg.allowed_extensions, vec!["mp4", "webm"]);

    clear_env();
}

#[test]
fn rejects_invalid_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RRB_SEQUENCE_LENGTH", "0");
    assert!(ServiceConfig::load().is_err());
    clear_env();

    std::env::set_var("RRB_CONFIDENCE_THRESHOLD", "1.5");
    assert!(ServiceConfig::load().is_err());
    clear_env();

    std::env::set_var("RRB_MIN_DETECTION_DURATION", "soon");
    assert!(ServiceConfig::load().is_err());
    clear_env();

    std::env::set_var("RRB_MAX_UPLOAD_BYTES", "0");
    assert!(ServiceConfig::load().is_err());
    clear_env();

    std::env::set_var("RRB_MAX_CONCURRENT_REQUESTS", "0");
    assert!(ServiceConfig::load().is_err());
    clear_env();

    std::env::set_var("RRB_CONFIG", "/nonexistent/rrb.json");
    assert!(ServiceConfig::load().is_err());
    clear_env();
}

#[test]
fn concurrency_cap_comes_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RRB_MAX_CONCURRENT_REQUESTS", "12");
    let cfg = ServiceConfig::load().expect("load with env override");
    assert_eq!(cfg.max_concurrent_requests, 12);
    clear_env();
}
