use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Address the HTTP API binds to.
    pub bind_addr: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory holding one reference JPEG per student.
    pub photo_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Euclidean distance threshold for a positive match.
    pub match_tolerance: f32,
    /// Number of frames to capture per scan or photo request.
    pub frames_per_scan: usize,
    /// Number of warmup frames to discard at startup (camera AGC/AE stabilization).
    pub warmup_frames: usize,
}

impl Config {
    /// Load configuration from `COGNATTEN_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("COGNATTEN_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| cognatten_core::default_model_dir());

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("cognatten");

        let db_path = std::env::var("COGNATTEN_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        let photo_dir = std::env::var("COGNATTEN_PHOTO_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("faces"));

        Self {
            bind_addr: std::env::var("COGNATTEN_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8817".to_string()),
            db_path,
            photo_dir,
            model_dir,
            camera_device: std::env::var("COGNATTEN_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            match_tolerance: env_f32(
                "COGNATTEN_MATCH_TOLERANCE",
                cognatten_core::types::DEFAULT_MATCH_TOLERANCE,
            ),
            frames_per_scan: env_usize("COGNATTEN_FRAMES_PER_SCAN", 3),
            warmup_frames: env_usize("COGNATTEN_WARMUP_FRAMES", 4),
        }
    }

    /// Path to the UltraFace detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the MobileFaceNet embedding model.
    pub fn encoder_model_path(&self) -> String {
        self.model_dir
            .join("mobilefacenet.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
