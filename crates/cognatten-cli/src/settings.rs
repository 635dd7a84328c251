use std::path::PathBuf;

/// CLI settings, read from the same `COGNATTEN_*` environment variables
/// the daemon uses so both surfaces point at the same data.
pub struct Settings {
    pub db_path: PathBuf,
    pub photo_dir: PathBuf,
    pub model_dir: PathBuf,
    pub camera_device: String,
    pub match_tolerance: f32,
    pub frames_per_capture: usize,
}

impl Settings {
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

        Self {
            db_path: std::env::var("COGNATTEN_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("attendance.db")),
            photo_dir: std::env::var("COGNATTEN_PHOTO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("faces")),
            model_dir,
            camera_device: std::env::var("COGNATTEN_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            match_tolerance: std::env::var("COGNATTEN_MATCH_TOLERANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(cognatten_core::types::DEFAULT_MATCH_TOLERANCE),
            frames_per_capture: std::env::var("COGNATTEN_FRAMES_PER_SCAN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }

    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    pub fn encoder_model_path(&self) -> String {
        self.model_dir
            .join("mobilefacenet.onnx")
            .to_string_lossy()
            .into_owned()
    }
}
