use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use cognatten_camera::Camera;
use cognatten_core::{identify_frame, GalleryEntry, GalleryIssue, Identification};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] cognatten_camera::CameraError),
    #[error("detector error: {0}")]
    Detector(#[from] cognatten_core::detector::DetectorError),
    #[error("encoder error: {0}")]
    Encoder(#[from] cognatten_core::encoder::EncoderError),
    #[error("identify error: {0}")]
    Identify(#[from] cognatten_core::pipeline::IdentifyError),
    #[error("no face detected in any captured frame")]
    NoFaceDetected,
    #[error("jpeg encode failed: {0}")]
    JpegEncode(#[from] image::ImageError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    /// Capture a registration photo: best face across N frames, returned
    /// as an encoded JPEG of the full frame.
    CapturePhoto {
        frames_count: usize,
        reply: oneshot::Sender<Result<Vec<u8>, EngineError>>,
    },
    /// Identify the person in front of the camera against the gallery.
    Identify {
        gallery: Vec<GalleryEntry>,
        tolerance: f32,
        frames_count: usize,
        reply: oneshot::Sender<Result<Option<Identification>, EngineError>>,
    },
    /// Re-encode the enrolled gallery from the photo directory.
    LoadGallery {
        photos: Vec<(String, PathBuf)>,
        reply: oneshot::Sender<(Vec<GalleryEntry>, Vec<GalleryIssue>)>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Capture a registration photo as JPEG bytes.
    pub async fn capture_photo(&self, frames_count: usize) -> Result<Vec<u8>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::CapturePhoto {
                frames_count,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Capture frames and match the best face against the gallery.
    /// `Ok(None)` means no face was visible in any frame.
    pub async fn identify(
        &self,
        gallery: Vec<GalleryEntry>,
        tolerance: f32,
        frames_count: usize,
    ) -> Result<Option<Identification>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Identify {
                gallery,
                tolerance,
                frames_count,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Encode every enrolled photo into a fresh gallery.
    pub async fn load_gallery(
        &self,
        photos: Vec<(String, PathBuf)>,
    ) -> Result<(Vec<GalleryEntry>, Vec<GalleryIssue>), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::LoadGallery {
                photos,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// A handle whose engine thread is gone; every request errors with
    /// `ChannelClosed`. Used by tests that exercise the HTTP surface
    /// without camera hardware.
    #[cfg(test)]
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Opens the camera, loads both ONNX models, discards warmup frames,
/// then enters a request loop. Fails fast at startup if any resource
/// is unavailable.
pub fn spawn_engine(
    camera_device: &str,
    detector_path: &str,
    encoder_path: &str,
    warmup_frames: usize,
) -> Result<EngineHandle, EngineError> {
    // Open camera and load models synchronously (fail-fast)
    let camera = Camera::open(camera_device)?;
    tracing::info!(
        device = camera_device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera opened"
    );

    let mut detector = cognatten_core::FaceDetector::load(detector_path)?;
    tracing::info!(path = detector_path, "UltraFace detector loaded");

    let mut encoder = cognatten_core::FaceEncoder::load(encoder_path)?;
    tracing::info!(path = encoder_path, "MobileFaceNet encoder loaded");

    // Discard warmup frames for camera AGC/AE stabilization
    if warmup_frames > 0 {
        tracing::info!(count = warmup_frames, "discarding warmup frames");
        for _ in 0..warmup_frames {
            let _ = camera.capture_frame();
        }
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("cognatten-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::CapturePhoto {
                        frames_count,
                        reply,
                    } => {
                        let result =
                            run_capture_photo(&camera, &mut detector, frames_count);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Identify {
                        gallery,
                        tolerance,
                        frames_count,
                        reply,
                    } => {
                        let result = run_identify(
                            &camera,
                            &mut detector,
                            &mut encoder,
                            &gallery,
                            tolerance,
                            frames_count,
                        );
                        let _ = reply.send(result);
                    }
                    EngineRequest::LoadGallery { photos, reply } => {
                        let result =
                            cognatten_core::load_gallery(&mut detector, &mut encoder, &photos);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

/// Capture frames, keep the one with the most confident face, and encode
/// it as a JPEG suitable for the photo directory.
fn run_capture_photo(
    camera: &Camera,
    detector: &mut cognatten_core::FaceDetector,
    frames_count: usize,
) -> Result<Vec<u8>, EngineError> {
    let (frames, dark_skipped) = camera.capture_frames(frames_count)?;
    tracing::debug!(
        captured = frames.len(),
        dark_skipped,
        "capture photo: captured frames"
    );

    let mut best_frame_idx = None;
    let mut best_confidence = 0.0f32;

    for (i, frame) in frames.iter().enumerate() {
        let faces = detector.detect(&frame.data, frame.width, frame.height)?;
        if let Some(face) = faces.first() {
            if face.confidence > best_confidence {
                best_confidence = face.confidence;
                best_frame_idx = Some(i);
            }
        }
    }

    let frame = &frames[best_frame_idx.ok_or(EngineError::NoFaceDetected)?];
    tracing::info!(confidence = best_confidence, "capture photo: best face selected");

    let img = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or(EngineError::NoFaceDetected)?;
    let mut jpeg = Cursor::new(Vec::new());
    img.write_to(&mut jpeg, image::ImageFormat::Jpeg)?;
    Ok(jpeg.into_inner())
}

/// Capture frames and match each one's best face against the gallery.
/// The smallest distance across all frames wins.
fn run_identify(
    camera: &Camera,
    detector: &mut cognatten_core::FaceDetector,
    encoder: &mut cognatten_core::FaceEncoder,
    gallery: &[GalleryEntry],
    tolerance: f32,
    frames_count: usize,
) -> Result<Option<Identification>, EngineError> {
    let (frames, dark_skipped) = camera.capture_frames(frames_count)?;
    tracing::debug!(
        captured = frames.len(),
        dark_skipped,
        "identify: captured frames"
    );

    let mut best: Option<Identification> = None;

    for frame in &frames {
        let Some(ident) = identify_frame(
            detector,
            encoder,
            &frame.data,
            frame.width,
            frame.height,
            gallery,
            tolerance,
        )?
        else {
            continue;
        };

        let is_better = match &best {
            None => true,
            Some(prev) => ident.result.distance < prev.result.distance,
        };
        if is_better {
            best = Some(ident);
        }
    }

    Ok(best)
}
