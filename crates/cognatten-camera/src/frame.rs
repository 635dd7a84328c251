//! Frame type, YUYV to RGB conversion, and dark-frame detection.

/// A captured RGB24 camera frame.
#[derive(Clone)]
pub struct Frame {
    /// RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
    pub is_dark: bool,
}

impl Frame {
    /// Average luma (BT.601) across the frame, 0.0–255.0.
    pub fn avg_luma(&self) -> f32 {
        let pixels = self.data.chunks_exact(3);
        let count = pixels.len();
        if count == 0 {
            return 0.0;
        }
        let sum: f32 = pixels.map(|p| luma(p[0], p[1], p[2])).sum();
        sum / count as f32
    }
}

fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Convert packed YUYV (4:2:2) to RGB24 using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// the U/V chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1];
        let v = quad[3];
        push_yuv_pixel(&mut rgb, quad[0], u, v);
        push_yuv_pixel(&mut rgb, quad[2], u, v);
    }

    Ok(rgb)
}

fn push_yuv_pixel(rgb: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let c = y as f32 - 16.0;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;

    let r = 1.164 * c + 1.596 * e;
    let g = 1.164 * c - 0.392 * d - 0.813 * e;
    let b = 1.164 * c + 2.017 * d;

    rgb.push(r.round().clamp(0.0, 255.0) as u8);
    rgb.push(g.round().clamp(0.0, 255.0) as u8);
    rgb.push(b.round().clamp(0.0, 255.0) as u8);
}

/// Check if an RGB frame is dark using per-pixel luma.
///
/// Returns true if more than `threshold_pct` of pixels have luma < 32
/// (lens covered, lights off); such frames are useless for detection.
pub fn is_dark_frame(rgb: &[u8], threshold_pct: f32) -> bool {
    let pixels = rgb.chunks_exact(3);
    let count = pixels.len();
    if count == 0 {
        return true;
    }
    let dark_count = pixels.filter(|p| luma(p[0], p[1], p[2]) < 32.0).count();
    (dark_count as f32 / count as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb_neutral_chroma() {
        // U = V = 128 → grayscale output, R = G = B
        let yuyv = vec![128, 128, 64, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.len(), 6);
        assert_eq!(rgb[0], rgb[1]);
        assert_eq!(rgb[1], rgb[2]);
        assert_eq!(rgb[3], rgb[4]);
        // Brighter Y gives a brighter pixel
        assert!(rgb[0] > rgb[3]);
    }

    #[test]
    fn test_yuyv_to_rgb_black_and_white() {
        // Y=16 is black, Y=235 is white in BT.601 studio range
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(&rgb[0..3], &[0, 0, 0]);
        assert_eq!(&rgb[3..6], &[255, 255, 255]);
    }

    #[test]
    fn test_yuyv_to_rgb_red_cast() {
        // High V pushes red up and green down
        let yuyv = vec![128, 128, 128, 200];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb[0] > rgb[1], "red should exceed green: {rgb:?}");
        assert!(rgb[0] > rgb[2], "red should exceed blue: {rgb:?}");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        let result = yuyv_to_rgb(&yuyv, 2, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_dark_frame_all_black() {
        let rgb = vec![0u8; 3000];
        assert!(is_dark_frame(&rgb, 0.95));
    }

    #[test]
    fn test_dark_frame_normal() {
        let rgb = vec![128u8; 3000];
        assert!(!is_dark_frame(&rgb, 0.95));
    }

    #[test]
    fn test_dark_frame_empty() {
        assert!(is_dark_frame(&[], 0.95));
    }

    #[test]
    fn test_dark_frame_mostly_dark() {
        // 96% dark, 4% bright → should be dark
        let mut rgb = vec![10u8; 960 * 3];
        rgb.extend(vec![128u8; 40 * 3]);
        assert!(is_dark_frame(&rgb, 0.95));
    }

    #[test]
    fn test_dark_frame_borderline_bright() {
        // 94% dark, 6% bright → should NOT be dark
        let mut rgb = vec![10u8; 940 * 3];
        rgb.extend(vec![128u8; 60 * 3]);
        assert!(!is_dark_frame(&rgb, 0.95));
    }

    #[test]
    fn test_avg_luma() {
        let frame = Frame {
            data: vec![100u8; 30],
            width: 10,
            height: 1,
            timestamp: std::time::Instant::now(),
            sequence: 0,
            is_dark: false,
        };
        // Luma of (100, 100, 100) is exactly 100
        assert!((frame.avg_luma() - 100.0).abs() < 1e-3);
    }
}
