//! The face capability seen by callers: decoded pixels in, encodings out.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Produces face encodings for every face found in an image.
///
/// Encodings come back in detection-confidence order, so the first one belongs
/// to the most confident face. An image without faces yields an empty list.
pub trait FaceAnalyzer {
    fn face_encodings(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, AnalyzerError>;
}

/// SCRFD detection followed by ArcFace encoding.
pub struct OnnxFaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceAnalyzer {
    /// Load `det_10g.onnx` and `w600k_r50.onnx` from `model_dir`.
    pub fn load(model_dir: &Path, intra_threads: usize) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE), intra_threads)?;
        let recognizer = FaceRecognizer::load(&model_dir.join(ARCFACE_MODEL_FILE), intra_threads)?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn face_encodings(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, AnalyzerError> {
        let faces = self.detector.detect(image)?;
        let mut encodings = Vec::with_capacity(faces.len());
        for face in faces.iter().filter(|f| f.landmarks.is_some()) {
            encodings.push(self.recognizer.extract(image, face)?);
        }
        Ok(encodings)
    }
}
