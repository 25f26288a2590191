//! facematch-core — Face detection, encoding and comparison.
//!
//! Uses SCRFD for face detection and ArcFace for face encoding, both running
//! via ONNX Runtime on the CPU. [`compare_images`] is the single entry point
//! the service needs: two encoded images in, one match decision out.

pub mod alignment;
pub mod analyzer;
pub mod comparator;
pub mod detector;
pub mod recognizer;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxFaceAnalyzer};
pub use comparator::{compare_images, decode_image, CompareError, Subject};
pub use detector::FaceDetector;
pub use recognizer::FaceRecognizer;
pub use types::{compare_faces, BoundingBox, Embedding, DEFAULT_MATCH_THRESHOLD};
