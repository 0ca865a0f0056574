//! facematch-core: face detection and reference matching engine.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime for CPU inference. The pipeline scans a
//! directory of reference images and reports, for every detected face,
//! the reference it is closest to in cosine distance.

pub mod alignment;
pub mod detector;
pub mod gallery;
pub mod pipeline;
pub mod recognizer;
pub mod types;
pub mod verify;

pub use detector::{DetectorError, FaceDetector, ScrfdDetector};
pub use gallery::{Gallery, GalleryError, ReferenceEntry};
pub use pipeline::{match_faces, PipelineError};
pub use recognizer::{ArcFaceRecognizer, FaceRecognizer, RecognizerError};
pub use types::{BestMatch, DetectionBox, Embedding, FaceMatch};
pub use verify::{find_best_match, ModelVerifier, ReferenceVerifier, VerifierError};

use std::path::PathBuf;

/// Default location of the ONNX model files.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/facematch/models")
}
