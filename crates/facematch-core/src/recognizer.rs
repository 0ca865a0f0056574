//! ArcFace face embedder via ONNX Runtime.
//!
//! Extracts 512-dimensional face embeddings from aligned face chips,
//! using the w600k_r50 ArcFace model.

use crate::alignment;
use crate::types::{DetectionBox, Embedding};
use image::{Rgb, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (different from SCRFD!) ---
const ARCFACE_INPUT_SIZE: usize = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // NOT 128.0, ArcFace uses symmetric normalization

const ARCFACE_EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0} (download w600k_r50.onnx from insightface)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face has no landmarks; the detector must supply landmarks for alignment")]
    NoLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces an embedding for one detected face in an RGB image.
pub trait FaceRecognizer {
    fn extract(&mut self, image: &RgbImage, face: &DetectionBox) -> Result<Embedding, RecognizerError>;
}

/// ArcFace-based face embedder.
pub struct ArcFaceRecognizer {
    session: Session,
}

impl ArcFaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, RecognizerError> {
        if !Path::new(model_path).exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Preprocess a 112x112 aligned RGB chip into a NCHW float tensor.
    fn preprocess(chip: &RgbImage) -> Array4<f32> {
        let size = ARCFACE_INPUT_SIZE;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for y in 0..size {
            for x in 0..size {
                let pixel = chip
                    .get_pixel_checked(x as u32, y as u32)
                    .copied()
                    .unwrap_or(Rgb([0, 0, 0]));

                for channel in 0..3 {
                    tensor[[0, channel, y, x]] = (pixel[channel] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
                }
            }
        }

        tensor
    }
}

impl FaceRecognizer for ArcFaceRecognizer {
    /// Extract a face embedding from a detected face.
    ///
    /// The face must have landmarks (from the SCRFD detector). The face region
    /// is warped to a canonical 112x112 chip in memory before extraction, and
    /// the resulting embedding is L2-normalized.
    fn extract(&mut self, image: &RgbImage, face: &DetectionBox) -> Result<Embedding, RecognizerError> {
        let landmarks = face.landmarks.as_ref().ok_or(RecognizerError::NoLandmarks)?;

        // Align face to canonical 112x112 position; the chip never touches disk
        let chip = alignment::align_face(image, landmarks);

        let input = Self::preprocess(&chip);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        // L2-normalize the embedding
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };

        Ok(Embedding { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_chip(color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(
            ARCFACE_INPUT_SIZE as u32,
            ARCFACE_INPUT_SIZE as u32,
            Rgb(color),
        )
    }

    #[test]
    fn test_preprocess_output_shape() {
        let tensor = ArcFaceRecognizer::preprocess(&uniform_chip([128, 128, 128]));
        assert_eq!(tensor.shape(), &[1, 3, ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let tensor = ArcFaceRecognizer::preprocess(&uniform_chip([128, 128, 128]));
        // 128 - 127.5 = 0.5, / 127.5 ≈ 0.00392
        let val = tensor[[0, 0, 0, 0]];
        let expected = (128.0 - ARCFACE_MEAN) / ARCFACE_STD;
        assert!((val - expected).abs() < 1e-6, "got {val}, expected {expected}");
    }

    #[test]
    fn test_preprocess_keeps_channels_separate() {
        // Each channel normalizes independently: R=255 -> 1.0, G=0 -> -1.0
        let tensor = ArcFaceRecognizer::preprocess(&uniform_chip([255, 0, 128]));
        assert!((tensor[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 10, 10]] + 1.0).abs() < 1e-6);
        let expected_b = (128.0 - ARCFACE_MEAN) / ARCFACE_STD;
        assert!((tensor[[0, 2, 10, 10]] - expected_b).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_undersized_chip_pads_black() {
        // A chip smaller than 112x112 fills the remainder with black
        let chip = RgbImage::from_pixel(10, 10, Rgb([200, 200, 200]));
        let tensor = ArcFaceRecognizer::preprocess(&chip);
        let expected_black = (0.0 - ARCFACE_MEAN) / ARCFACE_STD;
        assert!((tensor[[0, 0, 100, 100]] - expected_black).abs() < 1e-6);
    }
}
