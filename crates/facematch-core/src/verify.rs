//! Scoring a probe face against the reference gallery.

use crate::detector::{DetectorError, FaceDetector};
use crate::gallery::ReferenceEntry;
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BestMatch, Embedding};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("failed to decode reference image: {0}")]
    Undecodable(#[from] image::ImageError),
    #[error("no face found in reference image")]
    NoFaceInReference,
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
}

/// Scores how far a probe face is from a single reference image.
///
/// A failure applies to that reference only; callers skip it and move on.
pub trait ReferenceVerifier {
    /// Distance between the probe and the reference. Lower = more similar.
    fn distance(&mut self, probe: &Embedding, reference: &ReferenceEntry) -> Result<f32, VerifierError>;
}

/// Verifier backed by the detection and embedding models.
///
/// Each call decodes the reference image from disk, finds its most confident
/// face, embeds it, and measures cosine distance to the probe. Nothing is
/// cached between calls: the reference directory may change at any time.
pub struct ModelVerifier<'a, D, R> {
    detector: &'a mut D,
    recognizer: &'a mut R,
}

impl<'a, D, R> ModelVerifier<'a, D, R> {
    pub fn new(detector: &'a mut D, recognizer: &'a mut R) -> Self {
        Self { detector, recognizer }
    }
}

impl<D: FaceDetector, R: FaceRecognizer> ReferenceVerifier for ModelVerifier<'_, D, R> {
    fn distance(&mut self, probe: &Embedding, reference: &ReferenceEntry) -> Result<f32, VerifierError> {
        let image = image::open(&reference.path)?.to_rgb8();

        let faces = self.detector.detect(&image)?;
        let face = faces.first().ok_or(VerifierError::NoFaceInReference)?;

        let embedding = self.recognizer.extract(&image, face)?;
        Ok(probe.cosine_distance(&embedding))
    }
}

/// Scan every reference entry and keep the strictly smallest distance.
///
/// Entries are scored in slice order. A failing entry is skipped without
/// aborting the scan, and an equal distance never replaces the current best,
/// so the earliest of tied entries wins. Returns an empty match when no entry
/// could be scored at all.
pub fn find_best_match(
    verifier: &mut dyn ReferenceVerifier,
    probe: &Embedding,
    entries: &[ReferenceEntry],
) -> BestMatch {
    let mut best = BestMatch::none();
    let mut best_distance = f32::INFINITY;
    let mut skipped = 0usize;

    for entry in entries {
        match verifier.distance(probe, entry) {
            Ok(distance) => {
                if distance < best_distance {
                    best_distance = distance;
                    best = BestMatch {
                        label: Some(entry.label.clone()),
                        distance: Some(distance),
                    };
                }
            }
            Err(err) => {
                skipped += 1;
                tracing::debug!(reference = %entry.label, error = %err, "reference skipped");
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(total = entries.len(), skipped, "reference scan completed with skips");
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DetectionBox;
    use image::{Rgb, RgbImage};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    /// Verifier that answers from a fixed label -> distance table.
    /// Labels missing from the table fail as if the reference had no face.
    struct ScriptedVerifier {
        scores: HashMap<String, f32>,
    }

    impl ScriptedVerifier {
        fn new(scores: &[(&str, f32)]) -> Self {
            Self {
                scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            }
        }
    }

    impl ReferenceVerifier for ScriptedVerifier {
        fn distance(&mut self, _probe: &Embedding, reference: &ReferenceEntry) -> Result<f32, VerifierError> {
            self.scores
                .get(&reference.label)
                .copied()
                .ok_or(VerifierError::NoFaceInReference)
        }
    }

    fn entry(label: &str) -> ReferenceEntry {
        ReferenceEntry { label: label.to_string(), path: PathBuf::from(label) }
    }

    fn probe() -> Embedding {
        Embedding { values: vec![1.0, 0.0] }
    }

    #[test]
    fn test_minimum_distance_wins() {
        let mut verifier = ScriptedVerifier::new(&[("a.jpg", 0.9), ("b.jpg", 0.3), ("c.jpg", 0.5)]);
        let entries = [entry("a.jpg"), entry("b.jpg"), entry("c.jpg")];

        let best = find_best_match(&mut verifier, &probe(), &entries);
        assert_eq!(best.label.as_deref(), Some("b.jpg"));
        assert_eq!(best.distance, Some(0.3));
    }

    #[test]
    fn test_equal_distances_keep_first_seen() {
        let mut verifier = ScriptedVerifier::new(&[("first.jpg", 0.4), ("second.jpg", 0.4)]);
        let entries = [entry("first.jpg"), entry("second.jpg")];

        let best = find_best_match(&mut verifier, &probe(), &entries);
        assert_eq!(best.label.as_deref(), Some("first.jpg"));
    }

    #[test]
    fn test_failing_reference_is_skipped() {
        // "broken.jpg" has no scripted score and fails; the scan continues.
        let mut verifier = ScriptedVerifier::new(&[("ok.jpg", 0.7)]);
        let entries = [entry("broken.jpg"), entry("ok.jpg")];

        let best = find_best_match(&mut verifier, &probe(), &entries);
        assert_eq!(best.label.as_deref(), Some("ok.jpg"));
        assert_eq!(best.distance, Some(0.7));
    }

    #[test]
    fn test_failure_after_success_keeps_earlier_best() {
        let mut verifier = ScriptedVerifier::new(&[("ok.jpg", 0.2)]);
        let entries = [entry("ok.jpg"), entry("broken.jpg")];

        let best = find_best_match(&mut verifier, &probe(), &entries);
        assert_eq!(best.label.as_deref(), Some("ok.jpg"));
    }

    #[test]
    fn test_all_references_failing_yields_empty_match() {
        let mut verifier = ScriptedVerifier::new(&[]);
        let entries = [entry("a.jpg"), entry("b.jpg")];

        let best = find_best_match(&mut verifier, &probe(), &entries);
        assert_eq!(best, BestMatch::none());
    }

    #[test]
    fn test_no_entries_yields_empty_match() {
        let mut verifier = ScriptedVerifier::new(&[("unused.jpg", 0.1)]);
        let best = find_best_match(&mut verifier, &probe(), &[]);
        assert_eq!(best, BestMatch::none());
    }

    /// Detector fake that claims one centered face in any image.
    struct OneFaceDetector;

    impl FaceDetector for OneFaceDetector {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectionBox>, DetectorError> {
            let (w, h) = image.dimensions();
            Ok(vec![DetectionBox {
                x1: 0.0,
                y1: 0.0,
                x2: w as f32,
                y2: h as f32,
                confidence: 0.99,
                landmarks: Some([(1.0, 1.0); 5]),
            }])
        }
    }

    /// Detector fake that never finds anything.
    struct BlindDetector;

    impl FaceDetector for BlindDetector {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<DetectionBox>, DetectorError> {
            Ok(Vec::new())
        }
    }

    /// Recognizer fake that embeds the mean color of the whole image.
    struct MeanColorRecognizer;

    impl FaceRecognizer for MeanColorRecognizer {
        fn extract(&mut self, image: &RgbImage, _face: &DetectionBox) -> Result<Embedding, RecognizerError> {
            let mut sums = [0.0f64; 3];
            for pixel in image.pixels() {
                for c in 0..3 {
                    sums[c] += pixel[c] as f64;
                }
            }
            let count = (image.width() * image.height()) as f64;
            Ok(Embedding {
                values: sums.iter().map(|s| (s / count) as f32).collect(),
            })
        }
    }

    fn save_solid(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(8, 8, Rgb(color)).save(&path).unwrap();
        path
    }

    #[test]
    fn test_model_verifier_scores_reference_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_solid(dir.path(), "blue.png", [0, 0, 255]);

        let mut detector = OneFaceDetector;
        let mut recognizer = MeanColorRecognizer;
        let mut verifier = ModelVerifier::new(&mut detector, &mut recognizer);

        // Probe embedding equals the reference's mean color: distance ~0
        let probe = Embedding { values: vec![0.0, 0.0, 255.0] };
        let reference = ReferenceEntry { label: "blue.png".into(), path };

        let distance = verifier.distance(&probe, &reference).unwrap();
        assert!(distance.abs() < 1e-4, "distance = {distance}");

        // An orthogonal color is maximally far in cosine distance
        let red_probe = Embedding { values: vec![255.0, 0.0, 0.0] };
        let distance = verifier.distance(&red_probe, &reference).unwrap();
        assert!((distance - 1.0).abs() < 1e-4, "distance = {distance}");
    }

    #[test]
    fn test_model_verifier_unreadable_reference() {
        let mut detector = OneFaceDetector;
        let mut recognizer = MeanColorRecognizer;
        let mut verifier = ModelVerifier::new(&mut detector, &mut recognizer);

        let reference = ReferenceEntry {
            label: "gone.png".into(),
            path: PathBuf::from("/nonexistent/gone.png"),
        };
        let err = verifier.distance(&probe(), &reference).unwrap_err();
        assert!(matches!(err, VerifierError::Undecodable(_)));
    }

    #[test]
    fn test_model_verifier_reference_without_face() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_solid(dir.path(), "empty.png", [10, 10, 10]);

        let mut detector = BlindDetector;
        let mut recognizer = MeanColorRecognizer;
        let mut verifier = ModelVerifier::new(&mut detector, &mut recognizer);

        let reference = ReferenceEntry { label: "empty.png".into(), path };
        let err = verifier.distance(&probe(), &reference).unwrap_err();
        assert!(matches!(err, VerifierError::NoFaceInReference));
    }
}
