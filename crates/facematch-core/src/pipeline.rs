//! Per-request pipeline: detect faces, then find each face's closest
//! reference identity.

use crate::detector::{DetectorError, FaceDetector};
use crate::gallery::{Gallery, GalleryError};
use crate::recognizer::FaceRecognizer;
use crate::types::{BestMatch, FaceMatch};
use crate::verify::{find_best_match, ModelVerifier};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

/// Detect every face in `image` and match each against the gallery.
///
/// Results keep detector output order. A face whose probe embedding cannot be
/// extracted, or for which no reference scores, is still reported, just with
/// empty match fields. Two failures are fatal: the detector failing on the
/// uploaded image itself, and the reference directory being unlistable.
pub fn match_faces<D, R>(
    detector: &mut D,
    recognizer: &mut R,
    gallery: &Gallery,
    image: &RgbImage,
) -> Result<Vec<FaceMatch>, PipelineError>
where
    D: FaceDetector,
    R: FaceRecognizer,
{
    let detections = detector.detect(image)?;
    tracing::debug!(faces = detections.len(), "detection complete");

    let mut results = Vec::with_capacity(detections.len());
    for detection in &detections {
        // The reference set may change between requests; list it fresh for
        // every face rather than holding a snapshot.
        let entries = gallery.entries()?;

        let best = match recognizer.extract(image, detection) {
            Ok(probe) => {
                let mut verifier = ModelVerifier::new(&mut *detector, &mut *recognizer);
                find_best_match(&mut verifier, &probe, &entries)
            }
            Err(err) => {
                tracing::warn!(error = %err, "probe embedding failed, face reported without a match");
                BestMatch::none()
            }
        };

        let (x1, y1, x2, y2) = detection.pixel_coords();
        results.push(FaceMatch {
            x1,
            y1,
            x2,
            y2,
            label: best.label,
            distance: best.distance,
        });
    }

    Ok(results)
}
