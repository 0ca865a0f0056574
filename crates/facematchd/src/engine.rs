use facematch_core::{ArcFaceRecognizer, FaceMatch, Gallery, ScrfdDetector};
use image::RgbImage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] facematch_core::DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] facematch_core::RecognizerError),
    #[error("matching failed: {0}")]
    Pipeline(#[from] facematch_core::PipelineError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Match {
        image: RgbImage,
        reply: oneshot::Sender<Result<Vec<FaceMatch>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Detect faces in the image and match each against the reference set.
    pub async fn match_image(&self, image: RgbImage) -> Result<Vec<FaceMatch>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Match { image, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads both ONNX models synchronously (fail-fast), then enters a request
/// loop. The ONNX sessions take `&mut self` per inference, and this single
/// thread owning them is what serializes model access when the HTTP layer
/// serves requests concurrently. The channel bound keeps a burst of uploads
/// waiting in the server rather than piling up behind the models.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let scrfd_path = config.scrfd_model_path();
    let mut detector = ScrfdDetector::load(&scrfd_path)?;
    tracing::info!(path = %scrfd_path, "SCRFD detector loaded");

    let arcface_path = config.arcface_model_path();
    let mut recognizer = ArcFaceRecognizer::load(&arcface_path)?;
    tracing::info!(path = %arcface_path, "ArcFace embedder loaded");

    let gallery = Gallery::new(config.reference_dir.clone());
    if config.reference_dir.is_dir() {
        tracing::info!(dir = %config.reference_dir.display(), "reference directory found");
    } else {
        tracing::warn!(
            dir = %config.reference_dir.display(),
            "reference directory missing; requests that find a face will fail until it exists"
        );
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facematch-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Match { image, reply } => {
                        let result = facematch_core::match_faces(
                            &mut detector,
                            &mut recognizer,
                            &gallery,
                            &image,
                        )
                        .map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

/// Engine stand-in for router tests: answers from a closure instead of the
/// ONNX models, over the same channel plumbing as the real engine.
#[cfg(test)]
pub(crate) fn spawn_stub<F>(mut respond: F) -> EngineHandle
where
    F: FnMut(&RgbImage) -> Result<Vec<FaceMatch>, EngineError> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::spawn(move || {
        while let Some(EngineRequest::Match { image, reply }) = rx.blocking_recv() {
            let _ = reply.send(respond(&image));
        }
    });

    EngineHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_engine_round_trip() {
        // The stub keys its answer off the image so the reply routing is visible.
        let handle = spawn_stub(|image| {
            Ok(vec![FaceMatch {
                x1: image.width() as i32,
                y1: image.height() as i32,
                x2: 0,
                y2: 0,
                label: None,
                distance: None,
            }])
        });

        let matches = handle.match_image(RgbImage::new(7, 3)).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].x1, matches[0].y1), (7, 3));
    }

    #[tokio::test]
    async fn test_closed_engine_reports_channel_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = EngineHandle { tx };

        let err = handle.match_image(RgbImage::new(1, 1)).await.unwrap_err();
        assert!(matches!(err, EngineError::ChannelClosed));
    }
}
