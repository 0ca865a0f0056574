use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facematch_core::{ArcFaceRecognizer, FaceDetector, Gallery, ScrfdDetector};

#[derive(Parser)]
#[command(name = "facematch", about = "Detect faces and match them against reference images")]
struct Cli {
    /// Directory containing the ONNX model files.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in an image and print their bounding boxes
    Detect {
        /// Image file to scan
        image: PathBuf,
    },
    /// Detect faces and match each one against a reference directory
    Match {
        /// Image file to scan
        image: PathBuf,
        /// Directory of reference images (one identity per file)
        #[arg(short, long)]
        references: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let model_dir = cli.model_dir.unwrap_or_else(facematch_core::default_model_dir);

    let scrfd_path = model_dir.join("det_10g.onnx");
    let mut detector = ScrfdDetector::load(&scrfd_path.to_string_lossy())
        .with_context(|| format!("loading detection model from {}", scrfd_path.display()))?;

    match cli.command {
        Commands::Detect { image } => {
            let decoded = image::open(&image)
                .with_context(|| format!("opening {}", image.display()))?
                .to_rgb8();

            let detections = detector.detect(&decoded)?;
            println!("{}", serde_json::to_string_pretty(&detections)?);
        }
        Commands::Match { image, references } => {
            let arcface_path = model_dir.join("w600k_r50.onnx");
            let mut recognizer = ArcFaceRecognizer::load(&arcface_path.to_string_lossy())
                .with_context(|| format!("loading embedding model from {}", arcface_path.display()))?;

            let decoded = image::open(&image)
                .with_context(|| format!("opening {}", image.display()))?
                .to_rgb8();

            let gallery = Gallery::new(references);
            let matches =
                facematch_core::match_faces(&mut detector, &mut recognizer, &gallery, &decoded)?;
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
    }

    Ok(())
}
