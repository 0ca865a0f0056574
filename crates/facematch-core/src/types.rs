use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
///
/// Coordinates are corner-form in source image pixel space: `(x1, y1)` is the
/// top-left corner, `(x2, y2)` the bottom-right.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl DetectionBox {
    /// Corner coordinates truncated toward zero, the form reported to clients.
    pub fn pixel_coords(&self) -> (i32, i32, i32, i32) {
        (self.x1 as i32, self.y1 as i32, self.x2 as i32, self.y2 as i32)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Face embedding vector (typically 512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Cosine distance `1 - similarity`, in [0, 2]. Lower = more similar.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        1.0 - self.similarity(other)
    }
}

/// Best-scoring reference for one probe face.
///
/// Both fields are present or both absent: a face that no reference could be
/// scored against carries neither a label nor a distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestMatch {
    /// File name of the closest reference image.
    pub label: Option<String>,
    /// Cosine distance to that reference.
    pub distance: Option<f32>,
}

impl BestMatch {
    pub fn none() -> Self {
        Self { label: None, distance: None }
    }
}

/// Final outcome for one detected face: where it is and who it most resembles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceMatch {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    /// File name of the closest reference image, absent when nothing scored.
    pub label: Option<String>,
    /// Cosine distance to that reference. Lower = more similar.
    pub distance: Option<f32>,
}
