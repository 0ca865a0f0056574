use facematch_core::FaceMatch;
use serde::Serialize;

/// Wire shape of `POST /detect-verify-face`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectVerifyResponse {
    NoFaceDetected,
    FaceDetected { faces: Vec<FaceEntry> },
}

impl DetectVerifyResponse {
    /// An empty result set collapses to the dedicated no-face shape.
    pub fn from_matches(matches: Vec<FaceMatch>) -> Self {
        if matches.is_empty() {
            DetectVerifyResponse::NoFaceDetected
        } else {
            DetectVerifyResponse::FaceDetected {
                faces: matches.into_iter().map(FaceEntry::from).collect(),
            }
        }
    }
}

/// One detected face in the response, in detector output order.
#[derive(Debug, Serialize)]
pub struct FaceEntry {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    /// File name of the closest reference image, or null if none scored.
    pub best_match: Option<String>,
    /// Cosine distance to the best match, lower meaning more similar. The
    /// field name is kept from the original public API.
    pub similarity_score: Option<f32>,
}

impl From<FaceMatch> for FaceEntry {
    fn from(m: FaceMatch) -> Self {
        Self {
            x1: m.x1,
            y1: m.y1,
            x2: m.x2,
            y2: m.y2,
            best_match: m.label,
            similarity_score: m.distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_face_wire_shape() {
        let response = DetectVerifyResponse::from_matches(Vec::new());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "status": "no_face_detected" })
        );
    }

    #[test]
    fn test_face_detected_wire_shape() {
        let response = DetectVerifyResponse::from_matches(vec![FaceMatch {
            x1: 12,
            y1: 34,
            x2: 56,
            y2: 78,
            label: Some("alice.jpg".to_string()),
            distance: Some(0.25),
        }]);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "face_detected",
                "faces": [{
                    "x1": 12, "y1": 34, "x2": 56, "y2": 78,
                    "best_match": "alice.jpg",
                    "similarity_score": 0.25,
                }],
            })
        );
    }

    #[test]
    fn test_unmatched_face_keeps_null_fields() {
        let response = DetectVerifyResponse::from_matches(vec![FaceMatch {
            x1: 0,
            y1: 0,
            x2: 10,
            y2: 10,
            label: None,
            distance: None,
        }]);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["faces"][0]["best_match"], serde_json::Value::Null);
        assert_eq!(value["faces"][0]["similarity_score"], serde_json::Value::Null);
    }
}
