use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Dominant label used when every score was excluded
pub const UNKNOWN_EMOTION: &str = "unknown";

/// Face rectangle in frame pixel coordinates, serialized as `[x, y, w, h]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "[i32; 4]", from = "[i32; 4]")]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// One face as reported by the emotion model, before any filtering
#[derive(Debug, Clone, PartialEq)]
pub struct RawFace {
    pub bbox: BoundingBox,
    pub emotions: BTreeMap<String, f32>,
}

/// One face after post-processing, as stored and served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub emotions: BTreeMap<String, f32>,
    pub dominant: String,
}

impl Detection {
    /// Score of the dominant label, absent for [`UNKNOWN_EMOTION`]
    pub fn dominant_score(&self) -> Option<f32> {
        self.emotions.get(&self.dominant).copied()
    }
}

/// Emotion labels dropped from every detection before the dominant label is picked.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    excluded: HashSet<String>,
}

impl ExclusionPolicy {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_excluded(&self, label: &str) -> bool {
        self.excluded.contains(label)
    }

    /// Filter the face's scores and derive its dominant label.
    pub fn apply(&self, face: RawFace) -> Detection {
        let emotions: BTreeMap<String, f32> = face
            .emotions
            .into_iter()
            .filter(|(label, _)| !self.is_excluded(label))
            .collect();

        let dominant = dominant_label(&emotions)
            .unwrap_or(UNKNOWN_EMOTION)
            .to_string();

        Detection {
            bbox: face.bbox,
            emotions,
            dominant,
        }
    }

    pub fn apply_all(&self, faces: Vec<RawFace>) -> Vec<Detection> {
        faces.into_iter().map(|face| self.apply(face)).collect()
    }
}

/// Highest-scoring label; on ties the first label in key order wins.
pub fn dominant_label(emotions: &BTreeMap<String, f32>) -> Option<&str> {
    let mut best: Option<(&str, f32)> = None;
    for (label, &score) in emotions {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            Some(_) if score.is_nan() => {}
            _ => best = Some((label.as_str(), score)),
        }
    }
    best.map(|(label, _)| label)
}
