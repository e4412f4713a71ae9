//! Two-stage emotion model run through ONNX Runtime.
//!
//! Stage one is an UltraFace-style face detector (`scores [1, N, 2]`,
//! `boxes [1, N, 4]` with normalised corners). Stage two classifies a grayscale
//! crop of every face into the configured emotion labels.
use std::collections::BTreeMap;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use ndarray::Array4;
use tracing::{debug, info};

use super::detector::EmotionDetector;
use crate::config::InferenceConfig;
use crate::detection::{BoundingBox, RawFace};
use crate::error::{InferenceError, Result};

type BoxError = Box<dyn std::error::Error>;

/// UltraFace normalisation: (p - 127) / 128
const FACE_MEAN: f32 = 127.0;
const FACE_SCALE: f32 = 128.0;

/// Outputs summing to 1 within this tolerance are taken as probabilities
const PROBABILITY_TOLERANCE: f32 = 1e-3;

pub struct OnnxEmotionDetector {
    face_session: ort::session::Session,
    emotion_session: ort::session::Session,
    face_input: (u32, u32),
    emotion_input: u32,
    emotion_channels_last: bool,
    face_confidence: f32,
    nms_iou_threshold: f32,
    labels: Vec<String>,
}

impl OnnxEmotionDetector {
    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        let face_session = load_session(&config.face_model_path)?;
        let emotion_session = load_session(&config.emotion_model_path)?;

        // Keras exports are NHWC [1, S, S, 1]; others are NCHW [1, 1, S, S]
        let emotion_channels_last = emotion_session
            .inputs()
            .first()
            .map(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    shape.len() == 4 && shape[3] == 1 && shape[1] != 1
                } else {
                    false
                }
            })
            .unwrap_or(false);

        info!(
            "Emotion model ready (faces: {}, emotions: {}, {} labels)",
            config.face_model_path,
            config.emotion_model_path,
            config.emotion_labels.len()
        );

        Ok(Self {
            face_session,
            emotion_session,
            face_input: config.face_input_size,
            emotion_input: config.emotion_input_size,
            emotion_channels_last,
            face_confidence: config.face_confidence,
            nms_iou_threshold: config.nms_iou_threshold,
            labels: config.emotion_labels.clone(),
        })
    }

    fn detect_faces(&mut self, image: &RgbImage) -> std::result::Result<Vec<BoundingBox>, BoxError> {
        let (fw, fh) = image.dimensions();
        let input_tensor = preprocess_faces(image, self.face_input);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.face_session.run(ort::inputs![input_value])?;
        if outputs.len() < 2 {
            return Err(format!("Face model expected 2 outputs, got {}", outputs.len()).into());
        }

        let scores = outputs[0].try_extract_array::<f32>()?;
        let boxes = outputs[1].try_extract_array::<f32>()?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;
        let box_data = boxes.as_slice().ok_or("Cannot get box slice")?;

        let candidates = decode_faces(score_data, box_data, self.face_confidence, fw, fh);
        let kept = nms(candidates, self.nms_iou_threshold);

        Ok(kept.into_iter().map(|c| c.to_bbox()).collect())
    }

    fn classify(
        &mut self,
        gray: &GrayImage,
        bbox: &BoundingBox,
    ) -> std::result::Result<BTreeMap<String, f32>, BoxError> {
        let side = self.emotion_input;
        let crop = imageops::crop_imm(
            gray,
            bbox.x.max(0) as u32,
            bbox.y.max(0) as u32,
            bbox.width.max(1) as u32,
            bbox.height.max(1) as u32,
        )
        .to_image();
        let resized = imageops::resize(&crop, side, side, FilterType::Triangle);

        let s = side as usize;
        let shape = if self.emotion_channels_last {
            (1, s, s, 1)
        } else {
            (1, 1, s, s)
        };
        let values: Vec<f32> = resized
            .pixels()
            .map(|p| (p[0] as f32 / 255.0 - 0.5) * 2.0)
            .collect();
        let tensor = Array4::from_shape_vec(shape, values)?;

        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.emotion_session.run(ort::inputs![input_value])?;
        let logits = outputs[0].try_extract_array::<f32>()?;
        let raw = logits.as_slice().ok_or("Cannot get emotion slice")?;

        if raw.len() != self.labels.len() {
            return Err(format!(
                "Emotion model produced {} scores for {} labels",
                raw.len(),
                self.labels.len()
            )
            .into());
        }

        let probabilities = to_probabilities(raw);
        Ok(self
            .labels
            .iter()
            .cloned()
            .zip(probabilities)
            .collect())
    }
}

impl EmotionDetector for OnnxEmotionDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<RawFace>> {
        let run = |this: &mut Self| -> std::result::Result<Vec<RawFace>, BoxError> {
            let boxes = this.detect_faces(image)?;
            if boxes.is_empty() {
                return Ok(Vec::new());
            }

            let gray = imageops::grayscale(image);
            let mut faces = Vec::with_capacity(boxes.len());
            for bbox in boxes {
                let emotions = this.classify(&gray, &bbox)?;
                faces.push(RawFace { bbox, emotions });
            }
            debug!("Classified {} faces", faces.len());
            Ok(faces)
        };

        run(self).map_err(|e| {
            InferenceError::Model {
                details: e.to_string(),
            }
            .into()
        })
    }
}

fn load_session(path: &str) -> Result<ort::session::Session> {
    let load = || -> std::result::Result<ort::session::Session, BoxError> {
        Ok(ort::session::Session::builder()?.commit_from_file(path)?)
    };

    load().map_err(|e| {
        InferenceError::ModelLoad {
            path: path.to_string(),
            details: e.to_string(),
        }
        .into()
    })
}

/// Resize to the detector input and normalise into NCHW float32
fn preprocess_faces(image: &RgbImage, (width, height): (u32, u32)) -> Array4<f32> {
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - FACE_MEAN) / FACE_SCALE;
        }
    }

    tensor
}

#[derive(Debug, Clone, PartialEq)]
struct FaceCandidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl FaceCandidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &FaceCandidate) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    fn to_bbox(&self) -> BoundingBox {
        let x = self.x1.round() as i32;
        let y = self.y1.round() as i32;
        BoundingBox::new(
            x,
            y,
            (self.x2.round() as i32 - x).max(1),
            (self.y2.round() as i32 - y).max(1),
        )
    }
}

/// Keep anchors whose face score passes `threshold`, scaled to frame pixels
fn decode_faces(
    scores: &[f32],
    boxes: &[f32],
    threshold: f32,
    frame_width: u32,
    frame_height: u32,
) -> Vec<FaceCandidate> {
    let fw = frame_width as f32;
    let fh = frame_height as f32;

    scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(score, _)| score[1] >= threshold)
        .map(|(score, b)| FaceCandidate {
            x1: (b[0] * fw).clamp(0.0, fw),
            y1: (b[1] * fh).clamp(0.0, fh),
            x2: (b[2] * fw).clamp(0.0, fw),
            y2: (b[3] * fh).clamp(0.0, fh),
            score: score[1],
        })
        .filter(|c| c.x2 > c.x1 && c.y2 > c.y1)
        .collect()
}

/// Greedy non-maximum suppression, highest score first
fn nms(mut candidates: Vec<FaceCandidate>, iou_threshold: f32) -> Vec<FaceCandidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceCandidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Pass probabilities through unchanged, softmax anything else
fn to_probabilities(raw: &[f32]) -> Vec<f32> {
    let sum: f32 = raw.iter().sum();
    let is_distribution = raw.iter().all(|v| (0.0..=1.0).contains(v))
        && (sum - 1.0).abs() <= PROBABILITY_TOLERANCE;
    if is_distribution {
        return raw.to_vec();
    }

    let max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = raw.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
