use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quality::QualityReport;

/// Number of points in a full landmark set from the detector.
pub const LANDMARK_COUNT: usize = 106;

/// Smallest crop side (pixels) the 3×3 image kernels can run on.
const MIN_CROP_PX: i64 = 3;

/// A 2-D point in image pixel space.
pub type Point = (f32, f32);

/// Face bounding box in image pixel space, as delivered by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn from_corners([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Integer box used by every pixel-level check. Coordinates truncate
    /// toward zero; non-finite coordinates become 0.
    pub fn to_pixels(&self) -> PixelBox {
        PixelBox {
            x1: self.x1 as i64,
            y1: self.y1 as i64,
            x2: self.x2 as i64,
            y2: self.y2 as i64,
        }
    }
}

/// Truncated integer bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl PixelBox {
    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }

    /// Inclusive containment test for a landmark point.
    pub fn contains(&self, (x, y): Point) -> bool {
        x >= self.x1 as f32 && x <= self.x2 as f32 && y >= self.y1 as f32 && y <= self.y2 as f32
    }
}

/// A complete 106-point landmark set. Partial sets are never constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks(Vec<Point>);

impl Landmarks {
    /// Returns `None` unless exactly [`LANDMARK_COUNT`] points are supplied.
    pub fn new(points: Vec<Point>) -> Option<Self> {
        (points.len() == LANDMARK_COUNT).then_some(Self(points))
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One face as reported by the external detection/embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// `[x1, y1, x2, y2]` in image pixels.
    pub bbox: [f32; 4],
    #[serde(default)]
    pub landmarks: Option<Vec<[f32; 2]>>,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub det_score: f32,
}

impl Detection {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_corners(self.bbox)
    }

    /// The landmark set, if the provider delivered a complete one.
    pub fn landmarks(&self) -> Option<Landmarks> {
        let raw = self.landmarks.as_ref()?;
        let landmarks = Landmarks::new(raw.iter().map(|p| (p[0], p[1])).collect());
        if landmarks.is_none() {
            tracing::warn!(
                count = raw.len(),
                expected = LANDMARK_COUNT,
                "discarding incomplete landmark set"
            );
        }
        landmarks
    }

    pub fn embedding(&self) -> Embedding {
        Embedding::new(self.embedding.clone())
    }

    /// Cut this detection's face region out of the decoded photo.
    pub fn crop(&self, image: &DynamicImage) -> Option<FaceCrop> {
        FaceCrop::extract(image, self.bounding_box(), self.landmarks())
    }
}

/// A detected face region, ready for quality scoring.
///
/// Holds the grayscale pixels of the clamped bounding box together with the
/// unclamped box and the full image size, which the integrity check needs.
#[derive(Debug, Clone)]
pub struct FaceCrop {
    bbox: BoundingBox,
    image_width: u32,
    image_height: u32,
    pixels: GrayImage,
    landmarks: Option<Landmarks>,
}

impl FaceCrop {
    /// Crop `bbox` out of `image`.
    ///
    /// Returns `None` when the box, clamped to the image, is empty or smaller
    /// than 3 px on either side.
    pub fn extract(
        image: &DynamicImage,
        bbox: BoundingBox,
        landmarks: Option<Landmarks>,
    ) -> Option<Self> {
        let (width, height) = (image.width(), image.height());
        let px = bbox.to_pixels();

        let x1 = px.x1.clamp(0, width as i64);
        let y1 = px.y1.clamp(0, height as i64);
        let x2 = px.x2.clamp(0, width as i64);
        let y2 = px.y2.clamp(0, height as i64);

        if x2 - x1 < MIN_CROP_PX || y2 - y1 < MIN_CROP_PX {
            tracing::debug!(x1, y1, x2, y2, "face region empty or undersized after clamping");
            return None;
        }

        let pixels = image
            .crop_imm(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32)
            .to_luma8();

        Some(Self {
            bbox,
            image_width: width,
            image_height: height,
            pixels,
            landmarks,
        })
    }

    /// Build a crop from already-extracted grayscale pixels.
    pub fn from_parts(
        bbox: BoundingBox,
        image_width: u32,
        image_height: u32,
        pixels: GrayImage,
        landmarks: Option<Landmarks>,
    ) -> Option<Self> {
        if (pixels.width() as i64) < MIN_CROP_PX || (pixels.height() as i64) < MIN_CROP_PX {
            return None;
        }
        Some(Self {
            bbox,
            image_width,
            image_height,
            pixels,
            landmarks,
        })
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn landmarks(&self) -> Option<&Landmarks> {
        self.landmarks.as_ref()
    }
}

/// Face embedding vector (opaque identity fingerprint from the upstream model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every component is zero (or the vector is empty).
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    ///
    /// Returns 0.0 when either vector has zero norm or the lengths differ.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 && denom.is_finite() {
            (dot / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}

/// One accepted enrollment photo: its embedding and the report that admitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledPhoto {
    pub id: Uuid,
    pub embedding: Embedding,
    pub quality: QualityReport,
    pub photo_path: String,
    pub created_at: DateTime<Utc>,
}

impl EnrolledPhoto {
    pub fn new(embedding: Embedding, quality: QualityReport, photo_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            embedding,
            quality,
            photo_path: photo_path.into(),
            created_at: Utc::now(),
        }
    }
}

/// An enrolled identity and its accepted photos (never empty).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    id: String,
    name: String,
    photos: Vec<EnrolledPhoto>,
}

impl PersonRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, first: EnrolledPhoto) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            photos: vec![first],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn photos(&self) -> &[EnrolledPhoto] {
        &self.photos
    }

    pub fn into_photos(self) -> Vec<EnrolledPhoto> {
        self.photos
    }

    /// Append another accepted photo. Photos are never removed individually.
    pub fn push_photo(&mut self, photo: EnrolledPhoto) {
        self.photos.push(photo);
    }
}

/// A borrowed view of one enrolled embedding, flattened for matching.
#[derive(Debug, Clone, Copy)]
pub struct GalleryEntry<'a> {
    pub person_id: &'a str,
    pub name: &'a str,
    pub embedding: &'a Embedding,
}

/// An enrolled embedding whose similarity to the probe beat the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub person_id: String,
    pub name: String,
    pub similarity: f32,
}

/// How an accepted match was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MatchMethod {
    /// Only one enrolled sample of the identity beat the threshold.
    Single,
    /// Several samples agreed; confidence is their average similarity.
    Consensus { samples: usize },
}

/// Outcome of matching one probe face against the gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum MatchResult {
    Matched {
        person_id: String,
        name: String,
        confidence: f32,
        method: MatchMethod,
    },
    NoMatch,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    pub fn person_id(&self) -> Option<&str> {
        match self {
            MatchResult::Matched { person_id, .. } => Some(person_id),
            MatchResult::NoMatch => None,
        }
    }

    pub fn confidence(&self) -> Option<f32> {
        match self {
            MatchResult::Matched { confidence, .. } => Some(*confidence),
            MatchResult::NoMatch => None,
        }
    }
}
