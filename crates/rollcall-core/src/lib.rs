//! rollcall-core — Enrollment quality gate and face matching engine.
//!
//! Scores detected face crops against five quality criteria, decides whether
//! a photo may be enrolled, and matches probe embeddings against the enrolled
//! population with scene-aware thresholds and multi-sample consensus.
//! Detection and embedding extraction happen upstream; this crate only
//! consumes their output.

pub mod config;
pub mod gallery;
pub mod gate;
pub mod matcher;
pub mod quality;
pub mod readiness;
pub mod report;
pub mod scoring;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, EnrollmentPolicy, RollcallConfig};
pub use gallery::{Gallery, GalleryError, QualityStats};
pub use gate::{AcceptBasis, EnrollmentGate, GateDecision, RejectReason};
pub use matcher::{Matcher, SimilarityMatcher};
pub use quality::{Criterion, CriterionResult, QualityAssessor, QualityReport, QualitySummary};
pub use readiness::{MultiPhotoAccuracyEstimator, Readiness};
pub use scoring::CompositeScorer;
pub use session::{AttemptOutcome, EnrollmentSession, SessionError};
pub use types::{
    BoundingBox, Detection, Embedding, EnrolledPhoto, FaceCrop, GalleryEntry, Landmarks,
    MatchCandidate, MatchResult, PersonRecord,
};
