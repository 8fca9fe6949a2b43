//! Progressive enrollment of one identity.
//!
//! Photos are submitted one at a time. Each attempt is scored and gated;
//! accepted photos are kept until the session is finalized into a
//! [`PersonRecord`]. Rejected attempts are handed back to the caller for
//! failure logging.

use thiserror::Error;

use crate::config::RollcallConfig;
use crate::gate::{EnrollmentGate, GateDecision, RejectReason};
use crate::quality::{QualityAssessor, QualityReport};
use crate::readiness::{MultiPhotoAccuracyEstimator, Readiness};
use crate::types::{EnrolledPhoto, Embedding, FaceCrop, PersonRecord};

#[derive(Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("all {max} enrollment attempts have been used")]
    AttemptsExhausted { max: usize },
    #[error("no photo has been accepted")]
    NothingAccepted,
    #[error("recognition readiness {score:.2} is below the {target:.2} target")]
    NotReady { score: f32, target: f32 },
}

/// Result of one submitted photo.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// 1-based attempt number.
    pub attempt: usize,
    pub photo_path: String,
    pub report: QualityReport,
    pub decision: GateDecision,
}

impl AttemptOutcome {
    pub fn accepted(&self) -> bool {
        self.decision.is_accepted()
    }
}

pub struct EnrollmentSession<'a> {
    person_id: String,
    name: String,
    config: &'a RollcallConfig,
    attempts: usize,
    accepted: Vec<EnrolledPhoto>,
    /// Leading entries of `accepted` that were already enrolled.
    stored: usize,
}

impl<'a> EnrollmentSession<'a> {
    pub fn new(person_id: impl Into<String>, name: impl Into<String>, config: &'a RollcallConfig) -> Self {
        Self {
            person_id: person_id.into(),
            name: name.into(),
            config,
            attempts: 0,
            accepted: Vec::new(),
            stored: 0,
        }
    }

    /// Continue enrolling an existing identity. Its stored photos count
    /// toward readiness and fix the embedding length; the attempt budget
    /// starts fresh.
    pub fn resume(record: PersonRecord, config: &'a RollcallConfig) -> Self {
        let person_id = record.id().to_string();
        let name = record.name().to_string();
        let accepted = record.into_photos();
        Self {
            person_id,
            name,
            config,
            attempts: 0,
            stored: accepted.len(),
            accepted,
        }
    }

    pub fn person_id(&self) -> &str {
        &self.person_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn attempts_remaining(&self) -> usize {
        self.config.enrollment.max_attempts.saturating_sub(self.attempts)
    }

    /// Every photo the finalized record will hold, stored ones first.
    pub fn accepted(&self) -> &[EnrolledPhoto] {
        &self.accepted
    }

    /// Photos accepted in this session.
    pub fn new_photos(&self) -> &[EnrolledPhoto] {
        &self.accepted[self.stored..]
    }

    /// Score and gate one photo. `crop` is `None` when no usable face was
    /// found, which counts as an attempt with the undetectable report.
    pub fn submit(
        &mut self,
        photo_path: impl Into<String>,
        crop: Option<&FaceCrop>,
        embedding: Embedding,
    ) -> Result<AttemptOutcome, SessionError> {
        let max = self.config.enrollment.max_attempts;
        if self.attempts >= max {
            return Err(SessionError::AttemptsExhausted { max });
        }
        self.attempts += 1;
        let photo_path = photo_path.into();

        let report = QualityAssessor::new(&self.config.quality).assess(crop);
        let mut decision = EnrollmentGate::new(&self.config.enrollment).decide(&report);

        if decision.is_accepted() {
            if let Some(reason) = self.embedding_problem(&embedding) {
                tracing::warn!(photo = %photo_path, %reason, "quality passed but embedding refused");
                decision = GateDecision::Rejected { reason };
            } else {
                self.accepted
                    .push(EnrolledPhoto::new(embedding, report.clone(), photo_path.clone()));
            }
        }
        tracing::info!(
            person_id = %self.person_id,
            attempt = self.attempts,
            max,
            accepted = decision.is_accepted(),
            photos = self.accepted.len(),
            "enrollment attempt"
        );

        Ok(AttemptOutcome {
            attempt: self.attempts,
            photo_path,
            report,
            decision,
        })
    }

    /// Accepted embeddings must be non-zero and share one length.
    fn embedding_problem(&self, embedding: &Embedding) -> Option<RejectReason> {
        if embedding.is_zero() {
            return Some(RejectReason::UnusableEmbedding);
        }
        let expected = self.accepted.first()?.embedding.len();
        (embedding.len() != expected).then(|| RejectReason::EmbeddingLength {
            expected,
            actual: embedding.len(),
        })
    }

    pub fn readiness(&self) -> Readiness {
        let embeddings: Vec<Embedding> = self.accepted.iter().map(|p| p.embedding.clone()).collect();
        MultiPhotoAccuracyEstimator::new(self.config.enrollment.target_accuracy).assess(&embeddings)
    }

    pub fn can_finalize(&self) -> bool {
        self.readiness().permits_finalize()
    }

    /// Build the person record once readiness permits it.
    pub fn finalize(self) -> Result<PersonRecord, SessionError> {
        match self.readiness() {
            Readiness::Empty => Err(SessionError::NothingAccepted),
            Readiness::Insufficient { score, .. } => Err(SessionError::NotReady {
                score,
                target: self.config.enrollment.target_accuracy,
            }),
            Readiness::Basic | Readiness::Sufficient { .. } => self.into_record(),
        }
    }

    /// Build the person record from whatever has been accepted, ignoring
    /// readiness.
    pub fn force_finalize(self) -> Result<PersonRecord, SessionError> {
        self.into_record()
    }

    fn into_record(self) -> Result<PersonRecord, SessionError> {
        if self.accepted.len() == self.stored {
            return Err(SessionError::NothingAccepted);
        }
        let mut photos = self.accepted.into_iter();
        let first = photos.next().ok_or(SessionError::NothingAccepted)?;
        let mut record = PersonRecord::new(self.person_id, self.name, first);
        for photo in photos {
            record.push_photo(photo);
        }
        tracing::info!(
            person_id = %record.id(),
            photos = record.photos().len(),
            "enrollment finalized"
        );
        Ok(record)
    }
}
