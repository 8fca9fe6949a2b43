//! The enrolled population.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::types::{EnrolledPhoto, GalleryEntry, PersonRecord};

#[derive(Error, Debug, PartialEq)]
pub enum GalleryError {
    #[error("person {0} is already enrolled")]
    DuplicatePerson(String),
    #[error("person {0} is not enrolled")]
    UnknownPerson(String),
    #[error("person {0} has no photos")]
    EmptyRecord(String),
    #[error("person {0} has an empty or all-zero embedding")]
    UnusableEmbedding(String),
    #[error("person {person_id} has a {actual}-value embedding, gallery uses {expected}")]
    EmbeddingLength {
        person_id: String,
        expected: usize,
        actual: usize,
    },
}

const EXCELLENT_QUALITY: f64 = 0.80;
const GOOD_QUALITY: f64 = 0.60;

/// Overall quality of the enrolled photos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityStats {
    pub photos: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Photos at 0.80 or above.
    pub excellent: usize,
    /// Photos in [0.60, 0.80).
    pub good: usize,
    pub poor: usize,
}

/// Enrolled people keyed by id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    people: BTreeMap<String, PersonRecord>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a gallery from stored records, enforcing the same rules as
    /// [`Gallery::insert`].
    pub fn from_records(records: impl IntoIterator<Item = PersonRecord>) -> Result<Self, GalleryError> {
        let mut gallery = Self::new();
        for record in records {
            gallery.insert(record)?;
        }
        Ok(gallery)
    }

    pub fn insert(&mut self, record: PersonRecord) -> Result<(), GalleryError> {
        if record.photos().is_empty() {
            return Err(GalleryError::EmptyRecord(record.id().to_string()));
        }
        if self.people.contains_key(record.id()) {
            return Err(GalleryError::DuplicatePerson(record.id().to_string()));
        }
        let mut expected = self.dimension();
        for photo in record.photos() {
            expected = Some(check_embedding(record.id(), photo, expected)?);
        }
        tracing::debug!(person_id = %record.id(), photos = record.photos().len(), "person added to gallery");
        self.people.insert(record.id().to_string(), record);
        Ok(())
    }

    pub fn append_photo(&mut self, person_id: &str, photo: EnrolledPhoto) -> Result<(), GalleryError> {
        let expected = self.dimension();
        let record = self
            .people
            .get_mut(person_id)
            .ok_or_else(|| GalleryError::UnknownPerson(person_id.to_string()))?;
        check_embedding(person_id, &photo, expected)?;
        record.push_photo(photo);
        Ok(())
    }

    /// Remove a person together with all their photos and embeddings.
    pub fn remove(&mut self, person_id: &str) -> Result<PersonRecord, GalleryError> {
        let record = self
            .people
            .remove(person_id)
            .ok_or_else(|| GalleryError::UnknownPerson(person_id.to_string()))?;
        tracing::info!(person_id, photos = record.photos().len(), "person removed");
        Ok(record)
    }

    /// Embedding length shared by every enrolled photo.
    pub fn dimension(&self) -> Option<usize> {
        self.people
            .values()
            .flat_map(|r| r.photos())
            .map(|p| p.embedding.len())
            .next()
    }

    pub fn get(&self, person_id: &str) -> Option<&PersonRecord> {
        self.people.get(person_id)
    }

    pub fn people(&self) -> impl Iterator<Item = &PersonRecord> {
        self.people.values()
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn photo_count(&self, person_id: &str) -> Option<usize> {
        self.people.get(person_id).map(|r| r.photos().len())
    }

    /// One entry per enrolled embedding, grouped by person in id order.
    pub fn entries(&self) -> Vec<GalleryEntry<'_>> {
        self.people
            .values()
            .flat_map(|record| {
                record.photos().iter().map(move |photo| GalleryEntry {
                    person_id: record.id(),
                    name: record.name(),
                    embedding: &photo.embedding,
                })
            })
            .collect()
    }

    pub fn records(&self) -> Vec<&PersonRecord> {
        self.people.values().collect()
    }

    /// `None` when nothing is enrolled.
    pub fn quality_stats(&self) -> Option<QualityStats> {
        let scores: Vec<f64> = self
            .people
            .values()
            .flat_map(|r| r.photos().iter().map(|p| p.quality.overall_quality))
            .collect();
        if scores.is_empty() {
            return None;
        }
        let excellent = scores.iter().filter(|s| **s >= EXCELLENT_QUALITY).count();
        let good = scores
            .iter()
            .filter(|s| (GOOD_QUALITY..EXCELLENT_QUALITY).contains(*s))
            .count();
        Some(QualityStats {
            photos: scores.len(),
            mean: scores.iter().sum::<f64>() / scores.len() as f64,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            excellent,
            good,
            poor: scores.len() - excellent - good,
        })
    }
}

/// Returns the embedding length once it is usable and matches `expected`.
fn check_embedding(person_id: &str, photo: &EnrolledPhoto, expected: Option<usize>) -> Result<usize, GalleryError> {
    let actual = photo.embedding.len();
    if photo.embedding.is_zero() {
        return Err(GalleryError::UnusableEmbedding(person_id.to_string()));
    }
    match expected {
        Some(expected) if expected != actual => Err(GalleryError::EmbeddingLength {
            person_id: person_id.to_string(),
            expected,
            actual,
        }),
        _ => Ok(actual),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityReport;
    use crate::types::Embedding;

    fn photo(values: &[f32], overall: f64) -> EnrolledPhoto {
        let mut report = QualityReport::undetectable();
        report.overall_quality = overall;
        EnrolledPhoto::new(Embedding::new(values.to_vec()), report, "p.jpg")
    }

    fn gallery() -> Gallery {
        let mut ada = PersonRecord::new("2", "Ada", photo(&[1.0, 0.0], 0.7));
        ada.push_photo(photo(&[0.9, 0.1], 0.8));
        let bo = PersonRecord::new("1", "Bo", photo(&[0.0, 1.0], 0.6));
        Gallery::from_records([ada, bo]).unwrap()
    }

    #[test]
    fn test_entries_flatten_in_id_order() {
        let g = gallery();
        let entries = g.entries();
        let ids: Vec<&str> = entries.iter().map(|e| e.person_id).collect();
        assert_eq!(ids, vec!["1", "2", "2"]);
        assert_eq!(entries[1].name, "Ada");
    }

    #[test]
    fn test_duplicate_insert_refused() {
        let mut g = gallery();
        let again = PersonRecord::new("1", "Bo", photo(&[0.0, 1.0], 0.6));
        assert_eq!(g.insert(again), Err(GalleryError::DuplicatePerson("1".into())));
    }

    #[test]
    fn test_remove_cascades() {
        let mut g = gallery();
        let removed = g.remove("2").unwrap();
        assert_eq!(removed.photos().len(), 2);
        assert_eq!(g.entries().len(), 1);
        assert_eq!(g.photo_count("2"), None);
        assert_eq!(g.remove("2").unwrap_err(), GalleryError::UnknownPerson("2".into()));
    }

    #[test]
    fn test_append_photo() {
        let mut g = gallery();
        g.append_photo("1", photo(&[0.1, 1.0], 0.9)).unwrap();
        assert_eq!(g.photo_count("1"), Some(2));
        assert!(g.append_photo("9", photo(&[1.0], 0.9)).is_err());
    }

    #[test]
    fn test_embedding_length_is_enforced() {
        let mut g = gallery();
        assert_eq!(g.dimension(), Some(2));

        let err = g.append_photo("1", photo(&[1.0, 0.0, 0.0], 0.9)).unwrap_err();
        assert_eq!(
            err,
            GalleryError::EmbeddingLength {
                person_id: "1".into(),
                expected: 2,
                actual: 3
            }
        );

        let odd = PersonRecord::new("3", "Cy", photo(&[1.0], 0.7));
        assert!(matches!(g.insert(odd), Err(GalleryError::EmbeddingLength { .. })));

        let mut mixed = PersonRecord::new("4", "Di", photo(&[1.0, 2.0, 3.0], 0.7));
        mixed.push_photo(photo(&[1.0, 2.0], 0.7));
        assert!(Gallery::new().insert(mixed).is_err());
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_zero_embedding_refused() {
        let mut g = gallery();
        assert_eq!(
            g.append_photo("1", photo(&[0.0, 0.0], 0.9)),
            Err(GalleryError::UnusableEmbedding("1".into()))
        );
        let empty = PersonRecord::new("5", "Eve", photo(&[], 0.9));
        assert_eq!(Gallery::new().insert(empty), Err(GalleryError::UnusableEmbedding("5".into())));
    }

    #[test]
    fn test_quality_stats() {
        let stats = gallery().quality_stats().unwrap();
        assert_eq!(stats.photos, 3);
        assert!((stats.mean - 0.7).abs() < 1e-12);
        assert_eq!(stats.min, 0.6);
        assert_eq!(stats.max, 0.8);
        assert_eq!((stats.excellent, stats.good, stats.poor), (1, 2, 0));
        assert!(Gallery::new().quality_stats().is_none());
    }
}
