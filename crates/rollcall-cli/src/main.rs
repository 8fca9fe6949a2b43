mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rollcall_core::report::render_text;
use rollcall_core::{
    Detection, Embedding, EnrollmentGate, EnrollmentSession, FaceCrop, MatchResult,
    QualityAssessor, Readiness, SessionError, SimilarityMatcher,
};
use rollcall_store::{AuditRecord, FailedRegistration, GalleryStore, JsonGalleryStore};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall enrollment quality gate and face matcher")]
struct Cli {
    /// TOML configuration file (defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Store directory (overrides ROLLCALL_STORE_DIR)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one photo and print the quality report
    Assess {
        image: PathBuf,
        /// Detections JSON produced by the face detector
        detections: PathBuf,
        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Enroll a person from one or more photos
    Enroll {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Enroll whatever was accepted even if readiness is below target
        #[arg(long)]
        force: bool,
        /// Photo pairs: IMAGE DETECTIONS [IMAGE DETECTIONS ...]
        #[arg(required = true, num_args = 2..)]
        photos: Vec<PathBuf>,
    },
    /// Identify every face in one photo
    Identify {
        image: PathBuf,
        detections: PathBuf,
    },
    /// List enrolled people
    List,
    /// Remove an enrolled person and all their photos
    Remove {
        /// Person ID to remove
        id: String,
    },
    /// Show audit records or failed registrations
    Report {
        /// Only records for this person
        #[arg(long)]
        person: Option<String>,
        /// Show failed registrations instead of the audit log
        #[arg(long)]
        failures: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref(), cli.store)?;
    let store = JsonGalleryStore::new(&settings.store_dir);

    match cli.command {
        Commands::Assess {
            image,
            detections,
            json,
        } => assess(&settings, &image, &detections, json),
        Commands::Enroll {
            id,
            name,
            force,
            photos,
        } => enroll(&settings, &store, &id, &name, force, &photos),
        Commands::Identify { image, detections } => {
            identify(&settings, &store, &image, &detections).map(|_| ())
        }
        Commands::List => list(&store),
        Commands::Remove { id } => {
            let mut gallery = store.load()?;
            let removed = gallery.remove(&id)?;
            store.save(&gallery)?;
            println!("Removed {} ({}) with {} photo(s)", removed.name(), id, removed.photos().len());
            Ok(())
        }
        Commands::Report { person, failures } => report(&store, person.as_deref(), failures),
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&settings.engine)?);
            Ok(())
        }
    }
}

/// A decoded photo with the detector output for it.
struct Photo {
    path: PathBuf,
    image: image::DynamicImage,
    detections: Vec<Detection>,
}

impl Photo {
    fn open(image: &Path, detections: &Path) -> Result<Self> {
        let decoded = image::open(image).with_context(|| format!("failed to decode {}", image.display()))?;
        let raw = std::fs::read_to_string(detections)
            .with_context(|| format!("failed to read {}", detections.display()))?;
        let detections: Vec<Detection> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid detections in {}", detections.display()))?;
        tracing::debug!(photo = %image.display(), faces = detections.len(), "photo loaded");
        Ok(Self {
            path: image.to_path_buf(),
            image: decoded,
            detections,
        })
    }

    fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// The detection with the highest confidence.
    fn best(&self) -> Option<&Detection> {
        self.detections
            .iter()
            .max_by(|a, b| a.det_score.total_cmp(&b.det_score))
    }

    fn best_face(&self) -> (Option<FaceCrop>, Embedding) {
        match self.best() {
            Some(det) => (det.crop(&self.image), det.embedding()),
            None => (None, Embedding::new(Vec::new())),
        }
    }
}

fn assess(settings: &Settings, image: &Path, detections: &Path, json: bool) -> Result<()> {
    let photo = Photo::open(image, detections)?;
    let (crop, _) = photo.best_face();

    let report = QualityAssessor::new(&settings.engine.quality).assess(crop.as_ref());
    let decision = EnrollmentGate::new(&settings.engine.enrollment).decide(&report);

    if json {
        let out = serde_json::json!({ "report": report, "decision": decision });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "{}",
            render_text(&photo.path_str(), &report, &decision, &settings.engine.enrollment)
        );
    }
    Ok(())
}

fn enroll(
    settings: &Settings,
    store: &JsonGalleryStore,
    id: &str,
    name: &str,
    force: bool,
    photos: &[PathBuf],
) -> Result<()> {
    if photos.len() % 2 != 0 {
        bail!("photos must be given as IMAGE DETECTIONS pairs");
    }
    let mut gallery = store.load()?;
    let mut session = match gallery.get(id).cloned() {
        Some(existing) => {
            if existing.name() != name {
                tracing::warn!(
                    person_id = id,
                    stored = existing.name(),
                    given = name,
                    "name differs from enrollment"
                );
                println!("{id} is enrolled as {}; keeping that name", existing.name());
            }
            println!("Adding to {} stored photo(s)", existing.photos().len());
            EnrollmentSession::resume(existing, &settings.engine)
        }
        None => EnrollmentSession::new(id, name, &settings.engine),
    };
    let name = session.name().to_string();

    for pair in photos.chunks_exact(2) {
        let photo = Photo::open(&pair[0], &pair[1])?;
        let (crop, embedding) = photo.best_face();

        let outcome = match session.submit(photo.path_str(), crop.as_ref(), embedding) {
            Ok(outcome) => outcome,
            Err(err @ SessionError::AttemptsExhausted { .. }) => {
                tracing::warn!(%err, "skipping remaining photos");
                println!("{err}");
                break;
            }
            Err(err) => return Err(err.into()),
        };

        let text = render_text(
            &outcome.photo_path,
            &outcome.report,
            &outcome.decision,
            &settings.engine.enrollment,
        );
        store.append_audit(&AuditRecord {
            person_id: id.to_string(),
            photo_path: outcome.photo_path.clone(),
            overall_quality: outcome.report.overall_quality,
            details: outcome.report.clone(),
            decision: outcome.decision.clone(),
            report: text.clone(),
            created_at: Utc::now(),
        })?;

        match outcome.decision.reason() {
            None => println!(
                "[{}/{}] {} accepted (quality {:.2})",
                outcome.attempt,
                settings.engine.enrollment.max_attempts,
                outcome.photo_path,
                outcome.report.overall_quality
            ),
            Some(reason) => {
                println!(
                    "[{}/{}] {} rejected: {reason}",
                    outcome.attempt, settings.engine.enrollment.max_attempts, outcome.photo_path
                );
                store.append_failure(&FailedRegistration {
                    person_id: id.to_string(),
                    name: name.clone(),
                    photo_path: outcome.photo_path.clone(),
                    overall_quality: outcome.report.overall_quality,
                    reason: reason.to_string(),
                    report: text,
                    created_at: Utc::now(),
                })?;
            }
        }
    }

    match session.readiness() {
        Readiness::Empty => println!("Readiness: no photo accepted"),
        Readiness::Basic => println!("Readiness: basic (single photo)"),
        Readiness::Sufficient { score } => println!("Readiness: {score:.2} (sufficient)"),
        Readiness::Insufficient { score, shortfall } => {
            println!("Readiness: {score:.2} ({shortfall:.2} below target)")
        }
    }

    let record = if force {
        session.force_finalize()?
    } else {
        session.finalize()?
    };

    let photos = record.photos().len();
    if gallery.get(id).is_some() {
        gallery.remove(id)?;
    }
    gallery.insert(record)?;
    store.save(&gallery)?;
    println!("Enrolled {name} ({id}) with {photos} photo(s)");
    Ok(())
}

fn identify(
    settings: &Settings,
    store: &JsonGalleryStore,
    image: &Path,
    detections: &Path,
) -> Result<Vec<MatchResult>> {
    let photo = Photo::open(image, detections)?;
    let gallery = store.load()?;
    if gallery.is_empty() {
        bail!("no one is enrolled");
    }

    let probes: Vec<Embedding> = photo.detections.iter().map(Detection::embedding).collect();
    let matcher = SimilarityMatcher::new(&settings.engine.matching);
    let results = matcher.identify_scene(&probes, &gallery.entries());

    println!(
        "{} face(s), threshold {:.2}",
        probes.len(),
        matcher.threshold_for(probes.len())
    );
    for (i, result) in results.iter().enumerate() {
        match result {
            MatchResult::Matched {
                person_id,
                name,
                confidence,
                method,
            } => println!("  face {}: {name} ({person_id}) confidence {confidence:.2} {method:?}", i + 1),
            MatchResult::NoMatch => println!("  face {}: unknown", i + 1),
        }
    }
    Ok(results)
}

fn list(store: &JsonGalleryStore) -> Result<()> {
    let gallery = store.load()?;
    if gallery.is_empty() {
        println!("No one enrolled");
        return Ok(());
    }
    for person in gallery.people() {
        println!("{:<12} {:<24} {} photo(s)", person.id(), person.name(), person.photos().len());
    }
    if let Some(stats) = gallery.quality_stats() {
        println!(
            "\n{} photo(s): mean {:.2}, min {:.2}, max {:.2} | excellent {}, good {}, poor {}",
            stats.photos, stats.mean, stats.min, stats.max, stats.excellent, stats.good, stats.poor
        );
    }
    Ok(())
}

fn report(store: &JsonGalleryStore, person: Option<&str>, failures: bool) -> Result<()> {
    let wanted = |id: &str| person.map_or(true, |p| p == id);

    if failures {
        for failure in store.failures()?.iter().filter(|f| wanted(&f.person_id)) {
            println!(
                "{} {} ({}) {}: {}",
                failure.created_at.to_rfc3339(),
                failure.name,
                failure.person_id,
                failure.photo_path,
                failure.reason
            );
        }
        return Ok(());
    }

    for record in store.audit_records()?.iter().filter(|r| wanted(&r.person_id)) {
        println!("# {} {}", record.person_id, record.created_at.to_rfc3339());
        println!("{}\n", record.report);
    }
    Ok(())
}
