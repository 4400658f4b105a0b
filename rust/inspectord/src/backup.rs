use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::db::{self, Store, KEY_AUXILIARY, KEY_REPORTS, KEY_TEACHERS, KEY_TENURE_REPORTS};
use crate::model::{ReportData, Teacher, TenureReport};
use crate::normalize::{
    normalize_echelon, normalize_report_dates, normalize_teacher_dates, normalize_tenure_dates,
};
use crate::sheet::Cell;

const MANIFEST_ENTRY: &str = "manifest.json";
const PAYLOAD_ENTRY: &str = "backup.json";
pub const BACKUP_FORMAT_V1: &str = "inspectord-backup-v1";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("unsupported backup format: {0}")]
    UnsupportedFormat(String),
    #[error("backup is not a valid document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
    #[error("bundle is missing {0}")]
    MissingEntry(&'static str),
    #[error("backup checksum mismatch (manifest {expected}, payload {actual})")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Everything a workspace holds, as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupDocument {
    pub format: String,
    pub version: u32,
    pub exported_at: u64,
    pub teachers: Vec<Teacher>,
    pub reports: BTreeMap<String, ReportData>,
    pub tenure_reports: BTreeMap<String, TenureReport>,
    pub auxiliary: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub teacher_count: usize,
    pub report_count: usize,
}

impl BackupDocument {
    pub fn collect(store: &dyn Store) -> anyhow::Result<Self> {
        Ok(Self {
            format: BACKUP_FORMAT_V1.to_string(),
            version: 1,
            exported_at: now_unix(),
            teachers: db::load_or_default(store, KEY_TEACHERS)?,
            reports: db::load_or_default(store, KEY_REPORTS)?,
            tenure_reports: db::load_or_default(store, KEY_TENURE_REPORTS)?,
            auxiliary: db::load_or_default(store, KEY_AUXILIARY)?,
        })
    }

    /// Replaces every collection in `store` with this document's content.
    pub fn apply(&self, store: &mut dyn Store) -> anyhow::Result<()> {
        store.set_many(&[
            (KEY_TEACHERS, serde_json::to_value(&self.teachers)?),
            (KEY_REPORTS, serde_json::to_value(&self.reports)?),
            (KEY_TENURE_REPORTS, serde_json::to_value(&self.tenure_reports)?),
            (KEY_AUXILIARY, Value::Object(self.auxiliary.clone())),
        ])
    }

    fn normalize(&mut self) {
        for t in &mut self.teachers {
            normalize_teacher_dates(t);
            match normalize_echelon(&Cell::from(t.echelon.as_str())) {
                Some(e) => t.echelon = e,
                None => {
                    tracing::warn!(
                        teacher = %t.id,
                        echelon = %t.echelon,
                        "echelon outside 1..=12 dropped"
                    );
                    t.echelon.clear();
                }
            }
        }
        for (teacher_id, r) in &mut self.reports {
            if r.teacher_id.trim().is_empty() {
                r.teacher_id = teacher_id.clone();
            }
            normalize_report_dates(r);
        }
        for (teacher_id, r) in &mut self.tenure_reports {
            if r.teacher_id.trim().is_empty() {
                r.teacher_id = teacher_id.clone();
            }
            normalize_tenure_dates(r);
        }
    }
}

/// Reads a backup document and canonicalises every date-bearing field, the
/// same guarantee a sheet import gives.
pub fn restore_document(text: &str) -> Result<BackupDocument, BackupError> {
    let mut doc: BackupDocument = serde_json::from_str(text)?;
    if !doc.format.is_empty() && doc.format != BACKUP_FORMAT_V1 {
        return Err(BackupError::UnsupportedFormat(doc.format));
    }
    doc.format = BACKUP_FORMAT_V1.to_string();
    doc.normalize();
    Ok(doc)
}

pub fn export_bundle(doc: &BackupDocument, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let payload = serde_json::to_string_pretty(doc).context("failed to serialize backup")?;
    let checksum = sha256_hex(payload.as_bytes());

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BACKUP_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": doc.exported_at,
        "sha256": checksum,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(PAYLOAD_ENTRY, opts)
        .context("failed to start backup entry")?;
    zip.write_all(payload.as_bytes())
        .context("failed to write backup entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    tracing::info!(
        path = %out_path.to_string_lossy(),
        teachers = doc.teachers.len(),
        "backup bundle written"
    );
    Ok(ExportSummary {
        bundle_format: BACKUP_FORMAT_V1.to_string(),
        entry_count: 2,
        checksum,
    })
}

/// Accepts either a zip bundle written by [`export_bundle`] or a bare JSON
/// backup document.
pub fn import_bundle(in_path: &Path) -> anyhow::Result<(BackupDocument, ImportSummary)> {
    let (doc, detected) = if is_zip_file(in_path)? {
        (read_zip_bundle(in_path)?, BACKUP_FORMAT_V1.to_string())
    } else {
        let text = std::fs::read_to_string(in_path)
            .with_context(|| format!("failed to read backup {}", in_path.to_string_lossy()))?;
        (restore_document(&text)?, "json-document".to_string())
    };

    tracing::info!(format = %detected, teachers = doc.teachers.len(), "backup read");
    let summary = ImportSummary {
        bundle_format_detected: detected,
        teacher_count: doc.teachers.len(),
        report_count: doc.reports.len(),
    };
    Ok((doc, summary))
}

fn read_zip_bundle(in_path: &Path) -> anyhow::Result<BackupDocument> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .map_err(|_| BackupError::MissingEntry(MANIFEST_ENTRY))?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BACKUP_FORMAT_V1 {
        return Err(BackupError::UnsupportedFormat(format.to_string()).into());
    }

    let mut payload = String::new();
    archive
        .by_name(PAYLOAD_ENTRY)
        .map_err(|_| BackupError::MissingEntry(PAYLOAD_ENTRY))?
        .read_to_string(&mut payload)
        .context("failed to read backup.json")?;

    if let Some(expected) = manifest.get("sha256").and_then(|v| v.as_str()) {
        let actual = sha256_hex(payload.as_bytes());
        if actual != expected {
            return Err(BackupError::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
    }

    Ok(restore_document(&payload)?)
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Degree, EmploymentStatus, Level, Rank};

    #[test]
    fn restore_normalizes_dates_everywhere() {
        let text = r#"{
            "teachers": [{ "id": "t1", "name": "Amina", "birthDate": "03/04/1985",
                           "echelonDate": "2019-09-01T00:00:00.000Z", "tenureDate": "1.9.10" }],
            "reports": { "t1": { "inspectionDate": "12-03-24" } },
            "tenureReports": { "t1": { "examDate": "05/06/2011" } },
            "auxiliary": { "schedules": [] }
        }"#;
        let doc = restore_document(text).expect("restore");
        let t = &doc.teachers[0];
        assert_eq!(t.birth_date, "1985-04-03");
        assert_eq!(t.echelon_date, "2019-09-01");
        assert_eq!(t.tenure_date.as_deref(), Some("2010-09-01"));
        assert_eq!(doc.reports["t1"].inspection_date, "2024-03-12");
        assert_eq!(doc.reports["t1"].teacher_id, "t1");
        assert_eq!(doc.tenure_reports["t1"].exam_date, "2011-06-05");
        assert!(doc.auxiliary.contains_key("schedules"));
    }

    #[test]
    fn free_text_categoricals_and_numeric_echelons_restore() {
        let text = r#"{
            "teachers": [
                { "id": "t1", "name": "Amina", "rank": "Professeur formateur",
                  "status": "Contractuel", "degree": "Master 2", "echelon": 7 },
                { "id": "t2", "name": "Said", "rank": "", "echelon": "13" }
            ],
            "reports": { "t1": { "level": "5ème année" } }
        }"#;
        let doc = restore_document(text).expect("restore");
        let amina = &doc.teachers[0];
        assert_eq!(amina.rank, Rank::Trainer);
        assert_eq!(amina.status, EmploymentStatus::Contractual);
        assert_eq!(amina.degree, Degree::Master);
        assert_eq!(amina.echelon, "7");
        let said = &doc.teachers[1];
        assert_eq!(said.rank, Rank::Teacher);
        assert_eq!(said.echelon, "");
        assert_eq!(doc.reports["t1"].level, Some(Level::Year5));
    }

    #[test]
    fn foreign_format_is_rejected() {
        let err = restore_document(r#"{ "format": "something-else" }"#).expect_err("reject");
        assert!(matches!(err, BackupError::UnsupportedFormat(_)));
        assert!(matches!(
            restore_document("not json"),
            Err(BackupError::InvalidDocument(_))
        ));
    }
}
