use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::normalize::{normalize_degree, normalize_level, normalize_rank, normalize_status};
use crate::schema::{ObservationTemplate, OBSERVATION_TEMPLATES};
use crate::sheet::Cell;

/// Categorical fields accept any scalar and go through the same normaliser the
/// sheet parser uses. Canonical labels map to themselves.
macro_rules! deserialize_via {
    ($ty:ty, $normalize:path) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                Ok($normalize(&Cell::deserialize(d)?.as_text()))
            }
        }
    };
}

deserialize_via!(Rank, normalize_rank);
deserialize_via!(Degree, normalize_degree);
deserialize_via!(EmploymentStatus, normalize_status);
deserialize_via!(Level, normalize_level);

/// Echelon as stored text; numeric JSON values are accepted. Range checks
/// happen where the record is written.
fn echelon_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Cell::deserialize(d)?.trimmed())
}

fn optional_level<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Level>, D::Error> {
    let cell = Cell::deserialize(d)?;
    Ok((!cell.is_blank()).then(|| normalize_level(&cell.as_text())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rank {
    #[default]
    Teacher,
    FirstClass,
    SecondClass,
    Trainer,
    Distinguished,
}

impl Rank {
    pub fn label(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::FirstClass => "first-class",
            Self::SecondClass => "second-class",
            Self::Trainer => "trainer",
            Self::Distinguished => "distinguished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Degree {
    #[default]
    Licence,
    Master,
    InstituteGraduate,
    AppliedStudies,
    Postgraduate,
}

impl Degree {
    pub fn label(self) -> &'static str {
        match self {
            Self::Licence => "licence",
            Self::Master => "master",
            Self::InstituteGraduate => "institute-graduate",
            Self::AppliedStudies => "applied-studies",
            Self::Postgraduate => "postgraduate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentStatus {
    #[default]
    Permanent,
    Contractual,
    Probationary,
}

impl EmploymentStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Contractual => "contractual",
            Self::Probationary => "probationary",
        }
    }
}

/// Class level of the observed session (six primary-school years).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Level {
    #[default]
    #[serde(rename = "year-1")]
    Year1,
    #[serde(rename = "year-2")]
    Year2,
    #[serde(rename = "year-3")]
    Year3,
    #[serde(rename = "year-4")]
    Year4,
    #[serde(rename = "year-5")]
    Year5,
    #[serde(rename = "year-6")]
    Year6,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Self::Year1,
        Self::Year2,
        Self::Year3,
        Self::Year4,
        Self::Year5,
        Self::Year6,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Year1 => "year-1",
            Self::Year2 => "year-2",
            Self::Year3 => "year-3",
            Self::Year4 => "year-4",
            Self::Year5 => "year-5",
            Self::Year6 => "year-6",
        }
    }

    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            1..=6 => Some(Self::ALL[(n - 1) as usize]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportVariant {
    #[default]
    Current,
    Legacy,
}

impl ReportVariant {
    pub fn label(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Legacy => "legacy",
        }
    }
}

/// Observation score: 0 (not met), 1 (partially met), 2 (met).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub fn new(v: u8) -> Option<Self> {
        (v <= 2).then_some(Self(v))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Score::new(v).ok_or_else(|| format!("score must be 0, 1 or 2 (got {})", v))
    }
}

impl From<Score> for u8 {
    fn from(s: Score) -> u8 {
        s.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub birth_date: String,
    pub birth_place: String,
    pub degree: Degree,
    pub degree_date: String,
    pub recruitment_date: String,
    pub rank: Rank,
    pub rank_date: String,
    #[serde(deserialize_with = "echelon_text")]
    pub echelon: String,
    pub echelon_date: String,
    pub last_mark: Option<f64>,
    pub last_inspection_date: String,
    pub status: EmploymentStatus,
    pub tenure_date: Option<String>,
    pub note: Option<String>,
}

impl Teacher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Echelon as an integer, only when it lies in 1..=12.
    pub fn echelon_number(&self) -> Option<u8> {
        self.echelon
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|n| (1..=12).contains(n))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservationItem {
    pub template_id: String,
    pub category: String,
    pub criteria: String,
    pub indicators: Vec<String>,
    pub score: Option<Score>,
    pub improvement: String,
}

impl ObservationItem {
    pub fn from_template(t: &ObservationTemplate) -> Self {
        Self {
            template_id: t.id.to_string(),
            category: t.category.to_string(),
            criteria: t.criteria.to_string(),
            indicators: t.indicators.iter().map(|s| s.to_string()).collect(),
            score: None,
            improvement: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportData {
    pub id: String,
    pub teacher_id: String,
    pub variant: ReportVariant,
    pub inspector_name: String,
    pub region: String,
    pub district: String,
    pub school: String,
    pub inspection_date: String,
    pub subject: String,
    pub topic: String,
    pub duration: String,
    #[serde(deserialize_with = "optional_level")]
    pub level: Option<Level>,
    pub group: String,
    pub attendance_total: Option<u32>,
    pub attendance_present: Option<u32>,
    pub target_levels: Vec<String>,
    pub observations: Vec<ObservationItem>,
    pub general_assessment: String,
    pub final_mark: Option<f64>,
    pub mark_in_words: String,
    pub legacy: BTreeMap<String, String>,
}

impl ReportData {
    /// A blank report for `teacher_id` carrying one unscored item per observation template.
    pub fn empty(teacher_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            teacher_id: teacher_id.to_string(),
            observations: OBSERVATION_TEMPLATES
                .iter()
                .map(ObservationItem::from_template)
                .collect(),
            ..Self::default()
        }
    }

    pub fn observation(&self, template_id: &str) -> Option<&ObservationItem> {
        self.observations
            .iter()
            .find(|o| o.template_id == template_id)
    }

    pub fn observation_mut(&mut self, template_id: &str) -> Option<&mut ObservationItem> {
        self.observations
            .iter_mut()
            .find(|o| o.template_id == template_id)
    }

    /// Adds an unscored item for every template the report lacks, in
    /// template order after the existing items.
    pub fn fill_missing_observations(&mut self) {
        for t in OBSERVATION_TEMPLATES {
            if self.observation(t.id).is_none() {
                self.observations.push(ObservationItem::from_template(t));
            }
        }
    }

    pub fn has_inspection_date(&self) -> bool {
        !self.inspection_date.trim().is_empty()
    }
}

/// Tenure-exam record. Kept alongside the inspection reports but not mirrored
/// into the tabular sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenureReport {
    pub id: String,
    pub teacher_id: String,
    pub exam_date: String,
    pub lesson_date: String,
    pub subject: String,
    pub mark: Option<f64>,
    pub decision: String,
}

/// Sheet-wide fallback values for the carry-forward columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalDefaults {
    pub inspector_name: String,
    pub region: String,
    pub district: String,
    pub school: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echelon_number_only_in_range() {
        let mut t = Teacher::new("Amina");
        let cases = [
            ("7", Some(7)),
            (" 12 ", Some(12)),
            ("0", None),
            ("13", None),
            ("", None),
        ];
        for (raw, want) in cases {
            t.echelon = raw.to_string();
            assert_eq!(t.echelon_number(), want, "{:?}", raw);
        }
    }

    #[test]
    fn partial_report_gets_every_template() {
        let mut r: ReportData = serde_json::from_str(
            r#"{ "teacherId": "t1", "observations": [{ "templateId": "exec-aids", "score": 2 }] }"#,
        )
        .expect("report");
        r.fill_missing_observations();
        assert_eq!(r.observations.len(), OBSERVATION_TEMPLATES.len());
        assert_eq!(r.observations[0].template_id, "exec-aids");
        assert_eq!(r.observation("exec-aids").and_then(|o| o.score), Score::new(2));
    }

    #[test]
    fn categorical_fields_decode_through_normalizers() {
        let t: Teacher = serde_json::from_str(
            r#"{ "id": "t1", "rank": "Professeur formateur", "degree": "second-class",
                 "status": "Contractuel", "echelon": 7 }"#,
        )
        .expect("teacher");
        assert_eq!(t.rank, Rank::Trainer);
        assert_eq!(t.degree, Degree::Licence);
        assert_eq!(t.status, EmploymentStatus::Contractual);
        assert_eq!(t.echelon, "7");

        let back: Teacher = serde_json::from_value(serde_json::to_value(&t).expect("encode"))
            .expect("decode");
        assert_eq!(back, t);

        let r: ReportData = serde_json::from_str(r#"{ "level": "4ème année" }"#).expect("report");
        assert_eq!(r.level, Some(Level::Year4));
    }

    #[test]
    fn score_rejects_out_of_range_on_decode() {
        assert!(serde_json::from_str::<Score>("3").is_err());
        assert_eq!(serde_json::from_str::<Score>("1").ok(), Score::new(1));
    }
}
