use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use super::{Cell, Row};
use crate::model::{ObservationItem, ReportData, ReportVariant, Score, Teacher};
use crate::normalize::{
    normalize_date, normalize_degree, normalize_echelon, normalize_level, normalize_rank,
    normalize_status, parse_count, parse_mark,
};
use crate::schema::{
    catalog, Column, Field, LEGACY_FIELDS, OBSERVATION_TEMPLATES, SUPERSEDED_HEADERS,
};

static BLANK: Cell = Cell::Empty;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    /// 1-based row number in the input, when the warning concerns one row.
    pub row: Option<usize>,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSheet {
    pub teachers: Vec<Teacher>,
    pub reports_by_teacher_id: BTreeMap<String, ReportData>,
    pub warnings: Vec<ParseWarning>,
}

struct ColumnIndex {
    by_column: HashMap<Column, usize>,
    superseded: Vec<(Field, usize)>,
}

impl ColumnIndex {
    fn get<'r>(&self, row: &'r Row, column: Column) -> &'r Cell {
        self.by_column
            .get(&column)
            .and_then(|i| row.get(*i))
            .unwrap_or(&BLANK)
    }

    fn text(&self, row: &Row, column: Column) -> String {
        self.get(row, column).trimmed()
    }

    fn field<'r>(&self, row: &'r Row, field: Field) -> &'r Cell {
        self.get(row, Column::Field(field))
    }

    fn field_text(&self, row: &Row, field: Field) -> String {
        self.text(row, Column::Field(field))
    }
}

/// Rebuilds teachers and reports from a tabular array.
///
/// Columns are located by header label (trimmed, case-insensitive) and fall
/// back to their catalog position, unless another recognised header already
/// sits there. Row 0 is always the header row. When it matches no catalog
/// header at all, every column is read by position.
pub fn parse(rows: &[Row]) -> ParsedSheet {
    let mut out = ParsedSheet::default();
    let Some(first) = rows.first() else {
        return out;
    };

    let header_idx = header_map(first);
    let cat = catalog();
    let matched = cat
        .columns()
        .iter()
        .filter(|c| header_idx.contains_key(&c.header.to_lowercase()))
        .count();
    let unlabelled = matched == 0;

    // Positions owned by a recognised header are never borrowed as a fallback.
    let claimed: HashSet<usize> = cat
        .columns()
        .iter()
        .map(|c| c.header.as_str())
        .chain(SUPERSEDED_HEADERS.iter().map(|(_, label)| *label))
        .filter_map(|h| header_idx.get(&h.to_lowercase()).copied())
        .collect();

    let mut by_column = HashMap::with_capacity(cat.len());
    for c in cat.columns() {
        if let Some(i) = header_idx.get(&c.header.to_lowercase()) {
            by_column.insert(c.column, *i);
            continue;
        }
        if unlabelled {
            by_column.insert(c.column, c.default_index);
            continue;
        }
        if claimed.contains(&c.default_index) {
            tracing::debug!(
                header = %c.header,
                "sheet column missing and its position is taken; left blank"
            );
            out.warnings.push(ParseWarning {
                row: None,
                code: "missing_column",
                message: format!("column '{}' not found; left blank", c.header),
            });
            continue;
        }
        tracing::debug!(
            header = %c.header,
            index = c.default_index,
            "sheet column missing; using default position"
        );
        out.warnings.push(ParseWarning {
            row: None,
            code: "missing_column",
            message: format!(
                "column '{}' not found; read from position {}",
                c.header, c.default_index
            ),
        });
        by_column.insert(c.column, c.default_index);
    }
    if unlabelled {
        tracing::debug!("header row has no known labels; reading every column by position");
        out.warnings.push(ParseWarning {
            row: None,
            code: "unknown_headers",
            message: "no known header labels in the first row; all columns read by position"
                .to_string(),
        });
    }

    let superseded = SUPERSEDED_HEADERS
        .iter()
        .filter_map(|(field, label)| {
            header_idx
                .get(&label.to_lowercase())
                .map(|i| (*field, *i))
        })
        .collect();
    let index = ColumnIndex {
        by_column,
        superseded,
    };

    for (i, row) in rows.iter().enumerate().skip(1) {
        let line = i + 1;
        if index.field_text(row, Field::Name).is_empty() {
            continue;
        }
        let teacher = read_teacher(&index, row, line, &mut out.warnings);
        let report = read_report(&index, row, &teacher.id, line, &mut out.warnings);
        out.reports_by_teacher_id.insert(teacher.id.clone(), report);
        out.teachers.push(teacher);
    }
    out
}

fn header_map(row: &Row) -> HashMap<String, usize> {
    let mut idx = HashMap::new();
    for (i, c) in row.iter().enumerate() {
        let key = c.trimmed().to_lowercase();
        if key.is_empty() {
            continue;
        }
        idx.entry(key).or_insert(i);
    }
    idx
}

fn read_teacher(
    ix: &ColumnIndex,
    row: &Row,
    line: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Teacher {
    let mut id = ix.field_text(row, Field::Id);
    if id.is_empty() {
        id = Uuid::new_v4().to_string();
        warnings.push(ParseWarning {
            row: Some(line),
            code: "generated_id",
            message: "teacher id was empty; a new id was generated".to_string(),
        });
    }

    let echelon = match normalize_echelon(ix.field(row, Field::Echelon)) {
        Some(e) => e,
        None => {
            let raw = ix.field_text(row, Field::Echelon);
            tracing::warn!(line, echelon = %raw, "echelon outside 1..=12 dropped");
            warnings.push(ParseWarning {
                row: Some(line),
                code: "bad_echelon",
                message: format!("echelon '{}' is not an integer in 1..=12", raw),
            });
            String::new()
        }
    };

    let tenure_date = normalize_date(ix.field(row, Field::TenureDate));
    let note = ix.field_text(row, Field::Note);

    Teacher {
        id,
        name: ix.field_text(row, Field::Name),
        birth_date: normalize_date(ix.field(row, Field::BirthDate)),
        birth_place: ix.field_text(row, Field::BirthPlace),
        degree: normalize_degree(&ix.field_text(row, Field::Degree)),
        degree_date: normalize_date(ix.field(row, Field::DegreeDate)),
        recruitment_date: normalize_date(ix.field(row, Field::RecruitmentDate)),
        rank: normalize_rank(&ix.field_text(row, Field::Rank)),
        rank_date: normalize_date(ix.field(row, Field::RankDate)),
        echelon,
        echelon_date: normalize_date(ix.field(row, Field::EchelonDate)),
        last_mark: parse_mark(ix.field(row, Field::LastMark)),
        last_inspection_date: normalize_date(ix.field(row, Field::LastInspectionDate)),
        status: normalize_status(&ix.field_text(row, Field::Status)),
        tenure_date: (!tenure_date.is_empty()).then_some(tenure_date),
        note: (!note.is_empty()).then_some(note),
    }
}

fn read_report(
    ix: &ColumnIndex,
    row: &Row,
    teacher_id: &str,
    line: usize,
    warnings: &mut Vec<ParseWarning>,
) -> ReportData {
    let mut general_assessment = ix.field_text(row, Field::GeneralAssessment);
    if general_assessment.is_empty() {
        if let Some(old) = ix
            .superseded
            .iter()
            .filter(|(f, _)| *f == Field::GeneralAssessment)
            .map(|(_, i)| row.get(*i).unwrap_or(&BLANK).trimmed())
            .find(|v| !v.is_empty())
        {
            general_assessment = old;
        }
    }

    let level_cell = ix.field(row, Field::Level);
    let level = (!level_cell.is_blank()).then(|| normalize_level(&level_cell.as_text()));

    let mut legacy = BTreeMap::new();
    for (key, _) in LEGACY_FIELDS {
        let v = ix.text(row, Column::Legacy(*key));
        if !v.is_empty() {
            legacy.insert(key.to_string(), v);
        }
    }

    let observations = OBSERVATION_TEMPLATES
        .iter()
        .map(|t| ObservationItem {
            score: parse_score(ix.get(row, Column::Score(t.id))),
            improvement: ix.text(row, Column::Note(t.id)),
            ..ObservationItem::from_template(t)
        })
        .collect();

    ReportData {
        id: Uuid::new_v4().to_string(),
        teacher_id: teacher_id.to_string(),
        variant: parse_variant(&ix.field_text(row, Field::Variant)),
        inspector_name: ix.field_text(row, Field::InspectorName),
        region: ix.field_text(row, Field::Region),
        district: ix.field_text(row, Field::District),
        school: ix.field_text(row, Field::School),
        inspection_date: normalize_date(ix.field(row, Field::InspectionDate)),
        subject: ix.field_text(row, Field::Subject),
        topic: ix.field_text(row, Field::Topic),
        duration: ix.field_text(row, Field::Duration),
        level,
        group: ix.field_text(row, Field::Group),
        attendance_total: parse_count(ix.field(row, Field::AttendanceTotal)),
        attendance_present: parse_count(ix.field(row, Field::AttendancePresent)),
        target_levels: parse_string_list(&ix.field_text(row, Field::TargetLevels), line, warnings),
        observations,
        general_assessment,
        final_mark: parse_mark(ix.field(row, Field::FinalMark)),
        mark_in_words: ix.field_text(row, Field::MarkInWords),
        legacy,
    }
}

/// Only exactly 0, 1 or 2 are scores. Anything else, blank included, is no score.
pub fn parse_score(cell: &Cell) -> Option<Score> {
    match cell {
        Cell::Text(s) => match s.as_str() {
            "0" => Score::new(0),
            "1" => Score::new(1),
            "2" => Score::new(2),
            _ => None,
        },
        Cell::Number(n) if *n == 0.0 || *n == 1.0 || *n == 2.0 => Score::new(*n as u8),
        _ => None,
    }
}

fn parse_variant(s: &str) -> ReportVariant {
    let lower = s.to_lowercase();
    if ["legacy", "old", "ancien", "قديم"]
        .iter()
        .any(|k| lower.contains(k))
    {
        ReportVariant::Legacy
    } else {
        ReportVariant::Current
    }
}

fn parse_string_list(s: &str, line: usize, warnings: &mut Vec<ParseWarning>) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<serde_json::Value>>(s) {
        Ok(items) => items
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Err(e) => {
            tracing::warn!(line, error = %e, "malformed list cell replaced by empty list");
            warnings.push(ParseWarning {
                row: Some(line),
                code: "bad_list",
                message: format!("could not read list '{}': {}", s, e),
            });
            Vec::new()
        }
    }
}
