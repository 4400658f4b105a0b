use std::borrow::Cow;
use std::collections::BTreeMap;

use super::{Cell, Row};
use crate::model::{GlobalDefaults, ReportData, Teacher};
use crate::schema::{catalog, Column, Field};

/// Columns whose blank cells inherit the last value seen further up the sheet.
#[derive(Debug, Default)]
struct CarryForward {
    last: GlobalDefaults,
    defaults: GlobalDefaults,
}

impl CarryForward {
    fn new(defaults: GlobalDefaults) -> Self {
        Self {
            last: GlobalDefaults::default(),
            defaults,
        }
    }

    fn resolve(&mut self, field: Field, own: &str) -> String {
        let (last, default) = match field {
            Field::InspectorName => (&mut self.last.inspector_name, &self.defaults.inspector_name),
            Field::Region => (&mut self.last.region, &self.defaults.region),
            Field::District => (&mut self.last.district, &self.defaults.district),
            Field::School => (&mut self.last.school, &self.defaults.school),
            _ => return own.to_string(),
        };
        let own = own.trim();
        if !own.is_empty() {
            *last = own.to_string();
            return last.clone();
        }
        if !last.is_empty() {
            return last.clone();
        }
        default.clone()
    }
}

/// Flattens teachers and their reports into the tabular mirror: header row
/// first, then one row per teacher in input order.
///
/// A teacher's report comes from `reports_by_teacher_id`, else from
/// `active_report` when it belongs to that teacher, else an empty report.
pub fn serialize(
    teachers: &[Teacher],
    active_report: Option<&ReportData>,
    reports_by_teacher_id: Option<&BTreeMap<String, ReportData>>,
    global_defaults: Option<&GlobalDefaults>,
) -> Vec<Row> {
    let cat = catalog();
    let mut rows: Vec<Row> = Vec::with_capacity(teachers.len() + 1);
    rows.push(cat.header_row().into_iter().map(Cell::Text).collect());

    let mut carry = CarryForward::new(global_defaults.cloned().unwrap_or_default());
    for teacher in teachers {
        let report = resolve_report(teacher, active_report, reports_by_teacher_id);
        let carried = GlobalDefaults {
            inspector_name: carry.resolve(Field::InspectorName, &report.inspector_name),
            region: carry.resolve(Field::Region, &report.region),
            district: carry.resolve(Field::District, &report.district),
            school: carry.resolve(Field::School, &report.school),
        };

        let row = cat
            .columns()
            .iter()
            .map(|c| cell_for(c.column, teacher, &report, &carried))
            .collect();
        rows.push(row);
    }
    rows
}

fn resolve_report<'a>(
    teacher: &Teacher,
    active_report: Option<&'a ReportData>,
    reports_by_teacher_id: Option<&'a BTreeMap<String, ReportData>>,
) -> Cow<'a, ReportData> {
    if let Some(r) = reports_by_teacher_id.and_then(|m| m.get(&teacher.id)) {
        return Cow::Borrowed(r);
    }
    if let Some(r) = active_report.filter(|r| r.teacher_id == teacher.id) {
        return Cow::Borrowed(r);
    }
    Cow::Owned(ReportData::empty(&teacher.id))
}

fn cell_for(column: Column, t: &Teacher, r: &ReportData, carried: &GlobalDefaults) -> Cell {
    match column {
        Column::Field(field) => field_cell(field, t, r, carried),
        Column::Legacy(key) => Cell::text(r.legacy.get(key).cloned().unwrap_or_default()),
        Column::Score(id) => Cell::number_or_blank(
            r.observation(id)
                .and_then(|o| o.score)
                .map(|s| f64::from(s.value())),
        ),
        Column::Note(id) => Cell::text(
            r.observation(id)
                .map(|o| o.improvement.clone())
                .unwrap_or_default(),
        ),
    }
}

fn field_cell(field: Field, t: &Teacher, r: &ReportData, carried: &GlobalDefaults) -> Cell {
    match field {
        Field::Id => Cell::text(t.id.as_str()),
        Field::Name => Cell::text(t.name.as_str()),
        Field::BirthDate => Cell::text(t.birth_date.as_str()),
        Field::BirthPlace => Cell::text(t.birth_place.as_str()),
        Field::Degree => Cell::text(t.degree.label()),
        Field::DegreeDate => Cell::text(t.degree_date.as_str()),
        Field::RecruitmentDate => Cell::text(t.recruitment_date.as_str()),
        Field::Rank => Cell::text(t.rank.label()),
        Field::RankDate => Cell::text(t.rank_date.as_str()),
        Field::Echelon => Cell::text(t.echelon.as_str()),
        Field::EchelonDate => Cell::text(t.echelon_date.as_str()),
        Field::LastMark => Cell::number_or_blank(t.last_mark),
        Field::LastInspectionDate => Cell::text(t.last_inspection_date.as_str()),
        Field::Status => Cell::text(t.status.label()),
        Field::TenureDate => Cell::text(t.tenure_date.clone().unwrap_or_default()),
        Field::Note => Cell::text(t.note.clone().unwrap_or_default()),
        Field::Variant => Cell::text(r.variant.label()),
        Field::InspectorName => Cell::text(carried.inspector_name.as_str()),
        Field::Region => Cell::text(carried.region.as_str()),
        Field::District => Cell::text(carried.district.as_str()),
        Field::School => Cell::text(carried.school.as_str()),
        Field::InspectionDate => Cell::text(r.inspection_date.as_str()),
        Field::Subject => Cell::text(r.subject.as_str()),
        Field::Topic => Cell::text(r.topic.as_str()),
        Field::Duration => Cell::text(r.duration.as_str()),
        Field::Level => Cell::text(r.level.map(|l| l.label()).unwrap_or_default()),
        Field::Group => Cell::text(r.group.as_str()),
        Field::AttendanceTotal => Cell::number_or_blank(r.attendance_total.map(f64::from)),
        Field::AttendancePresent => Cell::number_or_blank(r.attendance_present.map(f64::from)),
        Field::TargetLevels => {
            if r.target_levels.is_empty() {
                Cell::text("")
            } else {
                Cell::text(serde_json::to_string(&r.target_levels).unwrap_or_default())
            }
        }
        Field::GeneralAssessment => Cell::text(r.general_assessment.as_str()),
        Field::FinalMark => Cell::number_or_blank(r.final_mark),
        Field::MarkInWords => Cell::text(r.mark_in_words.as_str()),
    }
}
