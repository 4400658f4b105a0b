use inspectord::model::{
    Degree, EmploymentStatus, GlobalDefaults, Level, Rank, ReportData, ReportVariant, Score,
    Teacher,
};
use inspectord::schema::{catalog, Column, Field};
use inspectord::sheet::{self, Cell, Row};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

fn teacher(id: &str, name: &str) -> Teacher {
    Teacher {
        id: id.to_string(),
        name: name.to_string(),
        birth_date: "1984-02-11".to_string(),
        birth_place: "Sétif".to_string(),
        degree: Degree::Master,
        degree_date: "2007-06-30".to_string(),
        recruitment_date: "2008-09-01".to_string(),
        rank: Rank::SecondClass,
        rank_date: "2016-01-01".to_string(),
        echelon: "7".to_string(),
        echelon_date: "2021-09-01".to_string(),
        last_mark: Some(14.5),
        last_inspection_date: "2022-03-15".to_string(),
        status: EmploymentStatus::Contractual,
        tenure_date: Some("2009-05-20".to_string()),
        note: Some("asked for a morning visit".to_string()),
    }
}

fn report(teacher_id: &str) -> ReportData {
    let mut r = ReportData::empty(teacher_id);
    r.variant = ReportVariant::Legacy;
    r.inspector_name = "K. Haddad".to_string();
    r.region = "Est".to_string();
    r.district = "Sétif 2".to_string();
    r.school = "Ibn Badis".to_string();
    r.inspection_date = "2024-04-18".to_string();
    r.subject = "Mathematics".to_string();
    r.topic = "Fractions".to_string();
    r.duration = "45 min".to_string();
    r.level = Some(Level::Year4);
    r.group = "4B".to_string();
    r.attendance_total = Some(31);
    r.attendance_present = Some(29);
    r.target_levels = vec!["year-4".to_string(), "year-5".to_string()];
    r.general_assessment = "Solid lesson, weak closure".to_string();
    r.final_mark = Some(15.25);
    r.mark_in_words = "fifteen and a quarter".to_string();
    r.legacy.insert("advice".to_string(), "Use manipulatives".to_string());
    if let Some(o) = r.observation_mut("exec-aids") {
        o.score = Score::new(2);
        o.improvement = "prepare the board before class".to_string();
    }
    if let Some(o) = r.observation_mut("assess-formative") {
        o.score = Score::new(0);
    }
    r
}

fn col(column: Column) -> usize {
    catalog()
        .descriptor(column)
        .expect("column in catalog")
        .default_index
}

fn without_report_ids(mut m: BTreeMap<String, ReportData>) -> BTreeMap<String, ReportData> {
    for r in m.values_mut() {
        r.id.clear();
    }
    m
}

#[test]
fn full_sheet_roundtrips_teachers_and_reports() {
    let teachers = vec![teacher("t1", "Amina Benali"), teacher("t2", "Said Ouali")];
    let mut reports = BTreeMap::new();
    reports.insert("t1".to_string(), report("t1"));
    reports.insert("t2".to_string(), report("t2"));

    let rows = sheet::serialize(&teachers, None, Some(&reports), None);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].len(), catalog().len());

    let parsed = sheet::parse(&rows);
    assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    assert_eq!(parsed.teachers, teachers);
    assert_eq!(
        without_report_ids(parsed.reports_by_teacher_id),
        without_report_ids(reports)
    );
}

#[test]
fn csv_projection_roundtrips_through_the_parser() {
    let teachers = vec![teacher("t1", "Benali, Amina")];
    let mut reports = BTreeMap::new();
    reports.insert("t1".to_string(), report("t1"));

    let rows = sheet::serialize(&teachers, None, Some(&reports), None);
    let text = sheet::csv::rows_to_csv(&rows);
    let parsed = sheet::parse(&sheet::csv::csv_to_rows(&text));

    assert_eq!(parsed.teachers, teachers);
    let back = &parsed.reports_by_teacher_id["t1"];
    assert_eq!(back.final_mark, Some(15.25));
    assert_eq!(back.attendance_present, Some(29));
    assert_eq!(
        back.observation("exec-aids").and_then(|o| o.score),
        Score::new(2)
    );
}

#[test]
fn blank_session_fields_carry_forward_then_fall_back_to_defaults() {
    let teachers = vec![
        teacher("t1", "A"),
        teacher("t2", "B"),
        teacher("t3", "C"),
    ];
    let mut first = ReportData::empty("t1");
    first.school = "Ibn Badis".to_string();
    let mut reports = BTreeMap::new();
    reports.insert("t1".to_string(), first);
    reports.insert("t2".to_string(), ReportData::empty("t2"));
    let defaults = GlobalDefaults {
        inspector_name: "K. Haddad".to_string(),
        region: "Est".to_string(),
        district: "Sétif 2".to_string(),
        school: "Default school".to_string(),
    };

    let rows = sheet::serialize(&teachers, None, Some(&reports), Some(&defaults));
    let school = col(Column::Field(Field::School));
    let inspector = col(Column::Field(Field::InspectorName));
    assert_eq!(rows[1][school], Cell::text("Ibn Badis"));
    assert_eq!(rows[2][school], Cell::text("Ibn Badis"));
    assert_eq!(rows[3][school], Cell::text("Ibn Badis"));
    for row in &rows[1..] {
        assert_eq!(row[inspector], Cell::text("K. Haddad"));
    }
}

#[test]
fn reordered_headers_are_found_by_label() {
    let rows = sheet::serialize(
        &[teacher("t1", "Amina")],
        None,
        None,
        None,
    );
    // Reverse every row: positions no longer match the catalog.
    let reversed: Vec<Row> = rows
        .iter()
        .map(|r| r.iter().rev().cloned().collect())
        .collect();
    let parsed = sheet::parse(&reversed);
    assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    assert_eq!(parsed.teachers, vec![teacher("t1", "Amina")]);
}

#[test]
fn headers_match_case_and_whitespace_insensitively() {
    let header: Row = vec![Cell::text("  NAME "), Cell::text("teacher id"), Cell::text("ECHELON")];
    let data: Row = vec![Cell::text("Amina"), Cell::text("t9"), Cell::Number(4.0)];
    let parsed = sheet::parse(&[header, data]);
    assert_eq!(parsed.teachers.len(), 1);
    assert_eq!(parsed.teachers[0].id, "t9");
    assert_eq!(parsed.teachers[0].name, "Amina");
    assert_eq!(parsed.teachers[0].echelon, "4");
}

#[test]
fn missing_column_reads_blank_when_its_position_is_taken() {
    // "Birth date" is absent and its catalog position holds "Name".
    let name_pos = col(Column::Field(Field::BirthDate));
    let mut header: Row = vec![Cell::text(""); name_pos + 1];
    header[0] = Cell::text("Teacher ID");
    header[name_pos] = Cell::text("Name");
    let mut data: Row = vec![Cell::text(""); name_pos + 1];
    data[0] = Cell::text("t1");
    data[name_pos] = Cell::text("Amina");

    let parsed = sheet::parse(&[header, data]);
    assert_eq!(parsed.teachers[0].name, "Amina");
    assert_eq!(parsed.teachers[0].birth_date, "");
    assert!(parsed
        .warnings
        .iter()
        .any(|w| w.code == "missing_column" && w.message.contains("Birth date")));
}

#[test]
fn rows_without_name_are_skipped_and_empty_ids_are_generated() {
    let teachers = [teacher("t1", "Amina"), teacher("t2", "Said")];
    let mut rows = sheet::serialize(&teachers, None, None, None);
    let name = col(Column::Field(Field::Name));
    let id = col(Column::Field(Field::Id));
    rows[1][name] = Cell::text("   ");
    rows[2][id] = Cell::Empty;

    let parsed = sheet::parse(&rows);
    assert_eq!(parsed.teachers.len(), 1);
    assert_eq!(parsed.teachers[0].name, "Said");
    assert!(!parsed.teachers[0].id.is_empty());
    assert!(parsed.reports_by_teacher_id.contains_key(&parsed.teachers[0].id));
    assert!(parsed.warnings.iter().any(|w| w.code == "generated_id" && w.row == Some(3)));
}

#[test]
fn only_exact_scores_are_accepted() {
    let mut rows = sheet::serialize(&[teacher("t1", "Amina")], None, None, None);
    let aids = col(Column::Score("exec-aids"));
    let launch = col(Column::Score("exec-launch"));
    let language = col(Column::Score("exec-language"));
    rows[1][aids] = Cell::text("2");
    rows[1][launch] = Cell::text("2.0");
    rows[1][language] = Cell::Number(3.0);

    let parsed = sheet::parse(&rows);
    let r = &parsed.reports_by_teacher_id["t1"];
    assert_eq!(r.observation("exec-aids").and_then(|o| o.score), Score::new(2));
    assert_eq!(r.observation("exec-launch").and_then(|o| o.score), None);
    assert_eq!(r.observation("exec-language").and_then(|o| o.score), None);
}

#[test]
fn superseded_assessment_header_is_still_read() {
    let header: Row = vec![
        Cell::text("Teacher ID"),
        Cell::text("Name"),
        Cell::text("Overall assessment"),
    ];
    let data: Row = vec![Cell::text("t1"), Cell::text("Amina"), Cell::text("Good pacing")];
    let parsed = sheet::parse(&[header, data]);
    assert_eq!(
        parsed.reports_by_teacher_id["t1"].general_assessment,
        "Good pacing"
    );
}

#[test]
fn raw_cells_are_normalized_on_import() {
    let mut rows = sheet::serialize(&[teacher("t1", "Amina")], None, None, None);
    rows[1][col(Column::Field(Field::BirthDate))] = Cell::Number(30_000.0);
    rows[1][col(Column::Field(Field::EchelonDate))] = Cell::text("01/09/2021");
    rows[1][col(Column::Field(Field::Rank))] = Cell::text("Enseignant formateur");
    rows[1][col(Column::Field(Field::Status))] = Cell::text("stagiaire");
    rows[1][col(Column::Field(Field::Echelon))] = Cell::text("13");
    rows[1][col(Column::Field(Field::LastMark))] = Cell::text("12,5");

    let parsed = sheet::parse(&rows);
    let t = &parsed.teachers[0];
    assert_eq!(t.birth_date, "1982-02-18");
    assert_eq!(t.echelon_date, "2021-09-01");
    assert_eq!(t.rank, Rank::Trainer);
    assert_eq!(t.status, EmploymentStatus::Probationary);
    assert_eq!(t.echelon, "");
    assert_eq!(t.last_mark, Some(12.5));
    assert!(parsed.warnings.iter().any(|w| w.code == "bad_echelon"));
}

#[test]
fn active_report_fills_in_for_unsaved_teacher() {
    let teachers = vec![teacher("t1", "Amina"), teacher("t2", "Said")];
    let mut active = ReportData::empty("t2");
    active.topic = "Reading".to_string();
    let rows = sheet::serialize(&teachers, Some(&active), None, None);
    let topic = col(Column::Field(Field::Topic));
    assert_eq!(rows[1][topic], Cell::text(""));
    assert_eq!(rows[2][topic], Cell::text("Reading"));
}

#[test]
fn unrecognised_header_row_is_never_read_as_a_teacher() {
    let width = catalog().len();
    let echelon = col(Column::Field(Field::Echelon));
    let mut header: Row = vec![Cell::text(""); width];
    header[col(Column::Field(Field::Id))] = Cell::text("ID");
    header[col(Column::Field(Field::Name))] = Cell::text("Nom complet");
    header[echelon] = Cell::text("Échelon");
    let mut data: Row = vec![Cell::text(""); width];
    data[col(Column::Field(Field::Id))] = Cell::text("t1");
    data[col(Column::Field(Field::Name))] = Cell::text("Amina");
    data[echelon] = Cell::text("5");

    let parsed = sheet::parse(&[header, data]);
    assert_eq!(parsed.teachers.len(), 1);
    assert_eq!(parsed.teachers[0].id, "t1");
    assert_eq!(parsed.teachers[0].name, "Amina");
    assert_eq!(parsed.teachers[0].echelon, "5");
    assert!(parsed.warnings.iter().any(|w| w.code == "unknown_headers"));
}

#[test]
fn short_rows_read_missing_trailing_columns_as_empty() {
    let mut rows = sheet::serialize(&[teacher("t1", "Amina")], None, None, None);
    rows[1].truncate(col(Column::Field(Field::Name)) + 1);

    let parsed = sheet::parse(&rows);
    assert_eq!(parsed.teachers.len(), 1);
    let t = &parsed.teachers[0];
    assert_eq!(t.name, "Amina");
    assert_eq!(t.echelon, "");
    assert_eq!(t.last_mark, None);
    assert_eq!(t.rank, Rank::Teacher);
    assert_eq!(parsed.reports_by_teacher_id["t1"].topic, "");
    assert!(!parsed.warnings.iter().any(|w| w.code == "bad_echelon"));
}

#[test]
fn duplicate_ids_are_kept_as_separate_teachers() {
    let teachers = [teacher("t1", "Amina"), teacher("t1", "Said")];
    let rows = sheet::serialize(&teachers, None, None, None);
    let parsed = sheet::parse(&rows);
    let names: Vec<_> = parsed
        .teachers
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .collect();
    assert_eq!(names, vec![("t1", "Amina"), ("t1", "Said")]);
}
