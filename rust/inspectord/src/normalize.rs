//! Coercion of loosely formatted sheet/form input into canonical values.
//!
//! Nothing here fails. Dates that cannot be recognised are passed through
//! verbatim so no data is lost; categorical free text that matches no rule
//! falls to a documented default, because seniority and mark arithmetic
//! downstream needs a concrete value.

use chrono::{Datelike, Duration, NaiveDate};

use crate::model::{Degree, EmploymentStatus, Level, Rank, ReportData, Teacher, TenureReport};
use crate::sheet::Cell;

const ISO_FORMAT: &str = "%Y-%m-%d";
// Largest serial that still lands in year 9999.
const MAX_SERIAL_DAY: f64 = 2_958_465.0;

fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

pub fn normalize_date(cell: &Cell) -> String {
    match cell {
        Cell::Number(n) => serial_to_iso(*n).unwrap_or_else(|| cell.as_text().into_owned()),
        Cell::Empty => String::new(),
        Cell::Text(s) => normalize_date_str(s),
        Cell::Bool(_) => cell.as_text().into_owned(),
    }
}

pub fn normalize_date_str(input: &str) -> String {
    let t = input.trim();
    if t.is_empty() {
        return String::new();
    }
    if is_iso_date(t) {
        return t.to_string();
    }
    // 2024-03-05T00:00:00.000Z, 2024-03-05 08:30
    if let Some(head) = t.get(..10) {
        if is_iso_date(head) && matches!(t.as_bytes().get(10), Some(b'T') | Some(b' ')) {
            return head.to_string();
        }
    }
    if let Some(d) = parse_day_month_year(t) {
        return d.format(ISO_FORMAT).to_string();
    }
    t.to_string()
}

/// Parses anything `normalize_date_str` can canonicalise.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let iso = normalize_date_str(input);
    if !is_iso_date(&iso) {
        return None;
    }
    NaiveDate::parse_from_str(&iso, ISO_FORMAT).ok()
}

pub fn format_for_display(date: &str) -> String {
    let t = date.trim();
    if is_iso_date(t) {
        return format!("{}/{}/{}", &t[8..10], &t[5..7], &t[..4]);
    }
    t.replace('-', "/")
}

pub fn is_iso_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

fn serial_to_iso(n: f64) -> Option<String> {
    if !n.is_finite() || !(0.0..=MAX_SERIAL_DAY).contains(&n) {
        return None;
    }
    serial_epoch()
        .checked_add_signed(Duration::days(n.floor() as i64))
        .map(|d| d.format(ISO_FORMAT).to_string())
}

fn parse_day_month_year(t: &str) -> Option<NaiveDate> {
    let sep = t.chars().find(|c| matches!(c, '/' | '-' | '.'))?;
    let parts: Vec<&str> = t.split(sep).collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    let (d, m, y) = (parts[0], parts[1], parts[2]);
    if d.len() > 2 || m.len() > 2 {
        return None;
    }
    let year = match y.len() {
        2 => 2000 + y.parse::<i32>().ok()?,
        4 => y.parse::<i32>().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)
}

/// Last day of the calendar year containing `d`.
pub fn year_end(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), 12, 31).unwrap_or(d)
}

#[derive(Debug, Clone, Copy)]
enum Predicate {
    /// Any needle occurs as a substring of the lower-cased input.
    Contains(&'static [&'static str]),
    /// Any needle equals a whole alphanumeric token of the input.
    Token(&'static [&'static str]),
}

impl Predicate {
    fn matches(self, lower: &str) -> bool {
        match self {
            Predicate::Contains(needles) => needles.iter().any(|n| lower.contains(n)),
            Predicate::Token(needles) => lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|tok| needles.contains(&tok)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Rule<T> {
    when: Predicate,
    then: T,
}

fn first_match<T: Copy>(rules: &[Rule<T>], input: &str, default: T) -> T {
    let lower = input.trim().to_lowercase();
    if lower.is_empty() {
        return default;
    }
    rules
        .iter()
        .find(|r| r.when.matches(&lower))
        .map(|r| r.then)
        .unwrap_or(default)
}

const RANK_RULES: &[Rule<Rank>] = &[
    Rule {
        when: Predicate::Contains(&["distingu", "مميز"]),
        then: Rank::Distinguished,
    },
    Rule {
        when: Predicate::Contains(&["trainer", "formateur", "مكون"]),
        then: Rank::Trainer,
    },
    Rule {
        when: Predicate::Contains(&["second", "deuxi", "2ème", "2eme", "ثاني"]),
        then: Rank::SecondClass,
    },
    Rule {
        when: Predicate::Token(&["2"]),
        then: Rank::SecondClass,
    },
    Rule {
        when: Predicate::Contains(&["first", "premi", "1er", "1ère", "أول", "اول"]),
        then: Rank::FirstClass,
    },
    Rule {
        when: Predicate::Token(&["1"]),
        then: Rank::FirstClass,
    },
];

const DEGREE_RULES: &[Rule<Degree>] = &[
    Rule {
        when: Predicate::Contains(&["master", "ماستر", "doctor", "دكتوراه"]),
        then: Degree::Master,
    },
    Rule {
        when: Predicate::Contains(&[
            "institut",
            "école normale",
            "ecole normale",
            "معهد",
            "المدرسة العليا",
        ]),
        then: Degree::InstituteGraduate,
    },
    Rule {
        when: Predicate::Token(&["ens", "ite"]),
        then: Degree::InstituteGraduate,
    },
    Rule {
        when: Predicate::Contains(&["applied", "appliqu", "deua", "تطبيقية"]),
        then: Degree::AppliedStudies,
    },
    Rule {
        when: Predicate::Contains(&[
            "postgrad",
            "post-grad",
            "magist",
            "ماجستير",
            "دراسات عليا",
        ]),
        then: Degree::Postgraduate,
    },
];

const STATUS_RULES: &[Rule<EmploymentStatus>] = &[
    Rule {
        when: Predicate::Contains(&["contrac", "vacataire", "متعاقد", "تعاقد"]),
        then: EmploymentStatus::Contractual,
    },
    Rule {
        when: Predicate::Contains(&["probation", "stagiaire", "trainee", "متربص", "تربص"]),
        then: EmploymentStatus::Probationary,
    },
];

const LEVEL_WORD_RULES: &[Rule<Level>] = &[
    Rule {
        when: Predicate::Contains(&["first", "premi", "أولى", "اولى"]),
        then: Level::Year1,
    },
    Rule {
        when: Predicate::Contains(&["second", "deuxi", "ثانية"]),
        then: Level::Year2,
    },
    Rule {
        when: Predicate::Contains(&["third", "troisi", "ثالثة"]),
        then: Level::Year3,
    },
    Rule {
        when: Predicate::Contains(&["fourth", "quatri", "رابعة"]),
        then: Level::Year4,
    },
    Rule {
        when: Predicate::Contains(&["fifth", "cinqui", "خامسة"]),
        then: Level::Year5,
    },
    Rule {
        when: Predicate::Contains(&["sixth", "sixi", "سادسة"]),
        then: Level::Year6,
    },
];

pub fn normalize_rank(input: &str) -> Rank {
    first_match(RANK_RULES, input, Rank::Teacher)
}

pub fn normalize_degree(input: &str) -> Degree {
    first_match(DEGREE_RULES, input, Degree::Licence)
}

pub fn normalize_status(input: &str) -> EmploymentStatus {
    first_match(STATUS_RULES, input, EmploymentStatus::Permanent)
}

pub fn normalize_level(input: &str) -> Level {
    let digit = input
        .chars()
        .find(|c| c.is_ascii_digit())
        .and_then(|c| c.to_digit(10))
        .and_then(Level::from_number);
    if let Some(level) = digit {
        return level;
    }
    first_match(LEVEL_WORD_RULES, input, Level::Year1)
}

/// Canonical echelon string. `Some("")` for a blank cell, `None` when the cell
/// holds something that is not an integer in 1..=12.
pub fn normalize_echelon(cell: &Cell) -> Option<String> {
    if cell.is_blank() {
        return Some(String::new());
    }
    let n = parse_mark(cell)?;
    if n.fract() != 0.0 || !(1.0..=12.0).contains(&n) {
        return None;
    }
    Some(format!("{}", n as u8))
}

/// Numeric cell or decimal text; a comma is accepted as decimal separator.
pub fn parse_mark(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite()),
        _ => None,
    }
}

pub fn parse_count(cell: &Cell) -> Option<u32> {
    parse_mark(cell)
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32)
}

pub fn normalize_teacher_dates(t: &mut Teacher) {
    for d in [
        &mut t.birth_date,
        &mut t.degree_date,
        &mut t.recruitment_date,
        &mut t.rank_date,
        &mut t.echelon_date,
        &mut t.last_inspection_date,
    ] {
        *d = normalize_date_str(d);
    }
    t.tenure_date = t
        .tenure_date
        .as_deref()
        .map(normalize_date_str)
        .filter(|d| !d.is_empty());
}

pub fn normalize_report_dates(r: &mut ReportData) {
    r.inspection_date = normalize_date_str(&r.inspection_date);
}

pub fn normalize_tenure_dates(r: &mut TenureReport) {
    r.exam_date = normalize_date_str(&r.exam_date);
    r.lesson_date = normalize_date_str(&r.lesson_date);
}
