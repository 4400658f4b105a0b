//! Advisory flags derived from a teacher, the report being edited for them,
//! and a reference date. Nothing here is persisted.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{EmploymentStatus, ReportData, Teacher};
use crate::normalize::{parse_date, year_end};

/// Days per year used for the inspection interval.
pub const DAYS_PER_YEAR: f64 = 365.25;
/// Days per month used for seniority accrual.
pub const DAYS_PER_MONTH: f64 = 30.44;
/// Years without a visit after which a teacher is overdue.
pub const OVERDUE_AFTER_YEARS: f64 = 3.0;
/// Seniority needed to move up one echelon, without regional bonus.
pub const BASE_REQUIRED_MONTHS: f64 = 30.0;
pub const TOP_ECHELON: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectionPriority {
    None,
    Medium,
    Urgent,
}

/// Regional seniority bonus: `bonus_months` extra months of seniority credited
/// per calendar year when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromotionRules {
    pub seniority_bonus_enabled: bool,
    pub bonus_months: f64,
}

impl PromotionRules {
    pub fn required_months(&self) -> f64 {
        if self.seniority_bonus_enabled && self.bonus_months > 0.0 {
            BASE_REQUIRED_MONTHS / ((12.0 + self.bonus_months) / 12.0)
        } else {
            BASE_REQUIRED_MONTHS
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityFlags {
    pub priority: InspectionPriority,
    pub promotion_due: bool,
}

/// Minimum "average" mark for an echelon: below it the teacher needs a visit.
pub fn average_mark_threshold(echelon: u8) -> f64 {
    9.5 + 0.5 * f64::from(echelon)
}

/// Mark ceiling for an echelon: at or above it a promotion visit is pointless.
pub fn mark_ceiling(echelon: u8) -> f64 {
    13.0 + 0.5 * f64::from(echelon)
}

pub fn inspection_priority(
    teacher: &Teacher,
    active_report: Option<&ReportData>,
    now: NaiveDate,
) -> InspectionPriority {
    if active_report.is_some_and(ReportData::has_inspection_date) {
        return InspectionPriority::None;
    }

    let Some(last) = parse_date(&teacher.last_inspection_date) else {
        return InspectionPriority::Urgent;
    };
    let elapsed_days = (now - last).num_days() as f64;
    if elapsed_days >= OVERDUE_AFTER_YEARS * DAYS_PER_YEAR {
        return InspectionPriority::Urgent;
    }

    let echelon = teacher.echelon_number().unwrap_or(0);
    if teacher.last_mark.unwrap_or(0.0) < average_mark_threshold(echelon) {
        return InspectionPriority::Medium;
    }
    InspectionPriority::None
}

/// Date from which the next echelon is reached, or `None` when the effective
/// date cannot be read.
pub fn next_echelon_date(teacher: &Teacher, rules: &PromotionRules) -> Option<NaiveDate> {
    let effective = parse_date(&teacher.echelon_date)?;
    let days = (rules.required_months() * DAYS_PER_MONTH).floor() as i64;
    effective.checked_add_signed(Duration::days(days))
}

pub fn promotion_due(
    teacher: &Teacher,
    active_report: Option<&ReportData>,
    now: NaiveDate,
    rules: &PromotionRules,
) -> bool {
    if teacher.status != EmploymentStatus::Permanent {
        return false;
    }
    let Some(echelon) = teacher.echelon_number() else {
        return false;
    };
    if echelon >= TOP_ECHELON {
        return false;
    }
    let Some(reached) = next_echelon_date(teacher, rules) else {
        return false;
    };
    if reached > year_end(now) {
        return false;
    }
    if teacher.last_mark.unwrap_or(0.0) >= mark_ceiling(echelon) {
        return false;
    }
    let visited = active_report
        .is_some_and(|r| r.has_inspection_date() && r.final_mark.is_some_and(|m| m > 0.0));
    !visited
}

pub fn evaluate(
    teacher: &Teacher,
    active_report: Option<&ReportData>,
    now: NaiveDate,
    rules: &PromotionRules,
) -> EligibilityFlags {
    EligibilityFlags {
        priority: inspection_priority(teacher, active_report, now),
        promotion_due: promotion_due(teacher, active_report, now, rules),
    }
}
