use chrono::NaiveDate;
use inspectord::eligibility::{
    evaluate, inspection_priority, next_echelon_date, promotion_due, EligibilityFlags,
    InspectionPriority, PromotionRules,
};
use inspectord::model::{ReportData, Teacher};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
}

fn promotable(echelon_date: &str) -> Teacher {
    Teacher {
        id: "t1".to_string(),
        name: "Amina".to_string(),
        echelon: "6".to_string(),
        echelon_date: echelon_date.to_string(),
        last_mark: Some(12.0),
        last_inspection_date: "2023-10-01".to_string(),
        ..Teacher::default()
    }
}

#[test]
fn promotion_counts_up_to_december_31_inclusive() {
    let now = date("2024-06-01");
    let rules = PromotionRules::default();
    // 2022-07-02 + 913 days = 2024-12-31
    let on_boundary = promotable("2022-07-02");
    assert_eq!(next_echelon_date(&on_boundary, &rules), Some(date("2024-12-31")));
    assert!(promotion_due(&on_boundary, None, now, &rules));

    let one_day_late = promotable("2022-07-03");
    assert_eq!(next_echelon_date(&one_day_late, &rules), Some(date("2025-01-01")));
    assert!(!promotion_due(&one_day_late, None, now, &rules));
}

#[test]
fn seniority_bonus_brings_the_date_forward() {
    let now = date("2024-06-01");
    let rules = PromotionRules {
        seniority_bonus_enabled: true,
        bonus_months: 6.0,
    };
    // 20 months -> 608 days; 2023-05-03 + 608 = 2024-12-31
    assert!(promotion_due(&promotable("2023-05-03"), None, now, &rules));
    assert!(!promotion_due(&promotable("2023-05-04"), None, now, &rules));
    assert!(!promotion_due(
        &promotable("2023-05-03"),
        None,
        now,
        &PromotionRules::default()
    ));
}

#[test]
fn top_echelon_is_never_promotion_due() {
    let mut t = promotable("2015-01-01");
    t.echelon = "12".to_string();
    t.last_mark = Some(1.0);
    assert!(!promotion_due(&t, None, date("2024-06-01"), &PromotionRules::default()));
    t.echelon = "11".to_string();
    assert!(promotion_due(&t, None, date("2024-06-01"), &PromotionRules::default()));
}

#[test]
fn unreadable_echelon_or_date_means_no_promotion_flag() {
    let now = date("2024-06-01");
    let mut t = promotable("");
    assert!(!promotion_due(&t, None, now, &PromotionRules::default()));
    t.echelon_date = "2020-01-01".to_string();
    t.echelon = "".to_string();
    assert!(!promotion_due(&t, None, now, &PromotionRules::default()));
}

#[test]
fn report_with_date_suppresses_priority_but_not_unmarked_promotion() {
    let mut t = promotable("2020-01-01");
    t.last_inspection_date = String::new();
    let now = date("2024-06-01");
    assert_eq!(
        evaluate(&t, None, now, &PromotionRules::default()),
        EligibilityFlags {
            priority: InspectionPriority::Urgent,
            promotion_due: true,
        }
    );

    let mut r = ReportData::empty("t1");
    r.inspection_date = "2024-05-28".to_string();
    assert_eq!(
        evaluate(&t, Some(&r), now, &PromotionRules::default()),
        EligibilityFlags {
            priority: InspectionPriority::None,
            promotion_due: true,
        }
    );

    r.final_mark = Some(13.0);
    assert!(!promotion_due(&t, Some(&r), now, &PromotionRules::default()));
}

#[test]
fn legacy_date_formats_feed_the_rules() {
    let now = date("2024-06-01");
    let mut t = promotable("2020-01-01");
    t.last_inspection_date = "15/03/2023".to_string();
    t.last_mark = Some(13.0);
    // echelon 6 threshold = 12.5
    assert_eq!(inspection_priority(&t, None, now), InspectionPriority::None);
    t.last_inspection_date = "15/03/21".to_string();
    assert_eq!(inspection_priority(&t, None, now), InspectionPriority::Urgent);
    t.last_inspection_date = "not a date".to_string();
    assert_eq!(inspection_priority(&t, None, now), InspectionPriority::Urgent);
}
