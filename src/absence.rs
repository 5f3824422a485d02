//! Consecutive-absence detection.
//!
//! A point-in-time scan: walk backward from today over a bounded window and
//! measure the longest run of days without a `presente` record.

use crate::models::{AttendanceRecord, MemberId};
use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

pub const DEFAULT_THRESHOLD_DAYS: u32 = 3;
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsencePolicy {
    pub threshold_days: u32,
    pub window_days: u32,
}

impl Default for AbsencePolicy {
    fn default() -> Self {
        Self {
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbsenceScan {
    pub longest_streak: u32,
    /// Earliest calendar day of the longest streak.
    pub streak_start: Option<NaiveDate>,
    pub last_attendance: Option<NaiveDate>,
}

impl AbsenceScan {
    pub fn is_flagged(&self, threshold_days: u32) -> bool {
        self.longest_streak >= threshold_days
    }
}

pub fn has_consecutive_absences(
    records: &[AttendanceRecord],
    member: MemberId,
    threshold_days: u32,
) -> bool {
    scan_absences_at(Local::now().date_naive(), records, member, DEFAULT_WINDOW_DAYS)
        .is_flagged(threshold_days)
}

pub fn has_consecutive_absences_at(
    today: NaiveDate,
    records: &[AttendanceRecord],
    member: MemberId,
    threshold_days: u32,
) -> bool {
    scan_absences_at(today, records, member, DEFAULT_WINDOW_DAYS).is_flagged(threshold_days)
}

pub fn scan_absences_at(
    today: NaiveDate,
    records: &[AttendanceRecord],
    member: MemberId,
    window_days: u32,
) -> AbsenceScan {
    let present: HashSet<NaiveDate> = records
        .iter()
        .filter(|record| record.user_id == member && record.is_present())
        .filter_map(AttendanceRecord::day)
        .collect();

    let mut streak = 0u32;
    let mut longest_streak = 0u32;
    let mut streak_start = None;

    for offset in 0..i64::from(window_days) {
        let day = today - Duration::days(offset);
        if present.contains(&day) {
            streak = 0;
            continue;
        }
        streak += 1;
        if streak > longest_streak {
            longest_streak = streak;
            streak_start = Some(day);
        }
    }

    AbsenceScan {
        longest_streak,
        streak_start,
        last_attendance: present.into_iter().max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    fn present_every_day_except(member: u64, skipped: &[i64]) -> Vec<AttendanceRecord> {
        (0..i64::from(DEFAULT_WINDOW_DAYS))
            .filter(|offset| !skipped.contains(offset))
            .map(|offset| AttendanceRecord {
                id: offset,
                user_id: MemberId(member),
                date: crate::dates::canonical(today() - Duration::days(offset)),
                status: AttendanceStatus::Presente,
                registered_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn always_present_is_never_flagged() {
        let records = present_every_day_except(1, &[]);
        let scan = scan_absences_at(today(), &records, MemberId(1), DEFAULT_WINDOW_DAYS);
        assert_eq!(scan.longest_streak, 0);
        assert_eq!(scan.streak_start, None);
        assert_eq!(scan.last_attendance, Some(today()));
        assert!(!has_consecutive_absences_at(today(), &records, MemberId(1), 3));
    }

    #[test]
    fn threshold_run_is_flagged() {
        let records = present_every_day_except(1, &[10, 11, 12]);
        let scan = scan_absences_at(today(), &records, MemberId(1), DEFAULT_WINDOW_DAYS);
        assert_eq!(scan.longest_streak, 3);
        assert_eq!(scan.streak_start, Some(today() - Duration::days(12)));
        assert!(has_consecutive_absences_at(today(), &records, MemberId(1), 3));
    }

    #[test]
    fn run_one_short_of_threshold_is_not_flagged() {
        let records = present_every_day_except(1, &[4, 5, 20, 21]);
        assert!(!has_consecutive_absences_at(today(), &records, MemberId(1), 3));
    }

    #[test]
    fn non_present_statuses_count_as_absence() {
        let mut records = present_every_day_except(1, &[0, 1, 2]);
        for offset in 0..3 {
            records.push(AttendanceRecord {
                id: 100 + offset,
                user_id: MemberId(1),
                date: crate::dates::canonical(today() - Duration::days(offset)),
                status: AttendanceStatus::Tarde,
                registered_at: Utc::now(),
            });
        }
        let scan = scan_absences_at(today(), &records, MemberId(1), DEFAULT_WINDOW_DAYS);
        assert_eq!(scan.longest_streak, 3);
        assert_eq!(scan.last_attendance, Some(today() - Duration::days(3)));
    }

    #[test]
    fn member_without_records_is_flagged_for_whole_window() {
        let others = present_every_day_except(2, &[]);
        let scan = scan_absences_at(today(), &others, MemberId(1), DEFAULT_WINDOW_DAYS);
        assert_eq!(scan.longest_streak, DEFAULT_WINDOW_DAYS);
        assert_eq!(scan.last_attendance, None);
        assert!(scan.is_flagged(DEFAULT_THRESHOLD_DAYS));
    }
}
