use crate::dates::DateNormalizer;
use crate::errors::GymError;
use crate::models::{AttendanceRecord, AttendanceStatus, MemberId, NewAttendance, RecordFilter};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DaySaveOutcome {
    pub date: String,
    pub saved: usize,
    /// Checked members that were not stored because their membership is
    /// locked.
    pub skipped: Vec<MemberId>,
}

#[derive(Debug, Clone, Default)]
pub struct Attendance {
    records: Vec<AttendanceRecord>,
    normalizer: DateNormalizer,
}

impl Attendance {
    pub fn new(records: Vec<AttendanceRecord>) -> Self {
        Self {
            records,
            normalizer: DateNormalizer::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: DateNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn all(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn contains(&self, id: i64) -> bool {
        self.records.iter().any(|record| record.id == id)
    }

    /// Ids come from the creation time plus an offset inside one save, bumped
    /// past any id already taken.
    fn next_id(&self, now: DateTime<Utc>, offset: usize) -> i64 {
        let mut id = now.timestamp_millis() + offset as i64;
        while self.contains(id) {
            id += 1;
        }
        id
    }

    pub fn add(
        &mut self,
        entry: NewAttendance,
        now: DateTime<Utc>,
    ) -> Result<&AttendanceRecord, GymError> {
        let date = self
            .normalizer
            .read_field(&entry.date, "fecha")?
            .ok_or(GymError::MissingField("fecha"))?;
        let record = AttendanceRecord {
            id: self.next_id(now, 0),
            user_id: entry.user_id,
            date,
            status: entry.status,
            registered_at: now,
        };
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Replaces a whole day: every record on `date` is dropped, then one
    /// `presente` record is stored per checked member unless `is_locked`
    /// says otherwise.
    pub fn record_day(
        &mut self,
        date: &str,
        present: &[MemberId],
        now: DateTime<Utc>,
        is_locked: impl Fn(MemberId) -> bool,
    ) -> DaySaveOutcome {
        self.records.retain(|record| record.date != date);

        let mut saved = 0;
        let mut skipped = Vec::new();
        for &member in present {
            if is_locked(member) {
                skipped.push(member);
                continue;
            }
            let record = AttendanceRecord {
                id: self.next_id(now, saved),
                user_id: member,
                date: date.to_string(),
                status: AttendanceStatus::Presente,
                registered_at: now,
            };
            self.records.push(record);
            saved += 1;
        }

        DaySaveOutcome {
            date: date.to_string(),
            saved,
            skipped,
        }
    }

    pub fn is_present_on(&self, member: MemberId, date: &str) -> bool {
        self.records
            .iter()
            .any(|record| record.user_id == member && record.date == date && record.is_present())
    }

    pub fn for_member(&self, member: MemberId) -> Vec<&AttendanceRecord> {
        self.records
            .iter()
            .filter(|record| record.user_id == member)
            .collect()
    }

    pub fn filter(&self, filter: &RecordFilter) -> Vec<&AttendanceRecord> {
        self.records
            .iter()
            .filter(|record| filter.matches(record.user_id, &record.date))
            .collect()
    }

    pub fn remove(&mut self, id: i64) -> Result<AttendanceRecord, GymError> {
        let index = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or(GymError::RecordNotFound {
                kind: "asistencia",
                id,
            })?;
        Ok(self.records.remove(index))
    }

    /// Adds an imported record; false when its id is already present.
    pub fn insert(&mut self, record: AttendanceRecord) -> bool {
        if self.contains(record.id) {
            return false;
        }
        self.records.push(record);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DayMonthOrder;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap()
    }

    #[test]
    fn record_day_replaces_previous_records_for_that_date() {
        let mut attendance = Attendance::default();
        attendance.record_day("2024-01-15", &[MemberId(1), MemberId(2)], now(), |_| false);
        let outcome =
            attendance.record_day("2024-01-15", &[MemberId(2), MemberId(3)], now(), |id| {
                id == MemberId(3)
            });

        assert_eq!(outcome.saved, 1);
        assert_eq!(outcome.skipped, vec![MemberId(3)]);
        assert_eq!(attendance.all().len(), 1);
        assert!(attendance.is_present_on(MemberId(2), "2024-01-15"));
        assert!(!attendance.is_present_on(MemberId(1), "2024-01-15"));
    }

    #[test]
    fn ids_in_one_batch_do_not_collide() {
        let mut attendance = Attendance::default();
        attendance.record_day("2024-01-15", &[MemberId(1), MemberId(2)], now(), |_| false);
        attendance.record_day("2024-01-16", &[MemberId(1)], now(), |_| false);
        let mut ids: Vec<i64> = attendance.all().iter().map(|record| record.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], now().timestamp_millis());
    }

    #[test]
    fn add_normalizes_the_date() {
        let mut attendance = Attendance::default();
        let record = attendance
            .add(
                NewAttendance {
                    user_id: MemberId(1),
                    date: "15/01/2024".to_string(),
                    status: AttendanceStatus::Tarde,
                },
                now(),
            )
            .unwrap();
        assert_eq!(record.date, "2024-01-15");

        let err = attendance.add(
            NewAttendance {
                user_id: MemberId(1),
                date: "ayer".to_string(),
                status: AttendanceStatus::Presente,
            },
            now(),
        );
        assert!(matches!(err, Err(GymError::InvalidDate("fecha"))));

        let blank = attendance.add(
            NewAttendance {
                user_id: MemberId(1),
                date: String::new(),
                status: AttendanceStatus::Presente,
            },
            now(),
        );
        assert!(matches!(blank, Err(GymError::MissingField("fecha"))));
        assert_eq!(attendance.all().len(), 1);
    }

    #[test]
    fn day_first_order_reads_ambiguous_dates() {
        let mut attendance =
            Attendance::default().with_normalizer(DateNormalizer::new(DayMonthOrder::DayFirst));
        let record = attendance
            .add(
                NewAttendance {
                    user_id: MemberId(1),
                    date: "05/03/2024".to_string(),
                    status: AttendanceStatus::Presente,
                },
                now(),
            )
            .unwrap();
        assert_eq!(record.date, "2024-03-05");
    }

    #[test]
    fn filter_and_remove() {
        let mut attendance = Attendance::default();
        attendance.record_day("2024-01-10", &[MemberId(1), MemberId(2)], now(), |_| false);
        attendance.record_day("2024-01-20", &[MemberId(1)], now(), |_| false);

        let january_first_half = RecordFilter {
            start: NaiveDate::from_ymd_opt(2024, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 15),
            member: Some(MemberId(1)),
        };
        assert_eq!(attendance.filter(&january_first_half).len(), 1);
        assert_eq!(attendance.for_member(MemberId(1)).len(), 2);

        let id = attendance.all()[0].id;
        attendance.remove(id).unwrap();
        assert!(attendance.remove(id).is_err());
        assert_eq!(attendance.all().len(), 2);
    }
}
