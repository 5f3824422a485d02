use crate::absence::AbsenceScan;
use crate::dates::{canonical, parse_canonical};
use crate::gym::Gym;
use crate::membership::{MembershipStatus, latest_payment};
use crate::models::{MemberId, PACKAGE_AFFILIATION};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::BTreeMap;

pub const CLASS_SLOTS: [&str; 8] = [
    "5:00 am", "6:00 am", "7:00 am", "8:00 am", "4:00 pm", "5:30 pm", "6:30 pm", "7:30 pm",
];

/// Attendance-rate denominator: expected visits per active member.
const EXPECTED_MONTHLY_VISITS: usize = 20;

const UNSPECIFIED_AFFILIATION: &str = "Sin especificar";
const UNTYPED_PAYMENT: &str = "Sin tipo";

#[derive(Debug, Serialize)]
pub struct Summary {
    pub active_members: usize,
    pub monthly_income: Decimal,
    pub attendance_rate: u32,
    pub package_members: usize,
    pub total_members: usize,
    pub attendance_records: usize,
    pub payment_records: usize,
    pub last_backup: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AffiliationCount {
    pub affiliation: String,
    pub members: usize,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ClassSlotCount {
    pub class_time: &'static str,
    pub attendance: usize,
}

#[derive(Debug, Serialize)]
pub struct MemberAttendance {
    pub id: MemberId,
    pub name: String,
    pub attendance_count: usize,
    pub last_attendance: Option<String>,
    pub percentage: u32,
}

#[derive(Debug, Serialize)]
pub struct MonthlyAttendance {
    pub month: String,
    pub business_days: u32,
    pub members: Vec<MemberAttendance>,
}

#[derive(Debug, Serialize)]
pub struct IncomeByType {
    pub payment_type: String,
    pub count: usize,
    pub amount: Decimal,
    pub percentage: u32,
}

#[derive(Debug, Serialize)]
pub struct MonthlyIncome {
    pub month: String,
    pub payments: usize,
    pub total: Decimal,
    pub types: Vec<IncomeByType>,
}

#[derive(Debug, Serialize)]
pub struct CombinedRow {
    pub id: MemberId,
    pub name: String,
    pub phone: String,
    pub attendance_count: usize,
    pub payment_type: Option<String>,
    pub amount: Option<Decimal>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AbsenceAlert {
    pub id: MemberId,
    pub name: String,
    pub phone: String,
    #[serde(flatten)]
    pub scan: AbsenceScan,
    pub membership: MembershipStatus,
}

#[derive(Debug, Serialize)]
pub struct RosterEntry {
    pub id: MemberId,
    pub name: String,
    pub class_time: String,
    pub present: bool,
    pub locked: bool,
    pub membership: MembershipStatus,
}

#[derive(Debug, Serialize)]
pub struct Roster {
    pub date: String,
    pub present: usize,
    pub pending: usize,
    pub members: Vec<RosterEntry>,
}

/// Calendar month given as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl Month {
    pub fn parse(raw: &str) -> Option<Self> {
        let first = NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").ok()?;
        Some(Self::starting(first))
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self::starting(date.with_day(1).unwrap_or(date))
    }

    fn starting(first: NaiveDate) -> Self {
        let next = first
            .checked_add_months(chrono::Months::new(1))
            .unwrap_or(first);
        Self {
            first,
            last: next - Duration::days(1),
        }
    }

    pub fn label(&self) -> String {
        self.first.format("%Y-%m").to_string()
    }

    pub fn contains(&self, date: &str) -> bool {
        parse_canonical(date).is_some_and(|day| day >= self.first && day <= self.last)
    }

    /// Days in the month that are not Sundays.
    pub fn business_days(&self) -> u32 {
        self.first
            .iter_days()
            .take_while(|day| *day <= self.last)
            .filter(|day| day.weekday() != Weekday::Sun)
            .count() as u32
    }
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round() as u32
}

fn percent_of(part: Decimal, whole: Decimal) -> u32 {
    if whole.is_zero() {
        return 0;
    }
    (part * Decimal::ONE_HUNDRED / whole)
        .round()
        .to_u32()
        .unwrap_or_default()
}

pub fn build_summary(gym: &Gym) -> Summary {
    build_summary_at(Local::now().date_naive(), gym)
}

pub fn build_summary_at(today: NaiveDate, gym: &Gym) -> Summary {
    let month = Month::containing(today);
    let active_members = gym.users().active().count();
    let monthly_income = gym
        .income()
        .all()
        .iter()
        .filter(|payment| month.contains(&payment.payment_date))
        .map(|payment| payment.amount)
        .sum();
    let present = gym
        .attendance()
        .all()
        .iter()
        .filter(|record| record.is_present())
        .count();

    Summary {
        active_members,
        monthly_income,
        attendance_rate: percent(present, active_members * EXPECTED_MONTHLY_VISITS),
        package_members: gym
            .users()
            .active()
            .filter(|member| member.affiliation_type == PACKAGE_AFFILIATION)
            .count(),
        total_members: gym.users().all().len(),
        attendance_records: gym.attendance().all().len(),
        payment_records: gym.income().all().len(),
        last_backup: gym.last_backup(),
    }
}

pub fn affiliation_distribution(gym: &Gym) -> Vec<AffiliationCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for member in gym.users().active() {
        let affiliation = match member.affiliation_type.trim() {
            "" => UNSPECIFIED_AFFILIATION,
            other => other,
        };
        *counts.entry(affiliation.to_string()).or_default() += 1;
    }
    let mut distribution: Vec<AffiliationCount> = counts
        .into_iter()
        .map(|(affiliation, members)| AffiliationCount {
            affiliation,
            members,
        })
        .collect();
    distribution.sort_by(|a, b| b.members.cmp(&a.members));
    distribution
}

/// `presente` records of active members, bucketed by the member's class slot.
pub fn class_attendance(gym: &Gym) -> Vec<ClassSlotCount> {
    CLASS_SLOTS
        .iter()
        .map(|&slot| ClassSlotCount {
            class_time: slot,
            attendance: gym
                .attendance()
                .all()
                .iter()
                .filter(|record| record.is_present())
                .filter(|record| {
                    gym.users()
                        .get(record.user_id)
                        .is_some_and(|member| member.is_active() && member.class_time == slot)
                })
                .count(),
        })
        .collect()
}

pub fn monthly_attendance(gym: &Gym, month: Month) -> MonthlyAttendance {
    let business_days = month.business_days();
    let mut members: Vec<MemberAttendance> = gym
        .users()
        .active_trainees()
        .map(|member| {
            let visits = gym.attendance().for_member(member.id);
            let attendance_count = visits
                .iter()
                .filter(|record| record.is_present() && month.contains(&record.date))
                .count();
            let last_attendance = visits
                .iter()
                .filter(|record| record.is_present())
                .filter_map(|record| record.day())
                .max()
                .map(canonical);
            MemberAttendance {
                id: member.id,
                name: member.name.clone(),
                attendance_count,
                last_attendance,
                percentage: percent(attendance_count, business_days as usize),
            }
        })
        .collect();
    members.sort_by(|a, b| b.attendance_count.cmp(&a.attendance_count));

    MonthlyAttendance {
        month: month.label(),
        business_days,
        members,
    }
}

pub fn monthly_income(gym: &Gym, month: Month) -> MonthlyIncome {
    let mut by_type: BTreeMap<String, (usize, Decimal)> = BTreeMap::new();
    let mut payments = 0;
    let mut total = Decimal::ZERO;
    for payment in gym.income().all() {
        if !month.contains(&payment.payment_date) {
            continue;
        }
        let payment_type = match payment.payment_type.trim() {
            "" => UNTYPED_PAYMENT,
            other => other,
        };
        let entry = by_type.entry(payment_type.to_string()).or_default();
        entry.0 += 1;
        entry.1 += payment.amount;
        payments += 1;
        total += payment.amount;
    }

    let mut types: Vec<IncomeByType> = by_type
        .into_iter()
        .map(|(payment_type, (count, amount))| IncomeByType {
            payment_type,
            count,
            amount,
            percentage: percent_of(amount, total),
        })
        .collect();
    types.sort_by(|a, b| b.amount.cmp(&a.amount));

    MonthlyIncome {
        month: month.label(),
        payments,
        total,
        types,
    }
}

/// Attendance inside `[start, end]` alongside each member's latest payment.
pub fn combined_report(
    gym: &Gym,
    start: NaiveDate,
    end: NaiveDate,
    member: Option<MemberId>,
) -> Vec<CombinedRow> {
    gym.users()
        .active_trainees()
        .filter(|candidate| member.is_none_or(|wanted| wanted == candidate.id))
        .map(|candidate| {
            let attendance_count = gym
                .attendance()
                .for_member(candidate.id)
                .iter()
                .filter(|record| record.is_present())
                .filter(|record| record.day().is_some_and(|day| day >= start && day <= end))
                .count();
            let payment = latest_payment(candidate.id, gym.income().all());
            let payment_type = payment.and_then(|payment| {
                [&payment.payment_type, &candidate.affiliation_type]
                    .into_iter()
                    .find(|kind| !kind.trim().is_empty())
                    .cloned()
            });
            let non_empty = |text: &str| (!text.is_empty()).then(|| text.to_string());
            CombinedRow {
                id: candidate.id,
                name: candidate.name.clone(),
                phone: candidate.phone.clone(),
                attendance_count,
                payment_type,
                amount: payment.map(|payment| payment.amount),
                valid_from: payment.and_then(|payment| non_empty(&payment.start_date)),
                valid_until: payment.and_then(|payment| non_empty(&payment.end_date)),
            }
        })
        .collect()
}

pub fn absence_alerts(gym: &Gym) -> Vec<AbsenceAlert> {
    absence_alerts_at(Local::now().date_naive(), gym)
}

/// Active non-trainer members whose longest absence streak reaches the
/// configured threshold, longest streak first.
pub fn absence_alerts_at(today: NaiveDate, gym: &Gym) -> Vec<AbsenceAlert> {
    let threshold = gym.settings().absence.threshold_days;
    let mut alerts: Vec<AbsenceAlert> = gym
        .users()
        .active_trainees()
        .filter_map(|member| {
            let scan = gym.absence_scan_at(today, member.id);
            scan.is_flagged(threshold).then(|| AbsenceAlert {
                id: member.id,
                name: member.name.clone(),
                phone: member.phone.clone(),
                scan,
                membership: gym.status_at(today, member.id),
            })
        })
        .collect();
    alerts.sort_by(|a, b| b.scan.longest_streak.cmp(&a.scan.longest_streak));
    alerts
}

/// Check-in sheet of active non-trainer members for `date`, sorted by name.
/// Membership standing is evaluated on `today`.
pub fn roster_at(today: NaiveDate, gym: &Gym, date: NaiveDate) -> Roster {
    let day = canonical(date);
    let mut trainees: Vec<_> = gym.users().active_trainees().collect();
    trainees.sort_by_key(|member| member.name.to_lowercase());
    let members: Vec<RosterEntry> = trainees
        .into_iter()
        .map(|member| {
            let membership = gym.status_at(today, member.id);
            RosterEntry {
                id: member.id,
                name: member.name.clone(),
                class_time: member.class_time.clone(),
                present: gym.attendance().is_present_on(member.id, &day),
                locked: membership.is_locked(),
                membership,
            }
        })
        .collect();
    let present = members.iter().filter(|entry| entry.present).count();

    Roster {
        date: day,
        present,
        pending: members.len() - present,
        members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gym::GymSettings;
    use crate::models::{
        AttendanceStatus, MemberForm, NewAttendance, NewPayment, TRAINER_AFFILIATION,
    };
    use crate::storage::RecordStore;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        ymd(2024, 1, 20)
    }

    fn member(gym: &mut Gym, name: &str, class_time: &str, affiliation: &str) -> MemberId {
        let form = MemberForm {
            name: name.to_string(),
            phone: "3001234567".to_string(),
            emergency_phone: "3007654321".to_string(),
            class_time: class_time.to_string(),
            affiliation_type: affiliation.to_string(),
            ..MemberForm::default()
        };
        gym.register_member(form, now()).unwrap().id
    }

    fn pay(gym: &mut Gym, member: MemberId, paid: &str, end: &str, kind: &str, amount: i64) {
        let payment = NewPayment {
            user_id: Some(member),
            payment_date: Some(paid.to_string()),
            start_date: Some(paid.to_string()),
            end_date: Some(end.to_string()),
            payment_type: kind.to_string(),
            amount: Decimal::new(amount, 0),
            ..NewPayment::default()
        };
        gym.add_payment(payment, today(), now()).unwrap();
    }

    /// Ana attends every day, Luis only on the 20th, Sofia (a trainer) never.
    fn sample() -> (Gym, MemberId, MemberId, MemberId) {
        let mut gym = Gym::load(RecordStore::new(), GymSettings::default());
        let ana = member(&mut gym, "Ana", "6:00 am", "Mensual");
        let luis = member(&mut gym, "Luis", "6:00 am", PACKAGE_AFFILIATION);
        let sofia = member(&mut gym, "Sofia", "5:30 pm", TRAINER_AFFILIATION);
        for day in 1..=20 {
            let date = canonical(ymd(2024, 1, day));
            let present: Vec<MemberId> = if day == 20 { vec![ana, luis] } else { vec![ana] };
            for user_id in present {
                let entry = NewAttendance {
                    user_id,
                    date: date.clone(),
                    status: AttendanceStatus::Presente,
                };
                gym.add_attendance(entry, now()).unwrap();
            }
        }
        pay(&mut gym, ana, "2024-01-02", "2024-02-01", "Mensual", 80_000);
        pay(&mut gym, luis, "2024-01-05", "2024-01-10", "", 20_000);
        pay(&mut gym, luis, "2023-12-05", "2024-01-04", "Mensual", 70_000);
        (gym, ana, luis, sofia)
    }

    #[test]
    fn month_bounds_and_business_days() {
        let february = Month::parse("2024-02").unwrap();
        assert_eq!(february.last, ymd(2024, 2, 29));
        assert_eq!(february.business_days(), 25);
        assert_eq!(Month::containing(ymd(2024, 1, 20)).label(), "2024-01");
        assert!(Month::parse("enero").is_none());
    }

    #[test]
    fn summary_counts_this_month() {
        let (gym, ..) = sample();
        let summary = build_summary_at(today(), &gym);
        assert_eq!(summary.active_members, 3);
        assert_eq!(summary.monthly_income, Decimal::new(100_000, 0));
        // 21 visits over 3 members * 20 expected visits.
        assert_eq!(summary.attendance_rate, 35);
        assert_eq!(summary.package_members, 1);
        assert_eq!(summary.payment_records, 3);
    }

    #[test]
    fn distribution_and_class_slots() {
        let (mut gym, ..) = sample();
        member(&mut gym, "Eva", "", "");
        let distribution = affiliation_distribution(&gym);
        assert_eq!(distribution.len(), 4);
        assert!(distribution.contains(&AffiliationCount {
            affiliation: UNSPECIFIED_AFFILIATION.to_string(),
            members: 1,
        }));

        let slots = class_attendance(&gym);
        assert_eq!(slots.len(), CLASS_SLOTS.len());
        assert_eq!(slots[1], ClassSlotCount { class_time: "6:00 am", attendance: 21 });
        assert_eq!(slots[5].attendance, 0);
    }

    #[test]
    fn monthly_attendance_excludes_trainers_and_sorts() {
        let (gym, ana, luis, _) = sample();
        let report = monthly_attendance(&gym, Month::parse("2024-01").unwrap());
        assert_eq!(report.business_days, 27);
        assert_eq!(report.members.len(), 2);
        assert_eq!(report.members[0].id, ana);
        assert_eq!(report.members[0].attendance_count, 20);
        assert_eq!(report.members[0].percentage, 74);
        assert_eq!(report.members[1].id, luis);
        assert_eq!(report.members[1].last_attendance.as_deref(), Some("2024-01-20"));
    }

    #[test]
    fn monthly_income_groups_by_type() {
        let (gym, ..) = sample();
        let report = monthly_income(&gym, Month::parse("2024-01").unwrap());
        assert_eq!(report.payments, 2);
        assert_eq!(report.total, Decimal::new(100_000, 0));
        assert_eq!(report.types[0].payment_type, "Mensual");
        assert_eq!(report.types[0].percentage, 80);
        assert_eq!(report.types[1].payment_type, UNTYPED_PAYMENT);
        assert_eq!(report.types[1].percentage, 20);
    }

    #[test]
    fn combined_report_uses_latest_payment() {
        let (gym, _, luis, _) = sample();
        let rows = combined_report(&gym, ymd(2024, 1, 15), ymd(2024, 1, 20), Some(luis));
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.attendance_count, 1);
        assert_eq!(row.payment_type.as_deref(), Some(PACKAGE_AFFILIATION));
        assert_eq!(row.amount, Some(Decimal::new(20_000, 0)));
        assert_eq!(row.valid_until.as_deref(), Some("2024-01-10"));
    }

    #[test]
    fn absence_alerts_skip_trainers() {
        let (gym, ana, luis, _) = sample();
        let alerts = absence_alerts_at(today(), &gym);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].id, luis);
        assert_eq!(alerts[0].scan.longest_streak, 29);
        assert!(alerts[0].membership.expired);
        // Nothing recorded before January: the tail of the window counts.
        assert_eq!(alerts[1].id, ana);
        assert_eq!(alerts[1].scan.longest_streak, 10);
        assert_eq!(alerts[1].scan.streak_start, Some(ymd(2023, 12, 22)));
    }

    #[test]
    fn roster_lists_trainees_by_name_with_presence_and_locks() {
        let (mut gym, ana, luis, sofia) = sample();
        member(&mut gym, "beto", "6:00 am", "Mensual");
        let roster = roster_at(ymd(2024, 1, 25), &gym, ymd(2024, 1, 20));
        assert_eq!(roster.present, 2);
        assert_eq!(roster.pending, 1);
        let names: Vec<&str> = roster.members.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "beto", "Luis"]);
        assert!(roster.members.iter().all(|entry| entry.id != sofia));
        let luis_entry = roster.members.iter().find(|entry| entry.id == luis).unwrap();
        assert!(luis_entry.locked);
        let ana_entry = roster.members.iter().find(|entry| entry.id == ana).unwrap();
        assert!(!ana_entry.locked);
    }
}
