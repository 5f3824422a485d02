//! Membership standing derived from payment and attendance history.
//!
//! Nothing here is cached: the status is recomputed from the full
//! collections on every query.

use crate::dates::parse_canonical;
use crate::models::{AttendanceRecord, MemberId, PaymentRecord};
use chrono::{Local, NaiveDate};
use serde::Serialize;

/// Days-expired value reported when there is no usable coverage at all.
pub const NO_COVERAGE_DAYS: i64 = 999;

/// Expired members at or below this many days still get the softer badge.
pub const RECENTLY_EXPIRED_DAYS: i64 = 7;

pub const DEFAULT_EXPIRING_SOON_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    None,
    Current,
    ExpiringSoon,
    ExpiredRecently,
    ExpiredLong,
}

#[derive(Debug, Clone, Serialize)]
pub struct MembershipStatus {
    pub has_membership: bool,
    pub status: String,
    pub end_date: Option<String>,
    pub expired: bool,
    pub days_expired: i64,
    pub days_left: i64,
    pub attendance_after_expiry: usize,
    pub payment_type: String,
    pub urgency: Urgency,
}

impl MembershipStatus {
    fn without_payment() -> Self {
        Self {
            has_membership: false,
            status: "Sin pago".to_string(),
            end_date: None,
            expired: true,
            days_expired: NO_COVERAGE_DAYS,
            days_left: 0,
            attendance_after_expiry: 0,
            payment_type: "Ninguno".to_string(),
            urgency: Urgency::None,
        }
    }

    /// Members expired for longer than a week cannot be checked in. That
    /// includes members who never paid.
    pub fn is_locked(&self) -> bool {
        self.expired && self.days_expired > RECENTLY_EXPIRED_DAYS
    }
}

/// Latest payment for a member: greatest payment date, unreadable dates
/// ranking oldest, ties going to the highest record id.
pub fn latest_payment(member: MemberId, payments: &[PaymentRecord]) -> Option<&PaymentRecord> {
    payments
        .iter()
        .filter(|payment| payment.user_id == member)
        .max_by_key(|payment| (parse_canonical(&payment.payment_date), payment.id))
}

pub fn membership_status(
    member: MemberId,
    payments: &[PaymentRecord],
    attendance: &[AttendanceRecord],
) -> MembershipStatus {
    membership_status_at(
        Local::now().date_naive(),
        DEFAULT_EXPIRING_SOON_DAYS,
        member,
        payments,
        attendance,
    )
}

pub fn membership_status_at(
    today: NaiveDate,
    expiring_soon_days: i64,
    member: MemberId,
    payments: &[PaymentRecord],
    attendance: &[AttendanceRecord],
) -> MembershipStatus {
    let Some(payment) = latest_payment(member, payments) else {
        return MembershipStatus::without_payment();
    };

    let payment_type = if payment.payment_type.trim().is_empty() {
        "Sin tipo".to_string()
    } else {
        payment.payment_type.clone()
    };

    let Some(end) = parse_canonical(&payment.end_date) else {
        return MembershipStatus {
            has_membership: true,
            status: "Sin vigencia válida".to_string(),
            end_date: None,
            expired: true,
            days_expired: NO_COVERAGE_DAYS,
            days_left: 0,
            attendance_after_expiry: 0,
            payment_type,
            urgency: Urgency::ExpiredLong,
        };
    };

    let delta = (today - end).num_days();
    let days_expired = delta.max(0);
    let days_left = (-delta).max(0);

    let (status, expired, urgency) = if delta > 0 {
        let urgency = if days_expired <= RECENTLY_EXPIRED_DAYS {
            Urgency::ExpiredRecently
        } else {
            Urgency::ExpiredLong
        };
        (format!("Vencida hace {days_expired} días"), true, urgency)
    } else if delta == 0 {
        ("Vence hoy".to_string(), true, Urgency::ExpiredRecently)
    } else if days_left <= expiring_soon_days {
        (
            format!("Vence en {days_left} días"),
            false,
            Urgency::ExpiringSoon,
        )
    } else {
        ("Vigente".to_string(), false, Urgency::Current)
    };

    MembershipStatus {
        has_membership: true,
        status,
        end_date: Some(payment.end_date.clone()),
        expired,
        days_expired,
        days_left,
        attendance_after_expiry: attendance_after(member, end, attendance),
        payment_type,
        urgency,
    }
}

fn attendance_after(member: MemberId, end: NaiveDate, attendance: &[AttendanceRecord]) -> usize {
    attendance
        .iter()
        .filter(|record| record.user_id == member && record.is_present())
        .filter(|record| record.day().is_some_and(|day| day > end))
        .count()
}
