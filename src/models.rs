use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Member identifier. Stored data written by older clients carries it as a
/// numeric string, so deserialization accepts both forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl MemberId {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(MemberId)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for MemberId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Number(value) => Ok(MemberId(value)),
            RawId::Text(text) => MemberId::parse(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid member id: {text:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "active" | "activo" => Some(Self::Active),
            "inactive" | "inactivo" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for MemberStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown member status: {raw:?}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    #[serde(default)]
    pub document: String,
    #[serde(default)]
    pub birthdate: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub eps: String,
    #[serde(default)]
    pub rh: String,
    #[serde(default)]
    pub pathology: String,
    #[serde(default)]
    pub emergency_contact: String,
    #[serde(default)]
    pub emergency_phone: String,
    #[serde(default)]
    pub class_time: String,
    #[serde(default)]
    pub affiliation_type: String,
    #[serde(default)]
    pub status: MemberStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    pub fn is_trainer(&self) -> bool {
        self.affiliation_type == TRAINER_AFFILIATION
    }
}

pub const TRAINER_AFFILIATION: &str = "Entrenador(a)";
pub const PACKAGE_AFFILIATION: &str = "paquete 10 clases";

/// Form payload for registering or editing a member.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberForm {
    pub name: String,
    pub document: String,
    pub birthdate: String,
    pub phone: String,
    pub eps: String,
    pub rh: String,
    pub pathology: String,
    pub emergency_contact: String,
    pub emergency_phone: String,
    pub class_time: String,
    pub affiliation_type: String,
    pub status: MemberStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Presente,
    Ausente,
    Tarde,
    Permiso,
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "presente" => Some(Self::Presente),
            "ausente" => Some(Self::Ausente),
            "tarde" => Some(Self::Tarde),
            "permiso" => Some(Self::Permiso),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Presente => "presente",
            Self::Ausente => "ausente",
            Self::Tarde => "tarde",
            Self::Permiso => "permiso",
        }
    }
}

/// Stored records written by hand or by older clients may capitalise the
/// status.
impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown attendance status: {raw:?}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: MemberId,
    pub date: String,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn is_present(&self) -> bool {
        self.status == AttendanceStatus::Presente
    }

    pub fn day(&self) -> Option<NaiveDate> {
        crate::dates::parse_canonical(&self.date)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendance {
    pub user_id: MemberId,
    pub date: String,
    #[serde(default)]
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: i64,
    pub user_id: MemberId,
    #[serde(default)]
    pub payment_date: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub payment_type: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPayment {
    pub user_id: Option<MemberId>,
    pub payment_date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub payment_type: String,
    pub amount: Decimal,
    pub description: String,
}

/// Member, attendance and payment filters. The date range applies only when
/// both bounds are present.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RecordFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub member: Option<MemberId>,
}

impl RecordFilter {
    pub fn matches(&self, member: MemberId, date: &str) -> bool {
        if self.member.is_some_and(|wanted| wanted != member) {
            return false;
        }
        match (self.start, self.end) {
            (Some(start), Some(end)) => crate::dates::parse_canonical(date)
                .is_some_and(|day| day >= start && day <= end),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_id_accepts_numbers_and_strings() {
        let from_number: MemberId = serde_json::from_str("7").unwrap();
        let from_text: MemberId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(from_number, MemberId(7));
        assert_eq!(from_text, MemberId(7));
        assert!(serde_json::from_str::<MemberId>("\"abc\"").is_err());
    }

    #[test]
    fn attendance_record_reads_camel_case_fields() {
        let record: AttendanceRecord = serde_json::from_str(
            r#"{"id": 1700000000000, "userId": "3", "date": "2024-01-12", "status": "presente"}"#,
        )
        .unwrap();
        assert_eq!(record.user_id, MemberId(3));
        assert!(record.is_present());
        assert_eq!(record.day(), NaiveDate::from_ymd_opt(2024, 1, 12));
    }

    #[test]
    fn statuses_read_regardless_of_case() {
        let record: AttendanceRecord = serde_json::from_str(
            r#"{"id": 1, "userId": 3, "date": "2024-01-12", "status": "Presente"}"#,
        )
        .unwrap();
        assert!(record.is_present());
        assert!(serde_json::from_str::<AttendanceStatus>("\"vacaciones\"").is_err());

        let inactive: MemberStatus = serde_json::from_str("\"Inactivo\"").unwrap();
        assert_eq!(inactive, MemberStatus::Inactive);
        assert_eq!(serde_json::to_string(&inactive).unwrap(), "\"inactive\"");
    }

    #[test]
    fn filter_range_needs_both_bounds() {
        let only_start = RecordFilter {
            start: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..RecordFilter::default()
        };
        assert!(only_start.matches(MemberId(1), "2024-01-01"));

        let both = RecordFilter {
            start: NaiveDate::from_ymd_opt(2024, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 31),
            member: Some(MemberId(2)),
        };
        assert!(both.matches(MemberId(2), "2024-01-31"));
        assert!(!both.matches(MemberId(2), "2024-02-01"));
        assert!(!both.matches(MemberId(1), "2024-01-15"));
        assert!(!both.matches(MemberId(2), ""));
    }
}
