//! Workbook export/import and full-store snapshots.
//!
//! A workbook is a JSON document with one array of rows per sheet; each row
//! maps a column header to a cell value. Exports use the Spanish headers,
//! imports accept those or the internal field names.

use crate::dates::DateNormalizer;
use crate::errors::GymError;
use crate::models::{
    AttendanceRecord, AttendanceStatus, Member, MemberId, MemberStatus, PaymentRecord,
};
use crate::users::MemberLookup;
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const USERS_SHEET: &str = "Usuarios";
pub const ATTENDANCE_SHEET: &str = "Asistencias";
pub const PAYMENTS_SHEET: &str = "Pagos";

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Workbook {
    pub sheets: BTreeMap<String, Vec<Row>>,
}

impl Workbook {
    fn sheet(&self, name: &str) -> Result<&[Row], GymError> {
        self.sheets
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| GymError::MissingSheet(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    #[default]
    Merge,
    Replace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub mode: Option<ImportMode>,
    pub users: SheetSummary,
    pub attendance: SheetSummary,
    pub payments: SheetSummary,
}

/// Rows that survived parsing, before they are merged into the collections.
#[derive(Debug, Default)]
pub struct ParsedWorkbook {
    pub users: Vec<Member>,
    pub attendance: Vec<AttendanceRecord>,
    pub payments: Vec<PaymentRecord>,
    pub summary: ImportSummary,
}

/// Collections captured by a backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub users: Vec<Member>,
    pub attendance: Vec<AttendanceRecord>,
    pub income: Vec<PaymentRecord>,
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: [(&str, &str); 14] = [
    ("ID", "id"),
    ("Nombre", "name"),
    ("Documento", "document"),
    ("Fecha Nacimiento", "birthdate"),
    ("Teléfono", "phone"),
    ("EPS", "eps"),
    ("RH", "rh"),
    ("Patología", "pathology"),
    ("Contacto Emergencia", "emergencyContact"),
    ("Teléfono Emergencia", "emergencyPhone"),
    ("Clase", "classTime"),
    ("Tipo Afiliación", "affiliationType"),
    ("Estado", "status"),
    ("Fecha Registro", "createdAt"),
];

const ATTENDANCE_COLUMNS: [(&str, &str); 6] = [
    ("ID", "id"),
    ("ID Usuario", "userId"),
    ("Usuario", "userName"),
    ("Fecha", "date"),
    ("Estado", "status"),
    ("Registrado", "registeredAt"),
];

const PAYMENT_COLUMNS: [(&str, &str); 10] = [
    ("ID", "id"),
    ("ID Usuario", "userId"),
    ("Usuario", "userName"),
    ("Fecha Pago", "paymentDate"),
    ("Fecha Inicio", "startDate"),
    ("Fecha Fin", "endDate"),
    ("Tipo Pago", "paymentType"),
    ("Monto", "amount"),
    ("Descripción", "description"),
    ("Registrado", "registeredAt"),
];

pub fn export_filename(now: DateTime<Local>) -> String {
    format!("gym_backup_{}.json", now.format("%Y-%m-%d_%H-%M"))
}

pub fn export_workbook(
    users: &[Member],
    attendance: &[AttendanceRecord],
    payments: &[PaymentRecord],
    lookup: &impl MemberLookup,
) -> Workbook {
    let user_rows = users
        .iter()
        .map(|member| {
            row(
                &USER_COLUMNS,
                [
                    json!(member.id),
                    json!(member.name),
                    json!(member.document),
                    json!(member.birthdate),
                    json!(member.phone),
                    json!(member.eps),
                    json!(member.rh),
                    json!(member.pathology),
                    json!(member.emergency_contact),
                    json!(member.emergency_phone),
                    json!(member.class_time),
                    json!(member.affiliation_type),
                    json!(member.status),
                    json!(member.created_at),
                ],
            )
        })
        .collect();

    let attendance_rows = attendance
        .iter()
        .map(|record| {
            row(
                &ATTENDANCE_COLUMNS,
                [
                    json!(record.id),
                    json!(record.user_id),
                    json!(lookup.display_name(record.user_id)),
                    json!(record.date),
                    json!(record.status),
                    json!(record.registered_at),
                ],
            )
        })
        .collect();

    let payment_rows = payments
        .iter()
        .map(|record| {
            row(
                &PAYMENT_COLUMNS,
                [
                    json!(record.id),
                    json!(record.user_id),
                    json!(lookup.display_name(record.user_id)),
                    json!(record.payment_date),
                    json!(record.start_date),
                    json!(record.end_date),
                    json!(record.payment_type),
                    json!(record.amount),
                    json!(record.description),
                    json!(record.registered_at),
                ],
            )
        })
        .collect();

    let mut sheets = BTreeMap::new();
    sheets.insert(USERS_SHEET.to_string(), user_rows);
    sheets.insert(ATTENDANCE_SHEET.to_string(), attendance_rows);
    sheets.insert(PAYMENTS_SHEET.to_string(), payment_rows);
    Workbook { sheets }
}

fn row<const N: usize>(columns: &[(&str, &str); N], values: [Value; N]) -> Row {
    columns
        .iter()
        .zip(values)
        .map(|((header, _), value)| (header.to_string(), value))
        .collect()
}

/// Parses every sheet, rejecting the whole workbook up front if a sheet is
/// missing. Individual bad rows are counted and dropped.
pub fn parse_workbook(
    workbook: &Workbook,
    normalizer: &DateNormalizer,
    now: DateTime<Utc>,
) -> Result<ParsedWorkbook, GymError> {
    let user_rows = workbook.sheet(USERS_SHEET)?;
    let attendance_rows = workbook.sheet(ATTENDANCE_SHEET)?;
    let payment_rows = workbook.sheet(PAYMENTS_SHEET)?;

    let mut parsed = ParsedWorkbook::default();
    let fallback_id = now.timestamp_millis();

    for row in user_rows {
        match parse_member(row, normalizer, now) {
            Some(member) => parsed.users.push(member),
            None => parsed.summary.users.rejected += 1,
        }
    }
    for (offset, row) in attendance_rows.iter().enumerate() {
        match parse_attendance(row, normalizer, now, fallback_id + offset as i64) {
            Some(record) => parsed.attendance.push(record),
            None => parsed.summary.attendance.rejected += 1,
        }
    }
    for (offset, row) in payment_rows.iter().enumerate() {
        match parse_payment(row, normalizer, now, fallback_id + offset as i64) {
            Some(record) => parsed.payments.push(record),
            None => parsed.summary.payments.rejected += 1,
        }
    }
    Ok(parsed)
}

fn parse_member(row: &Row, normalizer: &DateNormalizer, now: DateTime<Utc>) -> Option<Member> {
    let id = member_id(cell(row, &USER_COLUMNS[0]))?;
    let status = MemberStatus::parse(&text(cell(row, &USER_COLUMNS[12]))).unwrap_or_default();
    Some(Member {
        id,
        name: text(cell(row, &USER_COLUMNS[1])),
        document: text(cell(row, &USER_COLUMNS[2])),
        birthdate: date(cell(row, &USER_COLUMNS[3]), normalizer),
        phone: text(cell(row, &USER_COLUMNS[4])),
        eps: text(cell(row, &USER_COLUMNS[5])),
        rh: text(cell(row, &USER_COLUMNS[6])),
        pathology: text(cell(row, &USER_COLUMNS[7])),
        emergency_contact: text(cell(row, &USER_COLUMNS[8])),
        emergency_phone: text(cell(row, &USER_COLUMNS[9])),
        class_time: text(cell(row, &USER_COLUMNS[10])),
        affiliation_type: text(cell(row, &USER_COLUMNS[11])),
        status,
        created_at: timestamp(cell(row, &USER_COLUMNS[13])).unwrap_or(now),
    })
}

fn parse_attendance(
    row: &Row,
    normalizer: &DateNormalizer,
    now: DateTime<Utc>,
    fallback_id: i64,
) -> Option<AttendanceRecord> {
    let user_id = member_id(cell(row, &ATTENDANCE_COLUMNS[1]))?;
    Some(AttendanceRecord {
        id: record_id(cell(row, &ATTENDANCE_COLUMNS[0])).unwrap_or(fallback_id),
        user_id,
        date: date(cell(row, &ATTENDANCE_COLUMNS[3]), normalizer),
        status: AttendanceStatus::parse(&text(cell(row, &ATTENDANCE_COLUMNS[4])))
            .unwrap_or_default(),
        registered_at: timestamp(cell(row, &ATTENDANCE_COLUMNS[5])).unwrap_or(now),
    })
}

fn parse_payment(
    row: &Row,
    normalizer: &DateNormalizer,
    now: DateTime<Utc>,
    fallback_id: i64,
) -> Option<PaymentRecord> {
    let user_id = member_id(cell(row, &PAYMENT_COLUMNS[1]))?;
    Some(PaymentRecord {
        id: record_id(cell(row, &PAYMENT_COLUMNS[0])).unwrap_or(fallback_id),
        user_id,
        payment_date: date(cell(row, &PAYMENT_COLUMNS[3]), normalizer),
        start_date: date(cell(row, &PAYMENT_COLUMNS[4]), normalizer),
        end_date: date(cell(row, &PAYMENT_COLUMNS[5]), normalizer),
        payment_type: text(cell(row, &PAYMENT_COLUMNS[6])),
        amount: amount(cell(row, &PAYMENT_COLUMNS[7])),
        description: text(cell(row, &PAYMENT_COLUMNS[8])),
        registered_at: timestamp(cell(row, &PAYMENT_COLUMNS[9])).unwrap_or(now),
    })
}

fn cell<'a>(row: &'a Row, (header, field): &(&str, &str)) -> &'a Value {
    row.get(*header)
        .or_else(|| row.get(*field))
        .unwrap_or(&Value::Null)
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if float.fract() == 0.0 && float.abs() < 1e15 => {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        },
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    }
}

fn date(value: &Value, normalizer: &DateNormalizer) -> String {
    normalizer.normalize(value)
}

fn member_id(value: &Value) -> Option<MemberId> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0 && *f > 0.0).map(|f| f as u64))
            .map(MemberId),
        Value::String(text) => MemberId::parse(text),
        _ => None,
    }
}

fn record_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Unreadable or negative amounts become zero.
fn amount(value: &Value) -> Decimal {
    let parsed = match value {
        Value::Number(number) => number
            .as_i64()
            .map(Decimal::from)
            .or_else(|| number.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(text) => Decimal::from_str(text.trim()).ok(),
        _ => None,
    };
    parsed
        .filter(|amount| !amount.is_sign_negative())
        .unwrap_or_default()
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let Value::String(text) = value else {
        return None;
    };
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Users;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn workbook(value: Value) -> Workbook {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn missing_sheet_rejects_workbook() {
        let book = workbook(json!({ "Usuarios": [], "Asistencias": [] }));
        let err = parse_workbook(&book, &DateNormalizer::default(), now()).unwrap_err();
        assert!(matches!(err, GymError::MissingSheet(sheet) if sheet == PAYMENTS_SHEET));
    }

    #[test]
    fn rows_accept_spanish_or_internal_headers() {
        let book = workbook(json!({
            "Usuarios": [
                { "ID": 1, "Nombre": "Ana", "Teléfono": 3001234567u64, "Fecha Nacimiento": 32874 },
                { "id": "2", "name": "Luis", "status": "Inactivo" },
                { "Nombre": "Sin id" }
            ],
            "Asistencias": [
                { "ID Usuario": 1, "Fecha": "15/01/2024", "Estado": "presente" },
                { "userId": 2, "date": "2024-01-14", "status": "???" },
                { "Fecha": "2024-01-14" }
            ],
            "Pagos": [
                {
                    "ID": 10,
                    "ID Usuario": 1,
                    "Fecha Pago": "2024-01-01",
                    "Fecha Fin": "2024-01-31",
                    "Monto": "80000"
                },
                { "userId": 2, "paymentDate": "nunca", "amount": "mucho" },
                { "userId": 2, "amount": -50 }
            ]
        }));

        let parsed = parse_workbook(&book, &DateNormalizer::default(), now()).unwrap();
        assert_eq!(parsed.users.len(), 2);
        assert_eq!(parsed.summary.users.rejected, 1);
        assert_eq!(parsed.users[0].phone, "3001234567");
        assert_eq!(parsed.users[0].birthdate, "1990-01-01");
        assert_eq!(parsed.users[1].status, MemberStatus::Inactive);

        assert_eq!(parsed.attendance.len(), 2);
        assert_eq!(parsed.summary.attendance.rejected, 1);
        assert_eq!(parsed.attendance[0].date, "2024-01-15");
        assert_eq!(parsed.attendance[1].status, AttendanceStatus::Presente);
        assert_ne!(parsed.attendance[0].id, parsed.attendance[1].id);

        assert_eq!(parsed.payments.len(), 3);
        assert_eq!(parsed.payments[0].amount, Decimal::new(80_000, 0));
        assert_eq!(parsed.payments[1].payment_date, "");
        assert_eq!(parsed.payments[1].amount, Decimal::ZERO);
        assert_eq!(parsed.payments[2].amount, Decimal::ZERO);
    }

    #[test]
    fn export_uses_spanish_headers_and_resolves_names() {
        let users = Users::default();
        let attendance = vec![AttendanceRecord {
            id: 5,
            user_id: MemberId(9),
            date: "2024-01-12".to_string(),
            status: AttendanceStatus::Presente,
            registered_at: now(),
        }];
        let book = export_workbook(users.all(), &attendance, &[], &users);
        assert_eq!(book.sheets.len(), 3);
        let row = &book.sheets[ATTENDANCE_SHEET][0];
        assert_eq!(row["Usuario"], json!("Usuario eliminado"));
        assert_eq!(row["Fecha"], json!("2024-01-12"));
        assert_eq!(row["ID Usuario"], json!(9));
    }

    #[test]
    fn exported_workbook_parses_back() {
        let member: Member = serde_json::from_value(json!({
            "id": 3, "name": "Carla", "phone": "3001234567", "birthdate": "1992-05-04",
            "status": "inactive", "createdAt": "2024-01-01T08:00:00Z"
        }))
        .unwrap();
        let book = export_workbook(std::slice::from_ref(&member), &[], &[], &Users::default());
        let parsed = parse_workbook(&book, &DateNormalizer::default(), now()).unwrap();
        assert_eq!(parsed.users.len(), 1);
        assert_eq!(parsed.users[0].birthdate, "1992-05-04");
        assert_eq!(parsed.users[0].status, MemberStatus::Inactive);
        assert_eq!(parsed.users[0].created_at, member.created_at);
    }

    #[test]
    fn filename_embeds_date_and_time() {
        let at = Local.with_ymd_and_hms(2024, 1, 15, 9, 5, 0).unwrap();
        assert_eq!(export_filename(at), "gym_backup_2024-01-15_09-05.json");
    }
}
