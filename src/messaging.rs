use crate::dates::parse_canonical;
use crate::errors::GymError;
use crate::membership::MembershipStatus;
use crate::models::{Member, PaymentRecord};
use crate::users::{clean_phone, is_valid_phone};
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;

pub const DEFAULT_COUNTRY_CODE: &str = "57";
pub const DEFAULT_GYM_NAME: &str = "Antología Box23";

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

#[derive(Debug, Clone, Serialize)]
pub struct WhatsAppMessage {
    pub phone: String,
    pub message: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Messenger {
    pub country_code: String,
    pub gym_name: String,
}

impl Messenger {
    pub fn new(country_code: impl Into<String>, gym_name: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            gym_name: gym_name.into(),
        }
    }

    pub fn link(&self, phone: &str, message: &str) -> Result<WhatsAppMessage, GymError> {
        if !is_valid_phone(phone) {
            return Err(GymError::InvalidPhone("teléfono del usuario"));
        }
        let digits = clean_phone(phone);
        let url = format!(
            "https://wa.me/{}{}?text={}",
            self.country_code,
            digits,
            urlencoding::encode(message)
        );
        Ok(WhatsAppMessage {
            phone: digits,
            message: message.to_string(),
            url,
        })
    }

    pub fn payment_reminder(
        &self,
        member: &Member,
        status: &MembershipStatus,
    ) -> Result<WhatsAppMessage, GymError> {
        let message = format!(
            "Hola {}, tu membresía en {} venció hace {} días. \
             Por favor, renueva tu pago para continuar asistiendo a las clases. ¡Te esperamos!",
            member.name, self.gym_name, status.days_expired
        );
        self.link(&member.phone, &message)
    }

    pub fn absence_reminder(
        &self,
        member: &Member,
        status: &MembershipStatus,
    ) -> Result<WhatsAppMessage, GymError> {
        let mut message = format!("Hola {}, te extrañamos en {}. ", member.name, self.gym_name);
        if status.expired {
            message.push_str(&format!(
                "Notamos que tu membresía venció hace {} días y que no has asistido \
                 últimamente. ¿Necesitas renovar tu pago o hay algún motivo por el que \
                 no has podido asistir? ",
                status.days_expired
            ));
        } else {
            let class_time = if member.class_time.is_empty() {
                "tu clase habitual"
            } else {
                member.class_time.as_str()
            };
            message.push_str(&format!(
                "Notamos que no has asistido a clases recientemente. \
                 ¿Todo está bien? Esperamos verte pronto en {class_time}. "
            ));
        }
        message.push_str("¡Tu salud y bienestar son importantes para nosotros!");
        self.link(&member.phone, &message)
    }

    pub fn payment_confirmation(
        &self,
        member: &Member,
        payment: &PaymentRecord,
    ) -> Result<WhatsAppMessage, GymError> {
        let message = format!(
            "Hola {}, tu pago en {} por un valor de ${} por {} ha sido registrado exitosamente. \
             Tu membresía es válida hasta el {}. ¡Gracias por confiar en {}!",
            member.name,
            self.gym_name,
            format_amount(payment.amount),
            payment.payment_type,
            long_date(&payment.end_date),
            self.gym_name
        );
        self.link(&member.phone, &message)
    }
}

/// Whole pesos with `.` as thousands separator.
pub fn format_amount(amount: Decimal) -> String {
    let whole = amount.trunc().abs().to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    if amount.is_sign_negative() && !amount.trunc().is_zero() {
        grouped.insert(0, '-');
    }
    grouped
}

/// `2024-02-14` → `14 de febrero de 2024`.
pub fn long_date(date: &str) -> String {
    let Some(day) = parse_canonical(date) else {
        return date.to_string();
    };
    let month = MONTHS[day.month0() as usize];
    format!("{:02} de {} de {}", day.day(), month, day.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::Urgency;
    use crate::models::{MemberId, MemberStatus};
    use chrono::Utc;

    fn member(phone: &str) -> Member {
        Member {
            id: MemberId(1),
            name: "Ana".to_string(),
            document: String::new(),
            birthdate: String::new(),
            phone: phone.to_string(),
            eps: String::new(),
            rh: String::new(),
            pathology: String::new(),
            emergency_contact: String::new(),
            emergency_phone: String::new(),
            class_time: "6:00 am".to_string(),
            affiliation_type: String::new(),
            status: MemberStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn expired(days: i64) -> MembershipStatus {
        MembershipStatus {
            has_membership: true,
            status: format!("Vencida hace {days} días"),
            end_date: Some("2024-01-10".to_string()),
            expired: true,
            days_expired: days,
            days_left: 0,
            attendance_after_expiry: 0,
            payment_type: "Mensual".to_string(),
            urgency: Urgency::ExpiredRecently,
        }
    }

    #[test]
    fn link_uses_country_code_and_encodes_text() {
        let messenger = Messenger::new("57", "Box");
        let link = messenger.link("300-123-4567", "Hola Ana & co").unwrap();
        assert_eq!(link.phone, "3001234567");
        assert_eq!(link.url, "https://wa.me/573001234567?text=Hola%20Ana%20%26%20co");
    }

    #[test]
    fn link_rejects_invalid_phone() {
        let messenger = Messenger::new("57", "Box");
        assert!(messenger.link("12345", "hola").is_err());
    }

    #[test]
    fn reminders_mention_days_expired() {
        let messenger = Messenger::new(DEFAULT_COUNTRY_CODE, "Box23");
        let payment = messenger.payment_reminder(&member("3001234567"), &expired(5)).unwrap();
        assert!(payment.message.contains("venció hace 5 días"));

        let absence = messenger.absence_reminder(&member("3001234567"), &expired(5)).unwrap();
        assert!(absence.message.starts_with("Hola Ana, te extrañamos en Box23."));
        assert!(absence.message.contains("renovar tu pago"));

        let mut current = expired(0);
        current.expired = false;
        let absence = messenger.absence_reminder(&member("3001234567"), &current).unwrap();
        assert!(absence.message.contains("Esperamos verte pronto en 6:00 am"));
    }

    #[test]
    fn amounts_and_dates_are_localized() {
        assert_eq!(format_amount(Decimal::new(80_000, 0)), "80.000");
        assert_eq!(format_amount(Decimal::new(1_234_567_89, 2)), "1.234.567");
        assert_eq!(format_amount(Decimal::new(999, 0)), "999");
        assert_eq!(long_date("2024-02-14"), "14 de febrero de 2024");
        assert_eq!(long_date(""), "");
    }
}
