use crate::dates::{DateNormalizer, canonical};
use crate::errors::GymError;
use crate::models::{MemberId, NewPayment, PaymentRecord, RecordFilter};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Coverage length used when a payment arrives without an end date.
pub const DEFAULT_COVERAGE_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
pub struct IncomeListing<'a> {
    pub records: Vec<&'a PaymentRecord>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct Income {
    records: Vec<PaymentRecord>,
    normalizer: DateNormalizer,
}

impl Income {
    pub fn new(records: Vec<PaymentRecord>) -> Self {
        Self {
            records,
            normalizer: DateNormalizer::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: DateNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn all(&self) -> &[PaymentRecord] {
        &self.records
    }

    pub fn contains(&self, id: i64) -> bool {
        self.records.iter().any(|record| record.id == id)
    }

    pub fn add(
        &mut self,
        payment: NewPayment,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<&PaymentRecord, GymError> {
        let user_id = payment.user_id.ok_or(GymError::MissingField("usuario"))?;
        if payment.amount.is_sign_negative() {
            return Err(GymError::InvalidAmount);
        }

        // Defaults only fill dates left blank; a typed date must be readable.
        let normalizer = self.normalizer;
        let date_or = |raw: Option<String>, field: &'static str, fallback: NaiveDate| {
            normalizer
                .read_field(raw.as_deref().unwrap_or_default(), field)
                .map(|date| date.unwrap_or_else(|| canonical(fallback)))
        };
        let payment_date = date_or(payment.payment_date, "fecha de pago", today)?;
        let start_date = date_or(payment.start_date, "fecha de inicio", today)?;
        let default_end = today + Duration::days(DEFAULT_COVERAGE_DAYS);
        let end_date = date_or(payment.end_date, "fecha de fin", default_end)?;

        let mut id = now.timestamp_millis();
        while self.contains(id) {
            id += 1;
        }

        let record = PaymentRecord {
            id,
            user_id,
            payment_date,
            start_date,
            end_date,
            payment_type: payment.payment_type.trim().to_string(),
            amount: payment.amount,
            description: payment.description,
            registered_at: now,
        };
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn for_member(&self, member: MemberId) -> Vec<&PaymentRecord> {
        self.records
            .iter()
            .filter(|record| record.user_id == member)
            .collect()
    }

    /// Filters on payment date and member, totalling the matching amounts.
    pub fn filter(&self, filter: &RecordFilter) -> IncomeListing<'_> {
        let records: Vec<&PaymentRecord> = self
            .records
            .iter()
            .filter(|record| filter.matches(record.user_id, &record.payment_date))
            .collect();
        let total = records.iter().map(|record| record.amount).sum();
        IncomeListing { records, total }
    }

    pub fn remove(&mut self, id: i64) -> Result<PaymentRecord, GymError> {
        let index = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or(GymError::RecordNotFound { kind: "pago", id })?;
        Ok(self.records.remove(index))
    }

    pub fn insert(&mut self, record: PaymentRecord) -> bool {
        if self.contains(record.id) {
            return false;
        }
        self.records.push(record);
        true
    }
}
