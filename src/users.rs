use crate::dates::{DateNormalizer, parse_canonical};
use crate::errors::GymError;
use crate::models::{Member, MemberForm, MemberId};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

pub const DELETED_MEMBER_NAME: &str = "Usuario eliminado";
pub const BIRTHDAY_LOOKAHEAD_DAYS: i64 = 3;

/// Resolves the member identifiers carried by attendance and payment
/// records. The reference is not enforced, so a lookup may come back empty.
pub trait MemberLookup {
    fn member(&self, id: MemberId) -> Option<&Member>;

    fn display_name(&self, id: MemberId) -> &str {
        self.member(id)
            .map(|member| member.name.as_str())
            .unwrap_or(DELETED_MEMBER_NAME)
    }
}

pub fn clean_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

pub fn is_valid_phone(phone: &str) -> bool {
    let digits = clean_phone(phone);
    digits.len() == 10 && digits.starts_with('3')
}

#[derive(Debug, Clone, Serialize)]
pub struct UpcomingBirthday {
    pub id: MemberId,
    pub name: String,
    pub date: NaiveDate,
    pub days_until: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Users {
    records: Vec<Member>,
    normalizer: DateNormalizer,
}

impl Users {
    pub fn new(records: Vec<Member>) -> Self {
        Self {
            records,
            normalizer: DateNormalizer::default(),
        }
    }

    /// Sets how typed birthdates are read.
    pub fn with_normalizer(mut self, normalizer: DateNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn all(&self) -> &[Member] {
        &self.records
    }

    pub fn get(&self, id: MemberId) -> Option<&Member> {
        self.records.iter().find(|member| member.id == id)
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.get(id).is_some()
    }

    pub fn active(&self) -> impl Iterator<Item = &Member> {
        self.records.iter().filter(|member| member.is_active())
    }

    /// Active members that take classes, i.e. everyone but trainers.
    pub fn active_trainees(&self) -> impl Iterator<Item = &Member> {
        self.active().filter(|member| !member.is_trainer())
    }

    pub fn next_id(&self) -> MemberId {
        MemberId(
            self.records
                .iter()
                .map(|member| member.id.0)
                .max()
                .map_or(1, |max| max + 1),
        )
    }

    pub fn register(&mut self, form: MemberForm, now: DateTime<Utc>) -> Result<&Member, GymError> {
        if form.name.trim().is_empty() {
            return Err(GymError::MissingField("nombre"));
        }
        if !is_valid_phone(&form.phone) {
            return Err(GymError::InvalidPhone("teléfono principal"));
        }
        if !is_valid_phone(&form.emergency_phone) {
            return Err(GymError::InvalidPhone("teléfono de emergencia"));
        }
        let birthdate = self.normalizer.read_field(&form.birthdate, "fecha de nacimiento")?;

        let member = Member {
            id: self.next_id(),
            name: form.name.trim().to_string(),
            document: form.document,
            birthdate: birthdate.unwrap_or_default(),
            phone: form.phone,
            eps: form.eps,
            rh: form.rh,
            pathology: form.pathology,
            emergency_contact: form.emergency_contact,
            emergency_phone: form.emergency_phone,
            class_time: form.class_time,
            affiliation_type: form.affiliation_type,
            status: form.status,
            created_at: now,
        };
        self.records.push(member);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Edits keep the identifier and creation time. Phones are only checked
    /// when filled in.
    pub fn update(&mut self, id: MemberId, form: MemberForm) -> Result<&Member, GymError> {
        if !form.phone.is_empty() && !is_valid_phone(&form.phone) {
            return Err(GymError::InvalidPhone("teléfono principal"));
        }
        if !form.emergency_phone.is_empty() && !is_valid_phone(&form.emergency_phone) {
            return Err(GymError::InvalidPhone("teléfono de emergencia"));
        }
        let birthdate = self.normalizer.read_field(&form.birthdate, "fecha de nacimiento")?;
        let member = self
            .records
            .iter_mut()
            .find(|member| member.id == id)
            .ok_or(GymError::MemberNotFound(id))?;

        if !form.name.trim().is_empty() {
            member.name = form.name.trim().to_string();
        }
        member.document = form.document;
        member.birthdate = birthdate.unwrap_or_default();
        member.phone = form.phone;
        member.eps = form.eps;
        member.rh = form.rh;
        member.pathology = form.pathology;
        member.emergency_contact = form.emergency_contact;
        member.emergency_phone = form.emergency_phone;
        member.class_time = form.class_time;
        member.affiliation_type = form.affiliation_type;
        member.status = form.status;
        Ok(&*member)
    }

    /// Removes the member only; their attendance and payments stay behind.
    pub fn remove(&mut self, id: MemberId) -> Result<Member, GymError> {
        let index = self
            .records
            .iter()
            .position(|member| member.id == id)
            .ok_or(GymError::MemberNotFound(id))?;
        Ok(self.records.remove(index))
    }

    /// Adds an already-built member (imports). Returns false when the id is
    /// taken.
    pub fn insert(&mut self, member: Member) -> bool {
        if self.contains(member.id) {
            return false;
        }
        self.records.push(member);
        true
    }

    pub fn search(&self, text: &str) -> Vec<&Member> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.records.iter().collect();
        }
        self.records
            .iter()
            .filter(|member| {
                [&member.name, &member.document, &member.phone]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn upcoming_birthdays(&self, today: NaiveDate) -> Vec<UpcomingBirthday> {
        let mut upcoming: Vec<UpcomingBirthday> = self
            .records
            .iter()
            .filter_map(|member| {
                let born = parse_canonical(&member.birthdate)?;
                let date = next_birthday(born, today)?;
                let days_until = (date - today).num_days();
                (days_until <= BIRTHDAY_LOOKAHEAD_DAYS).then(|| UpcomingBirthday {
                    id: member.id,
                    name: member.name.clone(),
                    date,
                    days_until,
                })
            })
            .collect();
        upcoming.sort_by_key(|birthday| birthday.days_until);
        upcoming
    }
}

impl MemberLookup for Users {
    fn member(&self, id: MemberId) -> Option<&Member> {
        self.get(id)
    }
}

/// Next occurrence of a birthday on or after `today`. February 29th falls on
/// March 1st in common years.
fn next_birthday(born: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let on_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, born.month(), born.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
    };
    let this_year = on_year(today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        on_year(today.year() + 1)
    }
}
