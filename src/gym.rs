use crate::absence::{AbsencePolicy, AbsenceScan, scan_absences_at};
use crate::attendance::{Attendance, DaySaveOutcome};
use crate::backup::{self, ImportMode, ImportSummary, Snapshot, Workbook};
use crate::dates::DateNormalizer;
use crate::errors::GymError;
use crate::income::Income;
use crate::membership::{DEFAULT_EXPIRING_SOON_DAYS, MembershipStatus, membership_status_at};
use crate::messaging::{DEFAULT_COUNTRY_CODE, DEFAULT_GYM_NAME, Messenger, WhatsAppMessage};
use crate::models::{
    AttendanceRecord, Member, MemberForm, MemberId, NewAttendance, NewPayment, PaymentRecord,
};
use crate::storage::{
    ATTENDANCE_KEY, AUTO_BACKUP_KEY, BACKUP_KEY, INCOME_KEY, LAST_BACKUP_KEY, RecordStore,
    USERS_KEY, records_from,
};
use crate::users::Users;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

#[derive(Debug, Clone)]
pub struct GymSettings {
    pub absence: AbsencePolicy,
    pub expiring_soon_days: i64,
    pub normalizer: DateNormalizer,
    pub messenger: Messenger,
}

impl Default for GymSettings {
    fn default() -> Self {
        Self {
            absence: AbsencePolicy::default(),
            expiring_soon_days: DEFAULT_EXPIRING_SOON_DAYS,
            normalizer: DateNormalizer::default(),
            messenger: Messenger::new(DEFAULT_COUNTRY_CODE, DEFAULT_GYM_NAME),
        }
    }
}

/// Owns the record store and the three collections mirrored from it. Every
/// mutation writes the touched collection back to its store key; flushing
/// the store to disk is left to the caller.
#[derive(Debug, Clone)]
pub struct Gym {
    store: RecordStore,
    users: Users,
    attendance: Attendance,
    income: Income,
    settings: GymSettings,
}

impl Gym {
    pub fn load(store: RecordStore, settings: GymSettings) -> Self {
        let mut gym = Self {
            store,
            users: Users::default(),
            attendance: Attendance::default(),
            income: Income::default(),
            settings,
        };
        gym.reload();
        gym
    }

    /// Rebuilds every collection from the store. Unreadable records are
    /// dropped one at a time.
    pub fn reload(&mut self) {
        self.set_collections(
            self.store.get_records(USERS_KEY),
            self.store.get_records(ATTENDANCE_KEY),
            self.store.get_records(INCOME_KEY),
        );
        info!(
            users = self.users.all().len(),
            attendance = self.attendance.all().len(),
            income = self.income.all().len(),
            "collections loaded"
        );
    }

    fn set_collections(
        &mut self,
        users: Vec<Member>,
        attendance: Vec<AttendanceRecord>,
        income: Vec<PaymentRecord>,
    ) {
        let normalizer = self.settings.normalizer;
        self.users = Users::new(users).with_normalizer(normalizer);
        self.attendance = Attendance::new(attendance).with_normalizer(normalizer);
        self.income = Income::new(income).with_normalizer(normalizer);
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn users(&self) -> &Users {
        &self.users
    }

    pub fn attendance(&self) -> &Attendance {
        &self.attendance
    }

    pub fn income(&self) -> &Income {
        &self.income
    }

    pub fn settings(&self) -> &GymSettings {
        &self.settings
    }

    fn save_users(&mut self) -> Result<(), GymError> {
        self.store.set(USERS_KEY, self.users.all())?;
        self.after_mutation()
    }

    fn save_attendance(&mut self) -> Result<(), GymError> {
        self.store.set(ATTENDANCE_KEY, self.attendance.all())?;
        self.after_mutation()
    }

    fn save_income(&mut self) -> Result<(), GymError> {
        self.store.set(INCOME_KEY, self.income.all())?;
        self.after_mutation()
    }

    fn after_mutation(&mut self) -> Result<(), GymError> {
        if self.auto_backup_enabled() {
            self.create_backup(Utc::now())?;
        }
        Ok(())
    }

    pub fn register_member(
        &mut self,
        form: MemberForm,
        now: DateTime<Utc>,
    ) -> Result<Member, GymError> {
        let member = self.users.register(form, now)?.clone();
        self.save_users()?;
        info!(id = %member.id, "member registered");
        Ok(member)
    }

    pub fn update_member(&mut self, id: MemberId, form: MemberForm) -> Result<Member, GymError> {
        let member = self.users.update(id, form)?.clone();
        self.save_users()?;
        Ok(member)
    }

    /// Attendance and payments of the member are left in place.
    pub fn remove_member(&mut self, id: MemberId) -> Result<Member, GymError> {
        let member = self.users.remove(id)?;
        self.save_users()?;
        info!(%id, "member removed");
        Ok(member)
    }

    pub fn add_attendance(
        &mut self,
        entry: NewAttendance,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, GymError> {
        let record = self.attendance.add(entry, now)?.clone();
        self.save_attendance()?;
        Ok(record)
    }

    /// Check-in for a whole day. Members whose membership is locked on
    /// `today` are skipped.
    pub fn record_day(
        &mut self,
        date: &str,
        present: &[MemberId],
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DaySaveOutcome, GymError> {
        let day = self
            .settings
            .normalizer
            .read_field(date, "fecha")?
            .ok_or(GymError::MissingField("fecha"))?;
        let locked: Vec<MemberId> = present
            .iter()
            .copied()
            .filter(|&member| self.status_at(today, member).is_locked())
            .collect();
        let outcome = self
            .attendance
            .record_day(&day, present, now, |member| locked.contains(&member));
        self.save_attendance()?;
        info!(
            date = %day,
            saved = outcome.saved,
            skipped = outcome.skipped.len(),
            "attendance saved"
        );
        Ok(outcome)
    }

    pub fn remove_attendance(&mut self, id: i64) -> Result<AttendanceRecord, GymError> {
        let record = self.attendance.remove(id)?;
        self.save_attendance()?;
        Ok(record)
    }

    pub fn add_payment(
        &mut self,
        payment: NewPayment,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, GymError> {
        let record = self.income.add(payment, today, now)?.clone();
        self.save_income()?;
        info!(id = record.id, member = %record.user_id, "payment registered");
        Ok(record)
    }

    pub fn remove_payment(&mut self, id: i64) -> Result<PaymentRecord, GymError> {
        let record = self.income.remove(id)?;
        self.save_income()?;
        Ok(record)
    }

    pub fn status_at(&self, today: NaiveDate, member: MemberId) -> MembershipStatus {
        membership_status_at(
            today,
            self.settings.expiring_soon_days,
            member,
            self.income.all(),
            self.attendance.all(),
        )
    }

    pub fn absence_scan_at(&self, today: NaiveDate, member: MemberId) -> AbsenceScan {
        scan_absences_at(
            today,
            self.attendance.all(),
            member,
            self.settings.absence.window_days,
        )
    }

    pub fn member_or_err(&self, id: MemberId) -> Result<&Member, GymError> {
        self.users.get(id).ok_or(GymError::MemberNotFound(id))
    }

    pub fn payment_reminder_at(
        &self,
        today: NaiveDate,
        id: MemberId,
    ) -> Result<WhatsAppMessage, GymError> {
        let member = self.member_or_err(id)?;
        let status = self.status_at(today, id);
        self.settings.messenger.payment_reminder(member, &status)
    }

    pub fn absence_reminder_at(
        &self,
        today: NaiveDate,
        id: MemberId,
    ) -> Result<WhatsAppMessage, GymError> {
        let member = self.member_or_err(id)?;
        let status = self.status_at(today, id);
        self.settings.messenger.absence_reminder(member, &status)
    }

    pub fn payment_confirmation(
        &self,
        payment: &PaymentRecord,
    ) -> Result<WhatsAppMessage, GymError> {
        let member = self.member_or_err(payment.user_id)?;
        self.settings.messenger.payment_confirmation(member, payment)
    }

    pub fn export_workbook(&self) -> Workbook {
        backup::export_workbook(
            self.users.all(),
            self.attendance.all(),
            self.income.all(),
            &self.users,
        )
    }

    /// Imports a workbook. Nothing changes when a sheet is missing; otherwise
    /// `Replace` drops all collections first and `Merge` keeps existing
    /// records, skipping ids that are already present.
    pub fn import_workbook(
        &mut self,
        workbook: &Workbook,
        mode: ImportMode,
        now: DateTime<Utc>,
    ) -> Result<ImportSummary, GymError> {
        let parsed = backup::parse_workbook(workbook, &self.settings.normalizer, now)?;
        let mut summary = parsed.summary;
        summary.mode = Some(mode);

        if mode == ImportMode::Replace {
            self.set_collections(Vec::new(), Vec::new(), Vec::new());
        }

        for member in parsed.users {
            if self.users.insert(member) {
                summary.users.accepted += 1;
            } else {
                summary.users.duplicates += 1;
            }
        }
        for record in parsed.attendance {
            if self.attendance.insert(record) {
                summary.attendance.accepted += 1;
            } else {
                summary.attendance.duplicates += 1;
            }
        }
        for record in parsed.payments {
            if self.income.insert(record) {
                summary.payments.accepted += 1;
            } else {
                summary.payments.duplicates += 1;
            }
        }

        self.store.set(USERS_KEY, self.users.all())?;
        self.store.set(ATTENDANCE_KEY, self.attendance.all())?;
        self.store.set(INCOME_KEY, self.income.all())?;
        self.after_mutation()?;
        info!(
            ?mode,
            users = summary.users.accepted,
            attendance = summary.attendance.accepted,
            payments = summary.payments.accepted,
            "workbook imported"
        );
        Ok(summary)
    }

    pub fn auto_backup_enabled(&self) -> bool {
        self.store.get(AUTO_BACKUP_KEY, false)
    }

    pub fn set_auto_backup(&mut self, enabled: bool) -> Result<(), GymError> {
        self.store.set(AUTO_BACKUP_KEY, &enabled)
    }

    pub fn last_backup(&self) -> Option<DateTime<Utc>> {
        self.store.get(LAST_BACKUP_KEY, None)
    }

    pub fn create_backup(&mut self, now: DateTime<Utc>) -> Result<(), GymError> {
        let snapshot = Snapshot {
            users: self.users.all().to_vec(),
            attendance: self.attendance.all().to_vec(),
            income: self.income.all().to_vec(),
            created_at: now,
        };
        self.store.set(BACKUP_KEY, &snapshot)?;
        self.store.set(LAST_BACKUP_KEY, &now)?;
        info!(%now, "backup created");
        Ok(())
    }

    /// Replaces the collections with the stored snapshot, read record by
    /// record like the live collections.
    pub fn restore_backup(&mut self) -> Result<DateTime<Utc>, GymError> {
        let snapshot = self.store.raw(BACKUP_KEY).ok_or(GymError::NoBackup)?;
        let created_at: DateTime<Utc> = snapshot
            .get("createdAt")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .ok_or(GymError::NoBackup)?;
        let users: Vec<Member> = records_from(USERS_KEY, snapshot.get("users"));
        let attendance: Vec<AttendanceRecord> =
            records_from(ATTENDANCE_KEY, snapshot.get("attendance"));
        let income: Vec<PaymentRecord> = records_from(INCOME_KEY, snapshot.get("income"));

        self.store.set(USERS_KEY, &users)?;
        self.store.set(ATTENDANCE_KEY, &attendance)?;
        self.store.set(INCOME_KEY, &income)?;
        self.set_collections(users, attendance, income);
        info!(%created_at, "backup restored");
        Ok(created_at)
    }
}
