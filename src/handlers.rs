use crate::attendance::DaySaveOutcome;
use crate::backup::{ImportMode, ImportSummary, Workbook, export_filename};
use crate::errors::AppError;
use crate::gym::Gym;
use crate::membership::MembershipStatus;
use crate::messaging::WhatsAppMessage;
use crate::models::{
    AttendanceRecord, Member, MemberForm, MemberId, NewAttendance, NewPayment, PaymentRecord,
    RecordFilter,
};
use crate::reports::{
    self, AbsenceAlert, AffiliationCount, ClassSlotCount, CombinedRow, Month, MonthlyAttendance,
    MonthlyIncome, Roster, Summary,
};
use crate::state::AppState;
use crate::storage::persist_store;
use crate::ui::render_index;
use crate::users::UpcomingBirthday;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse},
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    #[default]
    Payment,
    Absence,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ReminderQuery {
    pub kind: ReminderKind,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CombinedQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub member: Option<MemberId>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ImportQuery {
    pub mode: ImportMode,
}

#[derive(Debug, Deserialize)]
pub struct DayRequest {
    pub date: String,
    #[serde(default)]
    pub present: Vec<MemberId>,
}

#[derive(Debug, Deserialize)]
pub struct AutoBackupRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub records: Vec<PaymentRecord>,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PaymentCreatedResponse {
    pub payment: PaymentRecord,
    pub confirmation: Option<WhatsAppMessage>,
}

#[derive(Debug, Serialize)]
pub struct BackupResponse {
    pub last_backup: Option<DateTime<Utc>>,
    pub auto_backup: bool,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn persist(state: &AppState, gym: &Gym) -> Result<(), AppError> {
    persist_store(&state.data_path, gym.store()).await?;
    Ok(())
}

fn month_or_current(raw: Option<&str>) -> Result<Month, AppError> {
    match raw {
        Some(raw) => Month::parse(raw)
            .ok_or_else(|| AppError::bad_request(format!("mes inválido: {raw}"))),
        None => Ok(Month::containing(today())),
    }
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let gym = state.gym.lock().await;
    let summary = reports::build_summary(&gym);
    let date = today().to_string();
    Html(render_index(&gym.settings().messenger.gym_name, &date, &summary))
}

pub async fn get_summary(State(state): State<AppState>) -> Json<Summary> {
    let gym = state.gym.lock().await;
    Json(reports::build_summary(&gym))
}

pub async fn list_members(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<Member>> {
    let gym = state.gym.lock().await;
    let members = match query.q.as_deref() {
        Some(text) => gym.users().search(text).into_iter().cloned().collect(),
        None => gym.users().all().to_vec(),
    };
    Json(members)
}

pub async fn create_member(
    State(state): State<AppState>,
    Json(form): Json<MemberForm>,
) -> Result<(StatusCode, Json<Member>), AppError> {
    let mut gym = state.gym.lock().await;
    let member = gym.register_member(form, Utc::now())?;
    persist(&state, &gym).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Member>, AppError> {
    let gym = state.gym.lock().await;
    Ok(Json(gym.member_or_err(MemberId(id))?.clone()))
}

pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(form): Json<MemberForm>,
) -> Result<Json<Member>, AppError> {
    let mut gym = state.gym.lock().await;
    let member = gym.update_member(MemberId(id), form)?;
    persist(&state, &gym).await?;
    Ok(Json(member))
}

pub async fn delete_member(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Member>, AppError> {
    let mut gym = state.gym.lock().await;
    let member = gym.remove_member(MemberId(id))?;
    persist(&state, &gym).await?;
    Ok(Json(member))
}

pub async fn member_status(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<MembershipStatus>, AppError> {
    let gym = state.gym.lock().await;
    let id = MemberId(id);
    gym.member_or_err(id)?;
    Ok(Json(gym.status_at(today(), id)))
}

pub async fn member_reminder(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<ReminderQuery>,
) -> Result<Json<WhatsAppMessage>, AppError> {
    let gym = state.gym.lock().await;
    let id = MemberId(id);
    let message = match query.kind {
        ReminderKind::Payment => gym.payment_reminder_at(today(), id)?,
        ReminderKind::Absence => gym.absence_reminder_at(today(), id)?,
    };
    Ok(Json(message))
}

pub async fn get_roster(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Roster>, AppError> {
    let gym = state.gym.lock().await;
    let date = match query.date.as_deref() {
        Some(raw) => gym
            .settings()
            .normalizer
            .parse_text(raw)
            .ok_or_else(|| AppError::bad_request(format!("fecha inválida: {raw}")))?,
        None => today(),
    };
    Ok(Json(reports::roster_at(today(), &gym, date)))
}

pub async fn record_day(
    State(state): State<AppState>,
    Json(payload): Json<DayRequest>,
) -> Result<Json<DaySaveOutcome>, AppError> {
    let mut gym = state.gym.lock().await;
    let outcome = gym.record_day(&payload.date, &payload.present, today(), Utc::now())?;
    persist(&state, &gym).await?;
    Ok(Json(outcome))
}

pub async fn list_attendance(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Json<Vec<AttendanceRecord>> {
    let gym = state.gym.lock().await;
    Json(gym.attendance().filter(&filter).into_iter().cloned().collect())
}

pub async fn create_attendance(
    State(state): State<AppState>,
    Json(entry): Json<NewAttendance>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AppError> {
    let mut gym = state.gym.lock().await;
    let record = gym.add_attendance(entry, Utc::now())?;
    persist(&state, &gym).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn delete_attendance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AttendanceRecord>, AppError> {
    let mut gym = state.gym.lock().await;
    let record = gym.remove_attendance(id)?;
    persist(&state, &gym).await?;
    Ok(Json(record))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Json<PaymentListResponse> {
    let gym = state.gym.lock().await;
    let listing = gym.income().filter(&filter);
    Json(PaymentListResponse {
        records: listing.records.into_iter().cloned().collect(),
        total: listing.total,
    })
}

pub async fn create_payment(
    State(state): State<AppState>,
    Json(payment): Json<NewPayment>,
) -> Result<(StatusCode, Json<PaymentCreatedResponse>), AppError> {
    let mut gym = state.gym.lock().await;
    let payment = gym.add_payment(payment, today(), Utc::now())?;
    persist(&state, &gym).await?;
    let confirmation = gym.payment_confirmation(&payment).ok();
    Ok((
        StatusCode::CREATED,
        Json(PaymentCreatedResponse {
            payment,
            confirmation,
        }),
    ))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PaymentRecord>, AppError> {
    let mut gym = state.gym.lock().await;
    let record = gym.remove_payment(id)?;
    persist(&state, &gym).await?;
    Ok(Json(record))
}

pub async fn absence_report(State(state): State<AppState>) -> Json<Vec<AbsenceAlert>> {
    let gym = state.gym.lock().await;
    Json(reports::absence_alerts(&gym))
}

pub async fn attendance_report(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthlyAttendance>, AppError> {
    let month = month_or_current(query.month.as_deref())?;
    let gym = state.gym.lock().await;
    Ok(Json(reports::monthly_attendance(&gym, month)))
}

pub async fn income_report(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthlyIncome>, AppError> {
    let month = month_or_current(query.month.as_deref())?;
    let gym = state.gym.lock().await;
    Ok(Json(reports::monthly_income(&gym, month)))
}

/// Defaults to the current month when either bound is missing.
pub async fn combined_report(
    State(state): State<AppState>,
    Query(query): Query<CombinedQuery>,
) -> Result<Json<Vec<CombinedRow>>, AppError> {
    let (start, end) = match (query.start, query.end) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            let month = Month::containing(today());
            (month.first, month.last)
        }
    };
    if start > end {
        return Err(AppError::bad_request("el rango de fechas es inválido"));
    }
    let gym = state.gym.lock().await;
    Ok(Json(reports::combined_report(&gym, start, end, query.member)))
}

pub async fn class_report(State(state): State<AppState>) -> Json<Vec<ClassSlotCount>> {
    let gym = state.gym.lock().await;
    Json(reports::class_attendance(&gym))
}

pub async fn affiliation_report(State(state): State<AppState>) -> Json<Vec<AffiliationCount>> {
    let gym = state.gym.lock().await;
    Json(reports::affiliation_distribution(&gym))
}

pub async fn birthdays(State(state): State<AppState>) -> Json<Vec<UpcomingBirthday>> {
    let gym = state.gym.lock().await;
    Json(gym.users().upcoming_birthdays(today()))
}

pub async fn export_workbook(State(state): State<AppState>) -> impl IntoResponse {
    let gym = state.gym.lock().await;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(Local::now())
    );
    ([(header::CONTENT_DISPOSITION, disposition)], Json(gym.export_workbook()))
}

pub async fn import_workbook(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(workbook): Json<Workbook>,
) -> Result<Json<ImportSummary>, AppError> {
    let mut gym = state.gym.lock().await;
    let summary = gym.import_workbook(&workbook, query.mode, Utc::now())?;
    persist(&state, &gym).await?;
    Ok(Json(summary))
}

fn backup_response(gym: &Gym) -> BackupResponse {
    BackupResponse {
        last_backup: gym.last_backup(),
        auto_backup: gym.auto_backup_enabled(),
    }
}

pub async fn create_backup(
    State(state): State<AppState>,
) -> Result<Json<BackupResponse>, AppError> {
    let mut gym = state.gym.lock().await;
    gym.create_backup(Utc::now())?;
    persist(&state, &gym).await?;
    Ok(Json(backup_response(&gym)))
}

pub async fn restore_backup(State(state): State<AppState>) -> Result<Json<Summary>, AppError> {
    let mut gym = state.gym.lock().await;
    gym.restore_backup()?;
    persist(&state, &gym).await?;
    Ok(Json(reports::build_summary(&gym)))
}

pub async fn set_auto_backup(
    State(state): State<AppState>,
    Json(payload): Json<AutoBackupRequest>,
) -> Result<Json<BackupResponse>, AppError> {
    let mut gym = state.gym.lock().await;
    gym.set_auto_backup(payload.enabled)?;
    persist(&state, &gym).await?;
    Ok(Json(backup_response(&gym)))
}
