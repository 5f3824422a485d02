use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post, put},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/summary", get(handlers::get_summary))
        .route(
            "/api/members",
            get(handlers::list_members).post(handlers::create_member),
        )
        .route(
            "/api/members/:id",
            get(handlers::get_member)
                .put(handlers::update_member)
                .delete(handlers::delete_member),
        )
        .route("/api/members/:id/status", get(handlers::member_status))
        .route("/api/members/:id/reminder", get(handlers::member_reminder))
        .route("/api/roster", get(handlers::get_roster))
        .route("/api/attendance/day", post(handlers::record_day))
        .route(
            "/api/attendance",
            get(handlers::list_attendance).post(handlers::create_attendance),
        )
        .route("/api/attendance/:id", delete(handlers::delete_attendance))
        .route(
            "/api/payments",
            get(handlers::list_payments).post(handlers::create_payment),
        )
        .route("/api/payments/:id", delete(handlers::delete_payment))
        .route("/api/reports/absences", get(handlers::absence_report))
        .route("/api/reports/attendance", get(handlers::attendance_report))
        .route("/api/reports/income", get(handlers::income_report))
        .route("/api/reports/combined", get(handlers::combined_report))
        .route("/api/reports/classes", get(handlers::class_report))
        .route("/api/reports/affiliations", get(handlers::affiliation_report))
        .route("/api/birthdays", get(handlers::birthdays))
        .route("/api/export", get(handlers::export_workbook))
        .route("/api/import", post(handlers::import_workbook))
        .route("/api/backup", post(handlers::create_backup))
        .route("/api/restore", post(handlers::restore_backup))
        .route("/api/backup/auto", put(handlers::set_auto_backup))
        .with_state(state)
}
