pub mod absence;
pub mod app;
pub mod attendance;
pub mod backup;
pub mod config;
pub mod dates;
pub mod errors;
pub mod gym;
pub mod handlers;
pub mod income;
pub mod membership;
pub mod messaging;
pub mod models;
pub mod reports;
pub mod state;
pub mod storage;
pub mod ui;
pub mod users;

pub use app::router;
pub use config::AppConfig;
pub use gym::{Gym, GymSettings};
pub use state::AppState;
pub use storage::{load_store, persist_store, resolve_data_path};
