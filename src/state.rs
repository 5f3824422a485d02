use crate::gym::Gym;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub gym: Arc<Mutex<Gym>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, gym: Gym) -> Self {
        Self {
            data_path,
            gym: Arc::new(Mutex::new(gym)),
        }
    }
}
