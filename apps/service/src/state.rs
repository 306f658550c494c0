//! Application state.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use lexquest_core::calendar::study_date_of;
use lexquest_core::{EngineConfig, GraphCache};
use tokio::sync::Mutex as AsyncMutex;

use crate::commands::CommandError;
use crate::db::SqliteRepository;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Global application state.
pub struct AppState {
    pub repository: Arc<Mutex<SqliteRepository>>,
    /// Engine tunables, overridable at runtime.
    pub config: RwLock<EngineConfig>,
    pub graph: GraphCache,
    /// Serializes rollovers triggered by cold start and resume.
    pub rollover: AsyncMutex<()>,
    clock: Clock,
}

impl AppState {
    pub fn new(repository: SqliteRepository, config: EngineConfig) -> Self {
        Self {
            repository: Arc::new(Mutex::new(repository)),
            config: RwLock::new(config),
            graph: GraphCache::new(),
            rollover: AsyncMutex::new(()),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock (used by tests).
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn repo(&self) -> Result<MutexGuard<'_, SqliteRepository>, CommandError> {
        self.repository
            .lock()
            .map_err(|_| CommandError::new("repository lock poisoned"))
    }

    /// Snapshot of the current engine config.
    pub fn config(&self) -> Result<EngineConfig, CommandError> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| CommandError::new("config lock poisoned"))
    }

    pub fn update_config(
        &self,
        f: impl FnOnce(&mut EngineConfig),
    ) -> Result<EngineConfig, CommandError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| CommandError::new("config lock poisoned"))?;
        f(&mut config);
        Ok(config.clone())
    }

    /// Current study day under `config`.
    pub fn study_date(&self, config: &EngineConfig) -> NaiveDate {
        study_date_of(self.now(), config.daily_reset_hour)
    }
}
