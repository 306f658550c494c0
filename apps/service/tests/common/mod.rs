//! Common test utilities for integration tests.
//!
//! `TestContext` wires an `AppState` over an in-memory SQLite database
//! with a clock the test controls.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use lexquest_core::{CardPatch, EngineConfig, ReviewLog, ReviewLogStore};

use lexquest_service::db::SqliteRepository;
use lexquest_service::state::AppState;

/// Test context holding application state and its clock.
pub struct TestContext {
    pub state: AppState,
    clock: Arc<Mutex<DateTime<Utc>>>,
}

impl TestContext {
    /// Fresh database with the default engine config.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let repository =
            SqliteRepository::open_in_memory().expect("Failed to open in-memory database");
        let clock = Arc::new(Mutex::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        ));
        let reader = Arc::clone(&clock);
        let state = AppState::new(repository, config)
            .with_clock(move || *reader.lock().unwrap());
        Self { state, clock }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.clock.lock().unwrap();
        *now += by;
    }

    /// Move the clock to the same time on the next study day.
    pub fn next_day(&self) {
        self.advance(Duration::days(1));
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.state.now()
    }

    pub fn today(&self) -> NaiveDate {
        let config = self.state.config().unwrap();
        self.state.study_date(&config)
    }

    /// Write a review log row directly, bypassing the scheduler.
    pub fn seed_review(&self, log: &ReviewLog) {
        let repo = self.state.repo().unwrap();
        repo.record_review(log.card_id, &CardPatch::default(), log)
            .expect("Failed to seed review log");
    }
}
