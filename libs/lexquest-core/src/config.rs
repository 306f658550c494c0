//! Engine configuration: retention targets, point values, model tunables.
//!
//! Everything here is passed explicitly into the scheduler and engines.
//! Runtime overrides mutate a config value; nothing is read from ambient
//! state.

use serde::{Deserialize, Serialize};

use crate::algorithm::fsrs::FsrsParams;
use crate::error::CollaboratorError;
use crate::types::BookMode;

/// Lowest and highest accepted target retention.
pub const MIN_RETENTION: f64 = 0.70;
pub const MAX_RETENTION: f64 = 0.99;

/// Per-mode target retention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionTable {
    pub read: f64,
    pub solve: f64,
    pub memorize: f64,
}

impl Default for RetentionTable {
    fn default() -> Self {
        Self {
            read: 0.9,
            solve: 0.9,
            memorize: 0.85,
        }
    }
}

impl RetentionTable {
    pub fn for_mode(&self, mode: BookMode) -> f64 {
        let value = match mode {
            BookMode::Read => self.read,
            BookMode::Solve => self.solve,
            BookMode::Memorize => self.memorize,
        };
        clamp_retention(value)
    }

    /// Override one mode. Out-of-range values are clamped.
    pub fn set(&mut self, mode: BookMode, retention: f64) {
        let value = clamp_retention(retention);
        match mode {
            BookMode::Read => self.read = value,
            BookMode::Solve => self.solve = value,
            BookMode::Memorize => self.memorize = value,
        }
    }
}

fn clamp_retention(value: f64) -> f64 {
    if value.is_nan() {
        return RetentionTable::default().read;
    }
    value.clamp(MIN_RETENTION, MAX_RETENTION)
}

/// Source of per-card point values.
pub trait PointValue: Send + Sync {
    /// Point value of one card of a book in `mode`.
    fn lex(&self, mode: BookMode, difficulty: Option<f64>) -> Result<u32, CollaboratorError>;
}

/// Configurable point table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexTable {
    pub read: u32,
    pub solve: u32,
    pub memorize: u32,
    /// Extra points for cards at or above `hard_card_difficulty`.
    pub hard_card_bonus: u32,
}

/// Difficulty at which `hard_card_bonus` starts to apply.
pub const HARD_CARD_DIFFICULTY: f64 = 7.0;

impl Default for LexTable {
    fn default() -> Self {
        Self {
            read: 10,
            solve: 15,
            memorize: 5,
            hard_card_bonus: 0,
        }
    }
}

impl LexTable {
    pub fn base(&self, mode: BookMode) -> u32 {
        match mode {
            BookMode::Read => self.read,
            BookMode::Solve => self.solve,
            BookMode::Memorize => self.memorize,
        }
    }

    pub fn set(&mut self, mode: BookMode, value: u32) {
        match mode {
            BookMode::Read => self.read = value,
            BookMode::Solve => self.solve = value,
            BookMode::Memorize => self.memorize = value,
        }
    }

    /// Infallible lookup used directly and as the fallback for other sources.
    pub fn value(&self, mode: BookMode, difficulty: Option<f64>) -> u32 {
        let bonus = match difficulty {
            Some(d) if d >= HARD_CARD_DIFFICULTY => self.hard_card_bonus,
            _ => 0,
        };
        self.base(mode).saturating_add(bonus)
    }
}

impl PointValue for LexTable {
    fn lex(&self, mode: BookMode, difficulty: Option<f64>) -> Result<u32, CollaboratorError> {
        Ok(self.value(mode, difficulty))
    }
}

/// Look up a point value, falling back to `fallback` when the source fails.
pub fn lex_or_default(
    source: &dyn PointValue,
    fallback: &LexTable,
    mode: BookMode,
    difficulty: Option<f64>,
) -> i64 {
    match source.lex(mode, difficulty) {
        Ok(value) => i64::from(value),
        Err(err) => {
            tracing::warn!(
                error = %err,
                mode = mode.as_str(),
                "point lookup failed, using default table"
            );
            i64::from(fallback.value(mode, difficulty))
        }
    }
}

/// All tunables of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub retention: RetentionTable,
    pub lex: LexTable,
    /// Registry name of the memory model.
    pub model_name: String,
    pub model: FsrsParams,
    /// Daily target used when the target source and ledger history are both silent.
    pub default_daily_target: i64,
    /// Hour of day (0-23) when a new study day begins.
    pub daily_reset_hour: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: RetentionTable::default(),
            lex: LexTable::default(),
            model_name: "fsrs".to_string(),
            model: FsrsParams::default(),
            default_daily_target: 100,
            daily_reset_hour: 4,
        }
    }
}
