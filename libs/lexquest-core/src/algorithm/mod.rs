//! Memory models used by the card scheduler.

pub mod fsrs;

use crate::types::Rating;

/// Smallest stability any model may produce.
pub const MIN_STABILITY: f64 = 0.01;

/// Memory parameters of a reviewed card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryState {
    pub stability: f64,
    pub difficulty: f64,
}

/// Trait for memory-decay models.
///
/// A model owns the stability/difficulty math only. The review state
/// machine (statuses, lapses, due dates) lives in the scheduler.
pub trait MemoryModel: Send + Sync {
    /// Model identifier.
    fn name(&self) -> &'static str;

    /// Version of the constant set, bumped whenever the math changes.
    fn version(&self) -> u32;

    /// Memory state after the first review of a new card.
    fn initial_state(&self, rating: Rating) -> MemoryState;

    /// Probability of recall after `elapsed_days` at `stability`.
    fn retrievability(&self, elapsed_days: f64, stability: f64) -> f64;

    /// Memory state after reviewing a card that already has one.
    fn next_state(&self, current: MemoryState, elapsed_days: f64, rating: Rating) -> MemoryState;

    /// Interval in days at which retrievability falls to `retention`.
    fn review_interval(&self, stability: f64, retention: f64) -> f64;

    /// Short interval in (fractional) days used after a failed recall.
    fn relearn_interval(&self, stability: f64) -> f64;

    /// Upper bound of any review interval.
    fn maximum_interval(&self) -> f64;
}

/// Get a model by name.
pub fn get_model(name: &str, params: &fsrs::FsrsParams) -> Option<Box<dyn MemoryModel>> {
    match name {
        "fsrs" => Some(Box::new(fsrs::Fsrs::new(params.clone()))),
        _ => None,
    }
}
