//! Card review state machine.

use chrono::{DateTime, Duration, Utc};

use crate::algorithm::fsrs::Fsrs;
use crate::algorithm::{get_model, MemoryModel, MemoryState, MIN_STABILITY};
use crate::config::{EngineConfig, RetentionTable};
use crate::types::{BookMode, Card, CardStatus, Rating};

/// Applies ratings to cards using a memory model and per-mode retention.
pub struct Scheduler {
    model: Box<dyn MemoryModel>,
    retention: RetentionTable,
}

impl Scheduler {
    pub fn new(model: Box<dyn MemoryModel>, retention: RetentionTable) -> Self {
        Self { model, retention }
    }

    /// Scheduler over the model named in `config`. An unknown name falls
    /// back to FSRS.
    pub fn from_config(config: &EngineConfig) -> Self {
        let model = get_model(&config.model_name, &config.model).unwrap_or_else(|| {
            tracing::warn!(model = %config.model_name, "unknown memory model, using fsrs");
            Box::new(Fsrs::new(config.model.clone()))
        });
        Self::new(model, config.retention)
    }

    /// Apply `rating` to `card`, returning the updated card.
    ///
    /// `mode` is the owning book's mode and selects the target retention.
    pub fn review(&self, card: &Card, mode: BookMode, rating: Rating, now: DateTime<Utc>) -> Card {
        let uninitialized = card.is_new() || card.stability <= 0.0 || card.difficulty < 1.0;

        let memory = if uninitialized {
            self.model.initial_state(rating)
        } else {
            let current = MemoryState {
                stability: card.stability,
                difficulty: card.difficulty,
            };
            self.model.next_state(current, card.elapsed_days(now), rating)
        };
        let stability = memory.stability.max(MIN_STABILITY);

        let status = next_status(card.status, rating);
        let lapses = if rating == Rating::Again && !card.is_new() {
            card.lapses + 1
        } else {
            card.lapses
        };

        let scheduled_days = if rating == Rating::Again {
            self.model.relearn_interval(stability)
        } else {
            let interval = self
                .model
                .review_interval(stability, self.retention.for_mode(mode));
            let keeps_growing = card.status == CardStatus::Review
                && matches!(rating, Rating::Good | Rating::Easy);
            if keeps_growing {
                interval
                    .max(card.scheduled_days.floor() + 1.0)
                    .min(self.model.maximum_interval())
            } else {
                interval
            }
        };

        let due = now + Duration::seconds((scheduled_days * 86400.0).round().max(1.0) as i64);

        Card {
            status,
            stability,
            difficulty: memory.difficulty,
            scheduled_days,
            reps: if card.is_new() { 1 } else { card.reps + 1 },
            lapses,
            due,
            last_review: Some(now),
            ..card.clone()
        }
    }

    /// Predicted recall probability now. `None` for cards never reviewed.
    pub fn retrievability(&self, card: &Card, now: DateTime<Utc>) -> Option<f64> {
        if card.is_new() {
            return None;
        }
        Some(
            self.model
                .retrievability(card.elapsed_days(now), card.stability),
        )
    }
}

/// Manually reset a card back to New, due immediately.
pub fn reset_card(card: &Card, now: DateTime<Utc>) -> Card {
    Card {
        photo_path: card.photo_path.clone(),
        ..Card::new(card.book_id, card.unit_index, now)
    }
}

fn next_status(current: CardStatus, rating: Rating) -> CardStatus {
    match (current, rating) {
        (CardStatus::New, Rating::Again) => CardStatus::Learning,
        (CardStatus::Learning, Rating::Again) => CardStatus::Learning,
        (CardStatus::Review | CardStatus::Relearning, Rating::Again) => CardStatus::Relearning,
        (_, _) => CardStatus::Review,
    }
}
