//! Daily quest: due reviews, eligible new cards and the new-card plan.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{lex_or_default, LexTable, PointValue};
use crate::error::{CoreError, Result};
use crate::graph::GraphCache;
use crate::scheduler::Scheduler;
use crate::scope::{active_preset, resolve_scope};
use crate::store::{BookStore, CardPatch, CardStore, PresetStore, ReviewLogStore};
use crate::types::{Book, BookMode, Card, CardStatus, Rating, ReviewLog};

/// New-card plan for one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookAllocation {
    pub book_id: Uuid,
    pub title: String,
    pub mode: BookMode,
    pub lex_per_card: i64,
    /// Eligible new cards left in the book.
    pub available: usize,
    /// New cards of this book already introduced today.
    pub issued_today: usize,
    /// New cards recommended to close the remaining gap.
    pub recommended: usize,
    /// Ids of the recommended cards, in unit order.
    pub card_ids: Vec<Uuid>,
}

impl BookAllocation {
    fn candidate(book: &Book, lex_per_card: i64, cards: &[&Card], issued_today: usize) -> Self {
        Self {
            book_id: book.id,
            title: book.title.clone(),
            mode: book.mode,
            lex_per_card,
            available: cards.len(),
            issued_today,
            recommended: 0,
            card_ids: cards.iter().map(|c| c.id).collect(),
        }
    }
}

/// Fill `allocations` in order until their Lex reaches `deficit`.
///
/// Each allocation's `card_ids` must hold its candidate cards in unit order;
/// on return it is truncated to the recommended ones. Returns the Lex
/// recommended, which is at least `deficit` unless every card was taken.
pub fn recommend(deficit: i64, allocations: &mut [BookAllocation]) -> i64 {
    let mut cumulative = 0;
    for allocation in allocations.iter_mut() {
        let mut taken = 0;
        while taken < allocation.available && cumulative < deficit {
            cumulative += allocation.lex_per_card;
            taken += 1;
        }
        allocation.recommended = taken;
        allocation.card_ids.truncate(taken);
    }
    cumulative
}

/// Everything the study screen needs for one study day.
#[derive(Debug, Clone, Serialize)]
pub struct QuestPlan {
    pub study_date: NaiveDate,
    pub target_lex: i64,
    /// Lex of cards still due plus cards reviewed today (not counting new ones).
    pub review_lex: i64,
    pub new_lex_issued_today: i64,
    pub combined_lex: i64,
    pub deficit: i64,
    pub recommended_lex: i64,
    pub due_cards: Vec<Card>,
    pub eligible_new: usize,
    pub allocations: Vec<BookAllocation>,
    /// New cards that could still be added beyond the recommendation.
    pub extra_capacity: usize,
    pub next_card: Option<Card>,
}

/// One applied review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub card: Card,
    pub previous_status: CardStatus,
    pub lex: i64,
}

/// One item of a bulk submission. `rating` is the 1-4 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItem {
    pub card_id: Uuid,
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub card_id: Uuid,
    pub error: String,
}

/// Result of [`QuestEngine::submit_bulk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: Option<BulkFailure>,
    /// Items after the failed one that were not submitted.
    pub remaining: usize,
}

/// Builds the daily plan and applies reviews.
pub struct QuestEngine<'a> {
    books: &'a dyn BookStore,
    cards: &'a dyn CardStore,
    presets: &'a dyn PresetStore,
    reviews: &'a dyn ReviewLogStore,
    scheduler: &'a Scheduler,
    graph: &'a GraphCache,
    points: &'a dyn PointValue,
    fallback: &'a LexTable,
}

impl<'a> QuestEngine<'a> {
    /// Engine over a store implementing every repository, pricing cards
    /// with `lex`.
    pub fn new<S>(
        store: &'a S,
        scheduler: &'a Scheduler,
        graph: &'a GraphCache,
        lex: &'a LexTable,
    ) -> Self
    where
        S: BookStore + CardStore + PresetStore + ReviewLogStore,
    {
        Self {
            books: store,
            cards: store,
            presets: store,
            reviews: store,
            scheduler,
            graph,
            points: lex,
            fallback: lex,
        }
    }

    /// Price cards with another source, keeping the table as fallback.
    pub fn with_points(mut self, points: &'a dyn PointValue) -> Self {
        self.points = points;
        self
    }

    fn lex(&self, mode: BookMode, difficulty: Option<f64>) -> i64 {
        lex_or_default(self.points, self.fallback, mode, difficulty)
    }

    /// Plan `study_date` against `target_lex`.
    pub fn plan(
        &self,
        target_lex: i64,
        now: DateTime<Utc>,
        study_date: NaiveDate,
        selected_preset: Option<Uuid>,
    ) -> Result<QuestPlan> {
        let books = self.books.find_all()?;
        let preset = active_preset(self.presets, selected_preset)?;
        let scope = resolve_scope(preset.as_ref(), &books);
        let by_id: HashMap<Uuid, &Book> = books.iter().map(|b| (b.id, b)).collect();
        let route = self.graph.resolve(&books);

        let due_cards = self.cards.find_due(&scope, now)?;
        let new_cards: Vec<Card> = self
            .cards
            .find_new(&scope)?
            .into_iter()
            .filter(|c| route.is_satisfied(c.book_id))
            .collect();
        let logs = self.reviews.find_by_date(study_date)?;

        // Cards introduced today, then other cards reviewed today, each
        // counted once at the value credited on its first review.
        let mut introduced: HashMap<Uuid, i64> = HashMap::new();
        let mut issued_per_book: HashMap<Uuid, usize> = HashMap::new();
        for log in logs.iter().filter(|l| l.introduced_card()) {
            if let Entry::Vacant(slot) = introduced.entry(log.card_id) {
                slot.insert(log.lex);
                *issued_per_book.entry(log.book_id).or_default() += 1;
            }
        }
        let mut reviewed: HashMap<Uuid, i64> = HashMap::new();
        for log in &logs {
            if !introduced.contains_key(&log.card_id) {
                reviewed.entry(log.card_id).or_insert(log.lex);
            }
        }
        for card in &due_cards {
            if introduced.contains_key(&card.id) {
                continue;
            }
            if let (Entry::Vacant(slot), Some(book)) =
                (reviewed.entry(card.id), by_id.get(&card.book_id))
            {
                slot.insert(self.lex(book.mode, Some(card.difficulty)));
            }
        }

        let review_lex: i64 = reviewed.values().sum();
        let new_lex_issued_today: i64 = introduced.values().sum();
        let combined_lex = review_lex + new_lex_issued_today;
        let deficit = (target_lex - combined_lex).max(0);

        let mut per_book: HashMap<Uuid, Vec<&Card>> = HashMap::new();
        for card in &new_cards {
            per_book.entry(card.book_id).or_default().push(card);
        }
        let mut ordered: Vec<&Book> =
            books.iter().filter(|b| per_book.contains_key(&b.id)).collect();
        ordered.sort_by_key(|b| (b.priority.rank(), b.created_at));

        let mut allocations: Vec<BookAllocation> = ordered
            .iter()
            .map(|book| {
                let mut cards = per_book.remove(&book.id).unwrap_or_default();
                cards.sort_by_key(|c| c.unit_index);
                let issued = issued_per_book.get(&book.id).copied().unwrap_or(0);
                BookAllocation::candidate(book, self.lex(book.mode, None), &cards, issued)
            })
            .collect();
        let recommended_lex = recommend(deficit, &mut allocations);

        let eligible_new = new_cards.len();
        let planned: usize = allocations.iter().map(|a| a.recommended).sum();
        let next_card = next_due(&due_cards).cloned();

        tracing::debug!(
            %study_date,
            due = due_cards.len(),
            eligible_new,
            review_lex,
            new_lex_issued_today,
            deficit,
            planned,
            "planned quest"
        );

        Ok(QuestPlan {
            study_date,
            target_lex,
            review_lex,
            new_lex_issued_today,
            combined_lex,
            deficit,
            recommended_lex,
            due_cards,
            eligible_new,
            allocations,
            extra_capacity: eligible_new - planned,
            next_card,
        })
    }

    /// Earliest due card in scope.
    pub fn next_card(
        &self,
        now: DateTime<Utc>,
        selected_preset: Option<Uuid>,
    ) -> Result<Option<Card>> {
        let books = self.books.find_all()?;
        let preset = active_preset(self.presets, selected_preset)?;
        let scope = resolve_scope(preset.as_ref(), &books);
        let due = self.cards.find_due(&scope, now)?;
        Ok(next_due(&due).cloned())
    }

    /// Apply a rating to one card and log it.
    pub fn submit_review(
        &self,
        card_id: Uuid,
        rating: Rating,
        now: DateTime<Utc>,
        study_date: NaiveDate,
    ) -> Result<ReviewOutcome> {
        let card = self
            .cards
            .find_by_id(card_id)?
            .ok_or(CoreError::CardNotFound(card_id))?;
        let book = self
            .books
            .find_by_id(card.book_id)?
            .ok_or(CoreError::BookNotFound(card.book_id))?;

        let updated = self.scheduler.review(&card, book.mode, rating, now);
        let difficulty = (!card.is_new()).then_some(card.difficulty);
        let lex = self.lex(book.mode, difficulty);
        let log = ReviewLog {
            card_id,
            book_id: book.id,
            reviewed_at: now,
            study_date,
            rating,
            previous_status: card.status,
            lex,
        };
        self.reviews.record_review(card_id, &CardPatch::scheduling(&updated), &log)?;

        tracing::debug!(
            %card_id,
            rating = rating.to_value(),
            from = card.status.as_str(),
            to = updated.status.as_str(),
            scheduled_days = updated.scheduled_days,
            "applied review"
        );
        Ok(ReviewOutcome {
            card: updated,
            previous_status: card.status,
            lex,
        })
    }

    /// Submit `items` one by one, stopping at the first failure.
    pub fn submit_bulk(
        &self,
        items: &[BulkItem],
        now: DateTime<Utc>,
        study_date: NaiveDate,
    ) -> BulkOutcome {
        for (i, item) in items.iter().enumerate() {
            let result = Rating::try_from(item.rating)
                .and_then(|rating| self.submit_review(item.card_id, rating, now, study_date));
            if let Err(err) = result {
                tracing::warn!(card_id = %item.card_id, error = %err, "bulk review stopped");
                return BulkOutcome {
                    succeeded: i,
                    failed: Some(BulkFailure {
                        card_id: item.card_id,
                        error: err.to_string(),
                    }),
                    remaining: items.len() - i - 1,
                };
            }
        }
        BulkOutcome {
            succeeded: items.len(),
            failed: None,
            remaining: 0,
        }
    }
}

/// Earliest `due`; the first one wins ties.
fn next_due(cards: &[Card]) -> Option<&Card> {
    cards.iter().min_by_key(|c| c.due)
}
