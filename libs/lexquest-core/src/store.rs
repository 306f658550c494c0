//! Repository traits the engine reads and writes through.
//!
//! The engine never assumes a storage technology. `memory::MemoryStore`
//! implements every trait for tests; the service crate implements them over
//! SQLite.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{Book, Card, CardStatus, InventoryPreset, LedgerEntry, ReviewLog};

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Partial update of a card. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardPatch {
    pub unit_index: Option<u32>,
    pub status: Option<CardStatus>,
    pub stability: Option<f64>,
    pub difficulty: Option<f64>,
    pub scheduled_days: Option<f64>,
    pub reps: Option<u32>,
    pub lapses: Option<u32>,
    pub due: Option<DateTime<Utc>>,
    pub last_review: Option<Option<DateTime<Utc>>>,
    pub photo_path: Option<Option<String>>,
}

impl CardPatch {
    /// Patch carrying every scheduling field of `card`.
    pub fn scheduling(card: &Card) -> Self {
        Self {
            unit_index: None,
            status: Some(card.status),
            stability: Some(card.stability),
            difficulty: Some(card.difficulty),
            scheduled_days: Some(card.scheduled_days),
            reps: Some(card.reps),
            lapses: Some(card.lapses),
            due: Some(card.due),
            last_review: Some(card.last_review),
            photo_path: None,
        }
    }

    /// Apply the patch to an in-memory card.
    pub fn apply(&self, card: &mut Card) {
        if let Some(v) = self.unit_index {
            card.unit_index = v;
        }
        if let Some(v) = self.status {
            card.status = v;
        }
        if let Some(v) = self.stability {
            card.stability = v;
        }
        if let Some(v) = self.difficulty {
            card.difficulty = v;
        }
        if let Some(v) = self.scheduled_days {
            card.scheduled_days = v;
        }
        if let Some(v) = self.reps {
            card.reps = v;
        }
        if let Some(v) = self.lapses {
            card.lapses = v;
        }
        if let Some(v) = self.due {
            card.due = v;
        }
        if let Some(v) = self.last_review {
            card.last_review = v;
        }
        if let Some(v) = &self.photo_path {
            card.photo_path = v.clone();
        }
    }
}

/// Outcome of a ledger insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row stored under the returned id.
    Inserted(i64),
    /// A `daily` row for that date already exists; nothing was written.
    DuplicateDate,
}

/// Repository for card operations.
pub trait CardStore {
    /// Non-new cards of `book_ids` with `due <= now`, ordered by due then book/unit.
    fn find_due(&self, book_ids: &[Uuid], now: DateTime<Utc>) -> Result<Vec<Card>>;
    /// New cards of `book_ids` in unit order.
    fn find_new(&self, book_ids: &[Uuid]) -> Result<Vec<Card>>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<Card>>;
    /// All cards of a book in unit order.
    fn find_by_book(&self, book_id: Uuid) -> Result<Vec<Card>>;
    fn update(&self, id: Uuid, patch: &CardPatch) -> Result<()>;
    /// Insert cards, skipping ids that already exist.
    fn bulk_create(&self, cards: &[Card]) -> Result<()>;
    fn count_by_book_and_state(&self, book_id: Uuid, status: CardStatus) -> Result<usize>;
    /// Delete cards of a book with `unit_index > max_unit`. Returns the count removed.
    fn delete_by_book_beyond(&self, book_id: Uuid, max_unit: u32) -> Result<usize>;
}

/// Repository for book operations.
pub trait BookStore {
    /// All books in creation order.
    fn find_all(&self) -> Result<Vec<Book>>;
    fn find_active(&self) -> Result<Vec<Book>>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<Book>>;
    fn insert(&self, book: &Book) -> Result<()>;
    fn update(&self, book: &Book) -> Result<()>;
}

/// Repository for the Lex ledger.
pub trait LedgerStore {
    /// Most recent `n` rows, newest first.
    fn get_recent(&self, n: usize) -> Result<Vec<LedgerEntry>>;
    /// Every row, ordered by date then id.
    fn get_all(&self) -> Result<Vec<LedgerEntry>>;
    /// Latest `daily` row.
    fn latest_daily(&self) -> Result<Option<LedgerEntry>>;
    /// Insert a row. Must never store a second `daily` row for a date.
    fn insert(&self, entry: &LedgerEntry) -> Result<InsertOutcome>;
}

/// Repository for inventory presets.
pub trait PresetStore {
    fn find_all(&self) -> Result<Vec<InventoryPreset>>;
    fn find_default(&self) -> Result<Option<InventoryPreset>>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<InventoryPreset>>;
}

/// Repository for applied reviews.
pub trait ReviewLogStore {
    /// Apply `patch` to a card and append `log` as one unit: if either
    /// write fails, neither is kept.
    fn record_review(&self, card_id: Uuid, patch: &CardPatch, log: &ReviewLog) -> Result<()>;
    fn find_by_date(&self, study_date: NaiveDate) -> Result<Vec<ReviewLog>>;
}
