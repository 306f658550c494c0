//! Core types for the study tracker.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// How a book is studied. Determines its point value and review layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookMode {
    Read,
    Solve,
    Memorize,
}

impl BookMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Solve => "solve",
            Self::Memorize => "memorize",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "solve" => Some(Self::Solve),
            "memorize" => Some(Self::Memorize),
            _ => None,
        }
    }
}

/// Book progress status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Active,
    Completed,
    Frozen,
}

impl Default for BookStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Frozen => "frozen",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "frozen" => Some(Self::Frozen),
            _ => None,
        }
    }
}

/// Route priority. Main-line books are ordered before branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Branch,
    MainLine,
}

impl Default for Priority {
    fn default() -> Self {
        Self::MainLine
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::MainLine => "main_line",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "branch" => Some(Self::Branch),
            "main_line" => Some(Self::MainLine),
            _ => None,
        }
    }

    /// Sort rank: lower comes first.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::MainLine => 0,
            Self::Branch => 1,
        }
    }
}

/// A registered study material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub mode: BookMode,
    pub total_unit: u32,
    pub chunk_size: u32,
    pub completed_unit: u32,
    pub status: BookStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_book_id: Option<Uuid>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_completion_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Create an active main-line book with a fresh id.
    ///
    /// `total_unit` and `chunk_size` are clamped to at least 1.
    pub fn new(
        title: impl Into<String>,
        mode: BookMode,
        total_unit: u32,
        chunk_size: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            mode,
            total_unit: total_unit.max(1),
            chunk_size: chunk_size.max(1),
            completed_unit: 0,
            status: BookStatus::Active,
            previous_book_id: None,
            priority: Priority::MainLine,
            target_completion_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_previous(mut self, previous_book_id: Uuid) -> Self {
        self.previous_book_id = Some(previous_book_id);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: BookStatus) -> Self {
        self.status = status;
        self
    }

    /// Number of cards the book is sliced into: `ceil(total_unit / chunk_size)`.
    pub fn card_count(&self) -> u32 {
        let chunk = self.chunk_size.max(1);
        let total = self.total_unit.max(1);
        total.div_ceil(chunk)
    }

    pub fn is_completed(&self) -> bool {
        self.status == BookStatus::Completed
    }
}

/// Card learning status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    New,
    Learning,
    Review,
    Relearning,
}

impl Default for CardStatus {
    fn default() -> Self {
        Self::New
    }
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }

    /// Unknown values read back as `New`.
    pub fn parse(s: &str) -> Self {
        match s {
            "learning" => Self::Learning,
            "review" => Self::Review,
            "relearning" => Self::Relearning,
            _ => Self::New,
        }
    }
}

/// Rating for a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    /// Convert to 4-point numeric value (1-4).
    pub fn to_value(self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Create from 4-point numeric value.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or(CoreError::InvalidRating(value))
    }
}

/// Review unit covering one chunk of a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub book_id: Uuid,
    pub unit_index: u32,
    pub status: CardStatus,
    pub stability: f64,
    pub difficulty: f64,
    pub scheduled_days: f64,
    pub reps: u32,
    pub lapses: u32,
    pub due: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_path: Option<String>,
}

impl Card {
    /// Deterministic card id for a unit of a book.
    pub fn derive_id(book_id: Uuid, unit_index: u32) -> Uuid {
        Uuid::new_v5(&book_id, &unit_index.to_be_bytes())
    }

    /// A fresh card, due immediately.
    pub fn new(book_id: Uuid, unit_index: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Self::derive_id(book_id, unit_index),
            book_id,
            unit_index,
            status: CardStatus::New,
            stability: 0.0,
            difficulty: 0.0,
            scheduled_days: 0.0,
            reps: 0,
            lapses: 0,
            due: now,
            last_review: None,
            photo_path: None,
        }
    }

    /// Days since the last review, never negative.
    ///
    /// Cards without a recorded review fall back to `due - scheduled_days`.
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> f64 {
        let last_review = match self.last_review {
            Some(at) => at,
            None => {
                let secs = (self.scheduled_days.max(0.0) * 86400.0) as i64;
                self.due - chrono::Duration::seconds(secs)
            }
        };
        let elapsed = now.signed_duration_since(last_review);
        (elapsed.num_seconds() as f64 / 86400.0).max(0.0)
    }

    pub fn is_new(&self) -> bool {
        self.status == CardStatus::New
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_new() && self.due <= now
    }
}

/// Ledger row kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Daily,
    Adjustment,
    ItemPurchase,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Adjustment => "adjustment",
            Self::ItemPurchase => "item_purchase",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "adjustment" => Some(Self::Adjustment),
            "item_purchase" => Some(Self::ItemPurchase),
            _ => None,
        }
    }
}

/// One row of the Lex ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Assigned by the store; 0 before insertion.
    pub id: i64,
    pub date: NaiveDate,
    pub earned_lex: i64,
    pub target_lex: i64,
    pub balance: i64,
    pub transaction_type: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Named subset of books that scopes the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPreset {
    pub id: Uuid,
    pub label: String,
    pub book_ids: Vec<Uuid>,
    pub is_default: bool,
}

/// Record of one applied review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
    pub card_id: Uuid,
    pub book_id: Uuid,
    pub reviewed_at: DateTime<Utc>,
    pub study_date: NaiveDate,
    pub rating: Rating,
    pub previous_status: CardStatus,
    pub lex: i64,
}

impl ReviewLog {
    /// Whether this review introduced the card for the first time.
    pub fn introduced_card(&self) -> bool {
        self.previous_status == CardStatus::New
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_count_rounds_up() {
        let now = Utc::now();
        assert_eq!(Book::new("a", BookMode::Read, 100, 10, now).card_count(), 10);
        assert_eq!(Book::new("b", BookMode::Read, 101, 10, now).card_count(), 11);
        assert_eq!(Book::new("c", BookMode::Read, 3, 10, now).card_count(), 1);
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let book = Book::new("a", BookMode::Solve, 0, 0, Utc::now());
        assert_eq!(book.total_unit, 1);
        assert_eq!(book.chunk_size, 1);
        assert_eq!(book.card_count(), 1);
    }

    #[test]
    fn card_id_is_deterministic() {
        let book_id = Uuid::new_v4();
        assert_eq!(Card::derive_id(book_id, 3), Card::derive_id(book_id, 3));
        assert_ne!(Card::derive_id(book_id, 3), Card::derive_id(book_id, 4));
        assert_ne!(Card::derive_id(book_id, 3), Card::derive_id(Uuid::new_v4(), 3));
    }

    #[test]
    fn elapsed_days_clamped_for_early_review() {
        let now = Utc::now();
        let mut card = Card::new(Uuid::new_v4(), 1, now);
        card.last_review = Some(now + chrono::Duration::days(2));
        assert_eq!(card.elapsed_days(now), 0.0);
    }

    #[test]
    fn elapsed_days_without_last_review_uses_due() {
        let now = Utc::now();
        let mut card = Card::new(Uuid::new_v4(), 1, now);
        card.scheduled_days = 3.0;
        card.due = now - chrono::Duration::days(1);
        assert!((card.elapsed_days(now) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn rating_codes() {
        assert_eq!(Rating::try_from(3).ok(), Some(Rating::Good));
        assert!(matches!(Rating::try_from(0), Err(CoreError::InvalidRating(0))));
        assert!(matches!(Rating::try_from(5), Err(CoreError::InvalidRating(5))));
    }

    #[test]
    fn enum_string_forms() {
        for mode in [BookMode::Read, BookMode::Solve, BookMode::Memorize] {
            assert_eq!(BookMode::parse(mode.as_str()), Some(mode));
        }
        for ty in [
            TransactionType::Daily,
            TransactionType::Adjustment,
            TransactionType::ItemPurchase,
        ] {
            assert_eq!(TransactionType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(CardStatus::parse("garbage"), CardStatus::New);
    }
}
