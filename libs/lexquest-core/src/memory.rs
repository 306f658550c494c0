//! In-memory store implementing every repository trait.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{
    BookStore, CardPatch, CardStore, InsertOutcome, LedgerStore, PresetStore, Result,
    ReviewLogStore,
};
use crate::types::{
    Book, BookStatus, Card, CardStatus, InventoryPreset, LedgerEntry, ReviewLog, TransactionType,
};

/// Vector-backed store. Insertion order doubles as creation order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: Mutex<Vec<Book>>,
    cards: Mutex<Vec<Card>>,
    ledger: Mutex<Vec<LedgerEntry>>,
    presets: Mutex<Vec<InventoryPreset>>,
    reviews: Mutex<Vec<ReviewLog>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a preset. A default preset clears the flag on the others.
    pub fn add_preset(&self, preset: InventoryPreset) -> Result<()> {
        let mut presets = lock(&self.presets)?;
        if preset.is_default {
            presets.iter_mut().for_each(|p| p.is_default = false);
        }
        presets.push(preset);
        Ok(())
    }

    pub fn all_cards(&self) -> Result<Vec<Card>> {
        Ok(lock(&self.cards)?.clone())
    }
}

impl CardStore for MemoryStore {
    fn find_due(&self, book_ids: &[Uuid], now: DateTime<Utc>) -> Result<Vec<Card>> {
        let cards = lock(&self.cards)?;
        let mut due: Vec<Card> = cards
            .iter()
            .filter(|c| book_ids.contains(&c.book_id) && c.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|c| c.due);
        Ok(due)
    }

    fn find_new(&self, book_ids: &[Uuid]) -> Result<Vec<Card>> {
        let cards = lock(&self.cards)?;
        let mut fresh: Vec<Card> = cards
            .iter()
            .filter(|c| book_ids.contains(&c.book_id) && c.is_new())
            .cloned()
            .collect();
        fresh.sort_by_key(|c| c.unit_index);
        Ok(fresh)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Card>> {
        Ok(lock(&self.cards)?.iter().find(|c| c.id == id).cloned())
    }

    fn find_by_book(&self, book_id: Uuid) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = lock(&self.cards)?
            .iter()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.unit_index);
        Ok(cards)
    }

    fn update(&self, id: Uuid, patch: &CardPatch) -> Result<()> {
        let mut cards = lock(&self.cards)?;
        if let Some(card) = cards.iter_mut().find(|c| c.id == id) {
            patch.apply(card);
        }
        Ok(())
    }

    fn bulk_create(&self, new_cards: &[Card]) -> Result<()> {
        let mut cards = lock(&self.cards)?;
        for card in new_cards {
            if !cards.iter().any(|c| c.id == card.id) {
                cards.push(card.clone());
            }
        }
        Ok(())
    }

    fn count_by_book_and_state(&self, book_id: Uuid, status: CardStatus) -> Result<usize> {
        Ok(lock(&self.cards)?
            .iter()
            .filter(|c| c.book_id == book_id && c.status == status)
            .count())
    }

    fn delete_by_book_beyond(&self, book_id: Uuid, max_unit: u32) -> Result<usize> {
        let mut cards = lock(&self.cards)?;
        let before = cards.len();
        cards.retain(|c| c.book_id != book_id || c.unit_index <= max_unit);
        Ok(before - cards.len())
    }
}

impl BookStore for MemoryStore {
    fn find_all(&self) -> Result<Vec<Book>> {
        Ok(lock(&self.books)?.clone())
    }

    fn find_active(&self) -> Result<Vec<Book>> {
        Ok(lock(&self.books)?
            .iter()
            .filter(|b| b.status == BookStatus::Active)
            .cloned()
            .collect())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        Ok(lock(&self.books)?.iter().find(|b| b.id == id).cloned())
    }

    fn insert(&self, book: &Book) -> Result<()> {
        let mut books = lock(&self.books)?;
        if !books.iter().any(|b| b.id == book.id) {
            books.push(book.clone());
        }
        Ok(())
    }

    fn update(&self, book: &Book) -> Result<()> {
        let mut books = lock(&self.books)?;
        if let Some(existing) = books.iter_mut().find(|b| b.id == book.id) {
            *existing = book.clone();
        }
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn get_recent(&self, n: usize) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.get_all()?;
        entries.reverse();
        entries.truncate(n);
        Ok(entries)
    }

    fn get_all(&self) -> Result<Vec<LedgerEntry>> {
        let mut entries = lock(&self.ledger)?.clone();
        entries.sort_by_key(|e| (e.date, e.id));
        Ok(entries)
    }

    fn latest_daily(&self) -> Result<Option<LedgerEntry>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|e| e.transaction_type == TransactionType::Daily)
            .last())
    }

    fn insert(&self, entry: &LedgerEntry) -> Result<InsertOutcome> {
        let mut ledger = lock(&self.ledger)?;
        let collides = entry.transaction_type == TransactionType::Daily
            && ledger
                .iter()
                .any(|e| e.transaction_type == TransactionType::Daily && e.date == entry.date);
        if collides {
            return Ok(InsertOutcome::DuplicateDate);
        }
        let id = ledger.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        ledger.push(LedgerEntry {
            id,
            ..entry.clone()
        });
        Ok(InsertOutcome::Inserted(id))
    }
}

impl PresetStore for MemoryStore {
    fn find_all(&self) -> Result<Vec<InventoryPreset>> {
        Ok(lock(&self.presets)?.clone())
    }

    fn find_default(&self) -> Result<Option<InventoryPreset>> {
        Ok(lock(&self.presets)?.iter().find(|p| p.is_default).cloned())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<InventoryPreset>> {
        Ok(lock(&self.presets)?.iter().find(|p| p.id == id).cloned())
    }
}

impl ReviewLogStore for MemoryStore {
    fn record_review(&self, card_id: Uuid, patch: &CardPatch, log: &ReviewLog) -> Result<()> {
        let mut cards = lock(&self.cards)?;
        let mut reviews = lock(&self.reviews)?;
        if let Some(card) = cards.iter_mut().find(|c| c.id == card_id) {
            patch.apply(card);
        }
        reviews.push(log.clone());
        Ok(())
    }

    fn find_by_date(&self, study_date: NaiveDate) -> Result<Vec<ReviewLog>> {
        Ok(lock(&self.reviews)?
            .iter()
            .filter(|r| r.study_date == study_date)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookMode;

    fn daily(date: NaiveDate) -> LedgerEntry {
        LedgerEntry {
            id: 0,
            date,
            earned_lex: 10,
            target_lex: 5,
            balance: 5,
            transaction_type: TransactionType::Daily,
            note: None,
        }
    }

    #[test]
    fn daily_rows_are_unique_per_date() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert!(matches!(
            LedgerStore::insert(&store, &daily(date)).unwrap(),
            InsertOutcome::Inserted(1)
        ));
        assert_eq!(
            LedgerStore::insert(&store, &daily(date)).unwrap(),
            InsertOutcome::DuplicateDate
        );

        let adjustment = LedgerEntry {
            transaction_type: TransactionType::Adjustment,
            ..daily(date)
        };
        assert!(matches!(
            LedgerStore::insert(&store, &adjustment).unwrap(),
            InsertOutcome::Inserted(2)
        ));
        assert_eq!(store.get_all().unwrap().len(), 2);
    }

    #[test]
    fn bulk_create_is_idempotent() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let book = Book::new("b", BookMode::Read, 20, 10, now);
        let cards = vec![Card::new(book.id, 1, now), Card::new(book.id, 2, now)];
        store.bulk_create(&cards).unwrap();
        store.bulk_create(&cards).unwrap();
        assert_eq!(store.find_by_book(book.id).unwrap().len(), 2);
    }

    #[test]
    fn default_preset_is_exclusive() {
        let store = MemoryStore::new();
        for label in ["a", "b"] {
            store
                .add_preset(InventoryPreset {
                    id: Uuid::new_v4(),
                    label: label.into(),
                    book_ids: vec![],
                    is_default: true,
                })
                .unwrap();
        }
        assert_eq!(store.find_default().unwrap().unwrap().label, "b");
        let defaults = PresetStore::find_all(&store)
            .unwrap()
            .into_iter()
            .filter(|p| p.is_default)
            .count();
        assert_eq!(defaults, 1);
    }
}
