//! Book registration and manual card edits.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::scheduler::reset_card;
use crate::store::{BookStore, CardPatch, CardStore};
use crate::types::{Book, BookStatus, Card};

/// Cards for every chunk of `book`, unit indexes 1..=card_count.
pub fn generate_cards(book: &Book, now: DateTime<Utc>) -> Vec<Card> {
    (1..=book.card_count())
        .map(|unit_index| Card::new(book.id, unit_index, now))
        .collect()
}

/// Store a new book and its cards. Returns the number of cards generated.
///
/// Card ids are derived from the book id and unit index, so registering
/// the same book twice leaves existing cards untouched.
pub fn register_book(
    books: &dyn BookStore,
    cards: &dyn CardStore,
    book: &Book,
    now: DateTime<Utc>,
) -> Result<usize> {
    books.insert(book)?;
    let generated = generate_cards(book, now);
    cards.bulk_create(&generated)?;
    tracing::info!(
        book_id = %book.id,
        title = %book.title,
        cards = generated.len(),
        "registered book"
    );
    Ok(generated.len())
}

/// Result of re-slicing a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RechunkOutcome {
    pub card_count: u32,
    pub created: usize,
    pub removed: usize,
}

/// Change a book's size or chunking and regenerate its cards.
///
/// Cards whose unit index survives keep their memory state.
pub fn rechunk_book(
    books: &dyn BookStore,
    cards: &dyn CardStore,
    book_id: Uuid,
    total_unit: u32,
    chunk_size: u32,
    now: DateTime<Utc>,
) -> Result<RechunkOutcome> {
    if total_unit == 0 || chunk_size == 0 {
        return Err(CoreError::InvalidInput(
            "total_unit and chunk_size must be at least 1".to_string(),
        ));
    }
    let mut book = books
        .find_by_id(book_id)?
        .ok_or(CoreError::BookNotFound(book_id))?;

    book.total_unit = total_unit;
    book.chunk_size = chunk_size;
    book.completed_unit = book.completed_unit.min(total_unit);
    book.updated_at = now;
    books.update(&book)?;

    let before = cards.find_by_book(book_id)?.len();
    let card_count = book.card_count();
    let removed = cards.delete_by_book_beyond(book_id, card_count)?;
    cards.bulk_create(&generate_cards(&book, now))?;
    let created = (card_count as usize).saturating_sub(before - removed);

    tracing::info!(%book_id, card_count, created, removed, "rechunked book");
    Ok(RechunkOutcome {
        card_count,
        created,
        removed,
    })
}

/// Change a book's status, bumping `updated_at` so the route cache notices.
pub fn set_book_status(
    books: &dyn BookStore,
    book_id: Uuid,
    status: BookStatus,
    now: DateTime<Utc>,
) -> Result<Book> {
    let mut book = books
        .find_by_id(book_id)?
        .ok_or(CoreError::BookNotFound(book_id))?;
    book.status = status;
    book.updated_at = now;
    books.update(&book)?;
    Ok(book)
}

/// Point a book at a new prerequisite, or clear it with `None`.
///
/// Links that would form a cycle are stored as given; the route resolver
/// breaks them when it walks the graph.
pub fn set_prerequisite(
    books: &dyn BookStore,
    book_id: Uuid,
    previous_book_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<Book> {
    let mut book = books
        .find_by_id(book_id)?
        .ok_or(CoreError::BookNotFound(book_id))?;
    book.previous_book_id = previous_book_id;
    book.updated_at = now;
    books.update(&book)?;
    Ok(book)
}

/// Reset one card to New.
pub fn reset_card_by_id(cards: &dyn CardStore, card_id: Uuid, now: DateTime<Utc>) -> Result<Card> {
    let card = cards
        .find_by_id(card_id)?
        .ok_or(CoreError::CardNotFound(card_id))?;
    let reset = reset_card(&card, now);
    cards.update(card_id, &CardPatch::scheduling(&reset))?;
    Ok(reset)
}
