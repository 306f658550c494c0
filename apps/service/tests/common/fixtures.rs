//! Test fixtures and factory functions.

use chrono::{DateTime, NaiveDate, Utc};
use lexquest_core::{BookMode, BulkItem, CardStatus, InventoryPreset, Priority, Rating, ReviewLog};
use uuid::Uuid;

use lexquest_service::commands::NewBookRequest;

/// A book request with `total_unit` units in chunks of `chunk_size`.
pub fn book_request(
    title: &str,
    mode: BookMode,
    total_unit: u32,
    chunk_size: u32,
) -> NewBookRequest {
    NewBookRequest {
        title: title.to_string(),
        mode,
        total_unit,
        chunk_size,
        previous_book_id: None,
        priority: None,
        target_completion_date: None,
    }
}

/// A Read book with one card per unit.
pub fn read_book(title: &str, cards: u32) -> NewBookRequest {
    book_request(title, BookMode::Read, cards, 1)
}

/// A Read book that depends on `previous`.
pub fn chained_book(title: &str, cards: u32, previous: Uuid) -> NewBookRequest {
    NewBookRequest {
        previous_book_id: Some(previous),
        ..read_book(title, cards)
    }
}

pub fn prioritized_book(title: &str, cards: u32, priority: Priority) -> NewBookRequest {
    NewBookRequest {
        priority: Some(priority),
        ..read_book(title, cards)
    }
}

/// A non-default preset over `book_ids`.
pub fn preset(label: &str, book_ids: Vec<Uuid>) -> InventoryPreset {
    InventoryPreset {
        id: Uuid::new_v4(),
        label: label.to_string(),
        book_ids,
        is_default: false,
    }
}

/// A review log for a card that was already in review.
pub fn review_log(
    book_id: Uuid,
    lex: i64,
    study_date: NaiveDate,
    reviewed_at: DateTime<Utc>,
) -> ReviewLog {
    ReviewLog {
        card_id: Uuid::new_v4(),
        book_id,
        reviewed_at,
        study_date,
        rating: Rating::Good,
        previous_status: CardStatus::Review,
        lex,
    }
}

/// One entry of a bulk submission.
pub fn bulk_item(card_id: Uuid, rating: u8) -> BulkItem {
    BulkItem { card_id, rating }
}
