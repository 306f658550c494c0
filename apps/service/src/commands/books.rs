//! Book registration and card edit commands.

use chrono::{DateTime, NaiveDate, Utc};
use lexquest_core::books::{self, RechunkOutcome};
use lexquest_core::{Book, BookMode, BookStatus, BookStore, Card, CardStatus, CardStore, Priority};
use uuid::Uuid;

use crate::db::SqliteRepository;
use crate::state::AppState;

use super::CommandError;

#[derive(Debug, serde::Deserialize)]
pub struct NewBookRequest {
    pub title: String,
    pub mode: BookMode,
    pub total_unit: u32,
    pub chunk_size: u32,
    #[serde(default)]
    pub previous_book_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub target_completion_date: Option<NaiveDate>,
}

/// A book with its card counts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BookSummary {
    #[serde(flatten)]
    pub book: Book,
    pub card_count: usize,
    pub new_count: usize,
    pub learning_count: usize,
    pub review_count: usize,
    pub due_count: usize,
}

fn summarize(
    repo: &SqliteRepository,
    book: Book,
    now: DateTime<Utc>,
) -> Result<BookSummary, CommandError> {
    let count = |status| repo.count_by_book_and_state(book.id, status);
    let new_count = count(CardStatus::New)?;
    let learning_count = count(CardStatus::Learning)? + count(CardStatus::Relearning)?;
    let review_count = count(CardStatus::Review)?;
    let due_count = repo.find_due(&[book.id], now)?.len();
    Ok(BookSummary {
        card_count: new_count + learning_count + review_count,
        new_count,
        learning_count,
        review_count,
        due_count,
        book,
    })
}

/// Register a book and generate its cards.
pub async fn create_book(
    request: NewBookRequest,
    state: &AppState,
) -> Result<BookSummary, CommandError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(CommandError::new("title must not be empty"));
    }
    let now = state.now();
    let mut book = Book::new(title, request.mode, request.total_unit, request.chunk_size, now);
    book.previous_book_id = request.previous_book_id;
    book.priority = request.priority.unwrap_or_default();
    book.target_completion_date = request.target_completion_date;

    let repo = state.repo()?;
    books::register_book(&*repo, &*repo, &book, now)?;
    summarize(&repo, book, now)
}

/// List all books in creation order.
pub async fn list_books(state: &AppState) -> Result<Vec<BookSummary>, CommandError> {
    let now = state.now();
    let repo = state.repo()?;
    BookStore::find_all(&*repo)?
        .into_iter()
        .map(|book| summarize(&repo, book, now))
        .collect()
}

/// Mark a book active, completed or frozen.
pub async fn set_book_status(
    book_id: Uuid,
    status: BookStatus,
    state: &AppState,
) -> Result<Book, CommandError> {
    let now = state.now();
    let repo = state.repo()?;
    books::set_book_status(&*repo, book_id, status, now).map_err(Into::into)
}

/// Change a book's size or chunking.
pub async fn rechunk_book(
    book_id: Uuid,
    total_unit: u32,
    chunk_size: u32,
    state: &AppState,
) -> Result<RechunkOutcome, CommandError> {
    let now = state.now();
    let repo = state.repo()?;
    books::rechunk_book(&*repo, &*repo, book_id, total_unit, chunk_size, now).map_err(Into::into)
}

/// Delete a book and its cards.
pub async fn delete_book(book_id: Uuid, state: &AppState) -> Result<bool, CommandError> {
    let repo = state.repo()?;
    let deleted = repo.delete_book(book_id)?;
    if deleted {
        tracing::info!(%book_id, "deleted book");
    }
    Ok(deleted)
}

/// Reset a card back to New.
pub async fn reset_card(card_id: Uuid, state: &AppState) -> Result<Card, CommandError> {
    let now = state.now();
    let repo = state.repo()?;
    books::reset_card_by_id(&*repo, card_id, now).map_err(Into::into)
}

/// Change or clear a book's prerequisite.
pub async fn set_prerequisite(
    book_id: Uuid,
    previous_book_id: Option<Uuid>,
    state: &AppState,
) -> Result<Book, CommandError> {
    let now = state.now();
    let repo = state.repo()?;
    books::set_prerequisite(&*repo, book_id, previous_book_id, now).map_err(Into::into)
}
