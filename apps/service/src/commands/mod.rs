//! Commands exposed to the UI layer.

pub mod books;
pub mod ledger;
pub mod route;
pub mod settings;
pub mod study;

use lexquest_core::{CoreError, StoreError};

/// Error returned by every command, serializable for the UI boundary.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CommandError {}

impl From<crate::db::DbError> for CommandError {
    fn from(e: crate::db::DbError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

impl From<CoreError> for CommandError {
    fn from(e: CoreError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

pub use books::{
    create_book, delete_book, list_books, rechunk_book, reset_card, set_book_status,
    set_prerequisite, BookSummary, NewBookRequest,
};
pub use ledger::{
    audit_ledger, check_and_perform_rollover, get_ledger_history, record_adjustment,
    record_purchase,
};
pub use route::get_route;
pub use settings::{
    delete_preset, get_settings, list_presets, save_preset, select_preset, set_daily_target,
    set_lex, set_retention, SettingsView,
};
pub use study::{
    get_card_forecast, get_quest, next_card, submit_bulk, submit_review, CardForecast,
    ReviewRequest,
};
