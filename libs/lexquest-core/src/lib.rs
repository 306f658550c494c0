//! Scheduling and learning-economy engine for the LexQuest study tracker.
//!
//! Provides:
//! - FSRS-style memory model and the card review state machine
//! - Prerequisite graph resolution for the book route
//! - Daily quest planning over due and new cards
//! - The Lex ledger with idempotent day rollover
//! - Repository traits and an in-memory implementation

pub mod algorithm;
pub mod books;
pub mod calendar;
pub mod config;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod memory;
pub mod quest;
pub mod scheduler;
pub mod scope;
pub mod store;
pub mod types;

pub use algorithm::{get_model, MemoryModel, MemoryState};
pub use config::{EngineConfig, LexTable, PointValue, RetentionTable};
pub use error::{CollaboratorError, CoreError, Result, StoreError};
pub use graph::{GraphCache, Resolution};
pub use ledger::{LedgerAudit, LedgerEngine, RolloverOutcome, TargetSource};
pub use memory::MemoryStore;
pub use quest::{BulkItem, BulkOutcome, QuestEngine, QuestPlan, ReviewOutcome};
pub use scheduler::Scheduler;
pub use store::{
    BookStore, CardPatch, CardStore, InsertOutcome, LedgerStore, PresetStore, ReviewLogStore,
};
pub use types::{
    Book, BookMode, BookStatus, Card, CardStatus, InventoryPreset, LedgerEntry, Priority, Rating,
    ReviewLog, TransactionType,
};
