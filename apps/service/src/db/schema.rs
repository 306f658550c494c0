//! SQLite schema definitions.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema for the local SQLite database.
pub const SCHEMA: &str = r#"
-- Study materials
CREATE TABLE IF NOT EXISTS books (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    mode TEXT NOT NULL,
    total_unit INTEGER NOT NULL CHECK (total_unit >= 1),
    chunk_size INTEGER NOT NULL CHECK (chunk_size >= 1),
    completed_unit INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    previous_book_id TEXT,
    priority TEXT NOT NULL DEFAULT 'main_line',
    target_completion_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- One card per chunk of a book, with its memory state
CREATE TABLE IF NOT EXISTS cards (
    id TEXT PRIMARY KEY,
    book_id TEXT NOT NULL REFERENCES books(id) ON DELETE CASCADE,
    unit_index INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'new',
    stability REAL NOT NULL DEFAULT 0,
    difficulty REAL NOT NULL DEFAULT 0,
    scheduled_days REAL NOT NULL DEFAULT 0,
    reps INTEGER NOT NULL DEFAULT 0,
    lapses INTEGER NOT NULL DEFAULT 0,
    due TEXT NOT NULL,
    last_review TEXT,
    photo_path TEXT,
    UNIQUE (book_id, unit_index)
);

-- Applied reviews
CREATE TABLE IF NOT EXISTS review_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    card_id TEXT NOT NULL,
    book_id TEXT NOT NULL,
    reviewed_at TEXT NOT NULL,
    study_date TEXT NOT NULL,
    rating INTEGER NOT NULL,
    previous_status TEXT NOT NULL,
    lex INTEGER NOT NULL
);

-- Lex ledger (append-only)
CREATE TABLE IF NOT EXISTS ledger (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    earned_lex INTEGER NOT NULL,
    target_lex INTEGER NOT NULL,
    balance INTEGER NOT NULL,
    transaction_type TEXT NOT NULL,
    note TEXT
);

-- Inventory presets
CREATE TABLE IF NOT EXISTS presets (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    book_ids TEXT NOT NULL DEFAULT '[]',
    is_default INTEGER NOT NULL DEFAULT 0
);

-- App settings
CREATE TABLE IF NOT EXISTS app_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    daily_target INTEGER,
    selected_preset TEXT
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_books_created ON books(created_at);
CREATE INDEX IF NOT EXISTS idx_cards_due ON cards(status, due);
CREATE INDEX IF NOT EXISTS idx_review_log_date ON review_log(study_date);
CREATE INDEX IF NOT EXISTS idx_ledger_order ON ledger(date, id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_daily_date ON ledger(date) WHERE transaction_type = 'daily';
"#;

/// Initialize app settings if not exists.
pub const INIT_APP_SETTINGS: &str = r#"
INSERT OR IGNORE INTO app_settings (id) VALUES (1);
"#;
