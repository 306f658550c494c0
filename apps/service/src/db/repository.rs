//! SQLite implementation of the engine's repositories.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use lexquest_core::calendar::format_date;
use lexquest_core::ledger::TargetSource;
use lexquest_core::store::{self, CardPatch, InsertOutcome};
use lexquest_core::{
    Book, BookMode, BookStatus, BookStore, Card, CardStatus, CardStore, CollaboratorError,
    InventoryPreset, LedgerEntry, LedgerStore, PresetStore, Priority, Rating, ReviewLog,
    ReviewLogStore, TransactionType,
};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

use crate::db::error::DbError;

type Result<T> = std::result::Result<T, DbError>;

const BOOK_COLUMNS: &str = "id, title, mode, total_unit, chunk_size, completed_unit, status, \
     previous_book_id, priority, target_completion_date, created_at, updated_at";

const CARD_COLUMNS: &str = "id, book_id, unit_index, status, stability, difficulty, \
     scheduled_days, reps, lapses, due, last_review, photo_path";

const LEDGER_COLUMNS: &str = "id, date, earned_lex, target_lex, balance, transaction_type, note";

/// Fixed-width UTC timestamps so text comparison matches time order.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn invalid(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(DbError::InvalidData(message)),
    )
}

fn get_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| invalid(idx, format!("bad uuid '{s}': {e}")))
}

fn get_opt_uuid(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| Uuid::parse_str(&s).map_err(|e| invalid(idx, format!("bad uuid '{s}': {e}"))))
        .transpose()
}

fn parse_time(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid(idx, format!("bad timestamp '{s}': {e}")))
}

fn get_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_time(idx, &s)
}

fn get_opt_time(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| parse_time(idx, &s)).transpose()
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| invalid(idx, format!("bad date '{s}': {e}")))
}

fn get_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    parse_date(idx, &s)
}

/// Enum column that reads an unrecognized value as `fallback`, so one bad
/// row cannot fail a whole listing.
fn get_enum_or<T>(
    row: &Row,
    idx: usize,
    parse: fn(&str) -> Option<T>,
    fallback: T,
) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    Ok(parse(&s).unwrap_or_else(|| {
        let column = row.as_ref().column_name(idx).unwrap_or("?");
        tracing::warn!(column, value = %s, "unrecognized value, using fallback");
        fallback
    }))
}

/// `?start, ?start+1, ...` for an IN list of `n` values.
fn placeholders(start: usize, n: usize) -> String {
    (start..start + n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SQLite implementation of repositories.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(super::schema::SCHEMA)?;
        self.conn.execute_batch(super::schema::INIT_APP_SETTINGS)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![super::schema::SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Highest applied schema version.
    pub fn schema_version(&self) -> Result<i32> {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Delete a book and its cards. Books that listed it as prerequisite
    /// keep the dangling id, which the route treats as "no prerequisite".
    pub fn delete_book(&self, id: Uuid) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM books WHERE id = ?1", params![id.to_string()])?;
        Ok(count > 0)
    }

    /// Insert or replace a preset. A default preset clears the flag on the others.
    pub fn save_preset(&self, preset: &InventoryPreset) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        if preset.is_default {
            tx.execute("UPDATE presets SET is_default = 0", [])?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO presets (id, label, book_ids, is_default) VALUES (?1, ?2, ?3, ?4)",
            params![
                preset.id.to_string(),
                preset.label,
                serde_json::to_string(&preset.book_ids)?,
                preset.is_default
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_preset(&self, id: Uuid) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM presets WHERE id = ?1", params![id.to_string()])?;
        Ok(count > 0)
    }

    /// Persisted daily target, if the user set one.
    pub fn stored_daily_target(&self) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT daily_target FROM app_settings WHERE id = 1", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn set_daily_target(&self, target: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE app_settings SET daily_target = ?1 WHERE id = 1",
            params![target],
        )?;
        Ok(())
    }

    pub fn selected_preset(&self) -> Result<Option<Uuid>> {
        let value: Option<String> = self.conn.query_row(
            "SELECT selected_preset FROM app_settings WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        value
            .map(|s| {
                Uuid::parse_str(&s)
                    .map_err(|e| DbError::InvalidData(format!("bad preset id '{s}': {e}")))
            })
            .transpose()
    }

    pub fn set_selected_preset(&self, preset: Option<Uuid>) -> Result<()> {
        self.conn.execute(
            "UPDATE app_settings SET selected_preset = ?1 WHERE id = 1",
            params![preset.map(|id| id.to_string())],
        )?;
        Ok(())
    }

    fn row_to_book(row: &Row) -> rusqlite::Result<Book> {
        let target: Option<String> = row.get(9)?;
        Ok(Book {
            id: get_uuid(row, 0)?,
            title: row.get(1)?,
            mode: get_enum_or(row, 2, BookMode::parse, BookMode::Read)?,
            total_unit: row.get(3)?,
            chunk_size: row.get(4)?,
            completed_unit: row.get(5)?,
            status: get_enum_or(row, 6, BookStatus::parse, BookStatus::Active)?,
            previous_book_id: get_opt_uuid(row, 7)?,
            priority: get_enum_or(row, 8, Priority::parse, Priority::MainLine)?,
            target_completion_date: target.map(|s| parse_date(9, &s)).transpose()?,
            created_at: get_time(row, 10)?,
            updated_at: get_time(row, 11)?,
        })
    }

    fn row_to_card(row: &Row) -> rusqlite::Result<Card> {
        let status: String = row.get(3)?;
        Ok(Card {
            id: get_uuid(row, 0)?,
            book_id: get_uuid(row, 1)?,
            unit_index: row.get(2)?,
            status: CardStatus::parse(&status),
            stability: row.get::<_, f64>(4)?.max(0.0),
            difficulty: row.get(5)?,
            scheduled_days: row.get(6)?,
            reps: row.get(7)?,
            lapses: row.get(8)?,
            due: get_time(row, 9)?,
            last_review: get_opt_time(row, 10)?,
            photo_path: row.get(11)?,
        })
    }

    fn row_to_entry(row: &Row) -> rusqlite::Result<LedgerEntry> {
        Ok(LedgerEntry {
            id: row.get(0)?,
            date: get_date(row, 1)?,
            earned_lex: row.get(2)?,
            target_lex: row.get(3)?,
            balance: row.get(4)?,
            transaction_type: get_enum_or(
                row,
                5,
                TransactionType::parse,
                TransactionType::Adjustment,
            )?,
            note: row.get(6)?,
        })
    }

    fn row_to_preset(row: &Row) -> rusqlite::Result<InventoryPreset> {
        let book_ids: String = row.get(2)?;
        Ok(InventoryPreset {
            id: get_uuid(row, 0)?,
            label: row.get(1)?,
            book_ids: serde_json::from_str(&book_ids)
                .map_err(|e| invalid(2, format!("bad book id list: {e}")))?,
            is_default: row.get(3)?,
        })
    }

    fn row_to_review(row: &Row) -> rusqlite::Result<ReviewLog> {
        let rating: u8 = row.get(4)?;
        let previous: String = row.get(5)?;
        Ok(ReviewLog {
            card_id: get_uuid(row, 0)?,
            book_id: get_uuid(row, 1)?,
            reviewed_at: get_time(row, 2)?,
            study_date: get_date(row, 3)?,
            rating: Rating::from_value(rating)
                .ok_or_else(|| invalid(4, format!("bad rating {rating}")))?,
            previous_status: CardStatus::parse(&previous),
            lex: row.get(6)?,
        })
    }

    fn query_cards(&self, sql: &str, values: Vec<String>) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(sql)?;
        let cards = stmt
            .query_map(params_from_iter(values), Self::row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    fn load_due(&self, book_ids: &[Uuid], now: DateTime<Utc>) -> Result<Vec<Card>> {
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards
             WHERE status != 'new' AND due <= ?1 AND book_id IN ({})
             ORDER BY due, book_id, unit_index",
            placeholders(2, book_ids.len())
        );
        let mut values = vec![ts(now)];
        values.extend(book_ids.iter().map(Uuid::to_string));
        self.query_cards(&sql, values)
    }

    fn load_new(&self, book_ids: &[Uuid]) -> Result<Vec<Card>> {
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards
             WHERE status = 'new' AND book_id IN ({})
             ORDER BY book_id, unit_index",
            placeholders(1, book_ids.len())
        );
        self.query_cards(&sql, book_ids.iter().map(Uuid::to_string).collect())
    }

    fn load_card(&self, id: Uuid) -> Result<Option<Card>> {
        self.conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
                params![id.to_string()],
                Self::row_to_card,
            )
            .optional()
            .map_err(Into::into)
    }

    fn write_card(&self, card: &Card) -> Result<()> {
        self.conn.execute(
            "UPDATE cards SET unit_index = ?2, status = ?3, stability = ?4, difficulty = ?5,
                scheduled_days = ?6, reps = ?7, lapses = ?8, due = ?9, last_review = ?10,
                photo_path = ?11
             WHERE id = ?1",
            params![
                card.id.to_string(),
                card.unit_index,
                card.status.as_str(),
                card.stability,
                card.difficulty,
                card.scheduled_days,
                card.reps,
                card.lapses,
                ts(card.due),
                card.last_review.map(ts),
                card.photo_path,
            ],
        )?;
        Ok(())
    }

    fn insert_cards(&self, cards: &[Card]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO cards ({CARD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ))?;
            for card in cards {
                stmt.execute(params![
                    card.id.to_string(),
                    card.book_id.to_string(),
                    card.unit_index,
                    card.status.as_str(),
                    card.stability,
                    card.difficulty,
                    card.scheduled_days,
                    card.reps,
                    card.lapses,
                    ts(card.due),
                    card.last_review.map(ts),
                    card.photo_path,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query_books(&self, filter: &str) -> Result<Vec<Book>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books {filter} ORDER BY created_at, rowid"
        ))?;
        let books = stmt
            .query_map([], Self::row_to_book)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn load_book(&self, id: Uuid) -> Result<Option<Book>> {
        self.conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                params![id.to_string()],
                Self::row_to_book,
            )
            .optional()
            .map_err(Into::into)
    }

    fn book_params(book: &Book) -> [Box<dyn rusqlite::ToSql>; 12] {
        [
            Box::new(book.id.to_string()),
            Box::new(book.title.clone()),
            Box::new(book.mode.as_str()),
            Box::new(book.total_unit.max(1)),
            Box::new(book.chunk_size.max(1)),
            Box::new(book.completed_unit),
            Box::new(book.status.as_str()),
            Box::new(book.previous_book_id.map(|id| id.to_string())),
            Box::new(book.priority.as_str()),
            Box::new(book.target_completion_date.map(format_date)),
            Box::new(ts(book.created_at)),
            Box::new(ts(book.updated_at)),
        ]
    }

    fn write_book(&self, book: &Book, insert: bool) -> Result<()> {
        let sql = if insert {
            format!(
                "INSERT OR IGNORE INTO books ({BOOK_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            )
        } else {
            "UPDATE books SET title = ?2, mode = ?3, total_unit = ?4, chunk_size = ?5,
                completed_unit = ?6, status = ?7, previous_book_id = ?8, priority = ?9,
                target_completion_date = ?10, created_at = ?11, updated_at = ?12
             WHERE id = ?1"
                .to_string()
        };
        let values = Self::book_params(book);
        self.conn
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;
        Ok(())
    }

    fn query_ledger(&self, sql: &str, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = match limit {
            Some(n) => stmt.query_map(params![n as i64], Self::row_to_entry)?,
            None => stmt.query_map([], Self::row_to_entry)?,
        };
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    fn insert_entry(&self, entry: &LedgerEntry) -> Result<InsertOutcome> {
        let result = self.conn.execute(
            "INSERT INTO ledger (date, earned_lex, target_lex, balance, transaction_type, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                format_date(entry.date),
                entry.earned_lex,
                entry.target_lex,
                entry.balance,
                entry.transaction_type.as_str(),
                entry.note,
            ],
        );
        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(self.conn.last_insert_rowid())),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Ok(InsertOutcome::DuplicateDate)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn query_presets(&self, filter: &str, values: Vec<String>) -> Result<Vec<InventoryPreset>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, label, book_ids, is_default FROM presets {filter} ORDER BY rowid"
        ))?;
        let presets = stmt
            .query_map(params_from_iter(values), Self::row_to_preset)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(presets)
    }

    fn insert_review(&self, log: &ReviewLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO review_log (card_id, book_id, reviewed_at, study_date, rating, previous_status, lex)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                log.card_id.to_string(),
                log.book_id.to_string(),
                ts(log.reviewed_at),
                format_date(log.study_date),
                log.rating.to_value(),
                log.previous_status.as_str(),
                log.lex,
            ],
        )?;
        Ok(())
    }

    /// Card write and log insert in one transaction.
    fn write_review(&self, card_id: Uuid, patch: &CardPatch, log: &ReviewLog) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        if let Some(mut card) = self.load_card(card_id)? {
            patch.apply(&mut card);
            self.write_card(&card)?;
        }
        self.insert_review(log)?;
        tx.commit()?;
        Ok(())
    }

    fn reviews_on(&self, study_date: NaiveDate) -> Result<Vec<ReviewLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT card_id, book_id, reviewed_at, study_date, rating, previous_status, lex
             FROM review_log WHERE study_date = ?1 ORDER BY id",
        )?;
        let logs = stmt
            .query_map(params![format_date(study_date)], Self::row_to_review)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}

impl CardStore for SqliteRepository {
    fn find_due(&self, book_ids: &[Uuid], now: DateTime<Utc>) -> store::Result<Vec<Card>> {
        Ok(self.load_due(book_ids, now)?)
    }

    fn find_new(&self, book_ids: &[Uuid]) -> store::Result<Vec<Card>> {
        Ok(self.load_new(book_ids)?)
    }

    fn find_by_id(&self, id: Uuid) -> store::Result<Option<Card>> {
        Ok(self.load_card(id)?)
    }

    fn find_by_book(&self, book_id: Uuid) -> store::Result<Vec<Card>> {
        Ok(self.query_cards(
            &format!("SELECT {CARD_COLUMNS} FROM cards WHERE book_id = ?1 ORDER BY unit_index"),
            vec![book_id.to_string()],
        )?)
    }

    fn update(&self, id: Uuid, patch: &CardPatch) -> store::Result<()> {
        if let Some(mut card) = self.load_card(id)? {
            patch.apply(&mut card);
            self.write_card(&card)?;
        }
        Ok(())
    }

    fn bulk_create(&self, cards: &[Card]) -> store::Result<()> {
        Ok(self.insert_cards(cards)?)
    }

    fn count_by_book_and_state(&self, book_id: Uuid, status: CardStatus) -> store::Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM cards WHERE book_id = ?1 AND status = ?2",
                params![book_id.to_string(), status.as_str()],
                |row| row.get(0),
            )
            .map_err(DbError::from)?;
        Ok(count.max(0) as usize)
    }

    fn delete_by_book_beyond(&self, book_id: Uuid, max_unit: u32) -> store::Result<usize> {
        Ok(self
            .conn
            .execute(
                "DELETE FROM cards WHERE book_id = ?1 AND unit_index > ?2",
                params![book_id.to_string(), max_unit],
            )
            .map_err(DbError::from)?)
    }
}

impl BookStore for SqliteRepository {
    fn find_all(&self) -> store::Result<Vec<Book>> {
        Ok(self.query_books("")?)
    }

    fn find_active(&self) -> store::Result<Vec<Book>> {
        Ok(self.query_books("WHERE status = 'active'")?)
    }

    fn find_by_id(&self, id: Uuid) -> store::Result<Option<Book>> {
        Ok(self.load_book(id)?)
    }

    fn insert(&self, book: &Book) -> store::Result<()> {
        Ok(self.write_book(book, true)?)
    }

    fn update(&self, book: &Book) -> store::Result<()> {
        Ok(self.write_book(book, false)?)
    }
}

impl LedgerStore for SqliteRepository {
    fn get_recent(&self, n: usize) -> store::Result<Vec<LedgerEntry>> {
        Ok(self.query_ledger(
            &format!("SELECT {LEDGER_COLUMNS} FROM ledger ORDER BY date DESC, id DESC LIMIT ?1"),
            Some(n),
        )?)
    }

    fn get_all(&self) -> store::Result<Vec<LedgerEntry>> {
        Ok(self.query_ledger(
            &format!("SELECT {LEDGER_COLUMNS} FROM ledger ORDER BY date, id"),
            None,
        )?)
    }

    fn latest_daily(&self) -> store::Result<Option<LedgerEntry>> {
        let rows = self.query_ledger(
            &format!(
                "SELECT {LEDGER_COLUMNS} FROM ledger WHERE transaction_type = 'daily'
                 ORDER BY date DESC, id DESC LIMIT ?1"
            ),
            Some(1),
        )?;
        Ok(rows.into_iter().next())
    }

    fn insert(&self, entry: &LedgerEntry) -> store::Result<InsertOutcome> {
        Ok(self.insert_entry(entry)?)
    }
}

impl PresetStore for SqliteRepository {
    fn find_all(&self) -> store::Result<Vec<InventoryPreset>> {
        Ok(self.query_presets("", Vec::new())?)
    }

    fn find_default(&self) -> store::Result<Option<InventoryPreset>> {
        Ok(self
            .query_presets("WHERE is_default = 1", Vec::new())?
            .into_iter()
            .next())
    }

    fn find_by_id(&self, id: Uuid) -> store::Result<Option<InventoryPreset>> {
        Ok(self
            .query_presets("WHERE id = ?1", vec![id.to_string()])?
            .into_iter()
            .next())
    }
}

impl ReviewLogStore for SqliteRepository {
    fn record_review(
        &self,
        card_id: Uuid,
        patch: &CardPatch,
        log: &ReviewLog,
    ) -> store::Result<()> {
        Ok(self.write_review(card_id, patch, log)?)
    }

    fn find_by_date(&self, study_date: NaiveDate) -> store::Result<Vec<ReviewLog>> {
        Ok(self.reviews_on(study_date)?)
    }
}

/// Daily target from the settings table, else the configured default.
pub struct SettingsTarget<'a> {
    repo: &'a SqliteRepository,
    default: i64,
}

impl<'a> SettingsTarget<'a> {
    pub fn new(repo: &'a SqliteRepository, default: i64) -> Self {
        Self { repo, default }
    }
}

impl TargetSource for SettingsTarget<'_> {
    fn daily_target(&self, _date: NaiveDate) -> std::result::Result<i64, CollaboratorError> {
        match self.repo.stored_daily_target() {
            Ok(target) => Ok(target.unwrap_or(self.default)),
            Err(e) => Err(CollaboratorError::Unavailable(e.to_string())),
        }
    }
}
