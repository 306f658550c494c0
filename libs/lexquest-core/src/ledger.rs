//! Lex ledger: daily rollover, manual entries and audit by replay.
//!
//! The ledger is append-only. Every row's `balance` is the previous row's
//! balance plus `earned_lex - target_lex`, with rows ordered by (date, id).

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::calendar::days_between;
use crate::config::EngineConfig;
use crate::error::{CollaboratorError, CoreError, Result};
use crate::store::{InsertOutcome, LedgerStore, ReviewLogStore};
use crate::types::{LedgerEntry, ReviewLog, TransactionType};

/// Source of the daily Lex target.
pub trait TargetSource {
    fn daily_target(&self, date: NaiveDate) -> std::result::Result<i64, CollaboratorError>;
}

/// A constant target.
#[derive(Debug, Clone, Copy)]
pub struct FixedTarget(pub i64);

impl TargetSource for FixedTarget {
    fn daily_target(&self, _date: NaiveDate) -> std::result::Result<i64, CollaboratorError> {
        Ok(self.0)
    }
}

/// Lex earned by a day's reviews. A card reviewed several times counts once,
/// at the value credited on its first review.
pub fn earned_lex(logs: &[ReviewLog]) -> i64 {
    let mut seen = HashSet::new();
    logs.iter()
        .filter(|log| seen.insert(log.card_id))
        .map(|log| log.lex)
        .sum()
}

/// Target for `date`: the source's answer, else the last known target, else
/// the configured default. Negative targets are clamped to zero.
pub fn resolve_target(
    targets: &dyn TargetSource,
    last_known: Option<i64>,
    config: &EngineConfig,
    date: NaiveDate,
) -> i64 {
    let target = match targets.daily_target(date) {
        Ok(target) => target,
        Err(err) => {
            let fallback = last_known.unwrap_or(config.default_daily_target);
            tracing::warn!(error = %err, %date, fallback, "target lookup failed");
            fallback
        }
    };
    target.max(0)
}

/// Result of [`LedgerEngine::check_and_perform_rollover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RolloverOutcome {
    pub performed: bool,
    pub target_lex: i64,
    pub new_balance: i64,
    /// Number of daily rows this call wrote.
    pub days_closed: usize,
}

/// A stored balance that disagrees with the fold of the rows before it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("ledger row {id} on {date}: stored balance {stored}, replay gives {expected}")]
pub struct LedgerMismatch {
    pub id: i64,
    pub date: NaiveDate,
    pub stored: i64,
    pub expected: i64,
}

/// Result of replaying the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub balance: i64,
    pub entries: usize,
    pub mismatch: Option<LedgerMismatch>,
}

/// Recompute every balance and return the final one.
///
/// The fold is seeded from the first row (`balance - earned + target`), so a
/// ledger opened with a non-zero starting balance still replays.
pub fn replay(entries: &[LedgerEntry]) -> std::result::Result<i64, LedgerMismatch> {
    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.date, e.id));

    let Some(first) = ordered.first() else {
        return Ok(0);
    };
    let mut running = first.balance - first.earned_lex + first.target_lex;
    for entry in ordered {
        running += entry.earned_lex - entry.target_lex;
        if running != entry.balance {
            return Err(LedgerMismatch {
                id: entry.id,
                date: entry.date,
                stored: entry.balance,
                expected: running,
            });
        }
    }
    Ok(running)
}

/// Balance of the latest row, or 0 for an empty ledger.
pub fn current_balance(ledger: &dyn LedgerStore) -> Result<i64> {
    Ok(ledger.get_recent(1)?.first().map_or(0, |e| e.balance))
}

/// Writes the ledger.
pub struct LedgerEngine<'a> {
    ledger: &'a dyn LedgerStore,
    reviews: &'a dyn ReviewLogStore,
    targets: &'a dyn TargetSource,
    config: &'a EngineConfig,
}

impl<'a> LedgerEngine<'a> {
    pub fn new(
        ledger: &'a dyn LedgerStore,
        reviews: &'a dyn ReviewLogStore,
        targets: &'a dyn TargetSource,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            ledger,
            reviews,
            targets,
            config,
        }
    }

    /// Close every finished study day that has no daily row yet.
    ///
    /// `today` is the current study day. `supplied_balance` seeds the fold
    /// only when the ledger is empty; otherwise the stored balance wins.
    /// Safe to call repeatedly: once yesterday is closed this is a no-op.
    pub fn check_and_perform_rollover(
        &self,
        supplied_balance: i64,
        today: NaiveDate,
    ) -> Result<RolloverOutcome> {
        let latest = self.ledger.latest_daily()?;
        let mut balance = self.seed_balance(supplied_balance)?;

        let Some(yesterday) = today.pred_opt() else {
            return Ok(self.unchanged(latest.as_ref(), balance));
        };

        let days = match &latest {
            Some(row) if row.date >= yesterday => {
                return Ok(self.unchanged(latest.as_ref(), balance));
            }
            Some(row) => days_between(row.date, today),
            None => vec![yesterday],
        };

        let opening = latest.is_none();
        let mut last_target = latest.as_ref().map(|row| row.target_lex);
        let mut written = 0;

        for date in days {
            let earned = earned_lex(&self.reviews.find_by_date(date)?);
            let target = if opening {
                0
            } else {
                resolve_target(self.targets, last_target, self.config, date)
            };
            let entry = LedgerEntry {
                id: 0,
                date,
                earned_lex: earned,
                target_lex: target,
                balance: balance + earned - target,
                transaction_type: TransactionType::Daily,
                note: opening.then(|| "opening".to_string()),
            };

            match self.ledger.insert(&entry)? {
                InsertOutcome::Inserted(id) => {
                    tracing::info!(
                        id,
                        %date,
                        earned,
                        target,
                        balance = entry.balance,
                        "closed study day"
                    );
                    balance = entry.balance;
                    last_target = Some(target);
                    written += 1;
                }
                InsertOutcome::DuplicateDate => {
                    tracing::info!(%date, "study day already closed by a concurrent rollover");
                    let stored = current_balance(self.ledger)?;
                    let target_lex = self
                        .ledger
                        .latest_daily()?
                        .map_or(target, |row| row.target_lex);
                    return Ok(RolloverOutcome {
                        performed: written > 0,
                        target_lex,
                        new_balance: stored,
                        days_closed: written,
                    });
                }
            }
        }

        Ok(RolloverOutcome {
            performed: written > 0,
            target_lex: last_target.unwrap_or(0),
            new_balance: balance,
            days_closed: written,
        })
    }

    /// Append a manual correction. `amount` may be negative but not zero.
    pub fn record_adjustment(
        &self,
        amount: i64,
        date: NaiveDate,
        note: Option<String>,
    ) -> Result<LedgerEntry> {
        if amount == 0 {
            return Err(CoreError::InvalidInput(
                "adjustment amount must not be zero".to_string(),
            ));
        }
        self.append(TransactionType::Adjustment, amount, 0, date, note)
    }

    /// Append a spend of `cost` Lex.
    pub fn record_purchase(
        &self,
        cost: i64,
        date: NaiveDate,
        note: Option<String>,
    ) -> Result<LedgerEntry> {
        if cost <= 0 {
            return Err(CoreError::InvalidInput(
                "purchase cost must be positive".to_string(),
            ));
        }
        self.append(TransactionType::ItemPurchase, 0, cost, date, note)
    }

    /// Most recent `n` rows, newest first.
    pub fn history(&self, n: usize) -> Result<Vec<LedgerEntry>> {
        Ok(self.ledger.get_recent(n)?)
    }

    /// Replay the whole ledger. A mismatch reports the stored balance of
    /// the first disagreeing row.
    pub fn audit(&self) -> Result<LedgerAudit> {
        let entries = self.ledger.get_all()?;
        let audit = match replay(&entries) {
            Ok(balance) => LedgerAudit {
                balance,
                entries: entries.len(),
                mismatch: None,
            },
            Err(mismatch) => {
                tracing::warn!(%mismatch, "ledger replay mismatch");
                LedgerAudit {
                    balance: mismatch.stored,
                    entries: entries.len(),
                    mismatch: Some(mismatch),
                }
            }
        };
        Ok(audit)
    }

    fn append(
        &self,
        transaction_type: TransactionType,
        earned_lex: i64,
        target_lex: i64,
        date: NaiveDate,
        note: Option<String>,
    ) -> Result<LedgerEntry> {
        // Earlier days must be closed first or their daily rows would sort
        // before this entry while being folded after it.
        let stored = current_balance(self.ledger)?;
        self.check_and_perform_rollover(stored, date)?;

        let latest = self.ledger.get_recent(1)?.into_iter().next();
        if let Some(latest) = &latest {
            if date < latest.date {
                return Err(CoreError::InvalidInput(format!(
                    "cannot backdate {} entry to {} before {}",
                    transaction_type.as_str(),
                    date,
                    latest.date
                )));
            }
        }
        let previous = latest.map_or(0, |e| e.balance);

        let mut entry = LedgerEntry {
            id: 0,
            date,
            earned_lex,
            target_lex,
            balance: previous + earned_lex - target_lex,
            transaction_type,
            note,
        };
        match self.ledger.insert(&entry)? {
            InsertOutcome::Inserted(id) => entry.id = id,
            InsertOutcome::DuplicateDate => {
                return Err(CoreError::InvalidInput(format!(
                    "ledger rejected {} entry on {}",
                    transaction_type.as_str(),
                    date
                )));
            }
        }
        tracing::info!(
            id = entry.id,
            kind = transaction_type.as_str(),
            amount = earned_lex - target_lex,
            balance = entry.balance,
            "recorded ledger entry"
        );
        Ok(entry)
    }

    fn seed_balance(&self, supplied: i64) -> Result<i64> {
        match self.ledger.get_recent(1)?.first() {
            Some(row) => {
                if row.balance != supplied {
                    tracing::warn!(
                        stored = row.balance,
                        supplied,
                        "supplied balance differs from ledger, using ledger"
                    );
                }
                Ok(row.balance)
            }
            None => Ok(supplied),
        }
    }

    fn unchanged(&self, latest: Option<&LedgerEntry>, balance: i64) -> RolloverOutcome {
        RolloverOutcome {
            performed: false,
            target_lex: latest.map_or(0, |row| row.target_lex),
            new_balance: balance,
            days_closed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::{self, CardPatch};
    use crate::types::{CardStatus, Rating};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    struct Offline;

    impl TargetSource for Offline {
        fn daily_target(&self, _: NaiveDate) -> std::result::Result<i64, CollaboratorError> {
            Err(CollaboratorError::Unavailable("settings unreadable".into()))
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    fn log(store: &MemoryStore, date: NaiveDate, lex: i64) -> Uuid {
        let card_id = Uuid::new_v4();
        let review = ReviewLog {
            card_id,
            book_id: Uuid::new_v4(),
            reviewed_at: Utc::now(),
            study_date: date,
            rating: Rating::Good,
            previous_status: CardStatus::Review,
            lex,
        };
        store.record_review(card_id, &CardPatch::default(), &review).unwrap();
        card_id
    }

    fn daily_row(date: NaiveDate, earned: i64, target: i64, balance: i64) -> LedgerEntry {
        LedgerEntry {
            id: 0,
            date,
            earned_lex: earned,
            target_lex: target,
            balance,
            transaction_type: TransactionType::Daily,
            note: None,
        }
    }

    #[test]
    fn opening_row_charges_no_target() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        log(&store, day(9), 30);
        let engine = LedgerEngine::new(&store, &store, &FixedTarget(100), &config);

        let outcome = engine.check_and_perform_rollover(50, day(10)).unwrap();
        assert_eq!(
            outcome,
            RolloverOutcome {
                performed: true,
                target_lex: 0,
                new_balance: 80,
                days_closed: 1
            }
        );
        let rows = store.get_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, day(9));
        assert_eq!(rows[0].note.as_deref(), Some("opening"));
    }

    #[test]
    fn second_rollover_is_a_no_op() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        LedgerStore::insert(&store, &daily_row(day(8), 0, 0, 20)).unwrap();
        log(&store, day(9), 120);
        let engine = LedgerEngine::new(&store, &store, &FixedTarget(100), &config);

        let first = engine.check_and_perform_rollover(20, day(10)).unwrap();
        assert!(first.performed);
        assert_eq!(first.new_balance, 40);

        let second = engine.check_and_perform_rollover(first.new_balance, day(10)).unwrap();
        assert!(!second.performed);
        assert_eq!(second.new_balance, 40);
        assert_eq!(second.target_lex, 100);
        assert_eq!(store.get_all().unwrap().len(), 2);
    }

    #[test]
    fn gap_days_are_closed_in_order() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        LedgerStore::insert(&store, &daily_row(day(5), 0, 0, 0)).unwrap();
        log(&store, day(7), 100);
        let engine = LedgerEngine::new(&store, &store, &FixedTarget(60), &config);

        let outcome = engine.check_and_perform_rollover(0, day(9)).unwrap();
        assert_eq!(outcome.days_closed, 3);

        let rows = store.get_all().unwrap();
        let summary: Vec<(NaiveDate, i64, i64)> =
            rows.iter().map(|r| (r.date, r.earned_lex, r.balance)).collect();
        assert_eq!(
            summary,
            vec![
                (day(5), 0, 0),
                (day(6), 0, -60),
                (day(7), 100, -20),
                (day(8), 0, -80),
            ]
        );
        assert_eq!(outcome.new_balance, -80);
    }

    #[test]
    fn stored_balance_beats_supplied_balance() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        LedgerStore::insert(&store, &daily_row(day(8), 0, 0, 70)).unwrap();
        let engine = LedgerEngine::new(&store, &store, &FixedTarget(10), &config);

        let outcome = engine.check_and_perform_rollover(9999, day(10)).unwrap();
        assert_eq!(outcome.new_balance, 60);
        assert_eq!(replay(&store.get_all().unwrap()), Ok(60));
    }

    #[test]
    fn failing_target_source_uses_last_known_target() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        LedgerStore::insert(&store, &daily_row(day(8), 0, 40, 0)).unwrap();
        let engine = LedgerEngine::new(&store, &store, &Offline, &config);

        let outcome = engine.check_and_perform_rollover(0, day(10)).unwrap();
        assert!(outcome.performed);
        assert_eq!(outcome.target_lex, 40);
        assert_eq!(outcome.new_balance, -40);
    }

    #[test]
    fn target_falls_back_to_default_without_history() {
        let config = EngineConfig {
            default_daily_target: 75,
            ..EngineConfig::default()
        };
        assert_eq!(resolve_target(&Offline, None, &config, day(1)), 75);
        assert_eq!(resolve_target(&Offline, Some(30), &config, day(1)), 30);
        assert_eq!(resolve_target(&FixedTarget(-5), None, &config, day(1)), 0);
    }

    /// Ledger whose `latest_daily` lags behind, as if another rollover
    /// committed between our read and our insert.
    struct StaleLedger<'a> {
        inner: &'a MemoryStore,
        stale: Option<LedgerEntry>,
    }

    impl LedgerStore for StaleLedger<'_> {
        fn get_recent(&self, n: usize) -> store::Result<Vec<LedgerEntry>> {
            self.inner.get_recent(n)
        }
        fn get_all(&self) -> store::Result<Vec<LedgerEntry>> {
            self.inner.get_all()
        }
        fn latest_daily(&self) -> store::Result<Option<LedgerEntry>> {
            Ok(self.stale.clone())
        }
        fn insert(&self, entry: &LedgerEntry) -> store::Result<InsertOutcome> {
            LedgerStore::insert(self.inner, entry)
        }
    }

    #[test]
    fn concurrent_rollover_reports_not_performed() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        LedgerStore::insert(&store, &daily_row(day(8), 0, 0, 10)).unwrap();
        LedgerStore::insert(&store, &daily_row(day(9), 50, 20, 40)).unwrap();

        let stale = StaleLedger {
            inner: &store,
            stale: Some(daily_row(day(8), 0, 0, 10)),
        };
        let engine = LedgerEngine::new(&stale, &store, &FixedTarget(20), &config);
        let outcome = engine.check_and_perform_rollover(40, day(10)).unwrap();

        assert!(!outcome.performed);
        assert_eq!(outcome.new_balance, 40);
        assert_eq!(store.get_all().unwrap().len(), 2);
    }

    #[test]
    fn repeated_reviews_of_a_card_earn_once() {
        let store = MemoryStore::new();
        let card_id = log(&store, day(3), 15);
        let review = ReviewLog {
            card_id,
            book_id: Uuid::new_v4(),
            reviewed_at: Utc::now(),
            study_date: day(3),
            rating: Rating::Again,
            previous_status: CardStatus::Review,
            lex: 15,
        };
        store.record_review(card_id, &CardPatch::default(), &review).unwrap();
        log(&store, day(3), 5);
        assert_eq!(earned_lex(&store.find_by_date(day(3)).unwrap()), 20);
    }

    #[test]
    fn adjustments_and_purchases_fold_into_balance() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = LedgerEngine::new(&store, &store, &FixedTarget(0), &config);

        engine.check_and_perform_rollover(100, day(10)).unwrap();
        let bonus = engine
            .record_adjustment(25, day(10), Some("bonus".into()))
            .unwrap();
        assert_eq!(bonus.balance, 125);
        let spend = engine.record_purchase(40, day(10), None).unwrap();
        assert_eq!(spend.balance, 85);
        assert_eq!(spend.target_lex, 40);

        assert_eq!(current_balance(&store).unwrap(), 85);
        let audit = engine.audit().unwrap();
        assert_eq!(audit.balance, 85);
        assert_eq!(audit.entries, 3);
        assert_eq!(audit.mismatch, None);
        assert_eq!(engine.history(2).unwrap()[0].id, spend.id);
    }

    #[test]
    fn purchase_closes_earlier_days_first() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        LedgerStore::insert(&store, &daily_row(day(5), 0, 0, 100)).unwrap();
        log(&store, day(6), 30);
        let engine = LedgerEngine::new(&store, &store, &FixedTarget(10), &config);

        let spend = engine.record_purchase(50, day(7), None).unwrap();
        assert_eq!(spend.balance, 70);
        let rows = store.get_all().unwrap();
        assert_eq!(rows[1].date, day(6));
        assert_eq!(rows[1].balance, 120);
        assert_eq!(replay(&rows), Ok(70));
    }

    #[test]
    fn misuse_is_rejected() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        LedgerStore::insert(&store, &daily_row(day(9), 0, 0, 0)).unwrap();
        let engine = LedgerEngine::new(&store, &store, &FixedTarget(0), &config);

        assert!(matches!(
            engine.record_adjustment(0, day(10), None),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.record_purchase(-3, day(10), None),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.record_adjustment(5, day(2), None),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn replay_reports_first_mismatch() {
        let mut rows = vec![
            daily_row(day(1), 10, 0, 10),
            daily_row(day(2), 10, 5, 15),
            daily_row(day(3), 0, 5, 10),
        ];
        for (i, row) in rows.iter_mut().enumerate() {
            row.id = i as i64 + 1;
        }
        assert_eq!(replay(&rows), Ok(10));

        rows[1].balance = 99;
        let err = replay(&rows).unwrap_err();
        assert_eq!(err.id, 2);
        assert_eq!(err.expected, 15);
        assert_eq!(replay(&[]), Ok(0));
    }
}
