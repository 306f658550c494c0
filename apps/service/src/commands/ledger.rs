//! Ledger and rollover commands.

use lexquest_core::ledger;
use lexquest_core::{LedgerAudit, LedgerEngine, LedgerEntry, RolloverOutcome};

use crate::db::SettingsTarget;
use crate::state::AppState;

use super::CommandError;

/// Close finished study days. Runs on cold start and on resume.
///
/// `current_balance` is what the caller last saw; it only seeds an empty
/// ledger.
pub async fn check_and_perform_rollover(
    current_balance: Option<i64>,
    state: &AppState,
) -> Result<RolloverOutcome, CommandError> {
    let _guard = state.rollover.lock().await;
    let config = state.config()?;
    let today = state.study_date(&config);

    let repo = state.repo()?;
    let supplied = match current_balance {
        Some(balance) => balance,
        None => ledger::current_balance(&*repo)?,
    };
    let targets = SettingsTarget::new(&repo, config.default_daily_target);
    let engine = LedgerEngine::new(&*repo, &*repo, &targets, &config);
    let outcome = engine.check_and_perform_rollover(supplied, today)?;
    if outcome.performed {
        tracing::info!(
            days = outcome.days_closed,
            balance = outcome.new_balance,
            "rollover performed"
        );
    }
    Ok(outcome)
}

/// Most recent ledger rows, newest first.
pub async fn get_ledger_history(
    limit: Option<usize>,
    state: &AppState,
) -> Result<Vec<LedgerEntry>, CommandError> {
    let config = state.config()?;
    let repo = state.repo()?;
    let targets = SettingsTarget::new(&repo, config.default_daily_target);
    let engine = LedgerEngine::new(&*repo, &*repo, &targets, &config);
    engine.history(limit.unwrap_or(30)).map_err(Into::into)
}

/// Add (or, with a negative amount, remove) Lex by hand.
pub async fn record_adjustment(
    amount: i64,
    note: Option<String>,
    state: &AppState,
) -> Result<LedgerEntry, CommandError> {
    let _guard = state.rollover.lock().await;
    let config = state.config()?;
    let today = state.study_date(&config);

    let repo = state.repo()?;
    let targets = SettingsTarget::new(&repo, config.default_daily_target);
    let engine = LedgerEngine::new(&*repo, &*repo, &targets, &config);
    engine.record_adjustment(amount, today, note).map_err(Into::into)
}

/// Spend Lex on an item.
pub async fn record_purchase(
    cost: i64,
    note: Option<String>,
    state: &AppState,
) -> Result<LedgerEntry, CommandError> {
    let _guard = state.rollover.lock().await;
    let config = state.config()?;
    let today = state.study_date(&config);

    let repo = state.repo()?;
    let targets = SettingsTarget::new(&repo, config.default_daily_target);
    let engine = LedgerEngine::new(&*repo, &*repo, &targets, &config);
    engine.record_purchase(cost, today, note).map_err(Into::into)
}

/// Replay every row and report the first stored balance that disagrees.
pub async fn audit_ledger(state: &AppState) -> Result<LedgerAudit, CommandError> {
    let config = state.config()?;
    let repo = state.repo()?;
    let targets = SettingsTarget::new(&repo, config.default_daily_target);
    let engine = LedgerEngine::new(&*repo, &*repo, &targets, &config);
    engine.audit().map_err(Into::into)
}
