//! Study session commands.

use lexquest_core::ledger::resolve_target;
use lexquest_core::{
    BulkItem, BulkOutcome, Card, CardStore, CoreError, LedgerStore, QuestEngine, QuestPlan, Rating,
    ReviewOutcome, Scheduler,
};
use uuid::Uuid;

use crate::db::SettingsTarget;
use crate::state::AppState;

use super::CommandError;

#[derive(Debug, serde::Deserialize)]
pub struct ReviewRequest {
    pub card_id: Uuid,
    /// 1 = Again, 2 = Hard, 3 = Good, 4 = Easy.
    pub rating: u8,
}

#[derive(Debug, serde::Serialize)]
pub struct CardForecast {
    pub card: Card,
    /// Predicted recall probability now; absent for new cards.
    pub retrievability: Option<f64>,
}

/// Today's quest for the given preset (or the selected/default one).
pub async fn get_quest(
    preset: Option<Uuid>,
    state: &AppState,
) -> Result<QuestPlan, CommandError> {
    let config = state.config()?;
    let now = state.now();
    let today = state.study_date(&config);
    let scheduler = Scheduler::from_config(&config);

    let repo = state.repo()?;
    let selected = match preset {
        Some(id) => Some(id),
        None => repo.selected_preset()?,
    };
    let last_known = repo.latest_daily()?.map(|row| row.target_lex);
    let targets = SettingsTarget::new(&repo, config.default_daily_target);
    let target_lex = resolve_target(&targets, last_known, &config, today);

    let engine = QuestEngine::new(&*repo, &scheduler, &state.graph, &config.lex);
    engine
        .plan(target_lex, now, today, selected)
        .map_err(Into::into)
}

/// Earliest due card in scope.
pub async fn next_card(state: &AppState) -> Result<Option<Card>, CommandError> {
    let config = state.config()?;
    let now = state.now();
    let scheduler = Scheduler::from_config(&config);

    let repo = state.repo()?;
    let selected = repo.selected_preset()?;
    let engine = QuestEngine::new(&*repo, &scheduler, &state.graph, &config.lex);
    engine.next_card(now, selected).map_err(Into::into)
}

/// Submit a review for a card.
pub async fn submit_review(
    request: ReviewRequest,
    state: &AppState,
) -> Result<ReviewOutcome, CommandError> {
    let rating = Rating::try_from(request.rating)?;
    let config = state.config()?;
    let now = state.now();
    let today = state.study_date(&config);
    let scheduler = Scheduler::from_config(&config);

    let repo = state.repo()?;
    let engine = QuestEngine::new(&*repo, &scheduler, &state.graph, &config.lex);
    engine
        .submit_review(request.card_id, rating, now, today)
        .map_err(Into::into)
}

/// Submit several reviews, stopping at the first failure.
pub async fn submit_bulk(
    items: Vec<BulkItem>,
    state: &AppState,
) -> Result<BulkOutcome, CommandError> {
    let config = state.config()?;
    let now = state.now();
    let today = state.study_date(&config);
    let scheduler = Scheduler::from_config(&config);

    let repo = state.repo()?;
    let engine = QuestEngine::new(&*repo, &scheduler, &state.graph, &config.lex);
    Ok(engine.submit_bulk(&items, now, today))
}

/// A card with its current recall probability.
pub async fn get_card_forecast(
    card_id: Uuid,
    state: &AppState,
) -> Result<CardForecast, CommandError> {
    let config = state.config()?;
    let now = state.now();
    let scheduler = Scheduler::from_config(&config);

    let repo = state.repo()?;
    let card = CardStore::find_by_id(&*repo, card_id)?.ok_or(CoreError::CardNotFound(card_id))?;
    Ok(CardForecast {
        retrievability: scheduler.retrievability(&card, now),
        card,
    })
}
