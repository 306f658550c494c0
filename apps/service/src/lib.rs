pub mod commands;
pub mod config;
pub mod db;
pub mod state;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::db::SqliteRepository;
use crate::state::AppState;

/// Open the store and build application state from `config`.
pub fn open_state(config: &AppConfig) -> anyhow::Result<AppState> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let repository = SqliteRepository::open(&config.db_path)?;
    Ok(AppState::new(repository, config.engine.clone()))
}

/// Cold start: close finished days, then log today's quest.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(path = %config.db_path.display(), "Opening database...");
    let state = open_state(&config)?;

    let rollover = commands::check_and_perform_rollover(None, &state).await?;
    tracing::info!(
        performed = rollover.performed,
        balance = rollover.new_balance,
        target = rollover.target_lex,
        "Rollover checked"
    );

    let quest = commands::get_quest(None, &state).await?;
    tracing::info!(
        date = %quest.study_date,
        due = quest.due_cards.len(),
        target = quest.target_lex,
        earned = quest.combined_lex,
        deficit = quest.deficit,
        new_cards = quest.allocations.iter().map(|a| a.recommended).sum::<usize>(),
        "Today's quest"
    );
    for allocation in quest.allocations.iter().filter(|a| a.recommended > 0) {
        tracing::info!(
            book = %allocation.title,
            recommended = allocation.recommended,
            issued_today = allocation.issued_today,
            "Planned new cards"
        );
    }

    Ok(())
}
