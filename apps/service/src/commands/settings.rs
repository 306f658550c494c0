//! Settings and preset commands.

use lexquest_core::{BookMode, EngineConfig, InventoryPreset, PresetStore};
use uuid::Uuid;

use crate::state::AppState;

use super::CommandError;

#[derive(Debug, serde::Serialize)]
pub struct SettingsView {
    pub engine: EngineConfig,
    /// Persisted target, or the configured default when unset.
    pub daily_target: i64,
    pub selected_preset: Option<Uuid>,
}

/// Current engine config plus persisted settings.
pub async fn get_settings(state: &AppState) -> Result<SettingsView, CommandError> {
    let engine = state.config()?;
    let repo = state.repo()?;
    Ok(SettingsView {
        daily_target: repo
            .stored_daily_target()?
            .unwrap_or(engine.default_daily_target),
        selected_preset: repo.selected_preset()?,
        engine,
    })
}

/// Override the target retention of a mode for this session.
pub async fn set_retention(
    mode: BookMode,
    retention: f64,
    state: &AppState,
) -> Result<EngineConfig, CommandError> {
    if !retention.is_finite() {
        return Err(CommandError::new("retention must be a number"));
    }
    let config = state.update_config(|config| config.retention.set(mode, retention))?;
    tracing::info!(
        mode = mode.as_str(),
        retention = config.retention.for_mode(mode),
        "retention override"
    );
    Ok(config)
}

/// Override the point value of a mode for this session.
pub async fn set_lex(
    mode: BookMode,
    lex: u32,
    state: &AppState,
) -> Result<EngineConfig, CommandError> {
    let config = state.update_config(|config| config.lex.set(mode, lex))?;
    tracing::info!(mode = mode.as_str(), lex, "point value override");
    Ok(config)
}

/// Persist the daily Lex target.
pub async fn set_daily_target(target: i64, state: &AppState) -> Result<(), CommandError> {
    if target < 0 {
        return Err(CommandError::new("daily target must not be negative"));
    }
    let repo = state.repo()?;
    repo.set_daily_target(target).map_err(Into::into)
}

pub async fn list_presets(state: &AppState) -> Result<Vec<InventoryPreset>, CommandError> {
    let repo = state.repo()?;
    PresetStore::find_all(&*repo).map_err(Into::into)
}

/// Create or replace a preset.
pub async fn save_preset(preset: InventoryPreset, state: &AppState) -> Result<(), CommandError> {
    if preset.label.trim().is_empty() {
        return Err(CommandError::new("preset label must not be empty"));
    }
    let repo = state.repo()?;
    repo.save_preset(&preset).map_err(Into::into)
}

/// Select the preset that scopes the quest; `None` falls back to the default.
pub async fn select_preset(preset: Option<Uuid>, state: &AppState) -> Result<(), CommandError> {
    let repo = state.repo()?;
    if let Some(id) = preset {
        if PresetStore::find_by_id(&*repo, id)?.is_none() {
            return Err(CommandError::new(format!("preset not found: {id}")));
        }
    }
    repo.set_selected_preset(preset).map_err(Into::into)
}

pub async fn delete_preset(preset: Uuid, state: &AppState) -> Result<bool, CommandError> {
    let repo = state.repo()?;
    if repo.selected_preset()? == Some(preset) {
        repo.set_selected_preset(None)?;
    }
    repo.delete_preset(preset).map_err(Into::into)
}
