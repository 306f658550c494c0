//! Route (prerequisite graph) command.

use std::sync::Arc;

use lexquest_core::{BookStore, Resolution};

use crate::state::AppState;

use super::CommandError;

/// Books in route order with prerequisite edges and satisfaction.
pub async fn get_route(state: &AppState) -> Result<Arc<Resolution>, CommandError> {
    let repo = state.repo()?;
    let books = BookStore::find_all(&*repo)?;
    Ok(state.graph.resolve(&books))
}
