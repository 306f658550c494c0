//! Which books are "in play" for today.

use uuid::Uuid;

use crate::store::{PresetStore, Result};
use crate::types::{Book, BookStatus, InventoryPreset};

/// Resolve the book ids in scope.
///
/// The preset's books that still exist come first. If that leaves nothing
/// (no preset, or all its books deleted) the scope falls back to every
/// active book, then to every book. The result is only empty when `books`
/// is empty.
pub fn resolve_scope(preset: Option<&InventoryPreset>, books: &[Book]) -> Vec<Uuid> {
    if let Some(preset) = preset {
        let scoped: Vec<Uuid> = books
            .iter()
            .filter(|b| preset.book_ids.contains(&b.id))
            .map(|b| b.id)
            .collect();
        if !scoped.is_empty() {
            return scoped;
        }
        tracing::debug!(preset = %preset.label, "preset has no existing books, widening scope");
    }

    let active: Vec<Uuid> = books
        .iter()
        .filter(|b| b.status == BookStatus::Active)
        .map(|b| b.id)
        .collect();
    if !active.is_empty() {
        return active;
    }

    books.iter().map(|b| b.id).collect()
}

/// Pick the active preset: the selected one if it exists, else the default.
pub fn active_preset(
    presets: &dyn PresetStore,
    selected: Option<Uuid>,
) -> Result<Option<InventoryPreset>> {
    if let Some(id) = selected {
        if let Some(preset) = presets.find_by_id(id)? {
            return Ok(Some(preset));
        }
        tracing::debug!(preset_id = %id, "selected preset not found, using default");
    }
    presets.find_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::BookMode;
    use chrono::Utc;

    fn preset(book_ids: Vec<Uuid>, is_default: bool) -> InventoryPreset {
        InventoryPreset {
            id: Uuid::new_v4(),
            label: "exam".into(),
            book_ids,
            is_default,
        }
    }

    fn book(status: BookStatus) -> Book {
        Book::new("b", BookMode::Read, 10, 1, Utc::now()).with_status(status)
    }

    #[test]
    fn preset_limits_scope() {
        let books = vec![book(BookStatus::Active), book(BookStatus::Active)];
        let p = preset(vec![books[1].id], false);
        assert_eq!(resolve_scope(Some(&p), &books), vec![books[1].id]);
    }

    #[test]
    fn preset_of_deleted_books_falls_back_to_active() {
        let books = vec![book(BookStatus::Active), book(BookStatus::Frozen)];
        let p = preset(vec![Uuid::new_v4()], false);
        assert_eq!(resolve_scope(Some(&p), &books), vec![books[0].id]);
    }

    #[test]
    fn no_active_books_falls_back_to_all() {
        let books = vec![book(BookStatus::Completed), book(BookStatus::Frozen)];
        assert_eq!(resolve_scope(None, &books).len(), 2);
    }

    #[test]
    fn never_empty_while_books_exist() {
        let statuses = [BookStatus::Active, BookStatus::Completed, BookStatus::Frozen];
        for status in statuses {
            let books = vec![book(status)];
            let presets = [
                None,
                Some(preset(vec![], false)),
                Some(preset(vec![Uuid::new_v4()], true)),
            ];
            for p in &presets {
                assert!(!resolve_scope(p.as_ref(), &books).is_empty());
            }
        }
        assert!(resolve_scope(None, &[]).is_empty());
    }

    #[test]
    fn selected_preset_wins_over_default() {
        let store = MemoryStore::new();
        let default = preset(vec![], true);
        let other = preset(vec![], false);
        store.add_preset(default.clone()).unwrap();
        store.add_preset(other.clone()).unwrap();

        let picked = active_preset(&store, Some(other.id)).unwrap().unwrap();
        assert_eq!(picked.id, other.id);
        let fallback = active_preset(&store, Some(Uuid::new_v4())).unwrap().unwrap();
        assert_eq!(fallback.id, default.id);
        assert_eq!(active_preset(&store, None).unwrap().unwrap().id, default.id);
    }
}
