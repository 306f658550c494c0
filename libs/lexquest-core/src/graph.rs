//! Prerequisite graph of books: route order and new-card gating.
//!
//! Every book is a node; `previous_book_id` links form a forest. Dangling
//! parents and self-references make a book a root. Cycles in corrupted data
//! are broken during traversal, never reported as errors.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::Book;

/// Prerequisite link `from -> to` (`from` must be completed before `to`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: Uuid,
    pub to: Uuid,
}

/// Output of [`resolve`].
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Parents before children; siblings main-line first, then creation order.
    pub order: Vec<Book>,
    pub edges: Vec<Edge>,
    pub satisfied: HashMap<Uuid, bool>,
    /// Distance from the route root, for rendering.
    pub depth: HashMap<Uuid, usize>,
    /// Books whose prerequisite link was dropped to break a cycle.
    pub broken_links: Vec<Uuid>,
}

impl Resolution {
    /// Whether `book_id` may issue new cards. Unknown ids count as satisfied.
    pub fn is_satisfied(&self, book_id: Uuid) -> bool {
        self.satisfied.get(&book_id).copied().unwrap_or(true)
    }
}

/// Resolve the route for `books`.
pub fn resolve(books: &[Book]) -> Resolution {
    // First occurrence wins if an id is repeated.
    let mut position: HashMap<Uuid, usize> = HashMap::with_capacity(books.len());
    for (i, book) in books.iter().enumerate() {
        position.entry(book.id).or_insert(i);
    }
    let nodes: Vec<&Book> = books
        .iter()
        .enumerate()
        .filter(|(i, b)| position.get(&b.id) == Some(i))
        .map(|(_, b)| b)
        .collect();

    let mut parent: HashMap<Uuid, Option<Uuid>> = nodes
        .iter()
        .map(|b| {
            let p = b
                .previous_book_id
                .filter(|p| *p != b.id && position.contains_key(p));
            (b.id, p)
        })
        .collect();

    let broken_links = break_cycles(&nodes, &mut parent);

    let sort_key = |id: &Uuid| {
        let i = position[id];
        let b = &books[i];
        (b.priority.rank(), b.created_at, i)
    };

    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut roots: Vec<Uuid> = Vec::new();
    for book in &nodes {
        match parent[&book.id] {
            Some(p) => children.entry(p).or_default().push(book.id),
            None => roots.push(book.id),
        }
    }
    roots.sort_by_key(sort_key);
    for list in children.values_mut() {
        list.sort_by_key(sort_key);
    }

    let mut order = Vec::with_capacity(nodes.len());
    let mut depth = HashMap::with_capacity(nodes.len());
    let mut seen = HashSet::with_capacity(nodes.len());
    let mut stack: Vec<(Uuid, usize)> = roots.iter().rev().map(|id| (*id, 0)).collect();
    while let Some((id, level)) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        order.push(books[position[&id]].clone());
        depth.insert(id, level);
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().rev().map(|k| (*k, level + 1)));
        }
    }
    // Unreachable only if cycle breaking missed a node; keep them as roots.
    for book in &nodes {
        if seen.insert(book.id) {
            order.push((*book).clone());
            depth.insert(book.id, 0);
        }
    }

    let edges = order
        .iter()
        .filter_map(|b| parent[&b.id].map(|p| Edge { from: p, to: b.id }))
        .collect();

    let satisfied = nodes
        .iter()
        .map(|b| {
            let ok = match parent[&b.id] {
                None => true,
                Some(p) => books[position[&p]].is_completed(),
            };
            (b.id, ok)
        })
        .collect();

    Resolution {
        order,
        edges,
        satisfied,
        depth,
        broken_links,
    }
}

/// Walk each parent chain; a node met again on the current walk becomes a root.
fn break_cycles(nodes: &[&Book], parent: &mut HashMap<Uuid, Option<Uuid>>) -> Vec<Uuid> {
    let mut done: HashSet<Uuid> = HashSet::with_capacity(nodes.len());
    let mut broken = Vec::new();

    for book in nodes {
        let mut on_path: HashSet<Uuid> = HashSet::new();
        let mut path = Vec::new();
        let mut current = book.id;
        loop {
            if done.contains(&current) {
                break;
            }
            if !on_path.insert(current) {
                tracing::warn!(
                    book_id = %current,
                    "prerequisite cycle detected, treating book as a root"
                );
                parent.insert(current, None);
                broken.push(current);
                break;
            }
            path.push(current);
            match parent.get(&current).copied().flatten() {
                Some(p) => current = p,
                None => break,
            }
        }
        done.extend(path);
    }

    broken
}

/// Cache key: SHA-256 over the `(id, updated_at)` pairs in input order.
///
/// [`resolve`] breaks cycles and final ties by input position, so the key
/// keeps that order. Callers pass books in creation order, as
/// `BookStore::find_all` returns them, which keeps the key stable between
/// calls.
pub fn cache_key(books: &[Book]) -> String {
    let mut hasher = Sha256::new();
    for book in books {
        hasher.update(book.id.as_bytes());
        hasher.update(book.updated_at.to_rfc3339().as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Process-wide memo of the last resolution, keyed by [`cache_key`].
#[derive(Debug, Default)]
pub struct GraphCache {
    last: Mutex<Option<(String, Arc<Resolution>)>>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `books`, reusing the previous result if nothing changed.
    pub fn resolve(&self, books: &[Book]) -> Arc<Resolution> {
        let key = cache_key(books);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached_key, resolution)) = last.as_ref() {
            if *cached_key == key {
                tracing::debug!("route cache hit");
                return Arc::clone(resolution);
            }
        }
        let resolution = Arc::new(resolve(books));
        *last = Some((key, Arc::clone(&resolution)));
        resolution
    }
}
