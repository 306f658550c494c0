//! Integration tests for the route resolver and settings commands.

mod common;

use chrono::Duration;
use lexquest_core::{BookMode, BookStatus};
use pretty_assertions::assert_eq;

use common::fixtures;
use common::TestContext;
use lexquest_service::commands;

#[tokio::test]
async fn test_chain_gates_new_cards_until_completed() {
    let ctx = TestContext::new();
    let algebra = commands::create_book(fixtures::read_book("Algebra", 3), &ctx.state)
        .await
        .unwrap()
        .book;
    ctx.advance(Duration::minutes(1));
    let calculus = commands::create_book(
        fixtures::chained_book("Calculus", 3, algebra.id),
        &ctx.state,
    )
    .await
    .unwrap()
    .book;

    let route = commands::get_route(&ctx.state).await.unwrap();
    let order: Vec<_> = route.order.iter().map(|b| b.id).collect();
    assert_eq!(order, vec![algebra.id, calculus.id]);
    assert_eq!(route.edges.len(), 1);
    assert_eq!(route.edges[0].from, algebra.id);
    assert_eq!(route.edges[0].to, calculus.id);
    assert!(route.is_satisfied(algebra.id));
    assert!(!route.is_satisfied(calculus.id));
    assert_eq!(route.depth[&calculus.id], 1);

    let quest = commands::get_quest(None, &ctx.state).await.unwrap();
    let books: Vec<_> = quest.allocations.iter().map(|a| a.book_id).collect();
    assert_eq!(books, vec![algebra.id]);

    ctx.advance(Duration::minutes(1));
    commands::set_book_status(algebra.id, BookStatus::Completed, &ctx.state)
        .await
        .unwrap();

    let route = commands::get_route(&ctx.state).await.unwrap();
    assert!(route.is_satisfied(calculus.id));
    let quest = commands::get_quest(None, &ctx.state).await.unwrap();
    let books: Vec<_> = quest.allocations.iter().map(|a| a.book_id).collect();
    assert_eq!(books, vec![calculus.id]);
}

#[tokio::test]
async fn test_route_is_cached_until_books_change() {
    let ctx = TestContext::new();
    commands::create_book(fixtures::read_book("Algebra", 3), &ctx.state)
        .await
        .unwrap();

    let first = commands::get_route(&ctx.state).await.unwrap();
    let second = commands::get_route(&ctx.state).await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    ctx.advance(Duration::minutes(1));
    commands::create_book(fixtures::read_book("Geometry", 3), &ctx.state)
        .await
        .unwrap();
    let third = commands::get_route(&ctx.state).await.unwrap();
    assert!(!std::sync::Arc::ptr_eq(&first, &third));
    assert_eq!(third.order.len(), 2);
}

#[tokio::test]
async fn test_cycle_is_broken_not_fatal() {
    let ctx = TestContext::new();
    let first = commands::create_book(fixtures::read_book("First", 2), &ctx.state)
        .await
        .unwrap()
        .book;
    ctx.advance(Duration::minutes(1));
    let second = commands::create_book(fixtures::chained_book("Second", 2, first.id), &ctx.state)
        .await
        .unwrap()
        .book;
    ctx.advance(Duration::minutes(1));
    commands::set_prerequisite(first.id, Some(second.id), &ctx.state)
        .await
        .unwrap();

    let route = commands::get_route(&ctx.state).await.unwrap();

    assert_eq!(route.order.len(), 2);
    assert_eq!(route.broken_links, vec![first.id]);
    assert!(route.is_satisfied(first.id));
    assert!(!route.is_satisfied(second.id));

    let quest = commands::get_quest(None, &ctx.state).await.unwrap();
    let books: Vec<_> = quest.allocations.iter().map(|a| a.book_id).collect();
    assert_eq!(books, vec![first.id]);
}

#[tokio::test]
async fn test_deleted_prerequisite_frees_dependent() {
    let ctx = TestContext::new();
    let first = commands::create_book(fixtures::read_book("First", 2), &ctx.state)
        .await
        .unwrap()
        .book;
    ctx.advance(Duration::minutes(1));
    let second = commands::create_book(fixtures::chained_book("Second", 2, first.id), &ctx.state)
        .await
        .unwrap()
        .book;

    assert!(commands::delete_book(first.id, &ctx.state).await.unwrap());

    let route = commands::get_route(&ctx.state).await.unwrap();
    assert_eq!(route.order.len(), 1);
    assert!(route.edges.is_empty());
    assert!(route.is_satisfied(second.id));
    let books = commands::list_books(&ctx.state).await.unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].card_count, 2);
}

#[tokio::test]
async fn test_settings_overrides() {
    let ctx = TestContext::new();
    commands::create_book(fixtures::read_book("Algebra", 20), &ctx.state)
        .await
        .unwrap();

    let config = commands::set_lex(BookMode::Read, 25, &ctx.state).await.unwrap();
    assert_eq!(config.lex.read, 25);
    let config = commands::set_retention(BookMode::Memorize, 0.8, &ctx.state)
        .await
        .unwrap();
    assert_eq!(config.retention.for_mode(BookMode::Memorize), 0.8);
    assert!(commands::set_retention(BookMode::Read, f64::NAN, &ctx.state)
        .await
        .is_err());
    commands::set_daily_target(50, &ctx.state).await.unwrap();

    let settings = commands::get_settings(&ctx.state).await.unwrap();
    assert_eq!(settings.daily_target, 50);
    assert_eq!(settings.engine.lex.read, 25);

    let quest = commands::get_quest(None, &ctx.state).await.unwrap();
    assert_eq!(quest.target_lex, 50);
    assert_eq!(quest.allocations[0].lex_per_card, 25);
    assert_eq!(quest.allocations[0].recommended, 2);
}

#[tokio::test]
async fn test_preset_validation() {
    let ctx = TestContext::new();

    assert!(commands::save_preset(fixtures::preset("  ", vec![]), &ctx.state)
        .await
        .is_err());
    assert!(commands::select_preset(Some(uuid::Uuid::new_v4()), &ctx.state)
        .await
        .is_err());

    let preset = fixtures::preset("Evening", vec![]);
    commands::save_preset(preset.clone(), &ctx.state).await.unwrap();
    let presets = commands::list_presets(&ctx.state).await.unwrap();
    assert_eq!(presets, vec![preset]);
}
