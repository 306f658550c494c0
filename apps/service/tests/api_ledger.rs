//! Integration tests for rollover and ledger commands.

mod common;

use chrono::Duration;
use lexquest_core::TransactionType;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use common::fixtures;
use common::TestContext;
use lexquest_service::commands;

#[tokio::test]
async fn test_cold_start_writes_opening_row() {
    let ctx = TestContext::new();
    let yesterday = ctx.today().pred_opt().unwrap();
    let book_id = Uuid::new_v4();
    ctx.seed_review(&fixtures::review_log(book_id, 10, yesterday, ctx.now() - Duration::days(1)));
    ctx.seed_review(&fixtures::review_log(book_id, 15, yesterday, ctx.now() - Duration::days(1)));

    let outcome = commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();

    assert!(outcome.performed);
    assert_eq!(outcome.days_closed, 1);
    assert_eq!(outcome.new_balance, 25);

    let history = commands::get_ledger_history(None, &ctx.state).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, yesterday);
    assert_eq!(history[0].earned_lex, 25);
    assert_eq!(history[0].target_lex, 0);
    assert_eq!(history[0].transaction_type, TransactionType::Daily);
    assert_eq!(history[0].note.as_deref(), Some("opening"));
}

#[tokio::test]
async fn test_supplied_balance_seeds_empty_ledger_only() {
    let ctx = TestContext::new();

    let first = commands::check_and_perform_rollover(Some(500), &ctx.state)
        .await
        .unwrap();
    assert_eq!(first.new_balance, 500);

    ctx.next_day();
    let second = commands::check_and_perform_rollover(Some(9_999), &ctx.state)
        .await
        .unwrap();
    assert!(second.performed);
    assert_eq!(second.new_balance, 400);

    let audit = commands::audit_ledger(&ctx.state).await.unwrap();
    assert_eq!(audit.balance, 400);
    assert!(audit.mismatch.is_none());
}

#[tokio::test]
async fn test_rollover_is_idempotent() {
    let ctx = TestContext::new();

    let first = commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();
    let second = commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();

    assert!(first.performed);
    assert!(!second.performed);
    assert_eq!(second.days_closed, 0);
    assert_eq!(second.new_balance, first.new_balance);
    let history = commands::get_ledger_history(None, &ctx.state).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_concurrent_rollovers_close_each_day_once() {
    let ctx = TestContext::new();
    commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();
    ctx.advance(Duration::days(2));

    let (a, b) = tokio::join!(
        commands::check_and_perform_rollover(None, &ctx.state),
        commands::check_and_perform_rollover(None, &ctx.state),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.days_closed + b.days_closed, 2);
    assert!(a.performed != b.performed);
    assert_eq!(a.new_balance, b.new_balance);
    let history = commands::get_ledger_history(None, &ctx.state).await.unwrap();
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn test_gap_days_are_closed_in_order() {
    let ctx = TestContext::new();
    commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();
    let day_one = ctx.today();
    let day_two = day_one.succ_opt().unwrap();
    ctx.seed_review(&fixtures::review_log(
        Uuid::new_v4(),
        40,
        day_two,
        ctx.now() + Duration::days(1),
    ));

    ctx.advance(Duration::days(3));
    let outcome = commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();

    assert_eq!(outcome.days_closed, 3);
    assert_eq!(outcome.target_lex, 100);
    assert_eq!(outcome.new_balance, -260);

    let history = commands::get_ledger_history(Some(3), &ctx.state).await.unwrap();
    let dates: Vec<_> = history.iter().map(|e| e.date).collect();
    assert_eq!(
        dates,
        vec![day_two.succ_opt().unwrap(), day_two, day_one]
    );
    assert_eq!(history[1].earned_lex, 40);
    assert_eq!(history[1].balance, -160);
}

#[tokio::test]
async fn test_rollover_uses_stored_daily_target() {
    let ctx = TestContext::new();
    commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();
    commands::set_daily_target(30, &ctx.state).await.unwrap();

    ctx.next_day();
    let outcome = commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();

    assert_eq!(outcome.target_lex, 30);
    assert_eq!(outcome.new_balance, -30);
    let quest = commands::get_quest(None, &ctx.state).await.unwrap();
    assert_eq!(quest.target_lex, 30);
}

#[tokio::test]
async fn test_reviews_earn_lex_at_rollover() {
    let ctx = TestContext::new();
    commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();
    commands::create_book(fixtures::read_book("Calculus", 5), &ctx.state)
        .await
        .unwrap();
    let ids = commands::get_quest(None, &ctx.state).await.unwrap().allocations[0]
        .card_ids
        .clone();
    for card_id in &ids[..3] {
        commands::submit_review(
            commands::ReviewRequest {
                card_id: *card_id,
                rating: 3,
            },
            &ctx.state,
        )
        .await
        .unwrap();
    }

    ctx.next_day();
    let outcome = commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();

    assert_eq!(outcome.new_balance, 30 - 100);
}

#[tokio::test]
async fn test_adjustment_and_purchase() {
    let ctx = TestContext::new();

    let adjustment = commands::record_adjustment(50, Some("bonus".into()), &ctx.state)
        .await
        .unwrap();
    assert_eq!(adjustment.transaction_type, TransactionType::Adjustment);
    assert_eq!(adjustment.balance, 50);
    assert_eq!(adjustment.date, ctx.today());

    let purchase = commands::record_purchase(20, Some("coffee".into()), &ctx.state)
        .await
        .unwrap();
    assert_eq!(purchase.transaction_type, TransactionType::ItemPurchase);
    assert_eq!(purchase.target_lex, 20);
    assert_eq!(purchase.balance, 30);

    // The opening row for yesterday was written before the adjustment.
    let history = commands::get_ledger_history(None, &ctx.state).await.unwrap();
    let kinds: Vec<_> = history.iter().map(|e| e.transaction_type).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionType::ItemPurchase,
            TransactionType::Adjustment,
            TransactionType::Daily
        ]
    );

    let audit = commands::audit_ledger(&ctx.state).await.unwrap();
    assert_eq!(audit.balance, 30);
    assert_eq!(audit.entries, 3);
    assert!(audit.mismatch.is_none());
}

#[tokio::test]
async fn test_invalid_ledger_amounts_are_rejected() {
    let ctx = TestContext::new();

    assert!(commands::record_adjustment(0, None, &ctx.state).await.is_err());
    assert!(commands::record_purchase(0, None, &ctx.state).await.is_err());
    assert!(commands::record_purchase(-5, None, &ctx.state).await.is_err());
    assert!(commands::set_daily_target(-1, &ctx.state).await.is_err());
}

#[tokio::test]
async fn test_history_limit() {
    let ctx = TestContext::new();
    commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();
    ctx.advance(Duration::days(5));
    commands::check_and_perform_rollover(None, &ctx.state)
        .await
        .unwrap();

    let recent = commands::get_ledger_history(Some(2), &ctx.state).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].date > recent[1].date);
    let all = commands::get_ledger_history(None, &ctx.state).await.unwrap();
    assert_eq!(all.len(), 6);
}
