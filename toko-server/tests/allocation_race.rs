//! Concurrency: stock allocation and settlement under racing
//! confirmations. File-backed database so writers genuinely overlap.

mod support;

use std::collections::HashSet;

use futures::future::join_all;
use toko_server::db::repository::orders;
use toko_server::reconcile::{ReconcileOutcome, reconcile};

use support::{paid, seed_order, seed_product, seed_stock, state_on_disk};

#[tokio::test]
async fn test_racing_orders_never_share_stock() {
    let (state, _mailer, _dir) = state_on_disk().await;
    let product_id = seed_product(&state.pool, "game-key", 50_000).await;
    let stock_ids = seed_stock(&state, &product_id, &["K1", "K2", "K3"]).await;

    // Two paid orders want two units each from a pool of three
    let order_a = seed_order(&state.pool, &product_id, 2, 100_000, "midtrans", None).await;
    let order_b = seed_order(&state.pool, &product_id, 2, 100_000, "tripay", None).await;

    let tasks = [&order_a, &order_b].map(|order_id| {
        let state = state.clone();
        let order_id = order_id.clone();
        tokio::spawn(async move {
            let (status, details) = paid(100_000);
            reconcile(&state, &order_id, status, details).await
        })
    });
    for result in join_all(tasks).await {
        let outcome = result.unwrap().unwrap();
        assert!(matches!(outcome, ReconcileOutcome::MarkedPaid { .. }));
    }

    let a = orders::find_by_id(&state.pool, &order_a)
        .await
        .unwrap()
        .unwrap();
    let b = orders::find_by_id(&state.pool, &order_b)
        .await
        .unwrap()
        .unwrap();
    assert!(a.is_paid() && b.is_paid());

    let claimed_a: HashSet<String> = a.stock_ids().into_iter().collect();
    let claimed_b: HashSet<String> = b.stock_ids().into_iter().collect();
    assert!(
        claimed_a.is_disjoint(&claimed_b),
        "an item was sold twice: {claimed_a:?} vs {claimed_b:?}"
    );

    let union: HashSet<&String> = claimed_a.union(&claimed_b).collect();
    assert_eq!(union.len(), 3, "the whole pool should be claimed");
    for id in &stock_ids {
        assert!(union.contains(id));
    }

    // One order came up a unit short
    let shortfall_a = a.quantity - claimed_a.len() as i64;
    let shortfall_b = b.quantity - claimed_b.len() as i64;
    assert_eq!(shortfall_a + shortfall_b, 1);
}

#[tokio::test]
async fn test_racing_confirmations_settle_once() {
    let (state, _mailer, _dir) = state_on_disk().await;
    let product_id = seed_product(&state.pool, "game-key", 50_000).await;
    seed_stock(&state, &product_id, &["K1", "K2"]).await;
    let order_id = seed_order(&state.pool, &product_id, 1, 50_000, "midtrans", None).await;

    // The provider hammers the same confirmation four times at once
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let state = state.clone();
            let order_id = order_id.clone();
            tokio::spawn(async move {
                let (status, details) = paid(50_000);
                reconcile(&state, &order_id, status, details).await
            })
        })
        .collect();

    let mut marked_paid = 0;
    for result in join_all(tasks).await {
        match result.unwrap().unwrap() {
            ReconcileOutcome::MarkedPaid { allocated, shortfall } => {
                marked_paid += 1;
                assert_eq!(allocated, 1);
                assert_eq!(shortfall, 0);
            }
            ReconcileOutcome::AlreadySettled => {}
            other => panic!("unexpected outcome under race: {other:?}"),
        }
    }
    assert_eq!(marked_paid, 1, "exactly one caller wins the transition");

    let order = orders::find_by_id(&state.pool, &order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.amount_paid, 50_000);
    assert_eq!(order.stock_ids().len(), 1, "stock allocated exactly once");

    let (sold,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM stock_items WHERE product_id = $1 AND is_sold = 1")
            .bind(&product_id)
            .fetch_one(&state.pool)
            .await
            .unwrap();
    assert_eq!(sold, 1);
}
