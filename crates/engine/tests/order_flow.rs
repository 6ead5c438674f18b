mod common;

use common::{oracle, paper_engine, FlakyStore, LaggingStore};
use configuration::AccountPolicy;
use core_types::{OrderRequest, OrderSide, OrderStatus, OrderTicket};
use database::{AccountStore, InMemoryAccountStore, OrderFilter};
use engine::{EngineError, TradingEngine};
use futures::future::join_all;
use price_oracle::StaticFeed;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn scenario_a_buy_buy_sell_flat() {
    let (engine, store, _) = paper_engine(dec!(10000));

    let receipt = engine
        .place_order(&OrderRequest::limit("a", "AAPL", OrderSide::Buy, dec!(10), dec!(190)))
        .await
        .unwrap();
    assert_eq!(receipt.cash_after, dec!(8100));
    assert_eq!(receipt.total_amount, dec!(1900));
    assert_eq!(receipt.status, OrderStatus::Executed);

    engine
        .place_order(&OrderRequest::limit("a", "AAPL", OrderSide::Buy, dec!(5), dec!(200)))
        .await
        .unwrap();
    let account = store.get_account("a").await.unwrap().unwrap();
    let position = account.position("AAPL").unwrap();
    assert_eq!(position.quantity, dec!(15));
    assert_eq!(position.average_cost.round_dp(2), dec!(193.33));
    assert_eq!(account.cash, dec!(7100));

    let receipt = engine
        .place_order(&OrderRequest::limit("a", "AAPL", OrderSide::Sell, dec!(15), dec!(210)))
        .await
        .unwrap();
    assert_eq!(receipt.cash_after, dec!(10250));

    let account = store.get_account("a").await.unwrap().unwrap();
    assert!(account.positions.is_empty());
    assert_eq!(account.order_count, 3);

    let portfolio = engine.get_portfolio("a").await.unwrap();
    assert_eq!(portfolio.realized_pnl.round_dp(2), dec!(250.00));
    assert_eq!(portfolio.total_value, dec!(10250));
}

#[tokio::test]
async fn scenario_b_sell_without_position() {
    let (engine, store, _) = paper_engine(dec!(10000));

    let err = engine
        .place_order(&OrderRequest::market("b", "TSLA", OrderSide::Sell, dec!(1)))
        .await
        .unwrap_err();
    match err {
        EngineError::InsufficientShares { symbol, held, requested } => {
            assert_eq!(symbol, "TSLA");
            assert_eq!(held, Decimal::ZERO);
            assert_eq!(requested, dec!(1));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let account = store.get_account("b").await.unwrap().unwrap();
    assert_eq!(account.cash, dec!(10000));
    assert_eq!(account.order_count, 0);
    assert!(store.list_orders("b", &OrderFilter::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn scenario_c_buy_beyond_cash() {
    let (engine, store, _) = paper_engine(dec!(1000));

    let err = engine
        .place_order(&OrderRequest::limit("c", "MSFT", OrderSide::Buy, dec!(100), dec!(500)))
        .await
        .unwrap_err();
    assert!(err.is_rejection());
    assert!(matches!(
        err,
        EngineError::InsufficientFunds { required, available }
            if required == dec!(50000) && available == dec!(1000)
    ));
    assert!(store.list_orders("c", &OrderFilter::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn market_orders_fill_at_the_feed_price() {
    let (engine, _, feed) = paper_engine(dec!(10000));
    feed.push_close("IBM", dec!(187.5)).await;

    let receipt = engine
        .place_order(&OrderRequest::market("m", "ibm", OrderSide::Buy, dec!(2)))
        .await
        .unwrap();
    assert_eq!(receipt.symbol, "IBM");
    assert_eq!(receipt.executed_price, dec!(187.5));

    // No feed data: the fallback table applies.
    let receipt = engine
        .place_order(&OrderRequest::market("m", "WMT", OrderSide::Buy, dec!(1)))
        .await
        .unwrap();
    assert_eq!(receipt.executed_price, dec!(165));
}

#[tokio::test]
async fn validation_failures_come_first_and_leave_no_trace() {
    let (engine, store, _) = paper_engine(dec!(10000));

    let ticket = OrderTicket {
        account_id: "v".to_string(),
        symbol: "AAPL".to_string(),
        side: "hold".to_string(),
        quantity: dec!(1),
        price: None,
        order_type: None,
    };
    assert!(ticket.into_request().is_err());

    let err = engine
        .place_order(&OrderRequest::market("v", "AAPL", OrderSide::Buy, dec!(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let mut limit = OrderRequest::limit("v", "AAPL", OrderSide::Buy, dec!(1), dec!(1));
    limit.price = None;
    let err = engine.place_order(&limit).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Rejected before the account was even looked up.
    assert!(store.get_account("v").await.unwrap().is_none());
}

#[tokio::test]
async fn strict_book_rejects_unknown_accounts_until_opened() {
    let store = Arc::new(InMemoryAccountStore::new());
    let engine = TradingEngine::new(
        store.clone(),
        oracle(Arc::new(StaticFeed::new())),
        AccountPolicy::strict(dec!(10000)),
    );
    let order = OrderRequest::limit("live-1", "UL", OrderSide::Buy, dec!(10), dec!(48));

    let err = engine.place_order(&order).await.unwrap_err();
    assert!(matches!(err, EngineError::AccountNotFound(_)));
    assert!(store.get_account("live-1").await.unwrap().is_none());

    engine.open_account("live-1").await.unwrap();
    let receipt = engine.place_order(&order).await.unwrap();
    assert_eq!(receipt.cash_after, dec!(9520));

    assert!(matches!(
        engine.open_account("live-1").await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn failed_commit_leaves_ledger_and_log_untouched() {
    let store = Arc::new(FlakyStore::default());
    let engine = TradingEngine::new(
        store.clone(),
        oracle(Arc::new(StaticFeed::new())),
        AccountPolicy::paper(dec!(5000)),
    );
    engine
        .place_order(&OrderRequest::limit("f", "IBM", OrderSide::Buy, dec!(5), dec!(100)))
        .await
        .unwrap();
    let before = store.get_account("f").await.unwrap().unwrap();

    store.set_failing(true);
    let err = engine
        .place_order(&OrderRequest::limit("f", "IBM", OrderSide::Sell, dec!(2), dec!(120)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Persistence(_)));
    assert!(!err.is_rejection());

    assert_eq!(store.get_account("f").await.unwrap().unwrap(), before);
    assert_eq!(store.list_orders("f", &OrderFilter::all()).await.unwrap().len(), 1);

    // The next attempt reuses the same sequence number.
    store.set_failing(false);
    engine
        .place_order(&OrderRequest::limit("f", "IBM", OrderSide::Sell, dec!(2), dec!(120)))
        .await
        .unwrap();
    let orders = store.list_orders("f", &OrderFilter::all()).await.unwrap();
    assert_eq!(orders.iter().map(|o| o.sequence).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_on_one_account_are_linearised() {
    let (engine, store, _) = paper_engine(dec!(100000));

    let tasks = (0..50).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .place_order(&OrderRequest::limit("hot", "AAPL", OrderSide::Buy, dec!(1), dec!(100)))
                .await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let account = store.get_account("hot").await.unwrap().unwrap();
    assert_eq!(account.order_count, 50);
    assert_eq!(account.cash, dec!(95000));
    assert_eq!(account.held_quantity("AAPL"), dec!(50));

    let orders = store.list_orders("hot", &OrderFilter::all()).await.unwrap();
    let sequences: Vec<u64> = orders.iter().map(|o| o.sequence).collect();
    assert_eq!(sequences, (1..=50).collect::<Vec<u64>>());
    assert_eq!(engine.locked_accounts(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_buys_never_overdraw() {
    let (engine, store, _) = paper_engine(dec!(1000));

    // Twenty buys of 100 against 1000 cash: exactly ten can succeed.
    let tasks = (0..20).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .place_order(&OrderRequest::limit("tight", "UL", OrderSide::Buy, dec!(2), dec!(50)))
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();
    let filled = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(filled, 10);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, EngineError::InsufficientFunds { .. })));

    let account = store.get_account("tight").await.unwrap().unwrap();
    assert_eq!(account.cash, Decimal::ZERO);
}

#[tokio::test]
async fn interleaved_symbols_keep_independent_averages() {
    let (engine, store, _) = paper_engine(dec!(100000));
    let fills = [
        ("AAPL", dec!(3), dec!(100)),
        ("MSFT", dec!(1), dec!(400)),
        ("AAPL", dec!(1), dec!(120)),
        ("MSFT", dec!(3), dec!(380)),
        ("AAPL", dec!(6), dec!(90)),
    ];
    for (symbol, quantity, price) in fills {
        engine
            .place_order(&OrderRequest::limit("i", symbol, OrderSide::Buy, quantity, price))
            .await
            .unwrap();
    }

    let account = store.get_account("i").await.unwrap().unwrap();
    // (300 + 120 + 540) / 10
    assert_eq!(account.position("AAPL").unwrap().average_cost, dec!(96));
    // (400 + 1140) / 4
    assert_eq!(account.position("MSFT").unwrap().average_cost, dec!(385));
    assert!(account.positions.values().all(|p| p.quantity > Decimal::ZERO));
}

#[tokio::test]
async fn oversized_order_is_rejected_without_touching_the_ledger() {
    let (engine, store, _) = paper_engine(dec!(10000));

    let err = engine
        .place_order(&OrderRequest::limit("x", "AAPL", OrderSide::Buy, Decimal::MAX, dec!(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(err.is_rejection());

    let account = store.get_account("x").await.unwrap().unwrap();
    assert_eq!(account.cash, dec!(10000));
    assert_eq!(account.order_count, 0);
    assert!(store.list_orders("x", &OrderFilter::all()).await.unwrap().is_empty());

    // The account lock was released: the next order goes through.
    engine
        .place_order(&OrderRequest::limit("x", "AAPL", OrderSide::Buy, dec!(1), dec!(2)))
        .await
        .unwrap();
}

#[tokio::test]
async fn blank_account_ids_are_rejected() {
    let (engine, store, _) = paper_engine(dec!(10000));

    let err = engine
        .place_order(&OrderRequest::market("  ", "AAPL", OrderSide::Buy, dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(store.list_account_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn hand_built_requests_share_one_position_per_symbol() {
    let (engine, store, _) = paper_engine(dec!(10000));

    let mut lower = OrderRequest::limit("n", "AAPL", OrderSide::Buy, dec!(2), dec!(100));
    lower.symbol = "aapl ".to_string();
    let receipt = engine.place_order(&lower).await.unwrap();
    assert_eq!(receipt.symbol, "AAPL");
    engine
        .place_order(&OrderRequest::limit("n", "AAPL", OrderSide::Buy, dec!(2), dec!(120)))
        .await
        .unwrap();

    let account = store.get_account("n").await.unwrap().unwrap();
    assert_eq!(account.positions.len(), 1);
    assert_eq!(account.held_quantity("AAPL"), dec!(4));
    assert_eq!(account.position("AAPL").unwrap().average_cost, dec!(110));
}

#[tokio::test]
async fn lock_table_does_not_grow_with_unknown_accounts() {
    let store = Arc::new(InMemoryAccountStore::new());
    let engine = TradingEngine::new(
        store.clone(),
        oracle(Arc::new(StaticFeed::new())),
        AccountPolicy::strict(dec!(10000)),
    );

    for i in 0..100 {
        let order = OrderRequest::limit(format!("ghost-{i}"), "UL", OrderSide::Buy, dec!(1), dec!(48));
        let err = engine.place_order(&order).await.unwrap_err();
        assert!(matches!(err, EngineError::AccountNotFound(_)));
        assert!(engine.get_portfolio(&format!("ghost-{i}")).await.is_err());
    }
    assert_eq!(engine.locked_accounts(), 0);
}

#[tokio::test]
async fn late_creation_keeps_the_other_engines_trades() {
    let shared = Arc::new(InMemoryAccountStore::new());
    let first = TradingEngine::new(
        shared.clone(),
        oracle(Arc::new(StaticFeed::new())),
        AccountPolicy::paper(dec!(1000)),
    );
    first
        .place_order(&OrderRequest::limit("s", "IBM", OrderSide::Buy, dec!(2), dec!(100)))
        .await
        .unwrap();

    // This engine misses the account on its first read and tries to create it.
    let second = TradingEngine::new(
        Arc::new(LaggingStore::new(shared.clone())),
        oracle(Arc::new(StaticFeed::new())),
        AccountPolicy::paper(dec!(1000)),
    );
    let receipt = second
        .place_order(&OrderRequest::limit("s", "IBM", OrderSide::Buy, dec!(1), dec!(100)))
        .await
        .unwrap();
    assert_eq!(receipt.cash_after, dec!(700));

    let account = shared.get_account("s").await.unwrap().unwrap();
    assert_eq!(account.order_count, 2);
    assert_eq!(account.position("IBM").unwrap().quantity, dec!(3));
    assert!(first.audit("s").await.unwrap().is_consistent());
}
