//! Integration tests for the inventory ledger and coordinator.

use std::sync::Arc;

use common::{ErrorKind, LineItem, ProductId};
use event_bus::{EventPublisher, InMemoryEventBus};
use inventory::{
    InventoryError, InventoryLedger, InventoryTrigger, InventoryUpdateCoordinator,
    NewInventoryItem, SOURCE, TriggerOutcome, UpdateMode, handle_inventory_trigger,
};
use record_store::InMemoryRecordStore;

type Coordinator = InventoryUpdateCoordinator<InMemoryRecordStore, InMemoryEventBus>;

async fn setup(stock: &[(&str, i64)]) -> (Coordinator, InMemoryEventBus) {
    let ledger = InventoryLedger::new(InMemoryRecordStore::new());
    for (product, quantity) in stock {
        ledger
            .create_item(NewInventoryItem::new(*product, *quantity))
            .await
            .unwrap();
    }
    let bus = InMemoryEventBus::new();
    let publisher = EventPublisher::new(bus.clone(), SOURCE, "default");
    (InventoryUpdateCoordinator::new(ledger, publisher), bus)
}

async fn quantity(ledger: &InventoryLedger<InMemoryRecordStore>, product: &str) -> i64 {
    ledger
        .get_item(&ProductId::new(product))
        .await
        .unwrap()
        .unwrap()
        .quantity
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_decrements_succeed_only_within_stock() {
    // (initial quantity, k1, k2)
    let cases = [(10, 4, 6), (10, 4, 7), (5, 5, 5), (3, 1, 1), (0, 1, 1)];

    for (initial, k1, k2) in cases {
        let ledger = Arc::new(InventoryLedger::new(InMemoryRecordStore::new()));
        ledger
            .create_item(NewInventoryItem::new("SKU-1", initial))
            .await
            .unwrap();

        let sku = ProductId::new("SKU-1");
        let first = {
            let ledger = ledger.clone();
            let sku = sku.clone();
            tokio::spawn(async move { ledger.adjust_quantity(&sku, -k1).await })
        };
        let second = {
            let ledger = ledger.clone();
            let sku = sku.clone();
            tokio::spawn(async move { ledger.adjust_quantity(&sku, -k2).await })
        };
        let results = [first.await.unwrap(), second.await.unwrap()];

        let succeeded: Vec<i64> = results
            .iter()
            .zip([k1, k2])
            .filter(|(r, _)| r.is_ok())
            .map(|(_, k)| k)
            .collect();
        for result in results.iter().filter(|r| r.is_err()) {
            assert!(matches!(
                result,
                Err(InventoryError::InsufficientStock { .. })
            ));
        }

        let final_quantity = quantity(&ledger, "SKU-1").await;
        assert!(final_quantity >= 0);
        assert_eq!(final_quantity, initial - succeeded.iter().sum::<i64>());

        if k1 + k2 <= initial {
            assert_eq!(succeeded.len(), 2, "case {initial}/{k1}/{k2}");
        } else if k1 <= initial || k2 <= initial {
            assert_eq!(succeeded.len(), 1, "case {initial}/{k1}/{k2}");
        } else {
            assert!(succeeded.is_empty(), "case {initial}/{k1}/{k2}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_buyers_never_oversell() {
    let ledger = Arc::new(InventoryLedger::new(InMemoryRecordStore::new()));
    ledger
        .create_item(NewInventoryItem::new("SKU-HOT", 50))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..40 {
        let ledger = ledger.clone();
        let want = 1 + i % 3;
        handles.push(tokio::spawn(async move {
            let result = ledger
                .adjust_quantity(&ProductId::new("SKU-HOT"), -want)
                .await;
            (want, result)
        }));
    }

    let mut sold = 0;
    for handle in handles {
        match handle.await.unwrap() {
            (want, Ok(_)) => sold += want,
            (_, Err(e)) => assert_eq!(e.kind(), ErrorKind::InsufficientStock),
        }
    }

    let remaining = quantity(&ledger, "SKU-HOT").await;
    assert!(remaining >= 0);
    assert_eq!(sold + remaining, 50);
}

#[tokio::test]
async fn partial_application_is_observable() {
    let (coordinator, bus) = setup(&[("A", 20), ("B", 10)]).await;

    let result = coordinator
        .apply_order_items(
            &[LineItem::new("A", 5), LineItem::new("B", 1000)],
            UpdateMode::Deduct,
        )
        .await;

    assert!(matches!(
        result,
        Err(InventoryError::InsufficientStock { .. })
    ));
    // A was deducted and stays deducted; B is untouched.
    assert_eq!(quantity(coordinator.ledger(), "A").await, 15);
    assert_eq!(quantity(coordinator.ledger(), "B").await, 10);
    assert!(bus.published_of("InventoryUpdated").is_empty());
}

#[tokio::test]
async fn double_create_is_guarded() {
    let ledger = InventoryLedger::new(InMemoryRecordStore::new());

    ledger
        .create_item(NewInventoryItem::new("SKU-1", 5))
        .await
        .unwrap();
    let err = ledger
        .create_item(NewInventoryItem::new("SKU-1", 99))
        .await
        .unwrap_err();

    assert!(matches!(err, InventoryError::AlreadyExists(_)));
    assert_eq!(quantity(&ledger, "SKU-1").await, 5);
}

#[tokio::test]
async fn repeated_decrement_hits_stock_guard() {
    let ledger = InventoryLedger::new(InMemoryRecordStore::new());
    ledger
        .create_item(NewInventoryItem::new("sku-1", 5))
        .await
        .unwrap();
    let sku = ProductId::new("sku-1");

    assert_eq!(ledger.adjust_quantity(&sku, -3).await.unwrap().quantity, 2);
    let err = ledger.adjust_quantity(&sku, -3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert_eq!(quantity(&ledger, "sku-1").await, 2);
}

#[tokio::test]
async fn not_found_and_insufficient_stock_are_distinct() {
    let ledger = InventoryLedger::new(InMemoryRecordStore::new());
    ledger
        .create_item(NewInventoryItem::new("SKU-1", 1))
        .await
        .unwrap();

    let missing = ledger
        .adjust_quantity(&ProductId::new("SKU-2"), -1)
        .await
        .unwrap_err();
    let short = ledger
        .adjust_quantity(&ProductId::new("SKU-1"), -2)
        .await
        .unwrap_err();

    assert_eq!(missing.kind(), ErrorKind::NotFound);
    assert_eq!(short.kind(), ErrorKind::InsufficientStock);
}

#[tokio::test]
async fn unreachable_bus_does_not_undo_deduction() {
    let (coordinator, bus) = setup(&[("A", 10)]).await;
    bus.set_unreachable(true);

    let updated = coordinator
        .apply_order_items(&[LineItem::new("A", 4)], UpdateMode::Deduct)
        .await
        .unwrap();

    assert_eq!(updated[0].quantity, 6);
    assert_eq!(quantity(coordinator.ledger(), "A").await, 6);
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn trigger_handler_reports_partial_failure() {
    let (coordinator, _bus) = setup(&[("A", 20), ("B", 10)]).await;

    let outcome = handle_inventory_trigger(
        &coordinator,
        InventoryTrigger {
            order_id: "order-7".to_string(),
            items: vec![LineItem::new("A", 5), LineItem::new("B", 1000)],
        },
    )
    .await
    .unwrap();

    match outcome {
        TriggerOutcome::Failed { order_id, error } => {
            assert_eq!(order_id, "order-7");
            assert_eq!(error.kind, ErrorKind::InsufficientStock);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(quantity(coordinator.ledger(), "A").await, 15);
}
