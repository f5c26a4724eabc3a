//! Integration tests for the order workflow.
//!
//! These tests run the workflow against the in-memory record store and
//! event bus, including bus outages.

use std::time::Duration;

use common::{ErrorKind, LineItem, Money};
use event_bus::{EventPublisher, InMemoryEventBus};
use inventory::{InventoryLedger, NewInventoryItem};
use orders::{
    CreateOrderRequest, OrderError, OrderRepository, OrderStatus, OrderWorkflow, SOURCE,
};
use record_store::{InMemoryRecordStore, RecordStore};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    workflow: OrderWorkflow<InMemoryRecordStore, InMemoryEventBus>,
    store: InMemoryRecordStore,
    bus: InMemoryEventBus,
}

async fn harness(stock: &[(&str, i64)]) -> Harness {
    let store = InMemoryRecordStore::new();
    let bus = InMemoryEventBus::new();
    let ledger = InventoryLedger::new(store.clone());
    for (product, quantity) in stock {
        ledger
            .create_item(NewInventoryItem::new(*product, *quantity))
            .await
            .unwrap();
    }
    let publisher = EventPublisher::new(bus.clone(), SOURCE, "default");
    let repository = OrderRepository::new(store.clone(), publisher.clone());
    Harness {
        workflow: OrderWorkflow::new(repository, ledger, publisher),
        store,
        bus,
    }
}

fn request(items: Vec<LineItem>) -> CreateOrderRequest {
    CreateOrderRequest::new("user-1", items, Money::from_cents(4500))
}

mod create_order {
    use super::*;

    #[tokio::test]
    async fn persists_created_order_and_announces_it() {
        let h = harness(&[("SKU-1", 10)]).await;

        let order = h
            .workflow
            .create_order(request(vec![LineItem::new("SKU-1", 3)]))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Created);

        let stored = h.workflow.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored, order);

        let event = h.bus.wait_for_event("OrderCreated", WAIT).await.unwrap();
        assert_eq!(event.source, "ecommerce.orders");
        assert_eq!(event.detail["orderId"], order.id.to_string());
        assert_eq!(event.detail["totalAmount"], 4500);
        assert_eq!(event.detail["items"][0]["productId"], "SKU-1");
    }

    #[tokio::test]
    async fn feasibility_check_does_not_consume_stock() {
        let h = harness(&[("SKU-1", 10)]).await;

        h.workflow
            .create_order(request(vec![LineItem::new("SKU-1", 10)]))
            .await
            .unwrap();

        let ledger = InventoryLedger::new(h.store.clone());
        let record = ledger
            .get_item(&common::ProductId::new("SKU-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.quantity, 10);
    }

    #[tokio::test]
    async fn unreachable_bus_still_creates_order() {
        let h = harness(&[("SKU-1", 10)]).await;
        h.bus.set_unreachable(true);

        let order = h
            .workflow
            .create_order(request(vec![LineItem::new("SKU-1", 1)]))
            .await
            .unwrap();

        assert!(h.bus.wait_for_failures(1, WAIT).await);
        let stored = h.workflow.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Created);
        assert!(h.bus.published().is_empty());
    }
}

mod rejections {
    use super::*;

    #[tokio::test]
    async fn insufficient_stock_publishes_order_failed() {
        let h = harness(&[("SKU-1", 2)]).await;

        let err = h
            .workflow
            .create_order(request(vec![LineItem::new("SKU-1", 3)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let event = h.bus.wait_for_event("OrderFailed", WAIT).await.unwrap();
        assert_eq!(event.detail["reason"], "INSUFFICIENT_STOCK");
        assert_eq!(event.detail["userId"], "user-1");
        assert_eq!(h.bus.published_of("OrderFailed").len(), 1);
        assert!(h.bus.published_of("OrderCreated").is_empty());
        assert!(h.store.scan(orders::TABLE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_lines_are_summed_before_checking() {
        let h = harness(&[("SKU-1", 4)]).await;

        let err = h
            .workflow
            .create_order(request(vec![
                LineItem::new("SKU-1", 2),
                LineItem::new("SKU-1", 3),
            ]))
            .await
            .unwrap_err();

        match err {
            OrderError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 4);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_product_is_not_found_without_event() {
        let h = harness(&[("SKU-1", 5)]).await;

        let err = h
            .workflow
            .create_order(request(vec![LineItem::new("SKU-404", 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.bus.published().is_empty());
    }

    #[tokio::test]
    async fn validation_errors_publish_nothing() {
        let h = harness(&[("SKU-1", 5)]).await;

        let err = h
            .workflow
            .create_order(CreateOrderRequest::new(
                "",
                vec![LineItem::new("SKU-1", 1)],
                Money::zero(),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = h.workflow.create_order(request(vec![])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.bus.published().is_empty());
    }

    #[tokio::test]
    async fn store_outage_is_transient() {
        let h = harness(&[("SKU-1", 5)]).await;
        h.store.set_unavailable(true);

        let err = h
            .workflow
            .create_order(request(vec![LineItem::new("SKU-1", 1)]))
            .await
            .unwrap_err();
        assert!(err.kind().is_retryable());
    }
}

mod status {
    use super::*;

    #[tokio::test]
    async fn order_moves_to_completed_once() {
        let h = harness(&[("SKU-1", 5)]).await;
        let order = h
            .workflow
            .create_order(request(vec![LineItem::new("SKU-1", 1)]))
            .await
            .unwrap();

        let repository = h.workflow.repository();
        let completed = repository
            .update_status(order.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);

        let err = repository
            .update_status(order.id, OrderStatus::Failed)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let updates = h.bus.published_of("OrderUpdated");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].detail["status"], "COMPLETED");
    }
}
