//! Store tests.
//!
//! Rules covered:
//! - 51. Hydration loads every state and the action metadata
//! - 52. Hydration runs once; later payloads are ignored
//! - 53. A malformed payload leaves the store empty
//! - 54. Unknown states and fields read as None
//! - 55. Local set updates the mirror, notifies, and applies the field binding
//! - 56. Subscribers only hear about their own state
//! - 57. Dropping or unsubscribing stops notifications
//! - 58. Listeners may read and write the store while being notified
//! - 59. Realtime state updates replace the whole state
//! - 60. Item events go to bindings; heartbeats change nothing

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use state_protocol_types::{ActionMode, RealtimeEvent};

use super::fixtures::{data, harness, shop_payload, MockTransport};
use crate::{BindingUpdate, ChangeNotice, ClientStateStore, RecordingBindings};

fn recorder(store: &ClientStateStore, state: &str) -> (crate::Subscription, Arc<Mutex<Vec<ChangeNotice>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = store.subscribe(state, move |notice| sink.lock().push(notice.clone()));
    (sub, seen)
}

/// Rule 51: Hydration loads every state and the action metadata
#[test]
fn rule_51_hydration_loads_states_and_actions() {
    let bindings = Arc::new(RecordingBindings::new());
    let store = ClientStateStore::with_parts(
        Arc::new(MockTransport::new()),
        Arc::new(crate::AlwaysConfirm),
        bindings.clone(),
    );
    assert!(!store.is_hydrated());

    assert!(store.hydrate(&shop_payload().to_json().unwrap()));

    assert!(store.is_hydrated());
    assert_eq!(store.state_names(), vec!["cart", "counter"]);
    assert_eq!(store.get_field("cart", "items"), Some(json!(["a"])));
    assert_eq!(
        store.action_descriptor("cart", "toggle_panel").map(|d| d.mode),
        Some(ActionMode::Client)
    );
    assert_eq!(
        store
            .action_descriptor("cart", "search")
            .and_then(|d| d.debounce_ms),
        Some(200)
    );

    // Every hydrated state is pushed to its bindings.
    let applied: Vec<String> = bindings
        .updates()
        .into_iter()
        .filter_map(|u| match u {
            BindingUpdate::State { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(applied, vec!["cart", "counter"]);
}

/// Rule 52: Hydration runs once; later payloads are ignored
#[test]
fn rule_52_hydration_runs_once() {
    let h = harness(MockTransport::new());

    let second = r#"{"states":{"counter":{"count":99}},"actions":{}}"#;
    assert!(!h.store.hydrate(second));

    assert_eq!(h.store.get_field("counter", "count"), Some(json!(0)));
    assert!(h.store.action_descriptor("counter", "increment").is_some());
}

/// Rule 53: A malformed payload leaves the store empty
#[test]
fn rule_53_malformed_payload_degrades_to_empty() {
    let store = ClientStateStore::new(Arc::new(MockTransport::new()));

    assert!(!store.hydrate("{\"states\": [not json"));

    assert!(store.is_hydrated());
    assert!(store.state_names().is_empty());
    assert!(store.get("cart").is_none());

    // The failed attempt still counts as the one hydration.
    assert!(!store.hydrate(&shop_payload().to_json().unwrap()));
    assert!(store.get("cart").is_none());
}

/// Rule 54: Unknown states and fields read as None
#[test]
fn rule_54_unknown_reads_are_none() {
    let h = harness(MockTransport::new());

    assert!(h.store.get("wishlist").is_none());
    assert!(h.store.get_field("wishlist", "items").is_none());
    assert!(h.store.get_field("cart", "coupon").is_none());
    assert_eq!(
        h.store.get("counter"),
        Some(data(json!({ "count": 0 })))
    );
}

/// Rule 55: Local set updates the mirror, notifies, and applies the field binding
#[test]
fn rule_55_set_notifies_and_binds() {
    let h = harness(MockTransport::new());
    let (_sub, seen) = recorder(&h.store, "cart");

    h.store.set("cart", "panel_open", json!(true));

    assert_eq!(h.store.get_field("cart", "panel_open"), Some(json!(true)));

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].state_name, "cart");
    assert_eq!(seen[0].key.as_deref(), Some("panel_open"));
    assert_eq!(seen[0].old_value, json!(false));
    assert_eq!(seen[0].new_value, json!(true));
    assert_eq!(seen[0].state.get("items"), Some(&json!(["a"])));

    assert_eq!(
        h.bindings.updates(),
        vec![BindingUpdate::Field {
            state: "cart".to_string(),
            key: "panel_open".to_string(),
            value: json!(true),
        }]
    );

    // Local writes never reach the server.
    assert!(h.transport.sent().is_empty());
}

/// Rule 56: Subscribers only hear about their own state
#[test]
fn rule_56_subscriptions_are_per_state() {
    let h = harness(MockTransport::new());
    let (_cart, cart_seen) = recorder(&h.store, "cart");
    let (_counter, counter_seen) = recorder(&h.store, "counter");

    h.store.set("counter", "count", json!(4));

    assert!(cart_seen.lock().is_empty());
    assert_eq!(counter_seen.lock().len(), 1);
    assert_eq!(counter_seen.lock()[0].old_value, json!(0));
}

/// Rule 57: Dropping or unsubscribing stops notifications
#[test]
fn rule_57_unsubscribe_stops_notifications() {
    let h = harness(MockTransport::new());
    let (explicit, explicit_seen) = recorder(&h.store, "cart");
    let (dropped, dropped_seen) = recorder(&h.store, "cart");
    assert_eq!(h.store.listener_count("cart"), 2);

    h.store.set("cart", "panel_open", json!(true));
    explicit.unsubscribe();
    drop(dropped);
    h.store.set("cart", "panel_open", json!(false));

    assert_eq!(h.store.listener_count("cart"), 0);
    assert_eq!(explicit_seen.lock().len(), 1);
    assert_eq!(dropped_seen.lock().len(), 1);
}

/// Rule 58: Listeners may read and write the store while being notified
#[test]
fn rule_58_reentrant_listener() {
    let h = harness(MockTransport::new());
    let store = h.store.clone();
    let _sub = h.store.subscribe("counter", move |notice| {
        let count = notice.new_value.as_i64().unwrap_or(0);
        store.set("cart", "item_count", json!(count * 10));
    });

    h.store.set("counter", "count", json!(3));

    assert_eq!(h.store.get_field("cart", "item_count"), Some(json!(30)));
}

/// Rule 59: Realtime state updates replace the whole state
#[test]
fn rule_59_realtime_update_replaces_state() {
    let h = harness(MockTransport::new());
    let (_sub, seen) = recorder(&h.store, "cart");

    h.store.apply_realtime_event(RealtimeEvent::state_updated(
        "cart",
        data(json!({ "items": 3 })),
    ));

    assert_eq!(h.store.get("cart"), Some(data(json!({ "items": 3 }))));

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].key.is_none());
    assert_eq!(seen[0].new_value, json!({ "items": 3 }));
    assert_eq!(seen[0].old_value["item_count"], json!(1));
}

/// Rule 60: Item events go to bindings; heartbeats change nothing
#[test]
fn rule_60_item_events_and_heartbeats() {
    let h = harness(MockTransport::new());
    let (_sub, seen) = recorder(&h.store, "cart");
    let before = h.store.get("cart");

    let created = RealtimeEvent::ItemCreated(json!({ "id": "sku-9" }));
    h.store.apply_realtime_event(created.clone());
    h.store.apply_realtime_event(RealtimeEvent::Heartbeat);
    h.store.apply_realtime_event(RealtimeEvent::Other {
        name: "presence".to_string(),
        data: "{}".to_string(),
    });

    assert_eq!(h.store.get("cart"), before);
    assert!(seen.lock().is_empty());
    assert_eq!(
        h.bindings.updates(),
        vec![BindingUpdate::Item { event: created }]
    );
}
