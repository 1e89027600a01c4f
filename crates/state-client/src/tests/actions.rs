//! Action dispatch tests.
//!
//! Rules covered:
//! - 61. Unknown actions are an error and send nothing
//! - 62. Client-mode actions run the local handler without a round trip
//! - 63. A client-mode action with no handler is a no-op
//! - 64. A declined confirmation aborts with no round trip
//! - 65. An accepted confirmation dispatches
//! - 66. Success replaces the whole state and notifies once
//! - 67. A server failure leaves state unchanged and clears loading
//! - 68. Transport errors surface and clear pending
//! - 69. Debounce coalesces a burst into one dispatch shared by every caller
//! - 70. Calls further apart than the debounce window dispatch separately
//! - 71. Dispatches for one state apply in issue order
//! - 72. The action is pending only while in flight
//! - 73. Background actions never toggle the loading binding

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use state_protocol_types::ActionResponse;
use tokio::time::Instant;

use super::fixtures::{data, harness, harness_with_confirm, MockTransport};
use crate::{ActionOutcome, BindingUpdate, ClientError};

/// Rule 61: Unknown actions are an error and send nothing
#[tokio::test]
async fn rule_61_unknown_action() {
    let h = harness(MockTransport::new());

    let err = h
        .store
        .action("cart", "checkout", json!({}))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::UnknownAction {
            state: "cart".to_string(),
            action: "checkout".to_string(),
        }
    );

    let err = h.store.action("wishlist", "add", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownAction { .. }));
    assert!(h.transport.sent().is_empty());
}

/// Rule 62: Client-mode actions run the local handler without a round trip
#[tokio::test]
async fn rule_62_client_handler() {
    let h = harness(MockTransport::new());
    h.store
        .register_handler("cart", "toggle_panel", |store, _payload| {
            let open = store
                .get_field("cart", "panel_open")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            store.set("cart", "panel_open", json!(!open));
            json!(!open)
        });

    let outcome = h
        .store
        .action("cart", "toggle_panel", json!({}))
        .await
        .unwrap();

    assert_eq!(outcome.result(), Some(&json!(true)));
    assert_eq!(h.store.get_field("cart", "panel_open"), Some(json!(true)));
    assert!(h.transport.sent().is_empty());
    assert!(h.bindings.loading_transitions("cart.toggle_panel").is_empty());
}

/// Rule 63: A client-mode action with no handler is a no-op
#[tokio::test]
async fn rule_63_client_action_without_handler() {
    let h = harness(MockTransport::new());
    let before = h.store.get("cart");

    let outcome = h
        .store
        .action("cart", "toggle_panel", json!({}))
        .await
        .unwrap();

    assert_eq!(outcome, ActionOutcome::NoHandler);
    assert_eq!(h.store.get("cart"), before);
    assert!(h.transport.sent().is_empty());
}

/// Rule 64: A declined confirmation aborts with no round trip
#[tokio::test]
async fn rule_64_declined_confirmation() {
    let h = harness_with_confirm(MockTransport::new(), false);
    let before = h.store.get("cart");

    let outcome = h.store.action("cart", "clear", json!({})).await.unwrap();

    assert_eq!(outcome, ActionOutcome::Declined);
    assert_eq!(h.confirm.prompts(), vec!["Empty the cart?"]);
    assert!(h.transport.sent().is_empty());
    assert_eq!(h.store.get("cart"), before);
    assert!(h.bindings.updates().is_empty());
}

/// Rule 65: An accepted confirmation dispatches
#[tokio::test]
async fn rule_65_accepted_confirmation() {
    let transport = MockTransport::new().reply(ActionResponse::ok(
        data(json!({ "items": [], "item_count": 0 })),
        json!(null),
    ));
    let h = harness_with_confirm(transport, true);

    h.store.action("cart", "clear", json!({})).await.unwrap();

    assert_eq!(h.confirm.prompts().len(), 1);
    assert_eq!(h.transport.sent().len(), 1);
    assert_eq!(h.store.get_field("cart", "items"), Some(json!([])));
}

/// Rule 66: Success replaces the whole state and notifies once
#[tokio::test]
async fn rule_66_success_replaces_state() {
    let transport = MockTransport::new().reply(ActionResponse::ok(
        data(json!({ "items": ["a", "b"], "item_count": 2 })),
        json!({ "added": "b" }),
    ));
    let h = harness(transport);

    let notices = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notices);
    let _sub = h.store.subscribe("cart", move |notice| {
        assert!(notice.key.is_none());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let outcome = h
        .store
        .action("cart", "add_item", json!({ "sku": "b" }))
        .await
        .unwrap();

    assert_eq!(outcome.result(), Some(&json!({ "added": "b" })));
    assert_eq!(notices.load(Ordering::SeqCst), 1);

    // Not a merge: `panel_open` was only in the old mirror.
    assert_eq!(
        h.store.get("cart"),
        Some(data(json!({ "items": ["a", "b"], "item_count": 2 })))
    );
    assert!(h.bindings.updates().contains(&BindingUpdate::State {
        state: "cart".to_string(),
        data: data(json!({ "items": ["a", "b"], "item_count": 2 })),
    }));
    assert_eq!(h.transport.sent()[0].payload, json!({ "sku": "b" }));
}

/// Rule 67: A server failure leaves state unchanged and clears loading
#[tokio::test]
async fn rule_67_quota_exceeded() {
    let transport = MockTransport::new().reply(ActionResponse::failure("quota exceeded"));
    let h = harness(transport);
    let before = h.store.get("cart");

    let err = h
        .store
        .action("cart", "add_item", json!({ "sku": "z" }))
        .await
        .unwrap_err();

    assert_eq!(err, ClientError::Server("quota exceeded".to_string()));
    assert_eq!(err.to_string(), "quota exceeded");
    assert_eq!(h.store.get("cart"), before);
    assert!(!h.store.is_pending("cart", "add_item"));
    assert_eq!(
        h.bindings.loading_transitions("cart.add_item"),
        vec![true, false]
    );
}

/// Rule 68: Transport errors surface and clear pending
#[tokio::test]
async fn rule_68_transport_error() {
    let transport =
        MockTransport::new().fail(ClientError::Transport("connection reset".to_string()));
    let h = harness(transport);

    let err = h
        .store
        .action("counter", "increment", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(h.store.get_field("counter", "count"), Some(json!(0)));
    assert!(!h.store.is_pending("counter", "increment"));
    assert_eq!(
        h.bindings.loading_transitions("counter.increment"),
        vec![true, false]
    );
}

/// Rule 69: Debounce coalesces a burst into one dispatch shared by every caller
#[tokio::test(start_paused = true)]
async fn rule_69_debounce_coalesces() {
    let transport = MockTransport::new().reply(ActionResponse::ok(
        data(json!({ "items": ["a"], "query": "abc" })),
        json!(["abc-1"]),
    ));
    let h = harness(transport);
    let start = Instant::now();

    let mut callers = Vec::new();
    for (i, query) in ["a", "ab", "abc"].into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let store = h.store.clone();
        callers.push(tokio::spawn(async move {
            store.action("cart", "search", json!({ "q": query })).await
        }));
    }

    for caller in callers {
        assert_eq!(
            caller.await.unwrap(),
            Ok(ActionOutcome::Completed {
                result: json!(["abc-1"])
            })
        );
    }

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, json!({ "q": "abc" }));

    // Last call at 100 ms plus the 200 ms window.
    let fired = h.transport.sent_at()[0] - start;
    assert!(fired >= Duration::from_millis(300), "fired at {:?}", fired);
    assert_eq!(h.store.get_field("cart", "query"), Some(json!("abc")));
}

/// Rule 70: Calls further apart than the debounce window dispatch separately
#[tokio::test(start_paused = true)]
async fn rule_70_debounce_window_expires() {
    let h = harness(MockTransport::new());

    let first = h.store.action("cart", "search", json!({ "q": "a" })).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    let second = h.store.action("cart", "search", json!({ "q": "b" })).await;

    assert_eq!(first.unwrap().result(), Some(&json!({ "q": "a" })));
    assert_eq!(second.unwrap().result(), Some(&json!({ "q": "b" })));
    assert_eq!(h.transport.sent().len(), 2);
}

/// Rule 71: Dispatches for one state apply in issue order
#[tokio::test(start_paused = true)]
async fn rule_71_same_state_serialized() {
    let transport = MockTransport::new()
        .reply_after(
            Duration::from_millis(100),
            ActionResponse::ok(data(json!({ "count": 1 })), json!(null)),
        )
        .reply_after(
            Duration::from_millis(10),
            ActionResponse::ok(data(json!({ "count": -1 })), json!(null)),
        );
    let h = harness(transport);

    let store = h.store.clone();
    let slow = tokio::spawn(async move { store.action("counter", "increment", json!({})).await });
    tokio::time::sleep(Duration::from_millis(1)).await;
    let store = h.store.clone();
    let fast = tokio::spawn(async move { store.action("counter", "decrement", json!({})).await });

    slow.await.unwrap().unwrap();
    fast.await.unwrap().unwrap();

    // The later-issued action wins even though its reply is faster.
    assert_eq!(h.store.get_field("counter", "count"), Some(json!(-1)));

    let sent_at = h.transport.sent_at();
    assert!(sent_at[1] - sent_at[0] >= Duration::from_millis(100));
}

/// Rule 72: The action is pending only while in flight
#[tokio::test(start_paused = true)]
async fn rule_72_pending_while_in_flight() {
    let transport = MockTransport::new().reply_after(
        Duration::from_millis(50),
        ActionResponse::ok(data(json!({ "count": 1 })), json!(null)),
    );
    let h = harness(transport);
    assert!(!h.store.is_pending("counter", "increment"));

    let store = h.store.clone();
    let call = tokio::spawn(async move { store.action("counter", "increment", json!({})).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.store.is_pending("counter", "increment"));

    call.await.unwrap().unwrap();
    assert!(!h.store.is_pending("counter", "increment"));
    assert_eq!(
        h.bindings.loading_transitions("counter.increment"),
        vec![true, false]
    );
}

/// Rule 73: Background actions never toggle the loading binding
#[tokio::test]
async fn rule_73_background_action_has_no_loading() {
    let payload = r#"{
        "states": {"feed": {"entries": []}},
        "actions": {"feed": {"refresh": {"mode": "background"}}}
    }"#;
    let transport = Arc::new(MockTransport::new().reply(ActionResponse::ok(
        data(json!({ "entries": [1, 2] })),
        json!(null),
    )));
    let bindings = Arc::new(crate::RecordingBindings::new());
    let store = crate::ClientStateStore::with_parts(
        transport.clone(),
        Arc::new(crate::AlwaysConfirm),
        bindings.clone(),
    );
    assert!(store.hydrate(payload));

    store.action("feed", "refresh", json!({})).await.unwrap();

    assert_eq!(store.get_field("feed", "entries"), Some(json!([1, 2])));
    assert!(bindings.loading_transitions("feed.refresh").is_empty());
    assert!(!store.is_pending("feed", "refresh"));
}
