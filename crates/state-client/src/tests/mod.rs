//! Integration tests for the client store.
//!
//! - `store.rs`   - Rules 51-60 (hydration, reads, local writes, subscriptions)
//! - `actions.rs` - Rules 61-75 (dispatch branches, debounce, ordering, pending)
//!
//! Realtime channel tests live beside the channel in `realtime/channel.rs`.

mod actions;
mod store;

use serde_json::json;
use state_protocol_types::ActionResponse;

use crate::ActionOutcome;
use fixtures::{data, harness, MockTransport};

/// Basic workflow: hydrate, write locally, run a server action.
#[tokio::test]
async fn basic_workflow() {
    let transport = MockTransport::new().reply(ActionResponse::ok(
        data(json!({ "count": 1 })),
        json!({ "incremented": true }),
    ));
    let h = harness(transport);

    assert_eq!(h.store.get_field("counter", "count"), Some(json!(0)));

    h.store.set("cart", "panel_open", json!(true));
    assert_eq!(h.store.get_field("cart", "panel_open"), Some(json!(true)));

    let outcome = h
        .store
        .action("counter", "increment", json!({}))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ActionOutcome::Completed {
            result: json!({ "incremented": true })
        }
    );
    assert_eq!(h.store.get_field("counter", "count"), Some(json!(1)));

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].state, "counter");
    assert_eq!(sent[0].action, "increment");
}
