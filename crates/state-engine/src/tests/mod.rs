//! Integration tests for the state engine.
//!
//! - `registration.rs` - Rules 1-10 (declarations, naming, conflicts)
//! - `proxy.rs`        - Rules 11-20 (field access, observability, computed cache)
//! - `persistence.rs`  - Rules 21-30 (load, dirty gate, rollback, backends)
//! - `hydration.rs`    - Rules 31-40 (hydration data and embedding)
//! - `actions.rs`      - Rules 41-50 (action endpoint and broadcast)

mod hydration;

use serde_json::json;

use crate::RequestContext;
use fixtures::{harness, SESSION};

/// Basic workflow: load, act, hydrate.
#[tokio::test]
async fn basic_workflow() {
    let h = harness().await;
    let ctx = RequestContext::new(h.registry.clone(), SESSION);

    let counter = ctx.get_state("counter").await.unwrap();
    {
        let mut counter = counter.lock().await;
        assert_eq!(counter.get("count"), json!(0));
        counter.call("increment", json!({})).await.unwrap();
        assert_eq!(counter.get("count"), json!(1));
        assert_eq!(counter.get("double"), json!(2));
    }

    let payload = ctx.hydration_payload().await.unwrap();
    assert_eq!(
        serde_json::Value::Object(payload.states["counter"].clone()),
        json!({ "count": 1, "step": 0, "double": 2, "parity": "odd" })
    );
    assert!(ctx.embed_hydration().await.unwrap().is_some());
    assert_eq!(h.session.writes(), 1);
}
