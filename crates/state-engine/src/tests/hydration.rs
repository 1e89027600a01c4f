//! Hydration tests.
//!
//! Rules covered:
//! - 31. Only states loaded in this request are hydrated
//! - 32. States with sync disabled are never hydrated
//! - 33. Hydrated data equals the proxy snapshot
//! - 34. The payload carries action metadata for every registered state
//! - 35. Embedding happens once per request
//! - 36. Each request context embeds independently
//! - 37. Embedded markup cannot be closed early by state values
//! - 38. The same name within a request resolves to the same proxy

use std::sync::Arc;

use serde_json::json;
use state_protocol_types::{HydrationPayload, HYDRATION_ELEMENT_ID};

use super::fixtures::{harness, SESSION};
use crate::RequestContext;

fn script_body(tag: &str) -> &str {
    let start = tag.find('>').map(|i| i + 1).unwrap_or(0);
    tag[start..].trim_end_matches("</script>")
}

/// Rule 31: Only states loaded in this request are hydrated
#[tokio::test]
async fn rule_31_only_loaded_states() {
    let h = harness().await;
    let ctx = RequestContext::new(h.registry.clone(), SESSION);
    assert!(ctx.hydration_data().await.unwrap().is_empty());

    ctx.get_state("cart").await.unwrap();
    let data = ctx.hydration_data().await.unwrap();
    assert_eq!(data.keys().collect::<Vec<_>>(), vec!["cart"]);
}

/// Rule 32: States with sync disabled are never hydrated
#[tokio::test]
async fn rule_32_unsynced_states_excluded() {
    let h = harness().await;
    let ctx = RequestContext::new(h.registry.clone(), SESSION);
    ctx.get_state("profile").await.unwrap();
    ctx.get_state("counter").await.unwrap();

    let data = ctx.hydration_data().await.unwrap();
    assert!(data.contains_key("counter"));
    assert!(!data.contains_key("profile"));
    assert_eq!(ctx.loaded_states(), vec!["counter", "profile"]);
}

/// Rule 33: Hydrated data equals the proxy snapshot
#[tokio::test]
async fn rule_33_hydration_matches_snapshot() {
    let h = harness().await;
    let ctx = RequestContext::new(h.registry.clone(), SESSION);
    let cart = ctx.get_state("cart").await.unwrap();
    cart.lock()
        .await
        .call("add_item", json!({ "sku": "sku-9" }))
        .await
        .unwrap();

    let snapshot = cart.lock().await.snapshot().unwrap();
    let data = ctx.hydration_data().await.unwrap();
    assert_eq!(data["cart"], snapshot);
    assert_eq!(data["cart"]["item_count"], json!(1));
}

/// Rule 34: The payload carries action metadata for every registered state
#[tokio::test]
async fn rule_34_payload_actions() {
    let h = harness().await;
    let ctx = RequestContext::new(h.registry.clone(), SESSION);
    ctx.get_state("counter").await.unwrap();

    let payload = ctx.hydration_payload().await.unwrap();
    assert_eq!(payload.states.len(), 1);
    assert_eq!(payload.actions.len(), 5);
    assert!(payload.actions["cart"].contains_key("add_item"));
}

/// Rule 35: Embedding happens once per request
#[tokio::test]
async fn rule_35_embed_once() {
    let h = harness().await;
    let ctx = RequestContext::new(h.registry.clone(), SESSION);
    ctx.get_state("counter").await.unwrap();

    let tag = ctx.embed_hydration().await.unwrap().unwrap();
    assert!(tag.contains(&format!(r#"id="{}""#, HYDRATION_ELEMENT_ID)));
    let payload = HydrationPayload::from_json(script_body(&tag)).unwrap();
    assert_eq!(payload.states["counter"]["count"], json!(0));

    assert!(ctx.embed_hydration().await.unwrap().is_none());
    assert!(ctx.embed_hydration().await.unwrap().is_none());
}

/// Rule 36: Each request context embeds independently
#[tokio::test]
async fn rule_36_contexts_are_isolated() {
    let h = harness().await;
    let first = RequestContext::new(Arc::clone(&h.registry), SESSION);
    let second = RequestContext::new(Arc::clone(&h.registry), SESSION);

    assert!(first.embed_hydration().await.unwrap().is_some());
    assert!(second.embed_hydration().await.unwrap().is_some());
}

/// Rule 37: Embedded markup cannot be closed early by state values
#[tokio::test]
async fn rule_37_markup_escaped() {
    let h = harness().await;
    let ctx = RequestContext::new(h.registry.clone(), SESSION);
    let banner = ctx.get_state("banner").await.unwrap();
    banner
        .lock()
        .await
        .set("text", json!("</script><script>alert(1)</script>"))
        .unwrap();

    let tag = ctx.embed_hydration().await.unwrap().unwrap();
    assert_eq!(tag.matches("</script>").count(), 1);

    let payload = HydrationPayload::from_json(script_body(&tag)).unwrap();
    assert_eq!(
        payload.states["banner"]["text"],
        json!("</script><script>alert(1)</script>")
    );
}

/// Rule 38: The same name within a request resolves to the same proxy
#[tokio::test]
async fn rule_38_same_proxy_within_request() {
    let h = harness().await;
    let ctx = RequestContext::new(h.registry.clone(), SESSION);

    let a = ctx.get_state("counter").await.unwrap();
    let b = ctx.get_state("counter").await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    a.lock().await.set("count", json!(3)).unwrap();
    assert_eq!(b.lock().await.get("count"), json!(3));
    assert_eq!(h.session.reads(), 1);
}
