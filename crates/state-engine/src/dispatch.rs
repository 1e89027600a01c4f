//! Server side of the action wire contract.

use serde_json::Value;
use state_protocol_types::{channel_name, ActionRequest, ActionResponse, RealtimeEvent, StateData};
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::{EngineError, EngineResult};

/// Run one action request. Errors become `success = false` responses.
pub async fn handle_action(ctx: &RequestContext, request: ActionRequest) -> ActionResponse {
    match execute_action(ctx, &request).await {
        Ok((state, result)) => ActionResponse::ok(state, result),
        Err(e) => {
            warn!(
                session_id = %ctx.session_id(),
                state = %request.state,
                action = %request.action,
                error = %e,
                "Action request failed"
            );
            ActionResponse::failure(e.to_string())
        }
    }
}

/// Run one action request and return the post-action snapshot and the method's result.
pub async fn execute_action(
    ctx: &RequestContext,
    request: &ActionRequest,
) -> EngineResult<(StateData, Value)> {
    let entry = ctx.registry().entry(&request.state)?;
    let descriptor = entry
        .declaration
        .actions
        .get(&request.action)
        .ok_or_else(|| EngineError::ActionNotFound {
            state: request.state.clone(),
            action: request.action.clone(),
        })?;
    if !descriptor.runs_on_server() {
        return Err(EngineError::ClientOnlyAction {
            state: request.state.clone(),
            action: request.action.clone(),
        });
    }

    let proxy = ctx.get_state(&request.state).await?;
    let (snapshot, result) = {
        let mut proxy = proxy.lock().await;
        let result = proxy.call(&request.action, request.payload.clone()).await?;
        (proxy.snapshot()?, result)
    };

    let descriptor = &entry.declaration.descriptor;
    if descriptor.sync {
        if let Some(broadcaster) = ctx.registry().broadcaster() {
            let channel = channel_name(&request.state, descriptor.scope, ctx.session_id());
            broadcaster.publish(
                &channel,
                RealtimeEvent::state_updated(request.state.clone(), snapshot.clone()),
            );
        }
    }

    info!(
        session_id = %ctx.session_id(),
        state = %request.state,
        action = %request.action,
        "Action handled"
    );
    Ok((snapshot, result))
}
