//! User confirmation before an action with a confirm prompt.

use async_trait::async_trait;

#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    /// `false` aborts the action with no network call.
    async fn confirm(&self, message: &str) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

#[async_trait]
impl ConfirmPrompt for AlwaysConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        true
    }
}

/// Confirmation decided by a closure.
pub struct FnConfirm<F>(pub F);

#[async_trait]
impl<F> ConfirmPrompt for FnConfirm<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn confirm(&self, message: &str) -> bool {
        (self.0)(message)
    }
}
