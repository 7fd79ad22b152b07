//! Concurrent fan-out of signals to their handlers.

use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::core::models::{ContentSignal, Contribution, HandlerContribution};
use crate::handlers::{ChatContext, HandlerRegistry};

/// Run every registered handler for every signal concurrently, each under
/// its own `timeout`, and wait for all of them.
///
/// The returned contributions are ordered by signal position, then by
/// handler registration order, no matter which handler finished first.
/// Abstains and timeouts are logged and dropped.
pub(crate) async fn dispatch_all(
    registry: &HandlerRegistry,
    signals: &[ContentSignal],
    context: &ChatContext,
    timeout: Duration,
) -> Vec<Contribution> {
    let calls = signals.iter().flat_map(move |signal| {
        registry.lookup(signal.kind()).iter().map(move |handler| async move {
            info!(
                "Dispatching {} signal to {} handler for chat {}",
                signal.kind(),
                handler.name(),
                context.chat_id
            );
            match tokio::time::timeout(timeout, handler.handle(signal, context)).await {
                Ok(HandlerContribution::Contributed(contribution)) => Some(contribution),
                Ok(HandlerContribution::Abstain { reason }) => {
                    warn!(
                        "{} handler abstained on {} signal for chat {}: {}",
                        handler.name(),
                        signal.kind(),
                        context.chat_id,
                        reason
                    );
                    None
                }
                Err(_) => {
                    warn!(
                        "{} handler timed out after {:?} on {} signal for chat {}",
                        handler.name(),
                        timeout,
                        signal.kind(),
                        context.chat_id
                    );
                    None
                }
            }
        })
    });

    // join_all yields results in input order, which is the merge order.
    join_all(calls).await.into_iter().flatten().collect()
}
