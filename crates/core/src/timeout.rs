use crate::error::{AgentError, Result};
use std::future::Future;
use std::time::Duration;

/// Runs a collaborator call under a time budget.
///
/// # Errors
/// Returns `CollaboratorTimeout` naming `operation` if `limit` elapses first, otherwise
/// whatever the call itself returns.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(AgentError::timeout(operation, limit)))
}
