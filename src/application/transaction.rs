//! Commit/rollback plumbing shared by the lifecycle services.

use crate::domain::document::DocumentError;
use crate::ports::LedgerTransaction;

/// Commits on `Ok`, rolls back on `Err` and hands the result back.
///
/// A rollback failure is logged; the original error is what the caller sees.
pub(crate) async fn finish<T>(
    tx: Box<dyn LedgerTransaction>,
    result: Result<T, DocumentError>,
) -> Result<T, DocumentError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed after {}", err);
            }
            Err(err)
        }
    }
}

/// Ends a read-only transaction without committing anything.
pub(crate) async fn release<T>(
    tx: Box<dyn LedgerTransaction>,
    result: Result<T, DocumentError>,
) -> Result<T, DocumentError> {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::debug!(error = %rollback_err, "read transaction rollback failed");
    }
    result
}
