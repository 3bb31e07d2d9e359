//! Transaction choreography shared by both services.

use db::store::StoreTx;
use tracing::warn;

/// Best-effort rollback.  A rollback failure is logged, never raised: the
/// caller is already propagating the error that caused it, and that cause
/// must not be masked.  The handle is released either way.
pub(crate) async fn rollback_or_warn(tx: Box<dyn StoreTx>) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "rollback failed");
    }
}
