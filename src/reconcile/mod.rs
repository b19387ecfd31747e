//! Reconciliation module
//!
//! Periodic cancellation of pending orders that outlived their validity

mod reconciler;
mod types;

pub use reconciler::ExpirationReconciler;
pub use types::{
    AccountStatus, AccountSweep, Disposition, OrderDisposition, ReconcilerConfig, SweepReport,
};
