//! Canonicalization and validation of `(cd_key, ds, y)` rows.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod canonicalize;
pub mod validate;

pub use canonicalize::{canonicalize, canonicalize_cancellable};
pub use validate::validate;

/// Cooperative cancellation flag, checked once per row batch or header column.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
