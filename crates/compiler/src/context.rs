//! Per-build processing context

use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a build needs besides its collaborators
#[derive(Clone)]
pub struct BuildContext {
    /// Raw key/value build options
    pub options: HashMap<String, String>,
    /// Cancellation signal from the caller
    pub cancel: CancellationToken,
    /// Where compilation diagnostics go
    pub diagnostics: Arc<dyn Diagnostics>,
}

impl BuildContext {
    /// Context with the given options, a fresh token and tracing diagnostics
    #[must_use]
    pub fn new(options: HashMap<String, String>) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Use the caller's cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send diagnostics to `diagnostics`
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

/// Run `future` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] when the token is (or becomes) cancelled,
/// otherwise whatever `future` returns.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}
