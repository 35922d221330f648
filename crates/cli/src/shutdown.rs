//! Signal handling for the tektonic CLI

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Returns a token that is cancelled on Ctrl+C
///
/// In-flight image resolution and solving observe the token and stop with a
/// cancellation error instead of the process being killed mid-write.
pub fn cancel_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt, cancelling build");
                trigger.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to install interrupt handler"),
        }
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_starts_live() {
        let token = cancel_on_signal();
        assert!(!token.is_cancelled());
    }
}
