use console::Term;
use tokio::sync::watch;

/// Install the Ctrl+C handler for graceful shutdown.
///
/// The returned receiver turns `true` on the first Ctrl+C; the poller and the
/// workers finish their current step and stop. A second Ctrl+C exits at once.
pub(crate) fn install_shutdown_handler() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }

        let is_tty = Term::stderr().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current jobs...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current jobs");
        }

        tx.send_replace(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });

    rx
}
