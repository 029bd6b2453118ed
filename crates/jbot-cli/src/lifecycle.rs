//! Signal handling and the panic-recovery supervisor (spec §4.13), grounded
//! in `original_source/jbot.go::main`'s signal-channel-plus-`serializeData`
//! pattern and its `select{}`-forever shape.

use std::future::Future;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Waits for SIGINT, SIGQUIT or SIGTERM, then runs `flush` and exits with
/// status 1 — matching spec §4.13's "each flushes state and exits nonzero"
/// and jbot.go's `serializeData(); os.Exit(EXIT_FAILURE)`. Never returns.
pub async fn wait_for_shutdown_signal_and_exit(flush: impl FnOnce()) -> ! {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    let which = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigquit.recv() => "SIGQUIT",
        _ = sigterm.recv() => "SIGTERM",
    };

    warn!(signal = which, "received shutdown signal, flushing state");
    flush();
    std::process::exit(1);
}

/// Repeatedly spawns `make_task()` and waits for it. A clean return ends
/// supervision (the transport decided to stop on its own); a panic is
/// logged and the transport is restarted from scratch, exactly as
/// `doTheHipChat`/`doTheSlackChat` is "re-entered" per spec §4.13. A task
/// cancellation (only possible if something external aborts the
/// `JoinHandle`, which this supervisor never does) also ends supervision.
pub async fn supervise<F, Fut>(name: &str, mut make_task: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let handle = tokio::spawn(make_task());
        match handle.await {
            Ok(()) => {
                info!(transport = name, "transport loop exited cleanly, ending supervision");
                return;
            }
            Err(e) if e.is_panic() => {
                error!(transport = name, "transport loop panicked, restarting from scratch");
                continue;
            }
            Err(e) => {
                warn!(transport = name, error = %e, "transport loop task ended abnormally");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn supervise_restarts_after_a_panic() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&attempts);
        supervise("test", move || {
            let a = Arc::clone(&a);
            async move {
                let n = a.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    panic!("forced failure on attempt {n}");
                }
            }
        })
        .await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn supervise_returns_on_clean_exit_without_restarting() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&attempts);
        supervise("test", move || {
            let a = Arc::clone(&a);
            async move {
                a.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
