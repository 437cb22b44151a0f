use replibench_core::prelude::ShutdownHandle;
use tokio::signal;

/// Trigger `handle` when the process receives Ctrl-C.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime, handle: ShutdownHandle) {
    runtime.spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C, runs cannot be interrupted: {e}");
            return;
        }
        println!("Received shutdown signal, stopping workers after their current iteration...");
        handle.shutdown();
    });
}
