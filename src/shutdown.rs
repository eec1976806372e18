/// Signal-driven shutdown of a running recorder
use log::{error, info};

use crate::recorder::Recorder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A termination signal was received
    Signal(&'static str),
    /// The cycle task died unexpectedly
    Fault(String),
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("Failed to listen for SIGTERM: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await
    }
}

/// Wait for Ctrl+C, SIGTERM or a cycle fault, then stop the recorder.
///
/// # Arguments
/// * `recorder` - The started recorder; only borrowed, the caller keeps ownership
///
/// # Returns
/// Why the recorder was stopped
pub async fn run_until_shutdown(recorder: &mut Recorder) -> ShutdownReason {
    let reason = tokio::select! {
        _ = interrupt() => ShutdownReason::Signal("SIGINT"),
        _ = terminate() => ShutdownReason::Signal("SIGTERM"),
        fault = recorder.fault() => ShutdownReason::Fault(fault),
    };

    match &reason {
        ShutdownReason::Signal(signal) => info!("Received {}, stopping recorder", signal),
        ShutdownReason::Fault(fault) => error!("Unrecoverable fault: {}, stopping recorder", fault),
    }
    recorder.stop();
    reason
}
