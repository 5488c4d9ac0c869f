use std::io;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;

/// Process signal, as seen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// SIGHUP: reload
    Hangup,
    /// SIGINT / SIGTERM: stop and drain
    Interrupt,
}

/// Forward OS signals into a channel the orchestrator can read
///
/// Must be called from within a tokio runtime.
pub fn listen() -> io::Result<mpsc::Receiver<ControlSignal>> {
    let (tx, rx) = mpsc::channel(8);

    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    Some(()) = hangup.recv() => {
                        info!("Received SIGHUP signal");
                        ControlSignal::Hangup
                    }
                    Some(()) = interrupt.recv() => {
                        info!("Received SIGINT signal");
                        ControlSignal::Interrupt
                    }
                    Some(()) = terminate.recv() => {
                        info!("Received SIGTERM signal");
                        ControlSignal::Interrupt
                    }
                    else => break,
                };
                if tx.send(received).await.is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        while signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C signal");
            if tx.send(ControlSignal::Interrupt).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
