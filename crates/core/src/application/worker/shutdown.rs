// Stop signal for worker loops

use std::time::Duration;
use tokio::sync::watch;

/// Receiving half, one clone per worker
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested (or the handle is dropped)
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `duration` unless stopped first. Returns true if stopped.
    pub async fn sleep_or_stop(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.stopped() => true,
        }
    }
}

/// Sending half, held by the composition root
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Ask every worker holding a matching `StopSignal` to finish
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_wakes_sleepers() {
        let (handle, mut signal) = stop_channel();
        assert!(!signal.is_stopped());

        let sleeper = tokio::spawn(async move { signal.sleep_or_stop(Duration::from_secs(60)).await });
        handle.stop();

        assert!(sleeper.await.unwrap());
    }

    #[tokio::test]
    async fn test_sleep_completes_without_stop() {
        let (_handle, mut signal) = stop_channel();
        assert!(!signal.sleep_or_stop(Duration::from_millis(1)).await);
    }
}
