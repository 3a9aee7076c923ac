//! Run-level stop signal.
//!
//! A [`StopHandle`] is held by whoever may end the run (operator interrupt,
//! quota exhaustion). Workers hold cheap [`StopSignal`] clones and check them
//! between units of work; every sleep the pipeline performs goes through
//! [`StopSignal::sleep`] so waiting never outlives a stop request.

use std::time::Duration;

use tokio::sync::watch;

/// Sending half of the stop signal.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

/// Receiving half of the stop signal.
#[derive(Clone, Debug)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

impl StopHandle {
    /// Ask every worker to finish its current unit and exit.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new signal observing this handle.
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl StopSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the stop has been triggered.
    ///
    /// If the handle is dropped without triggering, this never resolves.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration` unless stopped first.
    ///
    /// Returns `true` when the full duration elapsed, `false` on stop.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stopped() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes_without_stop() {
        let (_handle, signal) = stop_channel();
        assert!(signal.sleep(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_trigger_interrupts_sleep() {
        let (handle, signal) = stop_channel();
        let sleeper = tokio::spawn(async move { signal.sleep(Duration::from_secs(30)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.trigger();
        assert!(!sleeper.await.unwrap());
    }

    #[test]
    fn test_signal_from_handle_sees_trigger() {
        let (handle, _signal) = stop_channel();
        let late = handle.signal();
        assert!(!late.is_stopped());
        handle.trigger();
        assert!(late.is_stopped());
        assert!(handle.is_triggered());
    }

    #[test]
    fn test_never_signal_is_not_stopped() {
        assert!(!StopSignal::never().is_stopped());
    }
}
