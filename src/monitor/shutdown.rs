//! Cooperative shutdown signaling between the fleet and its poll engines.

use tokio::sync::watch;

/// Sending side, held by the fleet. Signaling more than once is a no-op.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Receiving side, cloned into every poll engine.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair.
pub fn channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    pub fn signal(&self) {
        // Errors only mean every engine already exited
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal { rx: self.tx.subscribe() }
    }
}

impl ShutdownSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is signaled. Also resolves if the handle is
    /// dropped, so an orphaned engine never sleeps forever.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_wakes_waiters() {
        let (handle, signal) = channel();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });

        handle.signal();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve after signal")
            .unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn repeated_signaling_is_a_noop() {
        let (handle, signal) = channel();
        handle.signal();
        handle.signal();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_handle_releases_waiters() {
        let (handle, signal) = channel();
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .expect("waiter should resolve when handle is dropped");
    }
}
