use std::sync::Arc;

use tokio::sync::watch::{Receiver, Sender};

/// Owner side of the stop signal shared by every virtual user in a run.
///
/// The signal is level triggered: once [ShutdownHandle::shutdown] has been called, every existing
/// and future listener observes it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(tokio::sync::watch::channel(false).0),
        }
    }

    pub fn shutdown(&self) {
        let was_stopped = self.sender.send_replace(true);
        if !was_stopped {
            log::debug!("Stop signal set");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if the shutdown signal has been set. If this returns true then work
    /// should be stopped so that the scenario can shut down.
    pub fn should_shutdown(&mut self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for the shutdown signal. Returns immediately if it has already been set. It is safe to
    /// race this with another future so that the shutdown signal can be used to cancel other work
    /// in progress.
    pub async fn wait_for_shutdown(&mut self) {
        // An error means the handle is gone, which can only happen once the run is over.
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn listener_sees_signal_set_before_it_was_created() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let mut listener = handle.new_listener();
        assert!(listener.should_shutdown());
        assert!(handle.is_shutdown());
    }

    #[test]
    fn signal_is_not_consumed_by_checking_it() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();
        assert!(!listener.should_shutdown());

        handle.shutdown();
        assert!(listener.should_shutdown());
        assert!(listener.should_shutdown());
        assert!(listener.clone().should_shutdown());
    }

    #[tokio::test]
    async fn wait_for_shutdown_wakes_all_listeners() {
        let handle = ShutdownHandle::new();
        let mut first = handle.new_listener();
        let mut second = handle.new_listener();

        let signaller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            signaller.shutdown();
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            first.wait_for_shutdown().await;
            second.wait_for_shutdown().await;
        })
        .await
        .expect("listeners were not woken");
    }

    #[tokio::test]
    async fn wait_for_shutdown_returns_when_handle_dropped() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), listener.wait_for_shutdown())
            .await
            .expect("listener hung after the handle was dropped");
    }
}
