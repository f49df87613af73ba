use std::future::Future;
use std::time::Duration;

use gale_core::prelude::ShutdownHandle;

#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// The future is not cancelled when the run is stopping. A virtual user always gets to finish the
    /// iteration it is running, within the grace period. Anything that could hang, such as a network
    /// request, should carry its own timeout. See [crate::prelude::RunnerContext::request_timeout].
    ///
    /// Must not be called from async code.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        self.runtime.block_on(fut)
    }

    /// Submit async code to be run in the background.
    ///
    /// It is not guaranteed that the runner will wait for the future to complete before shutting down.
    ///
    /// In agent behaviour hooks, you should use [Executor::execute_in_place] instead of [Executor::spawn] to ensure that
    /// your future completes before the behaviour completes and is scheduled again.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }

    /// Sleep for the pacing delay between two iterations.
    ///
    /// Returns false without waiting out the delay if the stop signal is set, in which case no
    /// further iteration should be started.
    pub(crate) fn pace(&self, delay: Duration) -> bool {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        if delay.is_zero() {
            return !shutdown_listener.should_shutdown();
        }

        self.runtime.block_on(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = shutdown_listener.wait_for_shutdown() => false,
            }
        })
    }

    pub(crate) fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}
