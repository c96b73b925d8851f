//! A concurrent application runner that manages long-running worker
//! processes with graceful shutdown.
//!
//! Processes run concurrently until one fails or a shutdown signal
//! (SIGTERM/SIGINT) arrives. Cancellation is cooperative: every process
//! receives a [`CancellationToken`] and is expected to finish its in-flight
//! work and return, so the runner waits for all of them instead of aborting
//! their tasks. Closers execute afterward under a bounded timeout,
//! regardless of how the processes stopped.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A long-running process. Takes a cancellation token and resolves once the
/// process has fully drained and stopped.
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>
        + Send,
>;

/// A cleanup function executed after all processes have stopped.
pub type Closer =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>> + Send>;

pub struct Runner {
    processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds a named process. The name shows up in logs when the process
    /// stops or fails.
    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.processes.push((name.into(), process));
        self
    }

    /// Adds a closer. Closers run after every process has stopped; all of
    /// them are attempted even when some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// Sets the timeout for executing closers. Default is 10 seconds.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Sets a custom cancellation token, allowing external control over
    /// shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs all processes to completion.
    ///
    /// The first process error cancels the token; the remaining processes
    /// are then awaited, not aborted, so they can drain. Returns that first
    /// error after the closers have run.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        spawn_signal_handlers(token.clone());

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "process stopped");
                }
                Ok((name, Err(err))) => {
                    error!(process = %name, error = format!("{err:#}"), "process failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    token.cancel();
                }
                Err(err) => {
                    error!(error = %err, "process panicked");
                    if first_error.is_none() {
                        first_error = Some(err.into());
                    }
                    token.cancel();
                }
            }
        }

        if !self.closers.is_empty() {
            info!(timeout = ?self.closer_timeout, "running closers");
            match tokio::time::timeout(self.closer_timeout, run_closers(self.closers)).await {
                Ok(()) => info!("all closers completed"),
                Err(_) => error!(timeout = ?self.closer_timeout, "closers timed out"),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let interrupt_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received interrupt signal");
                interrupt_token.cancel();
            }
            Err(err) => {
                error!(error = %err, "error setting up interrupt handler");
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM signal");
                token.cancel();
            }
            Err(err) => {
                error!(error = %err, "error setting up SIGTERM handler");
            }
        }
    });

    #[cfg(not(unix))]
    drop(token);
}

/// Runs all closers concurrently.
async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();

    for closer in closers {
        closer_set.spawn(closer());
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => debug!("closer completed"),
            Ok(Err(err)) => error!(error = format!("{err:#}"), "closer failed"),
            Err(err) => error!(error = %err, "closer panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn boxed_process<F, Fut>(process: F) -> AppProcess
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Box::new(|token| Box::pin(process(token)))
    }

    #[tokio::test]
    async fn cancellation_stops_processes_and_runs_closers() {
        let closer_called = Arc::new(AtomicBool::new(false));
        let closer_flag = Arc::clone(&closer_called);

        let token = CancellationToken::new();
        let external = token.clone();

        let runner = Runner::new()
            .with_named_process(
                "waiter",
                boxed_process(|ctx| async move {
                    ctx.cancelled().await;
                    Ok(())
                }),
            )
            .with_closer(move || {
                let flag = Arc::clone(&closer_flag);
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .with_cancellation_token(token)
            .with_closer_timeout(Duration::from_secs(1));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            external.cancel();
        });

        runner.run().await.unwrap();
        assert!(closer_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn process_failure_cancels_the_others_and_surfaces_the_error() {
        let token = CancellationToken::new();

        let result = Runner::new()
            .with_named_process(
                "failing",
                boxed_process(|_ctx| async move { Err(anyhow::anyhow!("boom")) }),
            )
            .with_named_process(
                "waiter",
                boxed_process(|ctx| async move {
                    ctx.cancelled().await;
                    Ok(())
                }),
            )
            .with_cancellation_token(token)
            .run()
            .await;

        assert_eq!(result.unwrap_err().to_string(), "boom");
    }

    #[tokio::test]
    async fn cancelled_processes_are_awaited_not_aborted() {
        let drained = Arc::new(AtomicBool::new(false));
        let drain_flag = Arc::clone(&drained);

        let token = CancellationToken::new();
        token.cancel();

        Runner::new()
            .with_named_process(
                "draining",
                boxed_process(move |ctx| async move {
                    ctx.cancelled().await;
                    // Work that continues past the cancellation point.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    drain_flag.store(true, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .with_cancellation_token(token)
            .run()
            .await
            .unwrap();

        // run() only returned because the process finished its drain.
        assert!(drained.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn all_closers_run_even_when_one_fails() {
        let count = Arc::new(AtomicUsize::new(0));

        let ok_count = Arc::clone(&count);
        let failing_count = Arc::clone(&count);

        let token = CancellationToken::new();
        token.cancel();

        Runner::new()
            .with_named_process(
                "noop",
                boxed_process(|ctx| async move {
                    ctx.cancelled().await;
                    Ok(())
                }),
            )
            .with_closer(move || {
                let count = Arc::clone(&failing_count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("cleanup failed"))
                }
            })
            .with_closer(move || {
                let count = Arc::clone(&ok_count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .with_cancellation_token(token)
            .run()
            .await
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
