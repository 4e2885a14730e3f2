use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;
type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// Runs a set of long-lived processes concurrently with graceful shutdown.
///
/// Processes run until one fails or SIGTERM/SIGINT arrives; either way the
/// shared cancellation token is cancelled, remaining processes wind down,
/// and closers execute under a timeout. Exits the process when done.
pub struct Runner {
    app_processes: Vec<AppProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_app_process<F, Fut>(mut self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.app_processes.push(Box::new(|token| Box::pin(process(token))));
        self
    }

    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    pub async fn run(self) {
        let token = CancellationToken::new();
        let mut join_set = JoinSet::new();

        for process in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move { process(process_token).await });
        }

        let signal_token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    signal_token.cancel();
                }
                Err(err) => {
                    error!(error = %err, "Error setting up signal handler");
                }
            }
        });

        #[cfg(unix)]
        {
            let sigterm_token = token.clone();
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                        info!("Received SIGTERM signal");
                        sigterm_token.cancel();
                    }
                    Err(err) => {
                        error!(error = %err, "Error setting up SIGTERM handler");
                    }
                }
            });
        }

        // One failing process brings the rest down.
        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("App process completed"),
                Ok(Err(err)) => {
                    if !token.is_cancelled() {
                        error!(error = %format!("{:#}", err), "App process failed");
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!(error = %err, "App process panicked");
                    token.cancel();
                }
            }
            if token.is_cancelled() {
                break;
            }
        }
        join_set.shutdown().await;

        if !self.closers.is_empty() {
            let run_closers = async {
                for closer in self.closers {
                    if let Err(err) = closer().await {
                        error!(error = %format!("{:#}", err), "Closer failed");
                    }
                }
            };
            if tokio::time::timeout(self.closer_timeout, run_closers)
                .await
                .is_err()
            {
                error!(timeout = ?self.closer_timeout, "Closers timed out");
            }
        }

        if first_error.is_some() {
            std::process::exit(1);
        }
        std::process::exit(0);
    }
}
