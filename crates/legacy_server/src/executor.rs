//! Serial execution of mutating commands.
//!
//! Each command surface owns one [`CommandExecutor`]. Jobs run strictly one
//! at a time in submission order, on the blocking pool so transactional store
//! work never stalls the tick loop. A player spamming a command therefore
//! cannot interleave two of its transactions.

use crate::error::CommandError;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a single-worker command queue.
pub struct CommandExecutor {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<(String, Job)>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandExecutor {
    /// Starts the worker. Must be called from within a tokio runtime.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<(String, Job)>();

        let worker_name = name.clone();
        let worker = tokio::spawn(async move {
            while let Some((label, job)) = receiver.recv().await {
                debug!("⚙️ {} running '{}'", worker_name, label);
                if let Err(err) = tokio::task::spawn_blocking(job).await {
                    error!("❌ {} job '{}' failed: {}", worker_name, label, err);
                }
            }
            info!("🛑 {} stopped", worker_name);
        });

        Self {
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues `job` behind every job submitted before it and waits for its
    /// result.
    pub async fn submit<R, F>(&self, label: &str, job: F) -> Result<R, CommandError>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R, CommandError> + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let boxed: Job = Box::new(move || {
            let _ = reply.send(job());
        });

        {
            let sender = self.sender.lock();
            let Some(sender) = sender.as_ref() else {
                return Err(CommandError::Closed);
            };
            sender
                .send((label.to_string(), boxed))
                .map_err(|_| CommandError::Closed)?;
        }

        // A dropped reply means the job panicked.
        result
            .await
            .map_err(|_| CommandError::Failed(format!("command '{label}' did not complete")))?
    }

    /// Stops accepting jobs and waits for queued ones to finish.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                error!("❌ {} worker ended abnormally: {}", self.name, err);
            }
        }
    }
}
