//! Sequential dispatch context
//!
//! A `SerialExecutor` owns one worker thread draining a command channel.
//! Every job posted to it runs to completion before the next one starts, in
//! the order it was queued, which is what confines an aggregator's state to a
//! single sequential context.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;

use crate::error::{DispatchError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Commands sent from producers to the worker
enum Command {
    /// Run a job
    Run(Job),
    /// Reply once every job queued before this one has run
    Flush(mpsc::SyncSender<()>),
    /// Stop the worker
    Shutdown,
}

/// Worker thread executing jobs strictly in enqueue order
pub struct SerialExecutor {
    name: String,
    command_tx: Mutex<Option<mpsc::Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: ThreadId,
}

impl SerialExecutor {
    /// Spawn the worker thread
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (command_tx, command_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn({
                let name = name.clone();
                move || run_loop(&name, command_rx)
            })
            .map_err(|source| DispatchError::Spawn {
                name: name.clone(),
                source,
            })?;

        let worker_thread = worker.thread().id();
        tracing::debug!(executor = %name, "executor started");

        Ok(Self {
            name,
            command_tx: Mutex::new(Some(command_tx)),
            worker: Mutex::new(Some(worker)),
            worker_thread,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job behind everything already queued
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Command::Run(Box::new(job)))
    }

    /// Block until every job queued so far has run
    ///
    /// Called from the worker itself this returns immediately, since the
    /// caller is by definition the only job running.
    pub fn flush(&self) -> Result<()> {
        if thread::current().id() == self.worker_thread {
            return Ok(());
        }
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.send(Command::Flush(done_tx))?;
        done_rx
            .recv()
            .map_err(|_| DispatchError::Closed(self.name.clone()))
    }

    pub fn is_shutdown(&self) -> bool {
        self.command_tx.lock().is_none()
    }

    /// Stop the worker after the jobs already queued
    ///
    /// Safe to call more than once; only the first call does anything.
    pub fn shutdown(&self) {
        let Some(command_tx) = self.command_tx.lock().take() else {
            return;
        };
        let _ = command_tx.send(Command::Shutdown);

        if thread::current().id() == self.worker_thread {
            // Joining ourselves would deadlock; the loop exits after this job.
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!(executor = %self.name, "worker thread panicked");
            }
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        let guard = self.command_tx.lock();
        let Some(command_tx) = guard.as_ref() else {
            return Err(DispatchError::Closed(self.name.clone()));
        };
        command_tx
            .send(command)
            .map_err(|_| DispatchError::Closed(self.name.clone()))
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("name", &self.name)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

fn run_loop(name: &str, command_rx: mpsc::Receiver<Command>) {
    while let Ok(command) = command_rx.recv() {
        match command {
            Command::Run(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!(executor = %name, "job panicked, continuing with next job");
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
            Command::Shutdown => {
                tracing::debug!(executor = %name, "executor received shutdown");
                break;
            }
        }
    }
    tracing::debug!(executor = %name, "executor stopped");
}
