use std::{any::Any, fmt, future::Future, panic, panic::AssertUnwindSafe};

use futures_util::FutureExt;
use log::{debug, error, warn};
use tokio::sync::mpsc;

/// Where a process-level fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    /// A panic anywhere in the process.
    Panic,
    /// A background task that returned an error.
    TaskFailure,
}

impl fmt::Display for FaultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultOrigin::Panic => f.write_str("uncaught panic"),
            FaultOrigin::TaskFailure => f.write_str("background task failure"),
        }
    }
}

/// A failure that escaped the per-request pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub origin: FaultOrigin,
    pub message: String,
}

impl Fault {
    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            origin: FaultOrigin::Panic,
            message: message.into(),
        }
    }

    pub fn task_failure(task: &str, err: impl fmt::Display) -> Self {
        Self {
            origin: FaultOrigin::TaskFailure,
            message: format!("task '{}' failed: {}", task, err),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.message)
    }
}

/// Sending half of the fault channel; cheap to clone into tasks and hooks.
#[derive(Clone, Debug)]
pub struct FaultReporter {
    tx: mpsc::UnboundedSender<Fault>,
}

/// Receiving half, owned by the supervisor.
pub struct FaultReceiver {
    rx: mpsc::UnboundedReceiver<Fault>,
}

pub fn channel() -> (FaultReporter, FaultReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FaultReporter { tx }, FaultReceiver { rx })
}

impl FaultReceiver {
    pub async fn recv(&mut self) -> Option<Fault> {
        self.rx.recv().await
    }
}

impl FaultReporter {
    pub fn report(&self, fault: Fault) {
        error!("Error: {}", fault);
        if self.tx.send(fault).is_err() {
            warn!("Fault reported after the supervisor stopped listening for faults");
        }
    }

    /// Spawn a background task on the current arbiter. An `Err` result or a panic is
    /// reported as a fault instead of vanishing with the task.
    pub fn spawn_guarded<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: fmt::Display + 'static,
    {
        let reporter = self.clone();
        actix_web::rt::spawn(async move {
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => debug!("Background task '{}' finished", name),
                Ok(Err(err)) => reporter.report(Fault::task_failure(name, err)),
                Err(payload) => reporter.report(Fault::panic(format!(
                    "task '{}' panicked: {}",
                    name,
                    panic_message(payload.as_ref())
                ))),
            }
        });
    }
}

/// Route every panic in the process into the fault channel.
pub fn install_panic_hook(reporter: FaultReporter) {
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!(" at {}:{}", l.file(), l.line()))
            .unwrap_or_default();
        reporter.report(Fault::panic(format!(
            "{}{}",
            panic_message(info.payload()),
            location
        )));
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
