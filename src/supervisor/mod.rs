//! Process supervisor: owns the lifecycle state machine, starts the server only
//! after the data layer is up, and turns escaped failures into a drained,
//! controlled shutdown.

use std::future::Future;

use actix_web::dev::Server;
use async_trait::async_trait;
use log::{error, info};

mod fault;
mod lifecycle;

pub use fault::{channel, install_panic_hook, Fault, FaultReceiver, FaultReporter};
pub use lifecycle::{Lifecycle, LifecycleState, TransitionError};

use crate::{db::DatabaseError, errors::AppError};

/// A resource the supervisor releases once the server has drained.
#[async_trait(?Send)]
pub trait ManagedResource {
    async fn close(&self);
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::Lifecycle(err.to_string())
    }
}

pub struct Supervisor {
    lifecycle: Lifecycle,
    reporter: FaultReporter,
    faults: FaultReceiver,
}

impl Supervisor {
    pub fn new() -> Self {
        let (reporter, faults) = channel();
        Self {
            lifecycle: Lifecycle::new(),
            reporter,
            faults,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn reporter(&self) -> FaultReporter {
        self.reporter.clone()
    }

    /// Connect the data layer, bind via `serve`, then run until the server stops
    /// on its own or a fault arrives.
    ///
    /// A connection failure never reaches `serve`, so the port is never bound.
    /// A fault stops the listener, drains in-flight requests, closes the data
    /// layer, and is returned as [`AppError::Fault`].
    pub async fn run<D, C, S>(self, connect: C, serve: S) -> Result<(), AppError>
    where
        D: ManagedResource,
        C: Future<Output = Result<D, DatabaseError>>,
        S: FnOnce(&D, &FaultReporter) -> std::io::Result<Server>,
    {
        let Supervisor {
            lifecycle,
            reporter,
            mut faults,
        } = self;

        let data = match connect.await {
            Ok(data) => data,
            Err(err) => {
                error!("Could not connect to the database: {}", err);
                lifecycle.transition(LifecycleState::Stopped)?;
                return Err(AppError::Database(err));
            }
        };

        let server = match serve(&data, &reporter) {
            Ok(server) => server,
            Err(err) => {
                error!("Could not start the HTTP server: {}", err);
                data.close().await;
                lifecycle.transition(LifecycleState::Stopped)?;
                return Err(AppError::Server(err));
            }
        };
        let handle = server.handle();
        tokio::pin!(server);

        lifecycle.transition(LifecycleState::Listening)?;

        let (fault, result) = tokio::select! {
            result = &mut server => (None, result),
            Some(fault) = faults.recv() => {
                error!("Shutting down the server due to {}", fault.origin);
                lifecycle.transition(LifecycleState::ShuttingDown)?;
                // The server future must keep running to process the stop command.
                let ((), result) = tokio::join!(handle.stop(true), &mut server);
                (Some(fault), result)
            }
        };

        if lifecycle.state() == LifecycleState::Listening {
            lifecycle.transition(LifecycleState::ShuttingDown)?;
        }
        data.close().await;
        lifecycle.transition(LifecycleState::Stopped)?;

        match fault {
            Some(fault) => Err(AppError::Fault(fault)),
            None => {
                info!("Server stopped");
                result.map_err(AppError::from)
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
