//! The application contract.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::ServiceConfig;
use crate::error::BoxError;
use crate::lifecycle::Context;
use crate::server::RunnableServer;

/// User business logic supervised by a [`Service`](crate::Service).
///
/// Exactly one instance per process: initialized once, run once, shut down
/// at most once.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    /// The configuration document this application is deployed with.
    type Config: ServiceConfig + DeserializeOwned;

    /// Turn the typed config into the servers this application needs. An
    /// error aborts startup before anything is launched.
    async fn init(&mut self, config: &Self::Config) -> Result<Vec<Box<dyn RunnableServer>>, BoxError>;

    /// The business body, run concurrently with the servers.
    ///
    /// Returning [`GracefulShutdown`](crate::GracefulShutdown) stops the
    /// service cleanly. Returning `Ok(())` stops the service only when it has
    /// no servers; otherwise the servers keep running.
    async fn run(&self, ctx: Context) -> Result<(), BoxError>;

    /// Graceful teardown honoring `ctx`'s deadline. Errors are logged only.
    async fn shutdown(&self, ctx: Context) -> Result<(), BoxError>;
}
