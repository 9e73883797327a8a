//! Runtime supervisor for long-running network services.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────┐
//!                  │                     SERVICE                      │
//!   config.yaml ──▶│  config ──▶ observability ──▶ Application::init  │
//!   --config       │                                     │            │
//!   DEBUG          │                                     ▼            │
//!                  │        ┌────────────┐  ┌────────────┐            │
//!                  │        │  server A  │  │  server B  │  app.run   │
//!                  │        └─────┬──────┘  └─────┬──────┘     │      │
//!                  │              └──── JoinSet ───┴───────────┘      │
//!   Ctrl+C ───────▶│                       │                          │
//!                  │              decision loop (select!)             │
//!                  │                       ▼                          │
//!                  │     shutdown: A → B → app → span → observability │
//!                  └───────────────────────┬──────────────────────────┘
//!                                          ▼
//!                               Outcome → exit code 0 / 125 / 1
//! ```
//!
//! Implement [`Application`], return your servers from `init`, and hand the
//! application to [`launch`].

pub mod application;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod scaffold;
pub mod server;
pub mod service;

use std::process::ExitCode;

use clap::Parser;

pub use application::Application;
pub use config::{BuildInfo, FrameworkConfig, RunArgs, ServiceConfig};
pub use error::{is_graceful, BoxError, GracefulShutdown, RuntimeError};
pub use lifecycle::{Context, Outcome, Trigger};
pub use server::{GrpcServer, HttpServer, RunnableServer, ServerInfo, TcpServer};
pub use service::{Service, ServiceBuilder};

/// Bootstrap and run `app` with the process arguments, returning the exit
/// code to terminate with.
///
/// Bootstrap errors are printed to stderr and map to exit code 1.
pub async fn launch<A: Application>(app: A, build_info: BuildInfo) -> ExitCode {
    let args = RunArgs::parse();

    let service = match Service::builder(app)
        .build_info(build_info)
        .config_path(args.config)
        .bootstrap()
        .await
    {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Bootstrap failed");
            eprintln!("Error: {}", e);
            return ExitCode::from(lifecycle::EXIT_CRASH);
        }
    };

    ExitCode::from(service.run().await)
}
