//! Demo service: one HTTP server saying hello.
//!
//! ```text
//! cargo run -- --config config.yaml
//! curl localhost:8080/        → hello from <service>
//! curl localhost:8080/info    → build metadata as JSON
//! ```

use std::process::ExitCode;

use async_trait::async_trait;
use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;

use runwright::{
    Application, BoxError, Context, FrameworkConfig, HttpServer, RunnableServer, ServerInfo,
    ServiceConfig,
};

#[derive(Debug, Deserialize)]
struct HelloConfig {
    #[serde(default)]
    framework: FrameworkConfig,
    #[serde(default)]
    http: HttpConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HttpConfig {
    host: String,
    port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServiceConfig for HelloConfig {
    fn framework(&self) -> &FrameworkConfig {
        &self.framework
    }

    fn framework_mut(&mut self) -> &mut FrameworkConfig {
        &mut self.framework
    }
}

#[derive(Clone)]
struct AppState {
    service: String,
    build: serde_json::Value,
}

#[derive(Default)]
struct HelloService;

#[async_trait]
impl Application for HelloService {
    type Config = HelloConfig;

    async fn init(&mut self, config: &HelloConfig) -> Result<Vec<Box<dyn RunnableServer>>, BoxError> {
        let build = config.framework.build_info.clone().unwrap_or_default();
        let state = AppState {
            service: config.framework.service_name.clone(),
            build: serde_json::to_value(&build)?,
        };

        let router = Router::new()
            .route("/", get(hello))
            .route("/info", get(info))
            .with_state(state);

        let server = HttpServer::new(
            ServerInfo::new("http", config.http.host.clone(), config.http.port),
            router,
        );
        Ok(vec![Box::new(server)])
    }

    async fn run(&self, _ctx: Context) -> Result<(), BoxError> {
        tracing::info!("Hello service ready");
        Ok(())
    }

    async fn shutdown(&self, _ctx: Context) -> Result<(), BoxError> {
        tracing::info!("Hello service stopped");
        Ok(())
    }
}

async fn hello(State(state): State<AppState>) -> String {
    format!("hello from {}\n", state.service)
}

async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": state.service,
        "build": state.build,
    }))
}

#[tokio::main]
async fn main() -> ExitCode {
    runwright::launch(HelloService, runwright::build_info!()).await
}
