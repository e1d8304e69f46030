mod api;
mod config;
mod executor;
mod types;
mod web;

use std::sync::Arc;

use config::RunnerConfig;
use executor::SandboxExecutor;
use log::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RunnerConfig::from_env();
    info!(
        "Runner limits: run {:?}, compile {:?}, java heap {}",
        config.run_timeout, config.compile_timeout, config.java_max_heap
    );

    web::server::run_server(Arc::new(SandboxExecutor::new(config))).await
}
