mod error;
mod params;
mod schedule;
mod server;
mod solver;
mod view;

use std::env;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    server::run_server(&addr).await
}
