use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use clap::Parser;
use stub_service::StubConfig;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: SocketAddr,

    /// Status code to answer `GET /libros` with.
    #[arg(long, default_value_t = 200)]
    status: u16,

    /// Delay in milliseconds before answering each request.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = StubConfig {
        status: StatusCode::from_u16(args.status)?,
        delay: Duration::from_millis(args.delay_ms),
        ..Default::default()
    };

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    log::info!("Stub service listening on {}", listener.local_addr()?);

    stub_service::serve(listener, config, Arc::new(AtomicU64::new(0))).await
}
