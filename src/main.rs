use anyhow::Context;
use clap::Parser;

use tailserve::{FileLogger, HttpFileServer, Logger, TracingLogger};

mod cli;

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_thread_names(true)
        .init();

    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir().context("failed to read current directory")?,
    };

    let logger: Box<dyn Logger + Send + Sync> = match &args.access_log {
        Some(path) => Box::new(
            FileLogger::open(path)
                .with_context(|| format!("failed to open access log {}", path.display()))?,
        ),
        None => Box::new(TracingLogger),
    };

    let server = HttpFileServer::bind(&args.bind, args.port, &root, logger)
        .with_context(|| format!("failed to listen on {}:{}", args.bind, args.port))?;

    tracing::info!(
        root = %server.root_dir().display(),
        "Serving at http://localhost:{}",
        server.local_addr()?.port()
    );
    server.run();

    Ok(())
}
