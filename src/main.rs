//! mailsweep - entry point for the command line client

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = mailsweep::cli::run().await {
        tracing::error!("command failed: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
