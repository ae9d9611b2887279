use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_env("VERDICT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    // Logs go to stderr so JSON on stdout stays parseable.
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish(),
    );
    verdict::cli::run();
}
