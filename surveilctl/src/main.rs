use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surveil_core=info,surveilctl=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = surveilctl::Cli::parse();
    if let Err(err) = surveilctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
