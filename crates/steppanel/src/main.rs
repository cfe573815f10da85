//! steppanel: runs a demo data pipeline under a live terminal status panel.

use steppanel_core::exit_codes;
use steppanel_lib::{app, config, errors};

fn main() {
    // Initialize tracing on stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let config = config::AppConfig::parse();
    let code = match app::run(&config) {
        Ok(Some(outcome)) => errors::exit_code(&outcome),
        Ok(None) => exit_codes::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            errors::handle_error(&err)
        }
    };
    std::process::exit(code);
}
