use std::process::ExitCode;
use std::sync::Arc;

use storybooks::config::{load_config, print_schema};
use storybooks::startup::run;
use storybooks::utils::logger::init_logging;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::args().any(|arg| arg == "--schema") {
        print_schema();
        return ExitCode::SUCCESS;
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = run(Arc::new(config)).await {
        error!(
            event_name = "server.failed",
            event_domain = "server",
            "Failed to start: {}",
            e
        );
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
