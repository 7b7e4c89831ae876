use clap::Parser;
use packlock::cli::{Cli, Command};
use packlock::prompt::TerminalHandler;
use packlock::{AutoAccept, Handler, Outcome, PacklockConfig, add_projects};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match PacklockConfig::load(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    config.override_api_key(cli.curseforge_api_key);

    match cli.command {
        Command::Add { projects, yes } => {
            let handler: Box<dyn Handler> = if yes {
                Box::new(AutoAccept)
            } else {
                Box::new(TerminalHandler::new())
            };

            match add_projects(&config, &cli.lock, &projects, handler.as_ref()).await {
                Ok(report) => {
                    for request in &report.requests {
                        match &request.outcome {
                            Outcome::Accepted(reference) => {
                                println!("{} added ({})", request.input, reference);
                            }
                            Outcome::Skipped(reason) => {
                                println!("{} skipped: {}", request.input, reason);
                            }
                            // Errors were already shown by the handler.
                            Outcome::Failed(_) | Outcome::Retry(_) => {}
                        }
                    }
                    println!(
                        "{} new projects in {}",
                        report.added.len(),
                        cli.lock.display()
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
