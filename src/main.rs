use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use tgo::agent::Agent;
use tgo::config::{CliOverrides, Config};
use tgo::exit_codes;
use tgo::logging;

#[derive(Parser)]
#[command(name = "tgo")]
#[command(version, about = "Per-host agent driving local apps through their lifecycle")]
pub struct Cli {
    /// Debug mode: include debug detail in the log file
    #[arg(short = 'd')]
    pub debug: bool,

    /// Also print log messages to the screen
    #[arg(short = 'D')]
    pub log_to_screen: bool,

    /// Internal functional test mode
    #[arg(short = 'F')]
    pub functional_test: bool,

    /// Config file (default: tgo.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Environment snapshot (default: uhura_map.json)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Coordinator base URL, overriding config and snapshot
    #[arg(long)]
    pub coordinator_url: Option<String>,

    /// Directory holding one directory per app
    #[arg(long)]
    pub app_root: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_file: self.config.clone(),
            env_file: self.env_file.clone(),
            coordinator_url: self.coordinator_url.clone(),
            app_root: self.app_root.clone(),
            debug: self.debug,
            log_to_screen: self.log_to_screen,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let config = match Config::load(cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tgo: {:#}", e);
            return exit_codes::STARTUP;
        }
    };

    let _guard = match logging::init(&config.log_file, config.debug, config.log_to_screen) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("tgo: {:#}", e);
            return exit_codes::STARTUP;
        }
    };
    info!("**********   T G O   **********");

    let agent = match Agent::prepare(config) {
        Ok(agent) => agent,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("tgo: {:#}", e);
            return exit_codes::STARTUP;
        }
    };

    if cli.functional_test {
        return match agent.functional_test().await {
            Ok(failures) => {
                info!(failures, "functional test error count");
                println!("functional test error count: {}", failures);
                exit_codes::OK
            }
            Err(e) => {
                error!("{}", e);
                e.exit_code()
            }
        };
    }

    match agent.run().await {
        Ok(_) => {
            info!("tgo exiting");
            exit_codes::OK
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}
