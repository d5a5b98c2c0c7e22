use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

mod output;
mod scenarios;
mod sse_client;

use output::print_test_summary;
use sse_client::Connection;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "Live availability SSE testing tool")]
struct Cli {
    /// Base URL of the backend (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// How long to wait for a heartbeat comment
    #[arg(long, default_value_t = 65)]
    heartbeat_timeout_secs: u64,

    /// Upper bound on streams opened by the capacity probe
    #[arg(long, default_value_t = 250)]
    max_connections: usize,

    /// How long the listen scenario prints events
    #[arg(long, default_value_t = 60)]
    listen_secs: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Open a stream and check it stays up
    ConnectionTest,
    /// Wait for the server's heartbeat comment
    HeartbeatWait,
    /// Open streams until the server refuses with 503
    CapacityProbe,
    /// Query the health endpoint
    Health,
    /// Print availability events as they arrive
    Listen,
    /// Run every scenario except listen
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let base_url = cli.base_url.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    println!("{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();
    let heartbeat_timeout = Duration::from_secs(cli.heartbeat_timeout_secs);

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            let mut sse = connect(&base_url).await?;
            results.push(scenarios::test_connection(&mut sse).await?);
        }
        ScenarioChoice::HeartbeatWait => {
            let mut sse = connect(&base_url).await?;
            results.push(scenarios::test_heartbeat(&mut sse, heartbeat_timeout).await?);
        }
        ScenarioChoice::CapacityProbe => {
            results.push(scenarios::test_capacity(&client, &base_url, cli.max_connections).await?);
        }
        ScenarioChoice::Health => {
            results.push(scenarios::test_health(&client, &base_url).await?);
        }
        ScenarioChoice::Listen => {
            let mut sse = connect(&base_url).await?;
            results.push(
                scenarios::listen(&mut sse, Duration::from_secs(cli.listen_secs)).await?,
            );
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_health(&client, &base_url).await?);
            {
                let mut sse = connect(&base_url).await?;
                results.push(scenarios::test_connection(&mut sse).await?);
                results.push(scenarios::test_heartbeat(&mut sse, heartbeat_timeout).await?);
            }
            results.push(scenarios::test_capacity(&client, &base_url, cli.max_connections).await?);
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}

async fn connect(base_url: &str) -> Result<Connection> {
    println!("{} Establishing SSE connection...", "→".blue());
    let sse = Connection::establish(base_url, "Subscriber".to_string()).await?;
    println!("{} SSE connection established", "✓".green());
    Ok(sse)
}
