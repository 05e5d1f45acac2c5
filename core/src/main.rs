//! AppStudio E2E CLI
//!
//! Rehearses a scenario against the simulated platform and prints the result as JSON.

use std::path::Path;
use std::sync::Arc;

use appstudio_e2e::{
    Client, Error, Result, ScenarioFixture, ScenarioKind, SimulatedPlatform, SuiteConfig,
    SuiteHarness,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <scenario|fixture.yaml> [suite.toml]", args[0]);
        eprintln!("\nRuns one scenario against the simulated platform.");
        eprintln!("\nScenarios: happy-path, negative-path, release");
        std::process::exit(2);
    }

    match run(&args[1], args.get(2).map(String::as_str)).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Runs the scenario; `Ok(false)` when it failed.
async fn run(scenario: &str, config_path: Option<&str>) -> Result<bool> {
    let fixture = load_fixture(scenario)?;
    let config = match config_path {
        Some(path) => SuiteConfig::load(path)?,
        None => SuiteConfig::default(),
    };

    tracing::info!(scenario = %fixture.name, kind = fixture.kind.as_str(), "starting rehearsal");

    let platform = Arc::new(SimulatedPlatform::new(fixture.platform.clone()));
    let harness = SuiteHarness::new(config, Client::new(platform));
    let result = harness.run(&fixture).await;

    let json = serde_json::to_string_pretty(&result)
        .map_err(|e| Error::Config(format!("failed to encode result: {}", e)))?;
    println!("{}", json);

    Ok(result.passed)
}

/// A scenario name, or a path to a YAML fixture.
fn load_fixture(arg: &str) -> Result<ScenarioFixture> {
    if let Some(kind) = ScenarioKind::parse(arg) {
        return Ok(ScenarioFixture::new(kind.as_str(), kind));
    }
    let path = Path::new(arg);
    if path.exists() {
        return ScenarioFixture::load(path);
    }
    Err(Error::Config(format!(
        "'{}' is neither a scenario name nor a fixture file",
        arg
    )))
}
