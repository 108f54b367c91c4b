//! One load-test run with its result checks.

use std::time::Duration;

use tracing::info;

use lorhammer_checker::{CheckReport, Checker, CheckerRegistry};
use lorhammer_config::LorhammerConfig;
use lorhammer_telemetry::MetricsRecorder;

use crate::gateway::GatewayStats;
use crate::load_test::LoadTest;
use crate::SimulatorError;

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub traffic: GatewayStats,
    /// One report per configured checker, in configuration order.
    pub checks: Vec<CheckReport>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(CheckReport::passed)
    }
}

/// Starts the checkers, generates traffic for `duration`, then finalizes
/// every checker once the gateways have stopped.
pub async fn run_scenario(
    config: &LorhammerConfig,
    registry: &CheckerRegistry,
    duration: Duration,
    metrics: Option<MetricsRecorder>,
) -> Result<ScenarioReport, SimulatorError> {
    let mut checkers = registry.build_all(&config.checkers)?;
    for checker in checkers.iter_mut() {
        checker.start().await?;
    }

    let mut load_test = LoadTest::new(config.gateway.clone())?;
    if let Some(metrics) = metrics {
        load_test = load_test.with_metrics(metrics);
    }
    load_test.start()?;
    tokio::time::sleep(duration).await;
    let traffic = load_test.stop().await;

    let mut checks = Vec::with_capacity(checkers.len());
    for checker in checkers.iter_mut() {
        checks.push(checker.check().await?);
    }

    let report = ScenarioReport { traffic, checks };
    info!(passed = report.passed(), checkers = report.checks.len(), "Scenario finished");
    Ok(report)
}
