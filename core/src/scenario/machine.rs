//! Sequential execution of scenario steps.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;

use crate::accessor::Client;
use crate::config::TimingConfig;

use super::context::ScenarioContext;
use super::step::{Diagnostic, PlannedStep, StepError, StepOutcome, StepRecord};

/// One lifecycle path through the platform, as an ordered list of steps.
#[async_trait]
pub trait Scenario: Send + Sync {
    type Step: Send + Sync;

    fn name(&self) -> &str;

    /// The steps in execution order, with their time budgets.
    fn plan(&self, timing: &TimingConfig) -> Vec<PlannedStep<Self::Step>>;

    /// Executes one step, recording what later steps need in `ctx`.
    async fn execute(
        &self,
        step: &Self::Step,
        ctx: &mut ScenarioContext,
        client: &Client,
    ) -> Result<(), StepError>;
}

/// Outcome of a scenario run.
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub namespace: String,
    pub steps: Vec<StepRecord>,
    pub failure: Option<Diagnostic>,
    pub elapsed_ms: u64,
    pub deadline_ms: u64,
    #[serde(skip)]
    pub error: Option<StepError>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// The report if every step passed, the failing step's error otherwise.
    pub fn into_result(mut self) -> Result<Self, StepError> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

/// Runs scenarios step by step against one control plane.
#[derive(Clone)]
pub struct ScenarioMachine {
    client: Client,
}

impl ScenarioMachine {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Executes the scenario's steps strictly in order.
    ///
    /// The first failing step ends the run; the steps after it are recorded as
    /// skipped. The run may take at most the sum of all step budgets, checked
    /// before each step starts.
    pub async fn run<S: Scenario>(&self, scenario: &S, ctx: &mut ScenarioContext) -> ScenarioReport {
        let plan = scenario.plan(&ctx.timing);
        let deadline: Duration = plan.iter().map(|s| s.budget).sum();
        let started = Instant::now();
        let mut steps = Vec::with_capacity(plan.len());
        let mut failure = None;
        let mut error = None;

        tracing::info!(
            scenario = %scenario.name(),
            namespace = %ctx.namespace,
            steps = plan.len(),
            deadline_ms = deadline.as_millis() as u64,
            "scenario started"
        );

        let mut pending = plan.into_iter();
        for planned in pending.by_ref() {
            let step_started = Instant::now();
            let result = if started.elapsed() > deadline {
                Err(StepError::DeadlineExceeded {
                    step: planned.name.to_string(),
                    deadline,
                })
            } else {
                tracing::info!(scenario = %scenario.name(), step = planned.name, kind = ?planned.kind, "step started");
                scenario.execute(&planned.step, ctx, &self.client).await
            };
            let elapsed = step_started.elapsed();

            match result {
                Ok(()) => {
                    tracing::info!(
                        scenario = %scenario.name(),
                        step = planned.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "step passed"
                    );
                    steps.push(StepRecord {
                        name: planned.name.to_string(),
                        kind: planned.kind,
                        outcome: StepOutcome::Passed,
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
                Err(e) => {
                    tracing::info!(
                        scenario = %scenario.name(),
                        step = planned.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "step failed"
                    );
                    failure = Some(e.diagnostic(planned.name, &ctx.namespace, elapsed));
                    steps.push(StepRecord {
                        name: planned.name.to_string(),
                        kind: planned.kind,
                        outcome: StepOutcome::Failed(e.to_string()),
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                    error = Some(e);
                    break;
                }
            }
        }

        steps.extend(pending.map(|planned| StepRecord {
            name: planned.name.to_string(),
            kind: planned.kind,
            outcome: StepOutcome::Skipped,
            elapsed_ms: 0,
        }));

        let elapsed = started.elapsed();
        tracing::info!(
            scenario = %scenario.name(),
            namespace = %ctx.namespace,
            passed = error.is_none(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scenario finished"
        );

        ScenarioReport {
            scenario: scenario.name().to_string(),
            namespace: ctx.namespace.clone(),
            steps,
            failure,
            elapsed_ms: elapsed.as_millis() as u64,
            deadline_ms: deadline.as_millis() as u64,
            error,
        }
    }
}
