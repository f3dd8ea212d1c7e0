//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use autoheal_bus::SharedBus;
use autoheal_common::{AppConfig, DatasetConfig, PolicyKind};
use autoheal_persistence::CsvLog;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::deployment::{
    DeploymentRecorder, DeploymentRequest, DeploymentResult, DeploymentTrigger, FailureHint,
    DEPLOYMENT_HEADERS, DEPLOY_ACTION,
};
use crate::detector::{IssueDetector, ISSUE_HEADERS};
use crate::executor::{HealingExecutor, HealingReport, HEALING_HEADERS};
use crate::feedback::{FeedbackJournal, FeedbackProvider, NoFeedback, FEEDBACK_HEADERS};
use crate::metrics::ResilienceMetrics;
use crate::policy::adaptive::PERFORMANCE_HEADERS;
use crate::policy::{AdaptivePolicy, HealingPolicy, RandomPolicy};
use crate::types::{Detection, FailureState, HealingAction, HumanFeedback, UptimeStatus};
use crate::uptime::{UptimeMonitor, UPTIME_HEADERS};

/// Perturbs the monitored dataset before a cycle runs.
pub trait DatasetMutator: Send + Sync {
    fn mutate(&self, dataset: &DatasetConfig, force_anomaly: bool) -> Result<()>;
}

/// Leaves the dataset as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMutation;

impl DatasetMutator for NoMutation {
    fn mutate(&self, _dataset: &DatasetConfig, _force_anomaly: bool) -> Result<()> {
        Ok(())
    }
}

/// Knobs for a single pipeline pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOptions {
    /// Force the initial deployment to fail in the given way.
    pub failure_hint: Option<FailureHint>,
    /// Ask the dataset mutator to inject an anomaly.
    pub force_anomaly: bool,
    /// Force the initial deployment to fail without a specific mode.
    pub force_failure: bool,
}

impl CycleOptions {
    fn deployment_request(&self) -> DeploymentRequest {
        if self.failure_hint.is_some() || self.force_failure {
            DeploymentRequest::failing(self.failure_hint)
        } else {
            DeploymentRequest::healthy()
        }
    }
}

/// Everything that happened during one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Classification before the initial deployment.
    pub initial: Detection,
    /// Classification that drove healing.
    pub detection: Detection,
    pub deployment: DeploymentResult,
    pub action: Option<HealingAction>,
    pub healing: Option<HealingReport>,
    pub feedback: Option<HumanFeedback>,
    /// Updated estimate, when the policy learns.
    pub new_value: Option<f64>,
    pub status: UptimeStatus,
    /// Non-fatal problems hit during the cycle.
    pub errors: Vec<String>,
}

impl CycleReport {
    /// Whether the cycle ended with the service up.
    pub fn is_up(&self) -> bool {
        self.status == UptimeStatus::Up
    }
}

/// One detection → healing → learning pass over the pipeline.
pub struct IncidentController {
    dataset: DatasetConfig,
    detector: IssueDetector,
    uptime: UptimeMonitor,
    policy: Box<dyn HealingPolicy>,
    executor: HealingExecutor,
    deployments: DeploymentRecorder,
    trigger: Arc<dyn DeploymentTrigger>,
    feedback: Arc<dyn FeedbackProvider>,
    journal: FeedbackJournal,
    mutator: Arc<dyn DatasetMutator>,
}

impl IncidentController {
    /// Wire every component from `config`, opening all logs it names.
    pub fn from_config(
        config: &AppConfig,
        bus: SharedBus,
        trigger: Arc<dyn DeploymentTrigger>,
        metrics: Option<ResilienceMetrics>,
    ) -> Result<Self> {
        let paths = &config.paths;
        let open = |path: std::path::PathBuf, headers: &[&str]| -> Result<Arc<CsvLog>> {
            CsvLog::open(&path, headers)
                .map(Arc::new)
                .with_context(|| format!("unable to open log {}", path.display()))
        };
        let deployment_log = open(paths.deployment_log(), &DEPLOYMENT_HEADERS)?;
        let issue_log = open(paths.issue_log(), &ISSUE_HEADERS)?;
        let uptime_log = open(paths.uptime_log(), &UPTIME_HEADERS)?;
        let healing_log = open(paths.healing_log(), &HEALING_HEADERS)?;
        let feedback_log = open(paths.feedback_log(), &FEEDBACK_HEADERS)?;

        let mut detector = IssueDetector::new(
            config.dataset.clone(),
            paths.deployment_log(),
            config.thresholds(),
            issue_log,
            bus.clone(),
        );
        let mut uptime = UptimeMonitor::open(uptime_log, bus.clone())?;
        let mut executor = HealingExecutor::new(
            config.dataset.clone(),
            trigger.clone(),
            healing_log,
            bus.clone(),
        );

        let policy: Box<dyn HealingPolicy> = match config.policy.kind {
            PolicyKind::Random => {
                let policy = RandomPolicy::new();
                Box::new(match config.policy.seed {
                    Some(seed) => policy.with_seed(seed),
                    None => policy,
                })
            }
            PolicyKind::Adaptive => {
                let performance_log = open(paths.performance_log(), &PERFORMANCE_HEADERS)?;
                let mut policy = AdaptivePolicy::open(
                    paths.value_table(),
                    performance_log,
                    bus.clone(),
                    &config.policy,
                )?;
                if let Some(metrics) = &metrics {
                    policy = policy.with_metrics(metrics.clone());
                }
                Box::new(policy)
            }
        };

        if let Some(metrics) = metrics {
            detector = detector.with_metrics(metrics.clone());
            uptime = uptime.with_metrics(metrics.clone());
            executor = executor.with_metrics(metrics);
        }

        Ok(Self {
            dataset: config.dataset.clone(),
            detector,
            uptime,
            policy,
            executor,
            deployments: DeploymentRecorder::new(deployment_log, bus),
            trigger,
            feedback: Arc::new(NoFeedback),
            journal: FeedbackJournal::new(feedback_log),
            mutator: Arc::new(NoMutation),
        })
    }

    pub fn with_policy(mut self, policy: Box<dyn HealingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackProvider>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_mutator(mut self, mutator: Arc<dyn DatasetMutator>) -> Self {
        self.mutator = mutator;
        self
    }

    pub fn policy(&self) -> &dyn HealingPolicy {
        self.policy.as_ref()
    }

    pub fn status(&self) -> UptimeStatus {
        self.uptime.status()
    }

    /// Run one full pass. Problems are logged and collected in the report;
    /// nothing escapes as an error.
    pub fn run_cycle(&mut self, options: CycleOptions) -> CycleReport {
        let mut errors = Vec::new();
        info!(
            target: "autoheal::resilience::controller",
            dataset = %self.dataset.label(),
            kind = self.dataset.kind.as_str(),
            policy = self.policy.name(),
            failure_hint = ?options.failure_hint,
            force_anomaly = options.force_anomaly,
            "starting cycle"
        );

        if let Err(err) = self.mutator.mutate(&self.dataset, options.force_anomaly) {
            warn!(error = %err, "dataset mutation failed");
            errors.push(format!("dataset mutation failed: {err:#}"));
        }

        let initial = self.detector.detect();

        let deployment = self.trigger.trigger(&options.deployment_request());
        if let Err(err) = self
            .deployments
            .record(&self.dataset.label(), &deployment, DEPLOY_ACTION)
        {
            error!(error = %err, "unable to record deployment");
            errors.push(format!("{err:#}"));
        }

        let detection = if initial.state.is_failure() {
            initial.clone()
        } else {
            self.detector.detect()
        };

        let mut report = CycleReport {
            initial,
            detection: detection.clone(),
            deployment,
            action: None,
            healing: None,
            feedback: None,
            new_value: None,
            status: self.uptime.status(),
            errors,
        };

        if detection.state.is_failure() {
            self.heal(&detection, &mut report);
        } else {
            self.transition(UptimeStatus::Up, "Successful deployment", &mut report.errors);
        }

        if let Err(err) = self.policy.save() {
            error!(error = %err, "unable to persist policy state");
            report.errors.push(format!("{err:#}"));
        }
        report.status = self.uptime.status();
        info!(
            target: "autoheal::resilience::controller",
            state = %report.detection.state,
            action = ?report.action.map(|a| a.as_str()),
            status = %report.status,
            errors = report.errors.len(),
            "cycle finished"
        );
        report
    }

    fn heal(&mut self, detection: &Detection, report: &mut CycleReport) {
        let state: FailureState = detection.state;
        self.transition(UptimeStatus::Down, &detection.reason, &mut report.errors);

        let action = self.policy.choose_action(state);
        let healing = self.executor.execute(action);
        let feedback = self.feedback.feedback(state, action, healing.outcome);
        if let Err(err) = self.journal.record(state, action, healing.outcome, feedback) {
            warn!(error = %err, "unable to record feedback");
            report.errors.push(format!("{err:#}"));
        }

        match self
            .policy
            .record_outcome(state, action, healing.outcome.base_reward(), feedback)
        {
            Ok(value) => report.new_value = value,
            Err(err) => {
                error!(error = %err, "policy failed to record outcome");
                report.errors.push(format!("{err:#}"));
            }
        }

        if let Err(err) = self.deployments.record(
            &self.dataset.label(),
            &healing.as_deployment(),
            healing.heal_type(),
        ) {
            error!(error = %err, "unable to record healing deployment");
            report.errors.push(format!("{err:#}"));
        }

        if healing.outcome.is_success() {
            let reason = format!("Recovery successful via {}", healing.heal_type());
            self.transition(UptimeStatus::Up, &reason, &mut report.errors);
        } else {
            warn!(
                target: "autoheal::resilience::controller",
                state = %state,
                action = %action,
                "healing attempt failed; service remains down"
            );
        }

        report.action = Some(action);
        report.healing = Some(healing);
        report.feedback = feedback;
    }

    fn transition(&mut self, status: UptimeStatus, reason: &str, errors: &mut Vec<String>) {
        if let Err(err) = self.uptime.update_status(status, reason) {
            error!(error = %err, status = %status, "unable to update uptime status");
            errors.push(format!("{err:#}"));
        }
    }
}

impl std::fmt::Debug for IncidentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentController")
            .field("dataset", &self.dataset)
            .field("policy", &self.policy.name())
            .field("status", &self.uptime.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::StaticDeployment;
    use crate::types::Outcome;
    use autoheal_bus::EventBus;
    use autoheal_common::{DatasetKind, LogPaths};
    use std::fs;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path, dataset: &str) -> AppConfig {
        let data_path = dir.join("scores.csv");
        fs::write(&data_path, dataset).unwrap();
        AppConfig {
            paths: LogPaths::in_directory(dir.join("logs")),
            dataset: DatasetConfig::new(data_path, DatasetKind::Scores),
            ..AppConfig::default()
        }
    }

    #[test]
    fn healthy_cycle_stays_up_without_healing() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), "score\n80\n90\n");
        let mut controller = IncidentController::from_config(
            &config,
            EventBus::shared(),
            Arc::new(StaticDeployment::new(Outcome::Success, 1200.0)),
            None,
        )
        .unwrap();

        let report = controller.run_cycle(CycleOptions::default());
        assert_eq!(report.detection.state, FailureState::NoFailure);
        assert!(report.action.is_none());
        assert!(report.is_up());
        assert!(report.errors.is_empty());

        let deployments = fs::read_to_string(config.paths.deployment_log()).unwrap();
        assert_eq!(deployments.lines().count(), 2);
    }

    #[test]
    fn crash_is_detected_after_deployment_and_healed() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), "score\n80\n");
        let trigger = Arc::new(StaticDeployment::new(Outcome::Failure, 700.0));
        let mut controller =
            IncidentController::from_config(&config, EventBus::shared(), trigger, None)
                .unwrap()
                .with_policy(Box::new(FixedPolicy(HealingAction::AdjustThresholds)));

        let report = controller.run_cycle(CycleOptions {
            failure_hint: Some(FailureHint::Crash),
            ..CycleOptions::default()
        });
        assert_eq!(report.initial.state, FailureState::NoFailure);
        assert_eq!(report.detection.state, FailureState::DeploymentFailure);
        assert_eq!(report.action, Some(HealingAction::AdjustThresholds));
        assert!(report.is_up());

        let uptime = fs::read_to_string(config.paths.uptime_log()).unwrap();
        assert!(uptime.contains("DOWN,Last deployment attempt failed."));
        assert!(uptime.contains("UP,Recovery successful via heal_adjust"));
    }

    #[test]
    fn failed_healing_leaves_service_down() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), "score\n5\n");
        let mut controller = IncidentController::from_config(
            &config,
            EventBus::shared(),
            Arc::new(StaticDeployment::new(Outcome::Success, 1000.0)),
            None,
        )
        .unwrap()
        .with_policy(Box::new(FixedPolicy(HealingAction::RestorePreviousVersion)));

        let report = controller.run_cycle(CycleOptions::default());
        assert_eq!(report.detection.state, FailureState::AnomalyScore);
        assert_eq!(report.healing.map(|h| h.outcome), Some(Outcome::Failure));
        assert_eq!(report.status, UptimeStatus::Down);
    }

    struct FixedPolicy(HealingAction);

    impl HealingPolicy for FixedPolicy {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn choose_action(&mut self, _state: FailureState) -> HealingAction {
            self.0
        }

        fn record_outcome(
            &mut self,
            _state: FailureState,
            _action: HealingAction,
            _base_reward: f64,
            _feedback: Option<HumanFeedback>,
        ) -> Result<Option<f64>> {
            Ok(None)
        }
    }
}
