/// Testing session
///
/// One session judges one submission: `build` runs exactly once, then `test`
/// runs once per test id, sequentially. The type parameter tracks whether a
/// solution exists, so `test` cannot be called before a successful build.
use crate::config::loader::JudgeConfig;
use crate::config::types::{
    BuildResult, BuildStatus, ExecutionStatus, IntermediateState, OwnerId, ProcessSettings,
    Result, SolutionSettings, TestResult,
};
use crate::config::validator::validate_process_settings;
use crate::core::container::Container;
use crate::exec::provision::ProvisionPlan;
use crate::exec::{capture, process};
use crate::judge::{builder_for, Checker, Solution};
use crate::observability::progress::ProgressReporter;
use crate::testdata::TestStore;
use crate::verdict::VerdictClassifier;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Session state before `build`
pub struct Unbuilt;

/// Session state after a successful `build`; owns the solution artifact
pub struct Built {
    solution: Box<dyn Solution>,
}

pub struct TestingSession<S> {
    container: Box<dyn Container>,
    store: Arc<dyn TestStore>,
    checker: Box<dyn Checker>,
    reporter: Arc<dyn ProgressReporter>,
    config: JudgeConfig,
    state: S,
}

/// Result of [`TestingSession::build`]
pub enum BuildOutcome {
    Ready {
        session: TestingSession<Built>,
        result: BuildResult,
    },
    /// No runnable solution; the session is gone
    Failed(BuildResult),
}

impl<S> TestingSession<S> {
    pub fn owner_id(&self) -> OwnerId {
        self.config.owner_id
    }

    pub fn container(&self) -> &dyn Container {
        self.container.as_ref()
    }
}

impl TestingSession<Unbuilt> {
    pub fn new(
        container: Box<dyn Container>,
        store: Arc<dyn TestStore>,
        checker: Box<dyn Checker>,
        reporter: Arc<dyn ProgressReporter>,
        config: JudgeConfig,
    ) -> Self {
        Self {
            container,
            store,
            checker,
            reporter,
            config,
            state: Unbuilt,
        }
    }

    /// Build the solution. Consumes the unbuilt session.
    ///
    /// An unknown builder id is an error; a failed compilation is a
    /// [`BuildOutcome::Failed`].
    pub fn build(mut self, solution: &SolutionSettings) -> Result<BuildOutcome> {
        self.reporter.report(&IntermediateState::building());

        let builder = builder_for(&solution.build.builder, &self.config)?;
        let mut result = BuildResult::default();
        let built = builder.build(
            self.container.as_mut(),
            self.config.owner_id,
            &solution.source,
            &solution.build.resource_limits,
            &mut result,
        )?;

        let Some(solution) = built else {
            result.status = BuildStatus::Failed;
            log::info!("Build with {} produced no solution", builder.id());
            return Ok(BuildOutcome::Failed(result));
        };

        result.status = BuildStatus::Ok;
        Ok(BuildOutcome::Ready {
            session: TestingSession {
                container: self.container,
                store: self.store,
                checker: self.checker,
                reporter: self.reporter,
                config: self.config,
                state: Built { solution },
            },
            result,
        })
    }
}

impl TestingSession<Built> {
    /// Run the solution on one test.
    ///
    /// Exactly one sandbox run, no retries. Limit breaches and crashes are
    /// recorded in the result; only judge failures are errors.
    pub fn test(&mut self, settings: &ProcessSettings, test_id: &str) -> Result<TestResult> {
        self.reporter.report(&IntermediateState::testing(test_id));
        let owner_id = self.config.owner_id;

        let validation = validate_process_settings(settings)?;
        for warning in &validation.warnings {
            log::warn!("test {}: {}", test_id, warning);
        }
        let plan = ProvisionPlan::new(&settings.files, owner_id)?;

        let mut group = self.container.create_process_group()?;
        let mut spec = self.state.solution.create(&settings.execution.arguments);
        process::setup(&settings.resource_limits, group.as_mut(), &mut spec);

        let provisioned = plan.apply(test_id, self.container.filesystem(), self.store.as_ref())?;
        process::bind(&mut spec, owner_id, &settings.execution, &provisioned.files)?;
        let process_id = group.add_process(spec)?;

        let group_result = group.synchronized_call()?;
        let process_result = group.process_result(process_id)?;
        let execution = VerdictClassifier::classify_execution(&group_result, &process_result);

        let fs = self.container.filesystem();
        let files = capture::capture_files(fs, &provisioned.receive)?;

        let checking = if execution.status == ExecutionStatus::Ok {
            let solution_files: HashMap<String, PathBuf> = provisioned
                .files
                .iter()
                .map(|(id, location)| (id.clone(), fs.keep_in_root(location)))
                .collect();
            let test_files: HashMap<String, PathBuf> = self
                .store
                .data_set()
                .into_iter()
                .map(|data_id| {
                    let location = self.store.location(test_id, &data_id);
                    (data_id, location)
                })
                .collect();
            Some(self.checker.check(&test_files, &solution_files)?)
        } else {
            None
        };

        let result = TestResult {
            id: test_id.to_string(),
            execution,
            checking,
            files,
        };
        log::info!(
            "test {}: execution={:?} checking={:?} passed={}",
            test_id,
            result.execution.status,
            result.checking.as_ref().map(|c| c.status),
            result.passed()
        );
        Ok(result)
    }
}
