use crate::config::loader::JudgeConfig;
use crate::config::types::{Result, SessionReport, Task};
use crate::core::container::Container;
use crate::exec::session::{BuildOutcome, TestingSession};
use crate::judge::checker_for;
use crate::observability::progress::ProgressReporter;
use crate::selector::{Matcher, TestQuery};
use crate::testdata::TestStore;
use std::sync::Arc;

/// Judge a whole task: build once, then run every selected test in
/// ascending id order.
///
/// The query is compiled before building so a malformed query never costs a
/// compilation. A failed build yields a report without tests.
pub fn judge_task(
    task: &Task,
    container: Box<dyn Container>,
    store: Arc<dyn TestStore>,
    reporter: Arc<dyn ProgressReporter>,
    config: &JudgeConfig,
) -> Result<SessionReport> {
    let matcher = Matcher::compile(&TestQuery::from_messages(&task.testing.test_query)?)?;
    let checker = checker_for(&task.checker);

    let session = TestingSession::new(
        container,
        Arc::clone(&store),
        checker,
        reporter,
        config.clone(),
    );

    let (mut session, build) = match session.build(&task.solution)? {
        BuildOutcome::Ready { session, result } => (session, result),
        BuildOutcome::Failed(build) => {
            return Ok(SessionReport {
                build,
                tests: Vec::new(),
            })
        }
    };

    let universe = store.test_set();
    let mut test_ids: Vec<String> = matcher.select(&universe).into_iter().collect();
    test_ids.sort();
    log::info!("Running {} of {} tests", test_ids.len(), universe.len());

    let mut tests = Vec::with_capacity(test_ids.len());
    for test_id in &test_ids {
        tests.push(session.test(&task.testing.process, test_id)?);
    }

    let report = SessionReport { build, tests };
    log::info!(
        "Passed {} of {} tests",
        report.passed_count(),
        report.tests.len()
    );
    Ok(report)
}
