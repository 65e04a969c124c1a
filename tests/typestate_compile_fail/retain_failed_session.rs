// This test should FAIL to compile
// A failed build carries no session to test with

use rustjudge::exec::BuildOutcome;
use rustjudge::ProcessSettings;

fn after_failure(outcome: BuildOutcome) {
    if let BuildOutcome::Failed(result) = outcome {
        let _ = result.test(&ProcessSettings::default(), "1");
    }
}

fn main() {}
