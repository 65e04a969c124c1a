// This test should FAIL to compile
// Attempting to run a test on a session that has not been built

use rustjudge::exec::{TestingSession, Unbuilt};
use rustjudge::ProcessSettings;

fn run_unbuilt(session: TestingSession<Unbuilt>) {
    // `test` only exists once a solution is built
    let _ = session.test(&ProcessSettings::default(), "1");
}

fn main() {}
