use crate::config::types::{CheckerSettings, Checking, CheckingStatus, JudgeError, Result};
use crate::verdict::VerdictClassifier;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Checker contract.
///
/// `test_files` maps data ids to host paths of the test data,
/// `solution_files` maps declared file ids to host paths inside the jail.
pub trait Checker: Send + Sync {
    fn check(
        &self,
        test_files: &HashMap<String, PathBuf>,
        solution_files: &HashMap<String, PathBuf>,
    ) -> Result<Checking>;
}

pub fn checker_for(settings: &CheckerSettings) -> Box<dyn Checker> {
    match settings {
        CheckerSettings::Tokens { expected, produced } => Box::new(TokenChecker {
            expected: expected.clone(),
            produced: produced.clone(),
        }),
        CheckerSettings::Program {
            path,
            arguments,
            input,
            produced,
            expected,
        } => Box::new(ProgramChecker {
            path: path.clone(),
            arguments: arguments.clone(),
            input: input.clone(),
            produced: produced.clone(),
            expected: expected.clone(),
        }),
    }
}

fn verdict(status: CheckingStatus, output: impl Into<String>) -> Checking {
    Checking {
        status,
        output: output.into(),
    }
}

fn solution_file<'a>(files: &'a HashMap<String, PathBuf>, id: &str) -> Result<&'a PathBuf> {
    files
        .get(id)
        .ok_or_else(|| JudgeError::InvalidFileId(id.to_string()))
}

/// Reads a file, `None` when it does not exist
fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(JudgeError::file_io(path, e)),
    }
}

/// Whitespace-token comparison of one test data file against one solution file
#[derive(Debug, Clone)]
pub struct TokenChecker {
    pub expected: String,
    pub produced: String,
}

impl TokenChecker {
    pub fn compare(expected: &[u8], produced: &[u8]) -> Checking {
        let expected = String::from_utf8_lossy(expected);
        let produced = String::from_utf8_lossy(produced);

        if significant_lines(&expected) == significant_lines(&produced) {
            return verdict(CheckingStatus::Ok, "");
        }

        let expected_tokens: Vec<&str> = expected.split_whitespace().collect();
        let produced_tokens: Vec<&str> = produced.split_whitespace().collect();
        if expected_tokens == produced_tokens {
            return verdict(CheckingStatus::PresentationError, "tokens match, layout differs");
        }

        let mismatch = expected_tokens
            .iter()
            .zip(produced_tokens.iter())
            .position(|(e, p)| e != p);
        let message = match mismatch {
            Some(index) => format!(
                "token {}: expected {:?}, found {:?}",
                index + 1,
                expected_tokens[index],
                produced_tokens[index]
            ),
            None => format!(
                "expected {} tokens, found {}",
                expected_tokens.len(),
                produced_tokens.len()
            ),
        };
        verdict(CheckingStatus::WrongAnswer, message)
    }
}

/// Lines with trailing whitespace and trailing blank lines removed
fn significant_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

impl Checker for TokenChecker {
    fn check(
        &self,
        test_files: &HashMap<String, PathBuf>,
        solution_files: &HashMap<String, PathBuf>,
    ) -> Result<Checking> {
        let produced_path = solution_file(solution_files, &self.produced)?;

        let expected = match test_files.get(&self.expected) {
            Some(path) => read_optional(path)?,
            None => None,
        };
        let Some(expected) = expected else {
            return Ok(verdict(
                CheckingStatus::FailTest,
                format!("test data {:?} is missing", self.expected),
            ));
        };

        match read_optional(produced_path)? {
            Some(produced) => Ok(Self::compare(&expected, &produced)),
            None => Ok(verdict(
                CheckingStatus::WrongAnswer,
                format!("output file {:?} was removed", self.produced),
            )),
        }
    }
}

/// External checker program following testlib exit codes.
///
/// Invoked as `path [arguments..] <input> <output> <answer>`.
#[derive(Debug, Clone)]
pub struct ProgramChecker {
    pub path: PathBuf,
    pub arguments: Vec<String>,
    pub input: String,
    pub produced: String,
    pub expected: String,
}

impl Checker for ProgramChecker {
    fn check(
        &self,
        test_files: &HashMap<String, PathBuf>,
        solution_files: &HashMap<String, PathBuf>,
    ) -> Result<Checking> {
        let output = solution_file(solution_files, &self.produced)?;
        let Some(answer) = test_files.get(&self.expected).filter(|p| p.exists()) else {
            return Ok(verdict(
                CheckingStatus::FailTest,
                format!("test data {:?} is missing", self.expected),
            ));
        };
        let input = test_files
            .get(&self.input)
            .filter(|p| p.exists())
            .cloned()
            .unwrap_or_else(|| PathBuf::from("/dev/null"));

        let result = Command::new(&self.path)
            .args(&self.arguments)
            .arg(&input)
            .arg(output)
            .arg(answer)
            .output()
            .map_err(|e| JudgeError::file_io(&self.path, e))?;

        let status = VerdictClassifier::checking_status(result.status.code())?;
        let mut message = String::from_utf8_lossy(&result.stdout).into_owned();
        message.push_str(&String::from_utf8_lossy(&result.stderr));

        log::debug!("checker {} returned {:?}", self.path.display(), status);
        Ok(verdict(status, message.trim_end()))
    }
}
