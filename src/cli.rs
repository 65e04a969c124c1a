use crate::config::loader::JudgeConfig;
use crate::config::types::Task;
use crate::config::validator::validate_config;
use crate::exec::judge_task;
use crate::observability::progress::LogReporter;
use crate::sandbox::HostContainer;
use crate::selector::{resolve, TestQuery, TestQueryMessage};
use crate::testdata::{DirectoryTestStore, TestStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "judge", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a solution and run it on the selected tests
    Run {
        /// Task JSON file, `-` for stdin
        #[arg(long)]
        task: PathBuf,
        /// Directory of `<test_id>.<data_id>` files
        #[arg(long)]
        tests: PathBuf,
        /// Judge configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Permissive mode: log and continue when owner changes or limits cannot be applied
        #[arg(long)]
        permissive: bool,
    },
    /// Print the test ids a query selects, one per line
    Select {
        /// Directory of `<test_id>.<data_id>` files
        #[arg(long)]
        tests: PathBuf,
        /// Query JSON: one query node or an array of nodes (logical OR)
        #[arg(long)]
        query: String,
    },
}

pub fn run() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            task,
            tests,
            config,
            permissive,
        } => run_task(&task, &tests, config.as_deref(), permissive),
        Commands::Select { tests, query } => select(&tests, &query),
    }
}

fn load_config(path: Option<&Path>, permissive: bool) -> Result<JudgeConfig> {
    let mut config = match path {
        Some(path) => JudgeConfig::load_from_file(path)?,
        None => JudgeConfig::default(),
    };
    if permissive {
        config.strict_mode = false;
    }

    let validation = validate_config(&config)?;
    for warning in &validation.warnings {
        log::warn!("config: {}", warning);
    }
    Ok(config)
}

fn read_task(path: &Path) -> Result<Task> {
    let content = if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read task from stdin")?;
        content
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task {}", path.display()))?
    };
    serde_json::from_str(&content).context("Failed to parse task JSON")
}

fn run_task(task: &Path, tests: &Path, config: Option<&Path>, permissive: bool) -> Result<()> {
    let config = load_config(config, permissive)?;
    let task = read_task(task)?;
    let store = Arc::new(DirectoryTestStore::open(tests)?);
    let container = HostContainer::from_config(&config)?;
    log::info!("Sandbox root {}", container.root().display());

    let report = judge_task(
        &task,
        Box::new(container),
        store,
        Arc::new(LogReporter),
        &config,
    )?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn parse_query(query: &str) -> Result<TestQuery> {
    let value: serde_json::Value = serde_json::from_str(query).context("Failed to parse query JSON")?;
    let messages: Vec<TestQueryMessage> = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(TestQuery::from_messages(&messages)?)
}

fn select(tests: &Path, query: &str) -> Result<()> {
    let query = parse_query(query)?;
    let store = DirectoryTestStore::open(tests)?;
    let mut selected: Vec<String> = resolve(&query, &store.test_set())?.into_iter().collect();
    selected.sort();
    for test_id in selected {
        println!("{}", test_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_single_and_list() {
        assert_eq!(
            parse_query(r#"{"id": "1"}"#).unwrap(),
            TestQuery::AnyOf(vec![TestQuery::id("1")])
        );
        assert_eq!(
            parse_query(r#"[{"id": "1"}, {"wildcard": {"value": "s*", "flags": ["IGNORE_CASE"]}}]"#)
                .unwrap(),
            TestQuery::AnyOf(vec![TestQuery::id("1"), TestQuery::wildcard("s*", true)])
        );
        assert!(parse_query(r#"{}"#).is_err());
    }

    #[test]
    fn test_permissive_flag_overrides_config() {
        let config = load_config(None, true).unwrap();
        assert!(!config.strict_mode);
        assert!(load_config(None, false).unwrap().strict_mode);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
