use anyhow::Result;

fn main() -> Result<()> {
    rustjudge::cli::run()
}
