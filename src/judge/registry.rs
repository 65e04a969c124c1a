use crate::config::loader::JudgeConfig;
use crate::config::types::{JudgeError, Result};
use crate::judge::builder::Builder;
use crate::judge::languages::{compiled::CompilerBuilder, interpreted::InterpreterBuilder};

/// Resolve a builder id, applying any compiler override from the config.
///
/// Unknown ids are a configuration error.
pub fn builder_for(id: &str, config: &JudgeConfig) -> Result<Box<dyn Builder>> {
    let mut builder: Box<dyn Builder> = match id {
        "cpp" | "c++" | "cxx" | "cc" => Box::new(CompilerBuilder::cpp()),
        "c" => Box::new(CompilerBuilder::c()),
        "python" | "py" => Box::new(InterpreterBuilder::python()),
        "shell" | "sh" => Box::new(InterpreterBuilder::shell()),
        _ => return Err(JudgeError::UnknownBuilder(id.to_string())),
    };

    if let Some(compiler) = config.compilers.get(builder.id()) {
        log::debug!(
            "Using {} for builder {}",
            compiler.executable.display(),
            builder.id()
        );
        builder.configure(compiler);
    }
    Ok(builder)
}
