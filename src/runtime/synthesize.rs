// INVARIANT:
// - The synthesized program is user source + bootstrap fragment + exactly one
//   `_run_main(<entry>)` line, in that order.
// - Output depends only on the inputs; no timestamps, no paths.

// Program synthesis: glue user source to the bootstrap fragment

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::{RunnerError, RunnerResult};
use crate::message::DEFAULT_ENTRY_POINT;

/// Function defined by the bootstrap fragment that drives the entry point.
pub const RUN_MAIN: &str = "_run_main";

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}_]*$").expect("static regex"))
}

/// Program text ready to be handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedProgram {
    pub text: String,
    pub entry_point: String,
}

/// Resolve the entry point named by the init message.
///
/// Absent or blank names fall back to [`DEFAULT_ENTRY_POINT`]. Anything that
/// is not a plain identifier is rejected so it cannot smuggle extra
/// statements into the program.
pub fn resolve_entry_point(requested: Option<&str>) -> RunnerResult<String> {
    let name = match requested.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_ENTRY_POINT,
    };
    if !identifier_pattern().is_match(name) {
        return Err(RunnerError::InvalidEntryPoint(name.to_string()));
    }
    Ok(name.to_string())
}

/// Read the bootstrap fragment. A missing file is fatal to initialization.
pub fn load_bootstrap(path: &Path) -> RunnerResult<String> {
    fs::read_to_string(path).map_err(|source| RunnerError::TemplateMissing {
        path: path.to_path_buf(),
        source,
    })
}

/// Append the bootstrap fragment and the entry point call to `source`.
pub fn synthesize(source: &str, entry_point: &str, bootstrap: &str) -> SynthesizedProgram {
    let call = format!("{}({})\n", RUN_MAIN, entry_point);
    let mut text = String::with_capacity(source.len() + bootstrap.len() + call.len() + 2);

    text.push_str(source);
    if !source.is_empty() && !source.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(bootstrap);
    if !bootstrap.is_empty() && !bootstrap.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&call);

    SynthesizedProgram {
        text,
        entry_point: entry_point.to_string(),
    }
}

/// Write the program to its fixed location, replacing any previous content.
pub fn write_program(program: &SynthesizedProgram, path: &Path) -> RunnerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RunnerError::io(parent, e))?;
    }
    fs::write(path, &program.text).map_err(|e| RunnerError::io(path, e))?;
    debug!(
        path = %path.display(),
        bytes = program.text.len(),
        entry_point = %program.entry_point,
        "wrote synthesized program"
    );
    Ok(())
}
