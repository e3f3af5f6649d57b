//! Logging initialization.
//!
//! Thin wrapper over the observability crate so binaries only pass a level
//! and, optionally, a component name.

use crate::Paths;

/// Initialize logging for the command-line client.
///
/// Writes JSONL to the path from `paths` and mirrors to stderr.
pub fn init_logging(level: &str, paths: &Paths) {
    init_logging_for_service("cropwatch-cli", level, paths);
}

/// Initialize logging with a custom component name.
///
/// Use this to tell the foreground client and the background push agent
/// apart in the shared log file.
pub fn init_logging_for_service(service_name: &str, level: &str, paths: &Paths) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    });
}
