//! Debug data dumping
//!
//! Best-effort IR snapshots keyed by module name and debug group. Dumping
//! is a side channel: IO failures are logged and swallowed, and a run never
//! fails because of them.

use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use trellis_core::ir::Module;

/// Coarse debug group: whole-run before/after snapshots.
pub const GROUP_MAIN: &str = "main";
/// Detailed debug group: per-pass snapshots during a run.
pub const GROUP_LOWERING_DETAIL: &str = "lowering_detail";

/// Dump policy and filename resolution.
///
/// Configured from the environment (`TRELLIS_DUMP_DIR`,
/// `TRELLIS_DUMP_GROUPS`, `TRELLIS_DUMP_NAME_FILTER`) or constructed
/// explicitly, e.g. in tests.
#[derive(Debug)]
pub struct DebugDumper {
    dir: Option<PathBuf>,
    groups: Vec<String>,
    name_filter: Option<String>,
    seq: AtomicU32,
}

impl DebugDumper {
    /// A dumper that never dumps
    pub fn disabled() -> Self {
        Self {
            dir: None,
            groups: Vec::new(),
            name_filter: None,
            seq: AtomicU32::new(0),
        }
    }

    /// A dumper writing under `dir` for the given groups (`"all"` enables
    /// every group)
    pub fn new(dir: impl Into<PathBuf>, groups: &[&str]) -> Self {
        Self {
            dir: Some(dir.into()),
            groups: groups.iter().map(|group| group.to_string()).collect(),
            name_filter: None,
            seq: AtomicU32::new(0),
        }
    }

    /// Restrict dumping to module names containing `filter`
    pub fn with_name_filter(mut self, filter: impl Into<String>) -> Self {
        self.name_filter = Some(filter.into());
        self
    }

    /// Read the dump configuration from the process environment
    pub fn from_env() -> Self {
        let dir = std::env::var("TRELLIS_DUMP_DIR").ok().map(PathBuf::from);
        let groups = std::env::var("TRELLIS_DUMP_GROUPS")
            .map(|value| {
                value
                    .split(',')
                    .map(|group| group.trim().to_string())
                    .filter(|group| !group.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec![GROUP_MAIN.to_string()]);
        let name_filter = std::env::var("TRELLIS_DUMP_NAME_FILTER").ok();
        Self {
            dir,
            groups,
            name_filter,
            seq: AtomicU32::new(0),
        }
    }

    /// Process-wide dumper, initialized from the environment on first use
    pub fn global() -> Arc<DebugDumper> {
        static GLOBAL: OnceLock<Arc<DebugDumper>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(DebugDumper::from_env())))
    }

    /// Whether this dumper can write files at all
    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Whether snapshots for `module_name` in `group` should be written
    pub fn should_dump(&self, module_name: &str, group: &str) -> bool {
        if self.dir.is_none() {
            return false;
        }
        if let Some(filter) = &self.name_filter {
            if !module_name.contains(filter.as_str()) {
                return false;
            }
        }
        self.groups
            .iter()
            .any(|enabled| enabled == "all" || enabled == group)
    }

    /// Deterministic dump path: `<dir>/<module_name>/<seq>.<group>.<tag>.ir`.
    ///
    /// The sequence number orders filenames chronologically across one
    /// process.
    pub fn dump_filename(&self, module_name: &str, group: &str, tag: &str) -> PathBuf {
        let dir = self.dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        dir.join(sanitize(module_name))
            .join(format!("{seq:04}.{group}.{tag}.ir"))
    }
}

/// Writes a textual module snapshot to `path`, creating parent directories.
///
/// Best effort: failures are logged and never propagated.
pub fn write_module_snapshot(path: &Path, module: &Module, context: &str) {
    let text = format!("// {context}\n{module}");
    if let Some(parent) = path.parent() {
        if let Err(error) = fs::create_dir_all(parent) {
            warn!(
                "failed to create dump directory {}: {error}",
                parent.display()
            );
            return;
        }
    }
    match fs::write(path, text) {
        Ok(()) => debug!("wrote module snapshot to {}", path.display()),
        Err(error) => warn!("failed to write module snapshot {}: {error}", path.display()),
    }
}

fn sanitize(module_name: &str) -> String {
    if module_name.is_empty() {
        return "module".to_string();
    }
    module_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
