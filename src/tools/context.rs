//! Tool execution context - scoped to one repository root

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

/// Execution context for tools - scoped to a single worker invocation
#[derive(Clone)]
pub struct ToolContext {
    /// Repository root - all file ops constrained here
    pub root: PathBuf,

    /// Session the invocation belongs to (for logging)
    pub session_id: String,

    /// Default budget for shell commands
    pub command_timeout: Duration,

    /// Whether sandbox mode is enabled (default: true)
    pub sandbox_enabled: bool,

    /// Files read this invocation (for edit validation)
    read_files: Arc<Mutex<BTreeSet<PathBuf>>>,

    /// Files written or edited this invocation, relative to root
    written_files: Arc<Mutex<BTreeSet<String>>>,
}

impl ToolContext {
    pub fn new(root: PathBuf, session_id: impl Into<String>) -> Self {
        Self {
            root,
            session_id: session_id.into(),
            command_timeout: Duration::from_millis(120_000),
            sandbox_enabled: true,
            read_files: Arc::new(Mutex::new(BTreeSet::new())),
            written_files: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// Create a context with sandbox disabled (for testing)
    pub fn new_unsandboxed(root: PathBuf, session_id: impl Into<String>) -> Self {
        Self {
            sandbox_enabled: false,
            ..Self::new(root, session_id)
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Track that a file was read (enables edit validation)
    pub async fn track_read(&self, path: &Path) {
        self.read_files.lock().await.insert(resolve(&self.normalize_path(path)));
    }

    /// Check if a file was read (required before edit)
    pub async fn was_read(&self, path: &Path) -> bool {
        self.read_files.lock().await.contains(&resolve(&self.normalize_path(path)))
    }

    /// Record a write so workers can report changed files
    pub async fn track_write(&self, path: &Path) {
        let relative = self.relative(path);
        self.written_files.lock().await.insert(relative);
    }

    /// Files written so far, sorted
    pub async fn written_files(&self) -> Vec<String> {
        self.written_files.lock().await.iter().cloned().collect()
    }

    /// Path relative to the root, for display
    pub fn relative(&self, path: &Path) -> String {
        let normalized = self.normalize_path(path);
        let root = resolve(&self.root);
        let resolved = resolve(&normalized);
        resolved
            .strip_prefix(&root)
            .or_else(|_| normalized.strip_prefix(&self.root))
            .unwrap_or(&normalized)
            .to_string_lossy()
            .to_string()
    }

    /// Join onto the root and fold away `.` and `..` lexically
    fn normalize_path(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) };
        let mut clean = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    clean.pop();
                }
                other => clean.push(other.as_os_str()),
            }
        }
        clean
    }

    /// Validate path is within the root (sandbox enforcement)
    pub fn validate_path(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let resolved = resolve(&self.normalize_path(path));

        if !self.sandbox_enabled {
            return Ok(resolved);
        }

        let root = self.root.canonicalize().map_err(|e| ToolError::IoError {
            operation: "canonicalize repository root".to_string(),
            source: e,
        })?;

        if resolved.starts_with(&root) {
            Ok(resolved)
        } else {
            Err(ToolError::SandboxViolation {
                path: path.to_path_buf(),
                root: self.root.clone(),
            })
        }
    }
}

/// Canonicalize the longest existing prefix and re-append the rest, so
/// symlinks are followed even for files that do not exist yet
fn resolve(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();
    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                missing.push(name.to_os_string());
                existing.pop();
            }
            None => break,
        }
    }

    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for name in missing.iter().rev() {
        resolved.push(name);
    }
    resolved
}

/// Errors that can occur during tool execution
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Path {path} escapes repository root {root}")]
    SandboxViolation { path: PathBuf, root: PathBuf },

    #[error("Must read_file before editing: {path}")]
    EditWithoutRead { path: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("IO error during {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}
