//! Task environment collaborator
//!
//! Supplies the shell commands that prepare the interpreter environment on the
//! remote side and persist captured logs once the step has run.

use whisk_core::domain::datastore::DatastoreKind;

/// Shell-level hooks for the environment a remote step runs in
pub trait Environment: Send + Sync {
    /// Commands run before the user step, after the code package is unpacked
    fn bootstrap_commands(&self, step_name: &str, datastore: DatastoreKind) -> Vec<String>;

    /// Command that persists captured logs to the datastore
    fn save_logs_command(&self) -> String {
        format!("{} -m metaflow.mflog.save_logs", self.python())
    }

    /// Python interpreter used by datastore tooling on the remote side
    fn python(&self) -> &str {
        "python"
    }
}

/// Environment with a fixed interpreter and optional extra bootstrap commands
#[derive(Debug, Clone)]
pub struct StandardEnvironment {
    python: String,
    bootstrap: Vec<String>,
}

impl StandardEnvironment {
    pub fn new() -> Self {
        Self {
            python: "python".to_string(),
            bootstrap: Vec::new(),
        }
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_bootstrap(mut self, command: impl Into<String>) -> Self {
        self.bootstrap.push(command.into());
        self
    }
}

impl Default for StandardEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for StandardEnvironment {
    fn bootstrap_commands(&self, _step_name: &str, _datastore: DatastoreKind) -> Vec<String> {
        self.bootstrap.clone()
    }

    fn python(&self) -> &str {
        &self.python
    }
}
