//! # Job specification.
//!
//! Defines [`JobSpec`], the description of what one job launches.
//!
//! A spec can be created:
//! - **Explicitly** with [`JobSpec::new`] (the script is executed directly)
//! - **From config** with [`JobSpec::with_defaults`] (inherits [`Config::interpreter`])
//!
//! ## Example
//! ```rust
//! use jobvisor::{Config, Interpreter, JobSpec};
//!
//! let mut cfg = Config::default();
//! cfg.interpreter = Some(Interpreter::new("python3").with_arg("-u"));
//!
//! let spec = JobSpec::with_defaults("tools/backup.py", &cfg).with_arg("--full");
//! assert_eq!(spec.script_name(), "backup.py");
//! assert_eq!(spec.program(), std::path::Path::new("python3"));
//! ```

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::core::Config;

/// Program used to launch scripts (e.g. `python3 -u`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interpreter {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Interpreter {
    /// Creates an interpreter without extra arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument placed before the script path.
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// What one job runs.
#[derive(Clone, Debug)]
pub struct JobSpec {
    script: PathBuf,
    interpreter: Option<Interpreter>,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
}

impl JobSpec {
    /// Executes `script` directly (it must be executable).
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            interpreter: None,
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Launches `script` through the configured default interpreter, if any.
    pub fn with_defaults(script: impl Into<PathBuf>, cfg: &Config) -> Self {
        let mut spec = Self::new(script);
        spec.interpreter = cfg.interpreter.clone();
        spec
    }

    /// Overrides the interpreter.
    pub fn with_interpreter(mut self, interpreter: Interpreter) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    /// Appends an argument passed after the script path.
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the working directory of the child.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Adds an environment variable for the child.
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn interpreter(&self) -> Option<&Interpreter> {
        self.interpreter.as_ref()
    }

    /// Human-readable name reported in `JobStarted` (file name of the script).
    pub fn script_name(&self) -> String {
        self.script
            .file_name()
            .unwrap_or(self.script.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Executable actually spawned.
    pub fn program(&self) -> &Path {
        match &self.interpreter {
            Some(i) => &i.program,
            None => &self.script,
        }
    }

    /// Builds the child command: piped stdout/stderr, null stdin, own process group on unix.
    pub(crate) fn command(&self) -> Command {
        let mut cmd = match &self.interpreter {
            Some(i) => {
                let mut cmd = Command::new(&i.program);
                cmd.args(&i.args).arg(&self.script);
                cmd
            }
            None => Command::new(&self.script),
        };
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Signals go to the whole group so helpers started by the script die with it.
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}
