//! Shared helpers for tests that touch process-global state or external tools.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use replay_core::process::{CommandResult, CommandRunner, CommandSpec, SystemCommandRunner};
use replay_core::store::MemoryStore;
use replay_core::{ReplayError, Result, RunContext, ScriptSpec};

/// Serialises tests that change the current directory or shared variables like `PATH`.
pub fn process_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// Puts the current directory back even when an assertion fails mid-test.
pub struct CwdRestorer(PathBuf);

impl CwdRestorer {
    pub fn capture() -> Self {
        Self(env::current_dir().unwrap())
    }
}

impl Drop for CwdRestorer {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.0);
    }
}

/// One command seen by [`RecordingRunner`], with the process state at call time.
#[derive(Debug, Clone)]
pub struct Call {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub path_env: String,
    pub pgdatabase: Option<String>,
}

impl Call {
    pub fn program_name(&self) -> &str {
        Path::new(&self.argv[0])
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Fake runner: records every command and answers with exit status 0, or 1
/// when any argument contains one of the `fail_on` substrings. Programs listed
/// in `passthrough` are really executed, programs in `unspawnable` fail to
/// start. A successful environment creation command creates its target
/// directory, as `virtualenv` and `venv` do.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Call>>,
    fail_on: Vec<String>,
    passthrough: Vec<String>,
    unspawnable: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }

    pub fn passing_through(mut self, program: &str) -> Self {
        self.passthrough.push(program.to_string());
        self
    }

    pub fn unable_to_spawn(mut self, program: &str) -> Self {
        self.unspawnable.push(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.program_name().to_string())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandResult> {
        let argv: Vec<String> = std::iter::once(command.program())
            .chain(command.arguments().iter().map(|a| a.as_os_str()))
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let call = Call {
            argv: argv.clone(),
            cwd: command
                .working_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| env::current_dir().unwrap_or_default()),
            path_env: env::var("PATH").unwrap_or_default(),
            pgdatabase: env::var("PGDATABASE").ok(),
        };
        self.calls.lock().unwrap().push(call.clone());

        if self.passthrough.iter().any(|p| p == call.program_name()) {
            return SystemCommandRunner.run(command);
        }
        if self.unspawnable.iter().any(|p| p == call.program_name()) {
            return Err(ReplayError::Spawn {
                command: command.display(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            });
        }
        let fails = argv[1..]
            .iter()
            .any(|a| self.fail_on.iter().any(|needle| a.contains(needle.as_str())));
        if !fails && creates_environment(&argv) {
            if let Some(target) = argv.last() {
                fs::create_dir_all(target).unwrap();
            }
        }
        Ok(CommandResult {
            command: command.display(),
            status: if fails { 1 } else { 0 },
            stdout: Vec::new(),
            stderr: if fails {
                b"ERROR: No matching distribution found".to_vec()
            } else {
                Vec::new()
            },
        })
    }
}

fn creates_environment(argv: &[String]) -> bool {
    let program = Path::new(&argv[0]).file_name().and_then(|n| n.to_str()).unwrap_or_default();
    program == "virtualenv" || (argv.len() > 3 && argv[1] == "-m" && argv[2] == "venv")
}

/// Context over an in-memory store, with environments cached under `envs`.
pub fn memory_context(envs: &Path, runner: Arc<dyn CommandRunner>) -> (RunContext, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ctx = RunContext::new(store.clone(), envs).with_runner(runner);
    (ctx, store)
}

/// Write `<dir>/<name>.script` with `yaml` and load it.
pub fn write_spec(dir: &Path, name: &str, yaml: &str) -> ScriptSpec {
    let path = dir.join(format!("{name}.script"));
    fs::write(&path, yaml).unwrap();
    ScriptSpec::from_file(&path).unwrap()
}

/// Write an executable-by-interpreter file next to the specs.
pub fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}
