//! End-to-end runs of the standard plugin chain with real `sh` scripts.
//! Environment and database tools are faked by `RecordingRunner`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use replay_core::store::{ContentStore, LocalStore};
use replay_core::{ReplayError, RunContext, ScriptSpec, WorkspacePolicy};

use crate::test_support::{process_lock, write_file, write_spec, CwdRestorer, RecordingRunner};
use crate::{default_chain, env as depenv, run};

struct Fixture {
    _tmp: tempfile::TempDir,
    scripts: PathBuf,
    store: PathBuf,
    envs: PathBuf,
    workspace: PathBuf,
    runner: Arc<RecordingRunner>,
}

impl Fixture {
    fn new(runner: RecordingRunner) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let scripts = root.join("scripts");
        let store = root.join("store");
        fs::create_dir(&scripts).unwrap();
        fs::create_dir(&store).unwrap();
        Self {
            scripts,
            store,
            envs: root.join("envs"),
            workspace: root.join("workspace"),
            runner: Arc::new(runner.passing_through("sh")),
            _tmp: tmp,
        }
    }

    fn context(&self) -> RunContext {
        RunContext::new(Arc::new(LocalStore::new(&self.store)), &self.envs)
            .with_working_directory(WorkspacePolicy::At(self.workspace.clone()))
            .with_runner(self.runner.clone())
    }

    fn script(&self, name: &str, yaml: &str, body: &str) -> ScriptSpec {
        write_file(&self.scripts, &format!("{name}.sh"), body);
        let yaml = format!("script: {name}.sh\ninterpreter: sh\n{yaml}");
        write_spec(&self.scripts, name, &yaml)
    }

    fn store_file(&self, path: &str, content: &str) {
        LocalStore::new(&self.store)
            .write(path, &mut content.as_bytes())
            .unwrap();
    }

    fn ran_script(&self) -> bool {
        self.runner.programs().iter().any(|p| p == "sh")
    }
}

fn run_default(fx: &Fixture, script: &ScriptSpec) -> replay_core::Result<()> {
    run(&default_chain(), &fx.context(), script)
}

/// Process state that every run must leave as it found it.
struct Ambient {
    cwd: PathBuf,
    path: Option<std::ffi::OsString>,
    virtual_env: Option<std::ffi::OsString>,
    pgdatabase: Option<std::ffi::OsString>,
}

impl Ambient {
    fn capture() -> Self {
        Self {
            cwd: env::current_dir().unwrap(),
            path: env::var_os("PATH"),
            virtual_env: env::var_os("VIRTUAL_ENV"),
            pgdatabase: env::var_os("PGDATABASE"),
        }
    }

    fn assert_unchanged(&self) {
        assert_eq!(env::current_dir().unwrap(), self.cwd);
        assert_eq!(env::var_os("PATH"), self.path);
        assert_eq!(env::var_os("VIRTUAL_ENV"), self.virtual_env);
        assert_eq!(env::var_os("PGDATABASE"), self.pgdatabase);
    }
}

#[test]
fn test_inputs_are_available_to_the_script() {
    let _lock = process_lock();
    let _cwd = CwdRestorer::capture();
    let fx = Fixture::new(RecordingRunner::new());
    fx.store_file("data1", "content1");
    fx.store_file("data2", "content2");
    let script = fx.script(
        "read_inputs",
        "inputs:\n  - data1: data1\n  - deeper/data2: data2\n",
        "test \"$(cat data1)\" = content1 && test \"$(cat deeper/data2)\" = content2\n",
    );
    let ambient = Ambient::capture();

    run_default(&fx, &script).unwrap();

    assert!(fx.ran_script());
    assert!(!fx.workspace.exists());
    ambient.assert_unchanged();
}

#[test]
fn test_missing_output_fails_and_copies_nothing() {
    let _lock = process_lock();
    let _cwd = CwdRestorer::capture();
    let fx = Fixture::new(RecordingRunner::new());
    let script = fx.script(
        "forgetful",
        "outputs:\n  - file: datastore/path\n",
        "echo 'not writing file'\n",
    );
    let ambient = Ambient::capture();

    let err = run_default(&fx, &script).unwrap_err();

    assert!(matches!(err, ReplayError::MissingOutput(ref p) if p == Path::new("file")));
    assert!(!fx.store.join("datastore").exists());
    assert!(!fx.workspace.exists());
    ambient.assert_unchanged();
}

#[test]
fn test_outputs_are_published() {
    let _lock = process_lock();
    let _cwd = CwdRestorer::capture();
    let fx = Fixture::new(RecordingRunner::new());
    let script = fx.script(
        "producer",
        "outputs:\n  - out/result.txt: results/result.txt\n",
        "mkdir -p out && echo 42 > out/result.txt\n",
    );

    run_default(&fx, &script).unwrap();

    assert_eq!(
        fs::read_to_string(fx.store.join("results/result.txt")).unwrap(),
        "42\n"
    );
}

#[test]
fn test_unresolvable_dependency_never_runs_script() {
    let _lock = process_lock();
    let _cwd = CwdRestorer::capture();
    let fx = Fixture::new(RecordingRunner::new().failing_on("nonexistent-package"));
    let script = fx.script(
        "needs_missing",
        "python dependencies:\n  - nonexistent-package==0.0.1\n",
        "echo should not run > marker\n",
    );
    let ambient = Ambient::capture();

    let err = run_default(&fx, &script).unwrap_err();

    match err {
        ReplayError::MissingDependency { package, result } => {
            assert_eq!(package, "nonexistent-package==0.0.1");
            assert!(!result.success());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fx.ran_script());
    assert!(!fx.workspace.exists());
    ambient.assert_unchanged();
}

#[test]
fn test_failing_script_still_cleans_up() {
    let _lock = process_lock();
    let _cwd = CwdRestorer::capture();
    let fx = Fixture::new(RecordingRunner::new());
    let script = fx.script(
        "fails",
        "outputs:\n  - partial: out/partial\n",
        "echo half > partial\nexit 1\n",
    );
    let ambient = Ambient::capture();

    let err = run_default(&fx, &script).unwrap_err();

    match err {
        ReplayError::ScriptError(result) => assert_eq!(result.status, 1),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fx.workspace.exists());
    assert!(!fx.store.join("out").exists());
    ambient.assert_unchanged();
}

#[test]
fn test_script_sees_environment_and_database() {
    let _lock = process_lock();
    let _cwd = CwdRestorer::capture();
    let fx = Fixture::new(RecordingRunner::new());
    let script = fx.script(
        "inspect",
        "python dependencies: [roman==2.0.0]\noptions: [uses database]\n\
         outputs:\n  - env.txt: env.txt\n",
        "printf '%s\\n%s\\n%s\\n' \"$PGDATABASE\" \"$VIRTUAL_ENV\" \"$PATH\" > env.txt\n",
    );
    let ambient = Ambient::capture();

    run_default(&fx, &script).unwrap();

    let env_dir = depenv::env_dir(&fx.envs, &["roman==2.0.0"]);
    let seen = fs::read_to_string(fx.store.join("env.txt")).unwrap();
    let lines: Vec<&str> = seen.lines().collect();
    assert!(lines[0].contains("_inspect_"));
    assert_eq!(lines[1], env_dir.to_string_lossy());
    assert!(lines[2].starts_with(&*depenv::bin_dir(&env_dir).to_string_lossy()));

    let programs = fx.runner.programs();
    assert_eq!(
        programs[programs.len() - 4..].to_vec(),
        vec!["pip", "createdb", "sh", "dropdb"]
    );

    let calls = fx.runner.calls();
    let sh = calls.iter().find(|c| c.program_name() == "sh").unwrap();
    assert_eq!(sh.cwd, fx.workspace);
    ambient.assert_unchanged();
}

#[test]
fn test_second_run_reuses_environment() {
    let _lock = process_lock();
    let _cwd = CwdRestorer::capture();
    let fx = Fixture::new(RecordingRunner::new());
    let first = fx.script("first", "python dependencies: [a==1, b==2]\n", "true\n");
    let second = fx.script("second", "python dependencies: [b==2, a==1]\n", "true\n");

    run_default(&fx, &first).unwrap();
    let after_first = fx.runner.programs().iter().filter(|p| *p == "pip").count();
    run_default(&fx, &second).unwrap();
    let after_second = fx.runner.programs().iter().filter(|p| *p == "pip").count();

    assert_eq!(after_first, 2);
    assert_eq!(after_second, 2);
    assert_eq!(fs::read_dir(&fx.envs).unwrap().count(), 1);
}

#[test]
fn test_existing_workspace_aborts_before_anything_runs() {
    let _lock = process_lock();
    let _cwd = CwdRestorer::capture();
    let fx = Fixture::new(RecordingRunner::new());
    fs::create_dir(&fx.workspace).unwrap();
    let script = fx.script("blocked", "", "true\n");

    let err = run_default(&fx, &script).unwrap_err();

    assert!(matches!(err, ReplayError::Io { .. }));
    assert!(fx.runner.calls().is_empty());
    assert!(fx.workspace.is_dir());
}
