//! Workspace plugin: run the script in a private, disposable directory.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use replay_core::{ReplayError, Result, RunContext, ScriptSpec, WorkspacePolicy};
use tempfile::TempDir;

use crate::info_log;
use crate::plugin::{Plugin, ScopeOutcome};

pub(crate) fn build<'a>(ctx: &'a RunContext, _script: &'a ScriptSpec) -> Result<Box<dyn Plugin + 'a>> {
    Ok(Box::new(WorkingDirectory::new(ctx.working_directory())))
}

enum WorkspaceDir {
    Temporary(TempDir),
    Fixed(PathBuf),
}

impl WorkspaceDir {
    fn create(policy: &WorkspacePolicy) -> Result<Self> {
        match policy {
            WorkspacePolicy::Temporary => tempfile::Builder::new()
                .prefix("replay-")
                .tempdir()
                .map(WorkspaceDir::Temporary)
                .map_err(ReplayError::io("Create temporary workspace")),
            // create_dir, not create_dir_all: an existing directory is never reused
            WorkspacePolicy::At(path) => fs::create_dir(path)
                .map(|()| WorkspaceDir::Fixed(path.clone()))
                .map_err(ReplayError::io(format!("Create workspace {}", path.display()))),
        }
    }

    fn path(&self) -> &Path {
        match self {
            WorkspaceDir::Temporary(dir) => dir.path(),
            WorkspaceDir::Fixed(path) => path,
        }
    }

    fn remove(self) -> Result<()> {
        let path = self.path().to_path_buf();
        let removed = match self {
            WorkspaceDir::Temporary(dir) => dir.close(),
            WorkspaceDir::Fixed(path) => fs::remove_dir_all(&path),
        };
        removed.map_err(ReplayError::io(format!("Remove workspace {}", path.display())))
    }
}

struct Active {
    dir: WorkspaceDir,
    previous: PathBuf,
}

/// Creates the workspace and makes it the current directory for the scope.
///
/// On exit the previous directory is restored first, then the workspace tree
/// is deleted. A failed restore does not stop the deletion; when both fail
/// the restore error is returned and the deletion error is logged.
pub struct WorkingDirectory<'a> {
    policy: &'a WorkspacePolicy,
    active: Option<Active>,
}

impl<'a> WorkingDirectory<'a> {
    pub fn new(policy: &'a WorkspacePolicy) -> Self {
        Self {
            policy,
            active: None,
        }
    }

    /// The workspace while the scope is active.
    pub fn path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.dir.path())
    }
}

impl Plugin for WorkingDirectory<'_> {
    fn name(&self) -> &str {
        crate::plugin::WORKING_DIRECTORY
    }

    fn enter(&mut self) -> Result<()> {
        let previous = env::current_dir().map_err(ReplayError::io("Read current directory"))?;
        let dir = WorkspaceDir::create(self.policy)?;
        if let Err(e) = env::set_current_dir(dir.path()) {
            let err = ReplayError::io(format!("Enter workspace {}", dir.path().display()))(e);
            if let Err(cleanup) = dir.remove() {
                tracing::warn!(error = %cleanup, "Could not remove unused workspace");
            }
            return Err(err);
        }
        info_log!(workspace = %dir.path().display(), "Entered workspace");
        self.active = Some(Active { dir, previous });
        Ok(())
    }

    fn exit(&mut self, _outcome: ScopeOutcome) -> Result<()> {
        let Some(Active { dir, previous }) = self.active.take() else {
            return Ok(());
        };
        let restored = env::set_current_dir(&previous)
            .map_err(ReplayError::io(format!("Restore directory {}", previous.display())));
        let removed = dir.remove();
        match (restored, removed) {
            (Err(restore), Err(remove)) => {
                tracing::error!(error = %remove, "Workspace removal failed too");
                Err(restore)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{process_lock, CwdRestorer};

    #[test]
    fn test_temporary_workspace_lifecycle() {
        let _lock = process_lock();
        let _cwd = CwdRestorer::capture();
        let before = env::current_dir().unwrap();
        let policy = WorkspacePolicy::Temporary;
        let mut plugin = WorkingDirectory::new(&policy);

        plugin.enter().unwrap();
        let ws = plugin.path().unwrap().to_path_buf();
        assert!(ws.is_dir());
        assert_eq!(
            env::current_dir().unwrap().canonicalize().unwrap(),
            ws.canonicalize().unwrap()
        );
        fs::create_dir_all("nested/dir").unwrap();
        fs::write("nested/dir/file", "x").unwrap();

        plugin.exit(ScopeOutcome::Completed).unwrap();
        assert_eq!(env::current_dir().unwrap(), before);
        assert!(!ws.exists());
    }

    #[test]
    fn test_fixed_workspace_is_created_and_removed() {
        let _lock = process_lock();
        let _cwd = CwdRestorer::capture();
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("work");
        let policy = WorkspacePolicy::At(target.clone());
        let mut plugin = WorkingDirectory::new(&policy);

        plugin.enter().unwrap();
        assert!(target.is_dir());
        plugin.exit(ScopeOutcome::Failed).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_existing_directory_is_never_reused() {
        let _lock = process_lock();
        let _cwd = CwdRestorer::capture();
        let before = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("work");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "precious").unwrap();
        let policy = WorkspacePolicy::At(target.clone());
        let mut plugin = WorkingDirectory::new(&policy);

        let err = plugin.enter().unwrap_err();
        assert!(matches!(err, ReplayError::Io { .. }));
        assert_eq!(env::current_dir().unwrap(), before);
        assert_eq!(fs::read_to_string(target.join("keep")).unwrap(), "precious");
    }

    #[test]
    fn test_removal_failure_reported_after_restore() {
        let _lock = process_lock();
        let _cwd = CwdRestorer::capture();
        let before = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("work");
        let policy = WorkspacePolicy::At(target.clone());
        let mut plugin = WorkingDirectory::new(&policy);

        plugin.enter().unwrap();
        // The script removed its own workspace.
        fs::remove_dir_all(&target).unwrap();

        let err = plugin.exit(ScopeOutcome::Completed).unwrap_err();
        assert!(err.to_string().contains("Remove workspace"));
        assert_eq!(env::current_dir().unwrap(), before);
    }

    #[test]
    fn test_exit_without_enter_is_noop() {
        let policy = WorkspacePolicy::Temporary;
        let mut plugin = WorkingDirectory::new(&policy);
        assert!(plugin.exit(ScopeOutcome::Completed).is_ok());
    }
}
