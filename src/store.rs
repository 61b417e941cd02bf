//! Version-control integration for the snapshot store

use crate::error::{MirrorError, Result};
use git2::{
    Config, Cred, CredentialType, PushOptions, RemoteCallbacks, Repository, Signature,
    StatusOptions,
};
use std::path::{Path, PathBuf};

/// Operations the pipeline needs from the version store. Paths are relative
/// to the snapshot store root.
pub trait VersionStore {
    /// Whether the working tree has modified, staged or untracked files
    fn is_dirty(&self) -> Result<bool>;
    fn stage_add(&mut self, paths: &[PathBuf]) -> Result<()>;
    fn stage_remove(&mut self, paths: &[PathBuf]) -> Result<()>;
    /// Whether the staged tree differs from the last commit
    fn has_staged_changes(&self) -> Result<bool>;
    /// Commit the staged tree, returning the new commit id
    fn commit(&mut self, message: &str) -> Result<String>;
    fn push(&mut self) -> Result<()>;
}

/// Credential callbacks allowed per push before giving up
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Refuse to run against a store with pending changes
pub fn ensure_clean(store: &dyn VersionStore, root: &Path) -> Result<()> {
    if store.is_dirty()? {
        return Err(MirrorError::DirtyStore {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}

/// Git-backed snapshot store
pub struct GitStore {
    repo: Repository,
    /// Location of the snapshot store inside the repository working tree
    prefix: PathBuf,
}

impl GitStore {
    /// Open the repository containing `root`
    pub fn open(root: &Path) -> Result<Self> {
        let repo = Repository::discover(root)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| {
                MirrorError::invalid_input(format!("{} is a bare repository", root.display()))
            })?
            .canonicalize()?;
        let root = root.canonicalize()?;
        let prefix = root
            .strip_prefix(&workdir)
            .map(Path::to_path_buf)
            .map_err(|_| {
                MirrorError::invalid_input(format!("{} is outside the repository", root.display()))
            })?;
        Ok(Self { repo, prefix })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn repo_path(&self, path: &Path) -> PathBuf {
        self.prefix.join(path)
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now("catalog-mirror", "catalog-mirror@localhost")?),
        }
    }

    fn head_tree(&self) -> Option<git2::Tree<'_>> {
        self.repo.head().ok().and_then(|head| head.peel_to_tree().ok())
    }
}

impl VersionStore for GitStore {
    fn is_dirty(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        if !self.prefix.as_os_str().is_empty() {
            options.pathspec(self.prefix.as_path());
        }
        Ok(!self.repo.statuses(Some(&mut options))?.is_empty())
    }

    fn stage_add(&mut self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut index = self.repo.index()?;
        for path in paths {
            index.add_path(&self.repo_path(path))?;
        }
        index.write()?;
        Ok(())
    }

    fn stage_remove(&mut self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut index = self.repo.index()?;
        for path in paths {
            index.remove_path(&self.repo_path(path))?;
        }
        index.write()?;
        Ok(())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let index = self.repo.index()?;
        let head_tree = self.head_tree();
        let diff = self.repo.diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;
        Ok(diff.deltas().len() > 0)
    }

    fn commit(&mut self, message: &str) -> Result<String> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;

        let parents: Vec<git2::Commit<'_>> = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .and_then(|oid| self.repo.find_commit(oid).ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, parent_refs.as_slice())?;
        Ok(oid.to_string())
    }

    fn push(&mut self) -> Result<()> {
        let head = self.repo.head()?;
        let branch = head
            .shorthand()
            .ok_or_else(|| MirrorError::invalid_input("HEAD is not a named branch"))?
            .to_string();
        let mut remote = self.repo.find_remote("origin")?;
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);

        let mut options = PushOptions::new();
        options.remote_callbacks(push_callbacks(self.repo.config()?));
        remote.push(&[refspec.as_str()], Some(&mut options))?;
        log::info!("Pushed {} to origin", branch);
        Ok(())
    }
}

/// Credentials from the ssh agent or the configured git credential helper,
/// and failure on any ref the remote rejects
fn push_callbacks(config: Config) -> RemoteCallbacks<'static> {
    let mut attempts = 0;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(&format!("authentication to {} failed", url)));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            if let Some(username) = username {
                return Cred::ssh_key_from_agent(username);
            }
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            return Cred::credential_helper(&config, url, username);
        }
        if allowed.contains(CredentialType::USERNAME) {
            return Cred::username(username.unwrap_or("git"));
        }
        Cred::default()
    });
    callbacks.push_update_reference(|refname, status| match status {
        Some(message) => Err(git2::Error::from_str(&format!(
            "origin rejected {}: {}",
            refname, message
        ))),
        None => Ok(()),
    });
    callbacks
}
