// Copyright 2024 SAP SE
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use git2::{Commit, ErrorCode, Oid, Repository, Signature};
use tracing::info;

pub const COMMITTER_NAME: &str = "GitHub Actions Bot";
pub const COMMITTER_EMAIL: &str = "actions@github.com";

/// Makes an updated stats file visible outside of the current checkout.
pub trait Publisher {
    fn publish(&self, changed_file: &Path, date: &str) -> impl Future<Output = anyhow::Result<()>>;
}

#[derive(Debug)]
pub struct GitPublisher {
    workspace: PathBuf,
}

impl GitPublisher {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

impl Publisher for GitPublisher {
    async fn publish(&self, changed_file: &Path, date: &str) -> anyhow::Result<()> {
        let Some(commit_id) = commit_file(&self.workspace, changed_file, date)? else {
            info!("No changes to commit for {}", changed_file.display());
            return Ok(());
        };
        info!("Created commit {commit_id}");

        push(&self.workspace).await?;
        info!("Successfully committed and pushed changes");
        Ok(())
    }
}

/// Stages `changed_file` and commits it on top of `HEAD`.
///
/// Returns `None` when the file is already committed in its current state.
pub fn commit_file(workspace: &Path, changed_file: &Path, date: &str) -> Result<Option<Oid>, anyhow::Error> {
    let repo = Repository::open(workspace)
        .with_context(|| format!("failed to open repository {}", workspace.display()))?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| anyhow!("repository {} has no working directory", workspace.display()))?;
    let relative_path = path_in_workdir(workdir, changed_file)?;

    let mut index = repo.index().context("cannot open Git index")?;
    index
        .add_path(&relative_path)
        .with_context(|| format!("cannot stage {}", relative_path.display()))?;
    index.write().context("cannot write Git index")?;
    let tree_id = index.write_tree().context("cannot write tree from Git index")?;
    let tree = repo
        .find_tree(tree_id)
        .with_context(|| format!("cannot find Git tree {tree_id}"))?;

    let parent = head_commit(&repo)?;
    if parent.as_ref().is_some_and(|commit| commit.tree_id() == tree_id) {
        return Ok(None);
    }

    let signature = Signature::now(COMMITTER_NAME, COMMITTER_EMAIL).context("cannot create commit signature")?;
    let parents: Vec<&Commit> = parent.iter().collect();
    let commit_id = repo
        .commit(
            Some("HEAD"),
            &signature,
            &signature,
            &format!("Update download stats for {date}"),
            &tree,
            &parents,
        )
        .context("cannot create commit")?;

    Ok(Some(commit_id))
}

fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>, anyhow::Error> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit().context("HEAD does not point to a commit")?)),
        // a freshly initialized repository has no commits yet
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e).context("cannot resolve HEAD"),
    }
}

fn path_in_workdir(workdir: &Path, file: &Path) -> Result<PathBuf, anyhow::Error> {
    let workdir = workdir
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", workdir.display()))?;
    let file = file
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", file.display()))?;
    Ok(file
        .strip_prefix(&workdir)
        .with_context(|| format!("{} is outside of repository {}", file.display(), workdir.display()))?
        .to_path_buf())
}

/// Pushes the current branch with the git CLI, which picks up the credentials set up by the CI checkout.
pub async fn push(workspace: &Path) -> Result<(), anyhow::Error> {
    let output = tokio::process::Command::new("git")
        .arg("push")
        .current_dir(workspace)
        .output()
        .await
        .context("cannot run git push")?;
    if !output.status.success() {
        bail!(
            "git push failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use git2::Repository;

    use super::*;

    fn init_repo() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let csv_file = dir.path().join("stats").join("docker_downloads.csv");
        fs::create_dir_all(csv_file.parent().unwrap()).unwrap();
        (dir, csv_file)
    }

    #[test]
    fn commits_stats_file_on_head() {
        let (dir, csv_file) = init_repo();
        fs::write(&csv_file, "Date,Repository,Downloads\n2024-05-01,redis/redis,1\n").unwrap();

        let first = commit_file(dir.path(), &csv_file, "2024-05-01").unwrap().unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id(), first);
        assert_eq!(head.message(), Some("Update download stats for 2024-05-01"));
        assert_eq!(head.author().name(), Some(COMMITTER_NAME));
        assert_eq!(head.author().email(), Some(COMMITTER_EMAIL));
        assert_eq!(head.parent_count(), 0);
        assert!(head
            .tree()
            .unwrap()
            .get_path(Path::new("stats/docker_downloads.csv"))
            .is_ok());

        fs::write(&csv_file, "Date,Repository,Downloads\n2024-05-01,redis/redis,1\n2024-05-02,redis/redis,2\n").unwrap();
        let second = commit_file(dir.path(), &csv_file, "2024-05-02").unwrap().unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id(), second);
        assert_eq!(head.parent_id(0).unwrap(), first);
    }

    #[test]
    fn skips_unchanged_file() {
        let (dir, csv_file) = init_repo();
        fs::write(&csv_file, "Date,Repository,Downloads\n").unwrap();

        assert!(commit_file(dir.path(), &csv_file, "2024-05-01").unwrap().is_some());
        assert!(commit_file(dir.path(), &csv_file, "2024-05-01").unwrap().is_none());
    }

    #[test]
    fn rejects_file_outside_repository() {
        let (dir, _) = init_repo();
        let elsewhere = tempfile::NamedTempFile::new().unwrap();

        let err = commit_file(dir.path(), elsewhere.path(), "2024-05-01").unwrap_err();
        assert!(err.to_string().contains("is outside of repository"), "{err}");
    }

    #[test]
    fn rejects_missing_repository() {
        let dir = tempfile::tempdir().unwrap();
        let err = commit_file(dir.path(), &dir.path().join("x.csv"), "2024-05-01").unwrap_err();
        assert!(err.to_string().starts_with("failed to open repository"), "{err}");
    }

    #[tokio::test]
    async fn push_without_remote_fails() {
        let (dir, _) = init_repo();
        assert!(push(dir.path()).await.is_err());
    }
}
