use error_set::error_set;
use std::process::{Command, Output};
use tracing::{debug, warn};

pub mod diff;
pub mod patch;
pub mod refs;
pub mod selection;
pub mod status;

pub use diff::{Diff, ParseError, format_diff};
pub use patch::PatchError;
pub use refs::{FileLineRefs, RefError};
pub use selection::{DiffSelection, DiffSelectionType};
pub use status::{FileChange, FileStatus, WorkingFileChange};

error_set! {
    /// Top-level error for git-hunks operations
    GitHunksError := {
        #[display("No changes found in {file}")]
        NoChanges { file: String },
        #[display("{file} has unresolved conflicts")]
        Conflicted { file: String },
        ParseError(ParseError),
        PatchError(PatchError),
        RefError(RefError),
    } || GitCommandError

    /// Errors from git command execution
    GitCommandError := {
        #[display("Failed to run git {command}: {message}")]
        SpawnFailed { command: String, message: String },
        #[display("git {command} failed: {stderr}")]
        ExitError { command: String, stderr: String },
        #[display("Invalid UTF-8 in git {command} output: {message}")]
        InvalidUtf8 { command: String, message: String },
        #[display("Failed to spawn git apply: {message}")]
        ApplySpawnFailed { message: String },
        #[display("Failed to get stdin handle for git apply")]
        ApplyStdinFailed,
        #[display("Failed to write patch to git apply: {message}")]
        ApplyWriteFailed { message: String },
        #[display("Failed to wait for git apply: {message}")]
        ApplyWaitFailed { message: String },
        #[display("git apply failed: {stderr}")]
        ApplyExitError { stderr: String },
    }
}

/// Where `git apply` writes a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyTarget {
    Index,
    WorkingTree,
}

/// A git working tree, driven through the `git` executable
pub struct Repository<'a> {
    repo_path: &'a str,
}

impl<'a> Repository<'a> {
    /// Create a new Repository for the given path
    pub fn new(repo_path: &'a str) -> Self {
        Self { repo_path }
    }

    /// Status of a single path in the working tree
    pub fn status(&self, path: &str) -> Result<FileChange, GitHunksError> {
        self.changes(&[path])?
            .into_iter()
            .find(|change| change.path == path)
            .ok_or_else(|| GitHunksError::NoChanges {
                file: path.to_string(),
            })
    }

    /// Every changed file, or only those under `paths` when given
    pub fn changes(&self, paths: &[&str]) -> Result<Vec<FileChange>, GitCommandError> {
        let mut args = vec!["status", "--porcelain", "-z", "--untracked-files=all", "--"];
        args.extend(paths);

        let output = self.git(&args, &[0])?;
        Ok(status::parse_porcelain(&stdout_string("status", output)?))
    }

    /// Diff of a file between the index and the working tree.
    ///
    /// Untracked files are diffed against `/dev/null`. A line-ending
    /// conversion warning from git is attached to the result.
    pub fn diff(&self, file: &FileChange) -> Result<Diff, GitHunksError> {
        if file.status == FileStatus::Conflicted {
            return Err(GitHunksError::Conflicted {
                file: file.path.clone(),
            });
        }

        let mut args = vec!["diff", "--no-ext-diff", "--patch-with-raw", "-z", "--no-color"];
        // `--no-index` exits with 1 when the files differ
        let success_codes: &[i32] = if file.status == FileStatus::Untracked {
            args.extend(["--no-index", "--", "/dev/null", file.path.as_str()]);
            &[0, 1]
        } else {
            args.extend(["--", file.path.as_str()]);
            &[0]
        };

        let output = self.git(&args, success_codes)?;
        let line_endings_change =
            diff::parse_line_endings_warning(&String::from_utf8_lossy(&output.stderr));
        if let Some(change) = &line_endings_change {
            warn!(path = %file.path, %change, "line endings will change");
        }

        let raw = stdout_string("diff", output)?;
        Ok(diff::diff_from_raw_output(&raw)?.with_line_endings_change(line_endings_change))
    }

    /// Stage the selected lines of `diff` into the index
    pub fn stage_selection(
        &self,
        file: &FileChange,
        diff: &Diff,
        selection: &DiffSelection,
    ) -> Result<(), GitHunksError> {
        // The diff is taken against the index, which already holds the file
        // under its current path unless git does not track it yet
        let target = match file.status {
            FileStatus::Untracked => file.clone(),
            _ => FileChange::new(file.path.clone(), FileStatus::Modified),
        };

        let patch = patch::create_patch(&target, diff, selection)?;
        Ok(self.apply_patch(&patch, ApplyTarget::Index)?)
    }

    /// Revert the selected lines of `diff` in the working tree.
    ///
    /// A selection without any changes leaves the file untouched.
    pub fn discard_selection(
        &self,
        path: &str,
        diff: &Diff,
        selection: &DiffSelection,
    ) -> Result<(), GitHunksError> {
        match patch::format_patch_to_discard_changes(path, diff, selection) {
            Ok(patch) => Ok(self.apply_patch(&patch, ApplyTarget::WorkingTree)?),
            Err(PatchError::NoChanges) => {
                debug!(path, "nothing selected to discard");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stage specific lines from a file
    ///
    /// # Examples
    /// ```no_run
    /// # use git_hunks::Repository;
    /// let repo = Repository::new(".");
    /// repo.stage("flake.nix:137").unwrap();
    /// repo.stage("file.nix:10..15").unwrap();
    /// repo.stage("config.nix:-10,-11,12").unwrap();
    /// ```
    pub fn stage(&self, file_ref: &str) -> Result<(), GitHunksError> {
        let refs = refs::parse_file_refs(file_ref)?;
        let (file, diff, selection) = self.resolve(&refs)?;
        self.stage_selection(&file, &diff, &selection)
    }

    /// Discard specific lines of a file from the working tree
    ///
    /// # Examples
    /// ```no_run
    /// # use git_hunks::Repository;
    /// let repo = Repository::new(".");
    /// repo.discard("src/main.rs:-4,7..9").unwrap();
    /// ```
    pub fn discard(&self, file_ref: &str) -> Result<(), GitHunksError> {
        let refs = refs::parse_file_refs(file_ref)?;
        let (file, diff, selection) = self.resolve(&refs)?;
        self.discard_selection(&file.path, &diff, &selection)
    }

    /// Line-numbered diff for the given files, or every changed file if empty
    ///
    /// # Examples
    /// ```no_run
    /// # use git_hunks::Repository;
    /// let repo = Repository::new(".");
    /// let all = repo.format_diff(&[]).unwrap();
    /// let one = repo.format_diff(&["flake.nix".to_string()]).unwrap();
    /// ```
    pub fn format_diff(&self, files: &[String]) -> Result<String, GitHunksError> {
        let paths: Vec<&str> = files.iter().map(String::as_str).collect();
        let mut sections = Vec::new();

        for change in self.changes(&paths)? {
            if change.status == FileStatus::Conflicted {
                warn!(path = %change.path, "skipping conflicted file");
                continue;
            }
            let diff = self.diff(&change)?;
            if diff.is_binary || diff.hunks.iter().any(|hunk| hunk.has_changes()) {
                sections.push(diff::format_diff(&change.path, &diff));
            }
        }

        Ok(sections.join("\n"))
    }

    /// Look up the file, its diff and the referenced selection
    fn resolve(
        &self,
        refs: &FileLineRefs,
    ) -> Result<(FileChange, Diff, DiffSelection), GitHunksError> {
        let file = self.status(&refs.file)?;
        let diff = self.diff(&file)?;
        let selection = refs.to_selection(&diff)?;
        debug!(path = %file.path, status = %file.status, "resolved line references");
        Ok((file, diff, selection))
    }

    /// Run git in the repository, accepting the given exit codes
    fn git(&self, args: &[&str], success_codes: &[i32]) -> Result<Output, GitCommandError> {
        let command = args.first().copied().unwrap_or_default().to_string();
        debug!(repo = self.repo_path, ?args, "running git");

        let output = Command::new("git")
            .args(["-C", self.repo_path])
            .args(args)
            .output()
            .map_err(|e| GitCommandError::SpawnFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output
            .status
            .code()
            .is_some_and(|code| success_codes.contains(&code))
        {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitCommandError::ExitError {
                command,
                stderr: stderr.into_owned(),
            });
        }

        Ok(output)
    }

    /// Apply a patch to the index or the working tree
    fn apply_patch(&self, patch: &str, target: ApplyTarget) -> Result<(), GitCommandError> {
        use std::io::Write;

        let mut args = vec!["-C", self.repo_path, "apply"];
        if target == ApplyTarget::Index {
            args.push("--cached");
        }
        args.extend(["--unidiff-zero", "--whitespace=nowarn", "-"]);
        debug!(?target, bytes = patch.len(), "applying patch");

        let mut child = Command::new("git")
            .args(&args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| GitCommandError::ApplySpawnFailed {
                message: e.to_string(),
            })?;

        child
            .stdin
            .take()
            .ok_or(GitCommandError::ApplyStdinFailed)?
            .write_all(patch.as_bytes())
            .map_err(|e| GitCommandError::ApplyWriteFailed {
                message: e.to_string(),
            })?;

        let output = child
            .wait_with_output()
            .map_err(|e| GitCommandError::ApplyWaitFailed {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitCommandError::ApplyExitError {
                stderr: stderr.into_owned(),
            });
        }

        Ok(())
    }
}

fn stdout_string(command: &str, output: Output) -> Result<String, GitCommandError> {
    String::from_utf8(output.stdout).map_err(|e| GitCommandError::InvalidUtf8 {
        command: command.to_string(),
        message: e.to_string(),
    })
}
