//! Job discovery.
//!
//! Every directory below the root (not the root itself) that directly holds a file matching the test-file pattern
//! becomes one job, named after the directory. Directories are visited in file-name order, so the job list is
//! deterministic. Hidden directories (`.terraform`, `.git`, ...) are not descended into.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use walkdir::{DirEntry, WalkDir};

use super::error::DiscoveryError;
use super::job::Job;
use super::sink::OutputSinks;

/// Walk `root` and build one [`Job`] per qualifying directory.
///
/// ## Errors
/// Any unreadable path aborts discovery; an empty result is not an error.
pub fn discover(
    root: &Path,
    pattern: &str,
    env: &[String],
    sinks: &OutputSinks,
) -> Result<Vec<Arc<Job>>, DiscoveryError> {
    let root = std::path::absolute(root).map_err(|source| DiscoveryError::Resolve {
        path: root.to_path_buf(),
        source,
    })?;
    let matcher = Pattern::new(pattern).map_err(|source| DiscoveryError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut jobs = Vec::new();
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: source.path().map_or_else(|| root.clone(), Path::to_path_buf),
            source,
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let Some(test_file) = first_match(entry.path(), &matcher)? else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        tracing::debug!(job = %name, test_file = %test_file.display(), "discovered job");
        jobs.push(Arc::new(Job::new(
            name,
            &root,
            entry.path(),
            test_file,
            env.to_vec(),
            sinks.clone(),
        )));
    }

    Ok(jobs)
}

/// The lexically first file directly inside `dir` whose name matches `matcher`.
fn first_match(dir: &Path, matcher: &Pattern) -> Result<Option<PathBuf>, DiscoveryError> {
    let list_err = |source| DiscoveryError::List {
        path: dir.to_path_buf(),
        source,
    };

    let mut matches = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if matcher.matches(name) && entry.path().is_file() {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|s| s.starts_with('.'))
}
