// Recursive discovery of travel time files below a search root

use crate::error::PipelineError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// A case-sensitive substring match against a file or folder name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern(String);

impl NamePattern {
    pub fn new(fragment: impl Into<String>) -> Self {
        NamePattern(fragment.into())
    }

    pub fn matches(&self, name: &str) -> bool {
        name.contains(&self.0)
    }

    pub fn fragment(&self) -> &str {
        &self.0
    }
}

/// Which folders to descend into and which files to pick up inside them.
#[derive(Debug, Clone)]
pub struct FileQuery {
    pub folder: NamePattern,
    pub files: Vec<NamePattern>,
}

impl FileQuery {
    pub fn new(folder: &str, files: &[&str]) -> Self {
        FileQuery {
            folder: NamePattern::new(folder),
            files: files.iter().map(|f| NamePattern::new(*f)).collect(),
        }
    }

    /// Build a query from request text. `files` is a comma-separated list of
    /// filename fragments; blank fragments are dropped.
    pub fn parse(folder: &str, files: &str) -> Self {
        FileQuery {
            folder: NamePattern::new(folder.trim()),
            files: files
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(NamePattern::new)
                .collect(),
        }
    }
}

/// Outcome of a search. Finding nothing is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    NoMatch,
    Matches(Vec<PathBuf>),
}

impl Located {
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Located::NoMatch => &[],
            Located::Matches(paths) => paths,
        }
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        match self {
            Located::NoMatch => Vec::new(),
            Located::Matches(paths) => paths,
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, Located::NoMatch)
    }
}

/// Find files matching `query` below `root`.
#[tracing::instrument(skip_all, fields(root = %root.display(), folder = query.folder.fragment()))]
pub fn locate(root: &Path, query: &FileQuery) -> Result<Located, PipelineError> {
    let file_preds: Vec<_> = query
        .files
        .iter()
        .map(|p| move |name: &str| p.matches(name))
        .collect();
    let located = locate_by(root, |name| query.folder.matches(name), &file_preds)?;

    match &located {
        Located::NoMatch => warn!("No files matched the search criteria"),
        Located::Matches(paths) => info!(files = paths.len(), "Travel time files located"),
    }
    Ok(located)
}

/// Walk `root` for folders whose name satisfies `folder_pred`, then walk each
/// of those for regular files whose name satisfies any of `file_preds`.
///
/// Both walks are sorted by file name, so the result depends only on the tree
/// contents. A file is reported once, at its first position, even if it sits
/// under several matching folders or satisfies several predicates.
pub fn locate_by<F, P>(root: &Path, folder_pred: F, file_preds: &[P]) -> Result<Located, PipelineError>
where
    F: Fn(&str) -> bool,
    P: Fn(&str) -> bool,
{
    let search_err = |source| PipelineError::Search {
        root: root.to_path_buf(),
        source,
    };

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut matched = Vec::new();

    for folder in sorted_walk(root) {
        let folder = folder.map_err(search_err)?;
        if !folder.file_type().is_dir() || !folder_pred(entry_name(&folder).as_str()) {
            continue;
        }
        debug!(folder = %folder.path().display(), "Searching matching folder");

        for file in sorted_walk(folder.path()) {
            let file = file.map_err(search_err)?;
            if !file.file_type().is_file() {
                continue;
            }
            let name = entry_name(&file);
            if file_preds.iter().any(|pred| pred(name.as_str())) && seen.insert(file.path().to_path_buf()) {
                matched.push(file.into_path());
            }
        }
    }

    if matched.is_empty() {
        Ok(Located::NoMatch)
    } else {
        Ok(Located::Matches(matched))
    }
}

fn sorted_walk(dir: &Path) -> walkdir::IntoIter {
    WalkDir::new(dir).min_depth(1).sort_by_file_name().into_iter()
}

fn entry_name(entry: &DirEntry) -> String {
    entry.file_name().to_string_lossy().into_owned()
}
