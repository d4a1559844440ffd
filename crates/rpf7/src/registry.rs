//! Archive registry: a scan of a root directory into a flat map from
//! normalized logical path to loaded archive, per `spec.md` §4.5 / §6.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::archive::{Archive, Entry};
use crate::error::{FindError, RegistryError};
use crate::keystream::KeystreamProvider;
use crate::pipeline;

const DEFAULT_IGNORED_DIRS: &[&str] = &["target", ".git", "node_modules"];

/// Options controlling a registry scan.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Directory names (besides dot-directories) skipped during the scan.
    pub ignored_dirs: Vec<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        RegistryOptions {
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    BinaryFile,
    ResourceFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub kind: EntryKind,
    pub path: String,
    pub on_disk_size: u64,
    pub uncompressed_size: u64,
    pub encrypted: bool,
}

impl From<&Entry> for EntryInfo {
    fn from(entry: &Entry) -> Self {
        match entry {
            Entry::Directory(d) => EntryInfo {
                kind: EntryKind::Directory,
                path: d.path.clone(),
                on_disk_size: 0,
                uncompressed_size: 0,
                encrypted: false,
            },
            Entry::BinaryFile(f) => EntryInfo {
                kind: EntryKind::BinaryFile,
                path: f.path.clone(),
                on_disk_size: f.on_disk_size,
                uncompressed_size: f.uncompressed_size,
                encrypted: f.is_encrypted(),
            },
            Entry::ResourceFile(f) => EntryInfo {
                kind: EntryKind::ResourceFile,
                path: f.path.clone(),
                on_disk_size: f.on_disk_size,
                uncompressed_size: f.uncompressed_size,
                encrypted: false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub archive_path: String,
    pub inner_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub is_directory: bool,
    pub children: Vec<TreeNode>,
}

/// A locator for an archive nested somewhere in a top-level archive's tree:
/// the top-level logical path plus a path of child indices to walk down
/// `Archive::children`.
#[derive(Debug, Clone)]
struct ArchiveLocator {
    top_level: String,
    nest_path: Vec<usize>,
}

struct RegistryState {
    top_level: HashMap<String, Archive>,
    locators: HashMap<String, ArchiveLocator>,
}

/// Process-level mapping from normalized logical path to loaded archive.
///
/// Constructed via [`Registry::new`] and populated with [`Registry::init`].
/// Every other method requires `init` to have run first, returning
/// [`RegistryError::NotInitialized`] otherwise. Once initialized the
/// registry is read-only and safe to query concurrently.
pub struct Registry {
    state: Option<RegistryState>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry { state: None }
    }

    /// Scans `root` for `*.rpf` files, opens each as a top-level archive,
    /// and registers every archive nested inside them. A per-archive
    /// failure is logged and does not abort the scan.
    pub fn init(
        &mut self,
        root: impl AsRef<Path>,
        keystream: &dyn KeystreamProvider,
        options: &RegistryOptions,
    ) -> Result<(), RegistryError> {
        let root = root.as_ref();
        let mut top_level = HashMap::new();
        let mut locators = HashMap::new();

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !is_ignored(e.file_name().to_str().unwrap_or(""), options))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(ext_ok) = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.to_lowercase().ends_with(".rpf"))
            else {
                continue;
            };
            if !ext_ok {
                continue;
            }

            let logical_path = match normalize_logical_path(root, path) {
                Some(p) => p,
                None => continue,
            };

            let size = match std::fs::metadata(path) {
                Ok(meta) => meta.len(),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to stat archive, skipping");
                    continue;
                }
            };

            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

            match Archive::open(path, 0, file_name, size, keystream) {
                Ok(archive) => {
                    register_locators(&logical_path, &archive, &mut locators);
                    top_level.insert(logical_path, archive);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to open archive, skipping");
                }
            }
        }

        self.state = Some(RegistryState { top_level, locators });
        Ok(())
    }

    fn state(&self) -> Result<&RegistryState, RegistryError> {
        self.state.as_ref().ok_or(RegistryError::NotInitialized)
    }

    fn resolve_archive(&self, archive_path: &str) -> Result<&Archive, RegistryError> {
        let state = self.state()?;
        let locator = state
            .locators
            .get(archive_path)
            .ok_or_else(|| RegistryError::ArchiveNotFound(archive_path.to_string()))?;
        let mut current = state
            .top_level
            .get(&locator.top_level)
            .ok_or_else(|| RegistryError::ArchiveNotFound(archive_path.to_string()))?;
        for &child_index in &locator.nest_path {
            current = &current
                .children
                .get(child_index)
                .ok_or_else(|| RegistryError::ArchiveNotFound(archive_path.to_string()))?
                .archive;
        }
        Ok(current)
    }

    /// Sorted list of every registered logical archive path, top-level and
    /// nested.
    pub fn list_archives(&self) -> Result<Vec<String>, RegistryError> {
        let state = self.state()?;
        let mut paths: Vec<String> = state.locators.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }

    pub fn find_entry(
        &self,
        archive_path: &str,
        inner_path: &str,
    ) -> Result<Option<&Entry>, RegistryError> {
        let archive = self.resolve_archive(archive_path)?;
        Ok(archive.find(inner_path))
    }

    pub fn list_directory(
        &self,
        archive_path: &str,
        inner_path: &str,
    ) -> Result<DirectoryListing, RegistryError> {
        let archive = self.resolve_archive(archive_path)?;
        let entry = archive.find(inner_path).ok_or(FindError::NotFound)?;
        let Entry::Directory(dir) = entry else {
            return Err(FindError::NotADirectory.into());
        };

        let start = dir.entries_index as usize;
        let end = (start + dir.entries_count as usize).min(archive.entries.len());

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for idx in start..end {
            match &archive.entries[idx] {
                Entry::Directory(d) => dirs.push(d.name.clone()),
                other => files.push(other.name().to_string()),
            }
        }
        dirs.sort();
        files.sort();

        Ok(DirectoryListing { dirs, files })
    }

    pub fn read_file(
        &self,
        archive_path: &str,
        inner_path: &str,
        keystream: &dyn KeystreamProvider,
    ) -> Result<Vec<u8>, RegistryError> {
        let archive = self.resolve_archive(archive_path)?;
        let entry = archive.find(inner_path).ok_or(FindError::NotFound)?;
        pipeline::read_entry(archive, entry, keystream).map_err(RegistryError::from)
    }

    pub fn file_info(
        &self,
        archive_path: &str,
        inner_path: &str,
    ) -> Result<EntryInfo, RegistryError> {
        let archive = self.resolve_archive(archive_path)?;
        let entry = archive.find(inner_path).ok_or(FindError::NotFound)?;
        Ok(EntryInfo::from(entry))
    }

    /// Matches `pattern` against every entry name across every registered
    /// archive. `*` in `pattern` triggers glob matching (anchored at both
    /// ends, `*` -> `.*`); otherwise matching is a case-insensitive
    /// substring search.
    pub fn search(&self, pattern: &str) -> Result<Vec<SearchHit>, RegistryError> {
        let state = self.state()?;
        let matcher = PatternMatcher::new(pattern)?;

        let mut hits = Vec::new();
        for archive_path in state.locators.keys() {
            let archive = self.resolve_archive(archive_path)?;
            for entry in &archive.entries {
                if matcher.is_match(entry.name()) {
                    hits.push(SearchHit {
                        archive_path: archive_path.clone(),
                        inner_path: entry.path().to_string(),
                    });
                }
            }
        }
        hits.sort_by(|a, b| (&a.archive_path, &a.inner_path).cmp(&(&b.archive_path, &b.inner_path)));
        Ok(hits)
    }

    pub fn directory_tree(
        &self,
        archive_path: &str,
        inner_path: &str,
        max_depth: usize,
    ) -> Result<TreeNode, RegistryError> {
        let archive = self.resolve_archive(archive_path)?;
        let entry = archive.find(inner_path).ok_or(FindError::NotFound)?;
        Ok(build_tree_node(archive, entry, max_depth))
    }
}

fn build_tree_node(archive: &Archive, entry: &Entry, remaining_depth: usize) -> TreeNode {
    let is_directory = entry.is_directory();
    let mut children = Vec::new();

    if let (Entry::Directory(dir), true) = (entry, remaining_depth > 0) {
        let start = dir.entries_index as usize;
        let end = (start + dir.entries_count as usize).min(archive.entries.len());
        for idx in start..end {
            children.push(build_tree_node(archive, &archive.entries[idx], remaining_depth - 1));
        }
    }

    TreeNode {
        name: entry.name().to_string(),
        is_directory,
        children,
    }
}

enum PatternMatcher {
    Glob(Regex),
    Substring(String),
}

impl PatternMatcher {
    fn new(pattern: &str) -> Result<Self, RegistryError> {
        if pattern.contains('*') {
            let mut escaped = regex::escape(pattern);
            escaped = escaped.replace(r"\*", ".*");
            let anchored = format!("(?i)^{escaped}$");
            let regex = Regex::new(&anchored)
                .map_err(|e| RegistryError::InvalidPattern(e.to_string()))?;
            Ok(PatternMatcher::Glob(regex))
        } else {
            Ok(PatternMatcher::Substring(pattern.to_lowercase()))
        }
    }

    fn is_match(&self, name: &str) -> bool {
        match self {
            PatternMatcher::Glob(re) => re.is_match(name),
            PatternMatcher::Substring(needle) => name.to_lowercase().contains(needle.as_str()),
        }
    }
}

fn is_ignored(name: &str, options: &RegistryOptions) -> bool {
    if name.starts_with('.') && name != "." && name != ".." {
        return true;
    }
    options.ignored_dirs.iter().any(|ignored| ignored == name)
}

fn normalize_logical_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let normalized = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Some(normalized)
}

fn register_locators(
    logical_path: &str,
    archive: &Archive,
    locators: &mut HashMap<String, ArchiveLocator>,
) {
    locators.insert(
        logical_path.to_string(),
        ArchiveLocator {
            top_level: logical_path.to_string(),
            nest_path: Vec::new(),
        },
    );
    register_nested_locators(logical_path, logical_path, archive, &[], locators);
}

fn register_nested_locators(
    top_level: &str,
    parent_logical_path: &str,
    archive: &Archive,
    nest_path_prefix: &[usize],
    locators: &mut HashMap<String, ArchiveLocator>,
) {
    for (child_index, nested) in archive.children.iter().enumerate() {
        let file_name = entry_name_at(archive, nested.entry_index);
        let child_logical_path = format!("{parent_logical_path}/{file_name}");
        let mut nest_path = nest_path_prefix.to_vec();
        nest_path.push(child_index);

        locators.insert(
            child_logical_path.clone(),
            ArchiveLocator {
                top_level: top_level.to_string(),
                nest_path: nest_path.clone(),
            },
        );

        register_nested_locators(
            top_level,
            &child_logical_path,
            &nested.archive,
            &nest_path,
            locators,
        );
    }
}

fn entry_name_at(archive: &Archive, entry_index: usize) -> String {
    archive
        .entries
        .get(entry_index)
        .map(|e| e.name().to_string())
        .unwrap_or_default()
}
