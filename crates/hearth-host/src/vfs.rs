//! Virtual file providers.
//!
//! The host resolves static content through the [`VirtualFiles`] contract.
//! When user configuration sets no provider, initialization builds one from
//! the physical web root plus any embedded-resource sources; multiple
//! sources compose into a [`MultiVirtualFiles`] chain where the first
//! provider claiming a path wins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

/// A file resolved through a provider.
#[derive(Debug, Clone)]
pub struct VirtualFile {
    /// Provider-relative path, `/`-separated.
    pub path: String,
    /// File contents.
    pub contents: Bytes,
}

/// Read-only file source contract.
pub trait VirtualFiles: Send + Sync {
    /// Resolve a file by provider-relative path.
    fn get_file(&self, path: &str) -> Option<VirtualFile>;

    /// List immediate entries of a directory, or `None` if it does not
    /// exist.
    fn get_directory(&self, path: &str) -> Option<Vec<String>>;

    /// The provider's root, for diagnostics.
    fn root_dir(&self) -> &str;

    /// Separator used in provider-relative paths.
    fn path_separator(&self) -> char {
        '/'
    }
}

/// Provider over a physical directory tree.
#[derive(Debug)]
pub struct FileSystemVirtualFiles {
    root: PathBuf,
    root_display: String,
}

impl FileSystemVirtualFiles {
    /// A provider rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root_display = root.display().to_string();
        Self { root, root_display }
    }

    fn physical(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        // Reject traversal outside the root.
        if relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl VirtualFiles for FileSystemVirtualFiles {
    fn get_file(&self, path: &str) -> Option<VirtualFile> {
        let physical = self.physical(path)?;
        let contents = std::fs::read(&physical).ok()?;
        Some(VirtualFile {
            path: path.trim_start_matches('/').to_string(),
            contents: Bytes::from(contents),
        })
    }

    fn get_directory(&self, path: &str) -> Option<Vec<String>> {
        let physical = self.physical(path)?;
        let entries = std::fs::read_dir(&physical).ok()?;
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        Some(names)
    }

    fn root_dir(&self) -> &str {
        &self.root_display
    }
}

/// In-memory provider standing in for embedded resources; doubles as the
/// test provider.
#[derive(Default)]
pub struct MemoryVirtualFiles {
    files: DashMap<String, Bytes>,
}

impl std::fmt::Debug for MemoryVirtualFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVirtualFiles")
            .field("files", &self.files.len())
            .finish()
    }
}

impl MemoryVirtualFiles {
    /// An empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any previous contents.
    pub fn add(&self, path: impl Into<String>, contents: impl Into<Bytes>) {
        let path = path.into();
        self.files
            .insert(path.trim_start_matches('/').to_string(), contents.into());
    }
}

impl VirtualFiles for MemoryVirtualFiles {
    fn get_file(&self, path: &str) -> Option<VirtualFile> {
        let key = path.trim_start_matches('/');
        self.files.get(key).map(|entry| VirtualFile {
            path: key.to_string(),
            contents: entry.value().clone(),
        })
    }

    fn get_directory(&self, path: &str) -> Option<Vec<String>> {
        let prefix = {
            let trimmed = path.trim_start_matches('/').trim_end_matches('/');
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("{trimmed}/")
            }
        };

        let mut names: Vec<String> = self
            .files
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().strip_prefix(&prefix)?;
                Some(rest.split('/').next().unwrap_or(rest).to_string())
            })
            .collect();
        names.sort();
        names.dedup();

        if names.is_empty() { None } else { Some(names) }
    }

    fn root_dir(&self) -> &str {
        "memory:"
    }
}

/// First-match-wins composition of providers.
pub struct MultiVirtualFiles {
    providers: Vec<Arc<dyn VirtualFiles>>,
}

impl std::fmt::Debug for MultiVirtualFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiVirtualFiles")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl MultiVirtualFiles {
    /// Compose providers; earlier providers shadow later ones.
    pub fn new(providers: Vec<Arc<dyn VirtualFiles>>) -> Self {
        Self { providers }
    }
}

impl VirtualFiles for MultiVirtualFiles {
    fn get_file(&self, path: &str) -> Option<VirtualFile> {
        self.providers.iter().find_map(|p| p.get_file(path))
    }

    fn get_directory(&self, path: &str) -> Option<Vec<String>> {
        self.providers.iter().find_map(|p| p.get_directory(path))
    }

    fn root_dir(&self) -> &str {
        self.providers
            .first()
            .map_or("multi:", |p| p.root_dir())
    }
}
