//! Test file discovery
//!
//! Resolves a `.json` test file, a `.master` manifest or a directory into
//! the ordered list of test files to run. Manifests may include other
//! manifests; paths inside a manifest are relative to its own directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};
use crate::procedure::file::string_or_number;

pub const TEST_EXTENSION: &str = "json";
pub const MANIFEST_EXTENSION: &str = "master";

/// Reported when a manifest carries no version
pub const UNKNOWN_VERSION: &str = "Unknown";

/// A test file to run and the version of the manifest that listed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub path: PathBuf,
    pub master_version: String,
}

/// On-disk manifest format
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: String,
    /// Entries to run, in order
    #[serde(default)]
    pub json_files: Vec<String>,
    /// Every manifest belonging to the suite, for audits
    #[serde(default)]
    pub full_list: Vec<String>,
    /// Entries deliberately left out of the run
    #[serde(default)]
    pub not_processed: Vec<serde_json::Value>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        serde_json::from_str(&content).map_err(|e| Error::test_file(path, e))
    }

    pub fn version_or_unknown(&self) -> String {
        if self.version.is_empty() {
            UNKNOWN_VERSION.to_string()
        } else {
            self.version.clone()
        }
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e == ext)
}

fn entry_has_extension(entry: &str, ext: &str) -> bool {
    has_extension(Path::new(entry), ext)
}

fn identity_of(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Version of a manifest, or `Unknown` when it cannot be read
pub fn read_master_version(path: &Path) -> String {
    match Manifest::load(path) {
        Ok(manifest) => manifest.version_or_unknown(),
        Err(e) => {
            tracing::error!("Error reading master file version: {}", e);
            UNKNOWN_VERSION.to_string()
        }
    }
}

/// Expand a manifest into its test files, depth first
///
/// A manifest already on the current resolution path is skipped. Entries
/// with other extensions are ignored.
pub fn expand_manifest(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = Vec::new();
    expand_into(path, &mut stack, &mut files);
    files
}

fn expand_into(path: &Path, stack: &mut Vec<PathBuf>, files: &mut Vec<PathBuf>) {
    let id = identity_of(path);
    if stack.contains(&id) {
        tracing::warn!("Skipping {}: already being expanded", path.display());
        return;
    }

    let manifest = match Manifest::load(path) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("Error processing {}: {}", path.display(), e);
            return;
        }
    };

    stack.push(id);
    let base = path.parent().unwrap_or(Path::new(""));
    for entry in &manifest.json_files {
        let full = base.join(entry);
        if entry_has_extension(entry, TEST_EXTENSION) {
            files.push(full);
        } else if entry_has_extension(entry, MANIFEST_EXTENSION) {
            expand_into(&full, stack, files);
        } else {
            tracing::debug!("Ignoring manifest entry {}", entry);
        }
    }
    stack.pop();
}

/// Directory entries sorted by name
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)
        .map_err(|e| Error::file_read(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

/// Resolve `input` into the test files to run
pub fn discover(input: &Path) -> Result<Vec<Discovered>> {
    let mut found = Vec::new();

    if input.is_dir() {
        for path in sorted_entries(input)? {
            if has_extension(&path, TEST_EXTENSION) {
                found.push(Discovered {
                    path,
                    master_version: UNKNOWN_VERSION.to_string(),
                });
            } else if has_extension(&path, MANIFEST_EXTENSION) {
                let version = read_master_version(&path);
                found.extend(expand_manifest(&path).into_iter().map(|p| Discovered {
                    path: p,
                    master_version: version.clone(),
                }));
            }
        }
    } else if has_extension(input, MANIFEST_EXTENSION) {
        let version = read_master_version(input);
        found.extend(expand_manifest(input).into_iter().map(|p| Discovered {
            path: p,
            master_version: version.clone(),
        }));
    } else if has_extension(input, TEST_EXTENSION) {
        found.push(Discovered {
            path: input.to_path_buf(),
            master_version: UNKNOWN_VERSION.to_string(),
        });
    } else {
        tracing::error!(
            "{} is not a .json file, a .master file or a directory",
            input.display()
        );
    }

    if found.is_empty() {
        return Err(Error::NoTestFiles);
    }
    tracing::debug!("Discovered {} test files", found.len());
    Ok(found)
}

/// Every manifest reachable from `input` through `full_list`
pub fn master_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut masters = Vec::new();
    if input.is_dir() {
        for path in sorted_entries(input)? {
            collect_masters(&path, &mut masters);
        }
    } else {
        collect_masters(input, &mut masters);
    }
    Ok(masters)
}

fn collect_masters(path: &Path, masters: &mut Vec<PathBuf>) {
    if !has_extension(path, MANIFEST_EXTENSION) {
        return;
    }
    let id = identity_of(path);
    if masters.iter().any(|m| identity_of(m) == id) {
        return;
    }
    masters.push(path.to_path_buf());

    match Manifest::load(path) {
        Ok(manifest) => {
            let base = path.parent().unwrap_or(Path::new(""));
            for entry in &manifest.full_list {
                if entry_has_extension(entry, MANIFEST_EXTENSION) {
                    collect_masters(&base.join(entry), masters);
                }
            }
        }
        Err(e) => tracing::error!("Error processing master file {}: {}", path.display(), e),
    }
}

/// Aggregated `not_processed` entries of the given manifests
pub fn not_processed(masters: &[PathBuf]) -> Vec<String> {
    let mut entries = Vec::new();
    for master in masters {
        match Manifest::load(master) {
            Ok(manifest) => entries.extend(manifest.not_processed.iter().map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })),
            Err(e) => tracing::error!("{}", e),
        }
    }
    entries
}
