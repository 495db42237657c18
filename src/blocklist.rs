//! Three-layered PERSON blocklist: a built-in set of common false positives,
//! a custom set shipped with this crate, and a user-supplied override that
//! is never modified by this crate.
//!
//! Mirrors the reference behavior of unioning `person_blocklist` +
//! `custom_blocklist` + `user_blocklist`, with a `reload()` hook so a caller
//! can pick up edits to the user file without restarting the process.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Words that look like proper names by capitalization alone but are common
/// enough that treating them as PERSON entities produces constant false
/// positives: days, months, common honorific-adjacent terms, and a handful
/// of frequently-capitalized common nouns seen in the reference corpus.
const BUILTIN_BLOCKLIST: &[&str] = &[
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
    "January", "February", "March", "April", "May", "June", "July", "August",
    "September", "October", "November", "December",
    "Dear", "Sincerely", "Regards", "Best", "Thanks", "Hello", "Hi",
    "Summary", "Objective", "Overview", "Introduction", "Conclusion", "Abstract",
    "Note", "Warning", "Important", "Attention", "Please",
];

/// Paths to the two optional on-disk blocklist layers. Either may be absent;
/// a missing path is treated as an empty layer rather than an error.
#[derive(Debug, Clone, Default)]
pub struct BlocklistPaths {
    pub custom_blocklist: Option<PathBuf>,
    pub user_blocklist: Option<PathBuf>,
}

fn load_lines(path: &Path) -> HashSet<String> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| l.to_string())
            .collect(),
        Err(_) => HashSet::new(),
    }
}

/// The merged, lazily-cached blocklist. Lookups are case-insensitive.
pub struct Blocklist {
    paths: BlocklistPaths,
    cache: RwLock<Option<HashSet<String>>>,
}

impl Blocklist {
    pub fn new(paths: BlocklistPaths) -> Self {
        Self {
            paths,
            cache: RwLock::new(None),
        }
    }

    /// A blocklist containing only the built-in layer, for callers that do
    /// not wire up on-disk custom/user lists.
    pub fn builtin_only() -> Self {
        Self::new(BlocklistPaths::default())
    }

    fn build(&self) -> HashSet<String> {
        let mut set: HashSet<String> = BUILTIN_BLOCKLIST.iter().map(|s| s.to_lowercase()).collect();
        if let Some(p) = &self.paths.custom_blocklist {
            set.extend(load_lines(p).into_iter().map(|s| s.to_lowercase()));
        }
        if let Some(p) = &self.paths.user_blocklist {
            set.extend(load_lines(p).into_iter().map(|s| s.to_lowercase()));
        }
        set
    }

    /// True if `name` (any capitalization) is in the merged blocklist.
    pub fn contains(&self, name: &str) -> bool {
        {
            let guard = self.cache.read().unwrap();
            if let Some(set) = guard.as_ref() {
                return set.contains(&name.to_lowercase());
            }
        }
        let built = self.build();
        let hit = built.contains(&name.to_lowercase());
        *self.cache.write().unwrap() = Some(built);
        hit
    }

    /// Drop the cache so the next `contains()` call re-reads the on-disk
    /// layers. The user layer is never written by this crate, only read.
    pub fn reload(&self) {
        *self.cache.write().unwrap() = None;
    }
}
