use crate::domain::model::{ModuleState, Requirement};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Local override table, keyed by `Addr` or `Addr/Path`.
pub struct ReplacementResolver<'a> {
    table: &'a BTreeMap<String, String>,
    root: &'a Path,
}

impl<'a> ReplacementResolver<'a> {
    pub fn new(table: &'a BTreeMap<String, String>, root: &'a Path) -> Self {
        Self { table, root }
    }

    /// Local source for `addr` + `path`, if overridden.
    ///
    /// An exact `Addr/Path` entry wins; an `Addr` entry covers every subpath beneath it.
    pub fn lookup(&self, addr: &str, path: &str) -> Option<PathBuf> {
        if !path.is_empty() {
            if let Some(location) = self.table.get(&format!("{}{}", addr, path)) {
                return Some(self.absolute(location));
            }
        }
        let base = self.absolute(self.table.get(addr)?);
        let sub = path.trim_start_matches('/');
        Some(if sub.is_empty() { base } else { base.join(sub) })
    }

    /// Marks `requirement` as replaced when the table covers it.
    /// `Downloaded` of a replaced requirement tracks the local location only.
    pub fn annotate(&self, requirement: &mut Requirement) -> bool {
        match self.lookup(&requirement.addr, &requirement.path) {
            Some(location) => {
                requirement.replaced = true;
                requirement.downloaded = location.exists();
                requirement.location = location;
                requirement.transition(ModuleState::Replaced);
                true
            }
            None => {
                requirement.replaced = false;
                if requirement.state == ModuleState::Replaced {
                    requirement.state = ModuleState::Declared;
                }
                false
            }
        }
    }

    fn absolute(&self, location: &str) -> PathBuf {
        let location = Path::new(location);
        if location.is_absolute() {
            location.to_path_buf()
        } else {
            self.root.join(location)
        }
    }
}
