//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;

use power_profile_data::{Error, SourceLine, SymbolBackend};

/// An in-memory symbolizer which counts how often it is asked.
#[derive(Debug, Default)]
pub struct FakeBackend {
    /// Source lines by looked up (normalized) address. Unlisted addresses are unknown.
    pub lines: HashMap<u64, SourceLine>,
    /// Addresses for which the symbolizer fails.
    pub failing: HashSet<u64>,
    /// Mangled to demangled names. Unlisted names demangle to themselves.
    pub demangled: HashMap<String, String>,
    /// File names of static executables.
    pub static_binaries: HashSet<String>,
    pub address_calls: usize,
    pub demangle_calls: usize,
}

impl FakeBackend {
    pub fn with_line(mut self, address: u64, function: &str, file: &str, line: u32) -> Self {
        self.lines.insert(
            address,
            SourceLine {
                function: Some(function.to_string()),
                file: Some(file.to_string()),
                line: Some(line),
            },
        );
        self
    }

    pub fn with_demangled(mut self, mangled: &str, demangled: &str) -> Self {
        self.demangled
            .insert(mangled.to_string(), demangled.to_string());
        self
    }
}

impl SymbolBackend for FakeBackend {
    fn is_static_executable(&mut self, path: &Path) -> Result<bool, Error> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.static_binaries.contains(&name))
    }

    fn address_to_line(&mut self, path: &Path, address: u64) -> Result<SourceLine, Error> {
        self.address_calls += 1;
        if self.failing.contains(&address) {
            return Err(Error::Resolution {
                path: path.to_owned(),
                address,
                reason: "exited with status 1".to_string(),
            });
        }
        Ok(self.lines.get(&address).cloned().unwrap_or_default())
    }

    fn demangle(&mut self, name: &str) -> Result<String, Error> {
        self.demangle_calls += 1;
        Ok(self
            .demangled
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string()))
    }
}
