use std::collections::HashMap;

use crate::error::Error;

/// Label for addresses inside a known module whose symbol could not be resolved.
pub const LABEL_UNKNOWN: &str = "_unknown";
/// Label for addresses which are not inside any known module.
pub const LABEL_FOREIGN: &str = "_foreign";
/// Label of the pseudo-module covering the kernel symbol table.
pub const LABEL_KERNEL: &str = "_kernel";

/// Index of [`LABEL_UNKNOWN`] in every table.
pub const UNKNOWN_INDEX: u32 = 0;
/// Index of [`LABEL_FOREIGN`] in every table.
pub const FOREIGN_INDEX: u32 = 1;

/// A function as reported by the symbolizer, and its human readable form.
#[derive(Clone, PartialEq, Eq, Hash, ::prost_derive::Message)]
pub struct FunctionName {
    #[prost(string, tag = "1")]
    pub mangled: String,
    #[prost(string, tag = "2")]
    pub demangled: String,
}

impl FunctionName {
    pub fn new(mangled: impl Into<String>, demangled: impl Into<String>) -> Self {
        Self {
            mangled: mangled.into(),
            demangled: demangled.into(),
        }
    }

    fn sentinel(label: &str) -> Self {
        Self::new(label, label)
    }
}

/// The canonical identity of a program counter: indices into [`SymbolTables`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedLocation {
    pub binary: u32,
    pub function: u32,
    pub file: u32,
    pub line: u32,
}

impl ResolvedLocation {
    /// The location of every address outside of all known modules.
    pub const FOREIGN: Self = Self {
        binary: FOREIGN_INDEX,
        function: FOREIGN_INDEX,
        file: FOREIGN_INDEX,
        line: 0,
    };

    /// A location inside `binary` about which nothing else is known.
    pub fn unknown_in(binary: u32) -> Self {
        Self {
            binary,
            function: UNKNOWN_INDEX,
            file: UNKNOWN_INDEX,
            line: 0,
        }
    }
}

/// The de-duplicated strings referenced by resolved locations.
///
/// Each table starts with [`LABEL_UNKNOWN`] at [`UNKNOWN_INDEX`] and
/// [`LABEL_FOREIGN`] at [`FOREIGN_INDEX`]. Strings are only ever appended, so
/// an index stays valid for the lifetime of the tables.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTables {
    binaries: Vec<String>,
    functions: Vec<FunctionName>,
    files: Vec<String>,
    binary_index: HashMap<String, u32>,
    function_index: HashMap<String, u32>,
    file_index: HashMap<String, u32>,
}

impl Default for SymbolTables {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTables {
    pub fn new() -> Self {
        Self::from_parts(Vec::new(), Vec::new(), Vec::new())
    }

    /// Rebuild tables from their serialized form.
    ///
    /// Missing sentinel entries are filled in; if a string occurs more than once,
    /// lookups resolve to its first occurrence.
    pub fn from_parts(
        mut binaries: Vec<String>,
        mut functions: Vec<FunctionName>,
        mut files: Vec<String>,
    ) -> Self {
        for (index, label) in [LABEL_UNKNOWN, LABEL_FOREIGN].into_iter().enumerate() {
            if binaries.len() <= index {
                binaries.push(label.to_string());
            }
            if functions.len() <= index {
                functions.push(FunctionName::sentinel(label));
            }
            if files.len() <= index {
                files.push(label.to_string());
            }
        }

        let binary_index = index_of(binaries.iter().map(String::as_str));
        let function_index = index_of(functions.iter().map(|f| f.mangled.as_str()));
        let file_index = index_of(files.iter().map(String::as_str));
        Self {
            binaries,
            functions,
            files,
            binary_index,
            function_index,
            file_index,
        }
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<FunctionName>, Vec<String>) {
        (self.binaries, self.functions, self.files)
    }

    pub fn binaries(&self) -> &[String] {
        &self.binaries
    }

    pub fn functions(&self) -> &[FunctionName] {
        &self.functions
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn binary(&self, index: u32) -> Result<&str, Error> {
        self.binaries
            .get(index as usize)
            .map(String::as_str)
            .ok_or(Error::DanglingSymbolIndex {
                table: "binary",
                index,
            })
    }

    pub fn function(&self, index: u32) -> Result<&FunctionName, Error> {
        self.functions
            .get(index as usize)
            .ok_or(Error::DanglingSymbolIndex {
                table: "function",
                index,
            })
    }

    pub fn file(&self, index: u32) -> Result<&str, Error> {
        self.files
            .get(index as usize)
            .map(String::as_str)
            .ok_or(Error::DanglingSymbolIndex {
                table: "file",
                index,
            })
    }

    pub fn intern_binary(&mut self, name: &str) -> u32 {
        intern(&mut self.binaries, &mut self.binary_index, name, |s| {
            s.to_string()
        })
    }

    /// Functions are identified by their mangled name; the demangled name of
    /// the first occurrence is kept.
    pub fn intern_function(&mut self, mangled: &str, demangled: &str) -> u32 {
        intern(&mut self.functions, &mut self.function_index, mangled, |s| {
            FunctionName::new(s, demangled)
        })
    }

    pub fn intern_file(&mut self, name: &str) -> u32 {
        intern(&mut self.files, &mut self.file_index, name, |s| s.to_string())
    }
}

fn index_of<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, u32> {
    let mut index = HashMap::new();
    for (i, name) in names.enumerate() {
        index.entry(name.to_string()).or_insert(i as u32);
    }
    index
}

fn intern<T>(
    table: &mut Vec<T>,
    index: &mut HashMap<String, u32>,
    name: &str,
    make: impl FnOnce(&str) -> T,
) -> u32 {
    if let Some(&i) = index.get(name) {
        return i;
    }
    let i = table.len() as u32;
    table.push(make(name));
    index.insert(name.to_string(), i);
    i
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sentinels_come_first() {
        let tables = SymbolTables::new();
        assert_eq!(tables.binary(UNKNOWN_INDEX).unwrap(), LABEL_UNKNOWN);
        assert_eq!(tables.binary(FOREIGN_INDEX).unwrap(), LABEL_FOREIGN);
        assert_eq!(
            tables.function(FOREIGN_INDEX).unwrap().demangled,
            LABEL_FOREIGN
        );
        assert_eq!(tables.file(UNKNOWN_INDEX).unwrap(), LABEL_UNKNOWN);
        assert_eq!(tables.files().len(), 2);
    }

    #[test]
    fn interning_deduplicates() {
        let mut tables = SymbolTables::new();
        let a = tables.intern_function("_Z3foov", "foo()");
        let b = tables.intern_function("_Z3barv", "bar()");
        assert_eq!(tables.intern_function("_Z3foov", "ignored"), a);
        assert_eq!((a, b), (2, 3));
        assert_eq!(tables.function(a).unwrap().demangled, "foo()");
        assert_eq!(tables.intern_binary(LABEL_FOREIGN), FOREIGN_INDEX);
        assert_eq!(tables.binaries().len(), 2);
    }

    #[test]
    fn dangling_index() {
        let tables = SymbolTables::new();
        assert!(matches!(
            tables.binary(99),
            Err(Error::DanglingSymbolIndex {
                table: "binary",
                index: 99
            })
        ));
    }
}
