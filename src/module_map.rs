use std::path::PathBuf;

use crate::capture::ModuleRecord;
use crate::error::Error;
use crate::symbols::{SymbolBackend, LABEL_KERNEL};

/// A loaded binary's placement in the profiled process's address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRange {
    /// The module name as recorded by the sampler, usually a file name.
    pub label: String,
    /// Where the binary was found on this machine.
    pub path: PathBuf,
    pub start: u64,
    /// The first address after the module.
    pub end: u64,
    /// Static binaries are looked up by absolute address, all others by the
    /// offset from `start`.
    pub is_static: bool,
    /// Kernel addresses are looked up in the kernel symbol table.
    pub is_kernel: bool,
}

impl ModuleRange {
    pub fn contains(&self, pc: u64) -> bool {
        pc >= self.start && pc < self.end
    }

    /// The address to look up in the binary for a program counter inside this module.
    pub fn normalize(&self, pc: u64) -> u64 {
        if self.is_static {
            pc
        } else {
            pc - self.start
        }
    }

    fn overlaps(&self, other: &ModuleRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A kernel symbol table, as found in `/proc/kallsyms`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelSymbols {
    /// Sorted by address, highest first.
    symbols: Vec<(u64, String)>,
}

impl KernelSymbols {
    /// Parse `kallsyms` text: one `<hex address> <type> <name> [module]` entry per line.
    /// Lines with fewer than three fields are ignored.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut symbols = Vec::new();
        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let (Some(address), Some(_kind), Some(name)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let address = u64::from_str_radix(address, 16)
                .map_err(|_| Error::InvalidKallsymsLine(line.to_string()))?;
            symbols.push((address, name.to_string()));
        }
        Ok(Self::from_symbols(symbols))
    }

    pub fn from_symbols(mut symbols: Vec<(u64, String)>) -> Self {
        symbols.sort_by(|a, b| b.0.cmp(&a.0));
        Self { symbols }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The symbol with the highest address that is not above `address`.
    pub fn lookup(&self, address: u64) -> Option<&str> {
        let i = self.symbols.partition_point(|(a, _)| *a > address);
        self.symbols.get(i).map(|(_, name)| name.as_str())
    }

    /// The module range spanning all symbols, from the first to the last
    /// symbol address (inclusive).
    fn range(&self) -> Option<ModuleRange> {
        let (last, _) = self.symbols.first()?;
        let (first, _) = self.symbols.last()?;
        Some(ModuleRange {
            label: LABEL_KERNEL.to_string(),
            path: PathBuf::from(LABEL_KERNEL),
            start: *first,
            end: last.saturating_add(1),
            is_static: true,
            is_kernel: true,
        })
    }
}

/// The modules loaded into the profiled process during one capture.
///
/// The map is filled once before resolution starts, and the first matching
/// module wins when classifying a program counter.
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    modules: Vec<ModuleRange>,
    kernel_symbols: KernelSymbols,
}

impl ModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate every recorded module in `search_paths` and ask `backend` whether it
    /// is a static executable.
    ///
    /// A candidate file which the backend cannot inspect is skipped. A module
    /// for which no usable candidate exists fails with [`Error::BinaryNotFound`].
    pub fn load<B: SymbolBackend>(
        records: &[ModuleRecord],
        search_paths: &[PathBuf],
        backend: &mut B,
    ) -> Result<Self, Error> {
        for dir in search_paths {
            if !dir.is_dir() {
                return Err(Error::InvalidSearchPath(dir.clone()));
            }
        }

        let mut map = Self::new();
        for record in records {
            let (path, is_static) = find_binary(&record.label, search_paths, backend)?;
            log::debug!(
                "{:#x} - {:#x} {} -> {} ({})",
                record.start,
                record.end(),
                record.label,
                path.display(),
                if is_static { "static" } else { "dynamic" }
            );
            map.push(ModuleRange {
                label: record.label.clone(),
                path,
                start: record.start,
                end: record.end(),
                is_static,
                is_kernel: false,
            });
        }
        Ok(map)
    }

    /// Add a module. Overlapping modules are accepted, but only the first one
    /// will ever match an address in the overlap.
    pub fn push(&mut self, module: ModuleRange) {
        if let Some(existing) = self.modules.iter().find(|m| m.overlaps(&module)) {
            log::warn!(
                "Module {} ({:#x} - {:#x}) overlaps {} ({:#x} - {:#x})",
                module.label,
                module.start,
                module.end,
                existing.label,
                existing.start,
                existing.end
            );
        }
        self.modules.push(module);
    }

    /// Install the kernel symbol table and a kernel module covering it.
    pub fn set_kernel_symbols(&mut self, symbols: KernelSymbols) {
        if let Some(range) = symbols.range() {
            self.modules.retain(|m| !m.is_kernel);
            self.push(range);
        }
        self.kernel_symbols = symbols;
    }

    pub fn kernel_symbols(&self) -> &KernelSymbols {
        &self.kernel_symbols
    }

    /// The module containing `pc`, if any.
    pub fn module_for_pc(&self, pc: u64) -> Option<&ModuleRange> {
        self.modules.iter().find(|m| m.contains(pc))
    }

    /// The label of the first recorded module, which is the profiled executable.
    pub fn target(&self) -> Option<&str> {
        self.modules
            .iter()
            .find(|m| !m.is_kernel)
            .map(|m| m.label.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModuleRange> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn find_binary<B: SymbolBackend>(
    label: &str,
    search_paths: &[PathBuf],
    backend: &mut B,
) -> Result<(PathBuf, bool), Error> {
    for dir in search_paths {
        let candidate = dir.join(label);
        if !candidate.is_file() {
            continue;
        }
        match backend.is_static_executable(&candidate) {
            Ok(is_static) => return Ok((candidate, is_static)),
            Err(e) => log::debug!("Skipping {}: {e}", candidate.display()),
        }
    }
    Err(Error::BinaryNotFound(label.to_string()))
}

/// Parse a textual vm map, one `<hex start> <hex size> <label>` entry per line.
/// Lines shorter than three characters are ignored.
pub fn parse_vmmap_text(text: &str) -> Result<Vec<ModuleRecord>, Error> {
    let mut records = Vec::new();
    for line in text.lines() {
        if line.len() <= 2 {
            continue;
        }
        let malformed = || Error::InvalidVmMapLine(line.to_string());
        let mut parts = line.splitn(3, ' ');
        let (Some(start), Some(size), Some(label)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        records.push(ModuleRecord {
            start: parse_hex(start).ok_or_else(malformed)?,
            size: parse_hex(size).ok_or_else(malformed)?,
            label: label.trim_end().to_string(),
        });
    }
    Ok(records)
}

fn parse_hex(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).ok()
}

/// Append the current directory to `search_paths`, which is always searched last.
pub fn with_current_dir(mut search_paths: Vec<PathBuf>) -> Vec<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        search_paths.push(cwd);
    }
    search_paths
}

impl<'a> IntoIterator for &'a ModuleMap {
    type Item = &'a ModuleRange;
    type IntoIter = std::slice::Iter<'a, ModuleRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorCategory;

    fn module(label: &str, start: u64, end: u64, is_static: bool) -> ModuleRange {
        ModuleRange {
            label: label.to_string(),
            path: PathBuf::from(label),
            start,
            end,
            is_static,
            is_kernel: false,
        }
    }

    #[test]
    fn normalize_static_and_dynamic() {
        let pie = module("app", 0x5555_0000_0000, 0x5555_0001_0000, false);
        assert_eq!(pie.normalize(0x5555_0000_1234), 0x1234);
        let exec = module("app", 0x40_0000, 0x50_0000, true);
        assert_eq!(exec.normalize(0x40_1234), 0x40_1234);
    }

    #[test]
    fn classification() {
        let mut map = ModuleMap::new();
        map.push(module("app", 0x1000, 0x2000, false));
        map.push(module("libc.so", 0x8000, 0x9000, false));
        assert_eq!(map.module_for_pc(0x1000).unwrap().label, "app");
        assert_eq!(map.module_for_pc(0x8fff).unwrap().label, "libc.so");
        assert!(map.module_for_pc(0x2000).is_none());
        assert!(map.module_for_pc(0).is_none());
        assert_eq!(map.target(), Some("app"));
    }

    #[test]
    fn kernel_nearest_preceding_symbol() {
        let symbols = KernelSymbols::parse(
            "ffffffff81000000 T _stext\n\
             ffffffff81000100 T do_one_initcall\n\
             ffffffff81000200 t schedule [sched]\n\
             bogus\n",
        )
        .unwrap();
        assert_eq!(symbols.len(), 3);
        assert_eq!(symbols.lookup(0xffffffff81000000), Some("_stext"));
        assert_eq!(symbols.lookup(0xffffffff810001ff), Some("do_one_initcall"));
        assert_eq!(symbols.lookup(0xffffffff81000200), Some("schedule"));
        assert_eq!(symbols.lookup(0xffffffff80ffffff), None);

        let mut map = ModuleMap::new();
        map.set_kernel_symbols(symbols);
        let kernel = map.module_for_pc(0xffffffff81000150).unwrap();
        assert!(kernel.is_kernel);
        assert_eq!(kernel.label, LABEL_KERNEL);
        assert!(map.module_for_pc(0xffffffff81000201).is_none());
        assert_eq!(map.target(), None);
    }

    #[test]
    fn kallsyms_bad_address() {
        let err = KernelSymbols::parse("ffffffff81000000 T _stext
xyz T broken
").unwrap_err();
        assert!(matches!(&err, Error::InvalidKallsymsLine(line) if line == "xyz T broken"));
        assert_eq!(err.category(), ErrorCategory::Format);
    }

    #[test]
    fn vmmap_text() {
        let records = parse_vmmap_text("400000 1000 app\n7f0000001000 2000 libc-2.31.so\n\n")
            .unwrap();
        assert_eq!(
            records,
            vec![
                ModuleRecord {
                    start: 0x400000,
                    size: 0x1000,
                    label: "app".into()
                },
                ModuleRecord {
                    start: 0x7f00_0000_1000,
                    size: 0x2000,
                    label: "libc-2.31.so".into()
                },
            ]
        );
        assert!(matches!(
            parse_vmmap_text("zz 10 app"),
            Err(Error::InvalidVmMapLine(_))
        ));
    }
}
