use std::collections::HashMap;

use super::backend::SymbolBackend;
use super::tables::{ResolvedLocation, SymbolTables, LABEL_UNKNOWN, UNKNOWN_INDEX};
use crate::error::Error;
use crate::module_map::{ModuleMap, ModuleRange};

/// What to do when the symbolizer fails for a program counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Log a warning and attribute the program counter to an unknown
    /// function inside its module.
    MarkUnknown,
}

/// Maps program counters to [`ResolvedLocation`]s.
///
/// Every distinct program counter is resolved at most once; later lookups are
/// answered from a cache keyed by the raw (not normalized) address. Demangled
/// names are cached separately, so a function reached through many
/// addresses is only demangled once.
#[derive(Debug)]
pub struct SymbolResolver<B: SymbolBackend> {
    modules: ModuleMap,
    backend: B,
    policy: ResolutionPolicy,
    resolved_pcs: HashMap<u64, ResolvedLocation>,
    demangled_names: HashMap<String, String>,
}

impl<B: SymbolBackend> SymbolResolver<B> {
    pub fn new(modules: ModuleMap, backend: B) -> Self {
        Self {
            modules,
            backend,
            policy: ResolutionPolicy::default(),
            resolved_pcs: HashMap::new(),
            demangled_names: HashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn modules(&self) -> &ModuleMap {
        &self.modules
    }

    /// The number of distinct program counters resolved so far.
    pub fn cached_count(&self) -> usize {
        self.resolved_pcs.len()
    }

    /// Resolve `pc`, interning any new strings into `tables`.
    pub fn resolve(
        &mut self,
        pc: u64,
        tables: &mut SymbolTables,
    ) -> Result<ResolvedLocation, Error> {
        if let Some(location) = self.resolved_pcs.get(&pc) {
            return Ok(*location);
        }

        let location = match self.modules.module_for_pc(pc) {
            None => ResolvedLocation::FOREIGN,
            Some(module) => {
                let binary = tables.intern_binary(&module.label);
                let result = if module.is_kernel {
                    Ok(resolve_kernel(&self.modules, module, pc, binary, tables))
                } else {
                    resolve_with_backend(
                        &mut self.backend,
                        &mut self.demangled_names,
                        module,
                        pc,
                        binary,
                        tables,
                    )
                };
                match (result, self.policy) {
                    (Ok(location), _) => location,
                    (Err(e), ResolutionPolicy::MarkUnknown) => {
                        log::warn!("{e}, attributing {pc:#x} to {LABEL_UNKNOWN}");
                        ResolvedLocation::unknown_in(binary)
                    }
                    (Err(e), ResolutionPolicy::Abort) => return Err(e),
                }
            }
        };

        self.resolved_pcs.insert(pc, location);
        Ok(location)
    }
}

fn resolve_kernel(
    modules: &ModuleMap,
    module: &ModuleRange,
    pc: u64,
    binary: u32,
    tables: &mut SymbolTables,
) -> ResolvedLocation {
    match modules.kernel_symbols().lookup(module.normalize(pc)) {
        Some(name) => ResolvedLocation {
            binary,
            function: tables.intern_function(name, name),
            file: UNKNOWN_INDEX,
            line: 0,
        },
        None => ResolvedLocation::unknown_in(binary),
    }
}

fn resolve_with_backend<B: SymbolBackend>(
    backend: &mut B,
    demangled_names: &mut HashMap<String, String>,
    module: &ModuleRange,
    pc: u64,
    binary: u32,
    tables: &mut SymbolTables,
) -> Result<ResolvedLocation, Error> {
    let address = module.normalize(pc);
    let source = backend.address_to_line(&module.path, address)?;
    log::trace!("{pc:#x} ({}+{address:#x}) -> {source:?}", module.label);

    let function = match source.function {
        Some(mangled) => {
            let demangled = match demangled_names.get(&mangled) {
                Some(demangled) => demangled.clone(),
                None => {
                    let demangled = backend.demangle(&mangled)?;
                    demangled_names.insert(mangled.clone(), demangled.clone());
                    demangled
                }
            };
            tables.intern_function(&mangled, &demangled)
        }
        None => UNKNOWN_INDEX,
    };
    let file = match source.file {
        Some(file) => tables.intern_file(&file),
        None => UNKNOWN_INDEX,
    };
    Ok(ResolvedLocation {
        binary,
        function,
        file,
        line: source.line.unwrap_or(0),
    })
}
