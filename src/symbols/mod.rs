//! Resolution of program counters to source locations.
//!
//! A [`SymbolResolver`] classifies each program counter against the
//! [`ModuleMap`](crate::ModuleMap) of a capture, and asks a [`SymbolBackend`]
//! for the function, file and line of addresses inside known binaries. The
//! resulting strings are de-duplicated in [`SymbolTables`], and locations refer
//! to them by index.
//!
//! ```
//! use power_profile_data::{ModuleMap, ProcessBackend, SymbolResolver, SymbolTables};
//!
//! # fn wrapper() -> Result<(), power_profile_data::Error> {
//! let mut resolver = SymbolResolver::new(ModuleMap::new(), ProcessBackend::new());
//! let mut tables = SymbolTables::new();
//! // Nothing is loaded, so every address is foreign.
//! let location = resolver.resolve(0x401000, &mut tables)?;
//! assert_eq!(tables.binary(location.binary)?, "_foreign");
//! # Ok(())
//! # }
//! ```

mod backend;
mod resolver;
mod tables;

pub use backend::*;
pub use resolver::*;
pub use tables::*;
