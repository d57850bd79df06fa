use std::fmt;

use crate::error::Error;
use crate::symbols::{ResolvedLocation, SymbolTables};

/// One field of a [`ResolvedLocation`] which can take part in an aggregation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyField {
    Binary,
    Function,
    File,
    Line,
}

impl KeyField {
    pub const ALL: [KeyField; 4] = [
        KeyField::Binary,
        KeyField::Function,
        KeyField::File,
        KeyField::Line,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KeyField::Binary => "binary",
            KeyField::Function => "function",
            KeyField::File => "file",
            KeyField::Line => "line",
        }
    }

    fn bit(self) -> u32 {
        match self {
            KeyField::Binary => 1,
            KeyField::Function => 2,
            KeyField::File => 4,
            KeyField::Line => 8,
        }
    }
}

/// Selects which location fields identify an aggregation entry.
///
/// The default projection aggregates by binary and function.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyProjection {
    bits: u32,
}

impl Default for KeyProjection {
    fn default() -> Self {
        Self::from_fields(&[KeyField::Binary, KeyField::Function])
    }
}

impl KeyProjection {
    pub fn from_fields(fields: &[KeyField]) -> Self {
        Self {
            bits: fields.iter().fold(0, |bits, field| bits | field.bit()),
        }
    }

    /// Parse a comma separated list of field names, e.g. `function,file,line`.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mut fields = Vec::new();
        for name in s.split(',') {
            let name = name.trim();
            let field = KeyField::ALL
                .into_iter()
                .find(|field| field.name() == name)
                .ok_or_else(|| Error::InvalidKeyField(name.to_string()))?;
            fields.push(field);
        }
        Ok(Self::from_fields(&fields))
    }

    pub fn to_bits(self) -> u32 {
        self.bits
    }

    /// Bits which don't name a field are ignored.
    pub fn from_bits(bits: u32) -> Self {
        Self { bits: bits & 0xf }
    }

    pub fn contains(self, field: KeyField) -> bool {
        self.bits & field.bit() != 0
    }

    pub fn fields(self) -> impl Iterator<Item = KeyField> {
        KeyField::ALL
            .into_iter()
            .filter(move |&field| self.contains(field))
    }

    pub fn project(self, location: &ResolvedLocation) -> AggregationKey {
        AggregationKey {
            binary: self
                .contains(KeyField::Binary)
                .then_some(location.binary),
            function: self
                .contains(KeyField::Function)
                .then_some(location.function),
            file: self.contains(KeyField::File).then_some(location.file),
            line: self.contains(KeyField::Line).then_some(location.line),
        }
    }
}

impl fmt::Display for KeyProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.fields().map(KeyField::name).collect();
        f.write_str(&names.join(","))
    }
}

impl fmt::Debug for KeyProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyProjection({self})")
    }
}

impl std::str::FromStr for KeyProjection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The identity of an aggregation entry: the projected fields of a location.
///
/// Fields outside the projection are `None`. Indices refer to the
/// [`SymbolTables`] of the profile the key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregationKey {
    pub binary: Option<u32>,
    pub function: Option<u32>,
    pub file: Option<u32>,
    pub line: Option<u32>,
}

impl AggregationKey {
    /// The human readable parts of this key, in field order. Functions are
    /// shown demangled.
    pub fn display_parts(&self, tables: &SymbolTables) -> Result<Vec<String>, Error> {
        let mut parts = Vec::new();
        if let Some(binary) = self.binary {
            parts.push(tables.binary(binary)?.to_string());
        }
        if let Some(function) = self.function {
            parts.push(tables.function(function)?.demangled.clone());
        }
        if let Some(file) = self.file {
            parts.push(tables.file(file)?.to_string());
        }
        if let Some(line) = self.line {
            parts.push(line.to_string());
        }
        Ok(parts)
    }

    /// Translate this key from the `from` tables into the `to` tables.
    pub fn remap(&self, from: &SymbolTables, to: &mut SymbolTables) -> Result<Self, Error> {
        let binary = match self.binary {
            Some(i) => Some(to.intern_binary(from.binary(i)?)),
            None => None,
        };
        let function = match self.function {
            Some(i) => {
                let function = from.function(i)?;
                Some(to.intern_function(&function.mangled, &function.demangled))
            }
            None => None,
        };
        let file = match self.file {
            Some(i) => Some(to.intern_file(from.file(i)?)),
            None => None,
        };
        Ok(Self {
            binary,
            function,
            file,
            line: self.line,
        })
    }

    /// The key with indices replaced by the strings they refer to, for
    /// matching keys of profiles with different tables.
    pub fn names(&self, tables: &SymbolTables) -> Result<KeyNames, Error> {
        Ok(KeyNames {
            binary: self.binary.map(|i| tables.binary(i)).transpose()?.map(str::to_string),
            function: self
                .function
                .map(|i| tables.function(i))
                .transpose()?
                .map(|f| f.mangled.clone()),
            file: self.file.map(|i| tables.file(i)).transpose()?.map(str::to_string),
            line: self.line,
        })
    }
}

/// An [`AggregationKey`] spelled out with names instead of table indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyNames {
    pub binary: Option<String>,
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_projection() {
        let projection = KeyProjection::parse("function, file,line").unwrap();
        assert!(!projection.contains(KeyField::Binary));
        assert!(projection.contains(KeyField::Line));
        assert_eq!(projection.to_string(), "function,file,line");
        assert_eq!(KeyProjection::default().to_string(), "binary,function");
        assert_eq!(KeyProjection::from_bits(projection.to_bits()), projection);
        assert_eq!(
            projection.fields().collect::<Vec<_>>(),
            vec![KeyField::Function, KeyField::File, KeyField::Line]
        );
        assert!(matches!(
            KeyProjection::parse("binary,symbol"),
            Err(Error::InvalidKeyField(name)) if name == "symbol"
        ));
    }

    #[test]
    fn project_and_display() {
        let mut tables = SymbolTables::new();
        let location = ResolvedLocation {
            binary: tables.intern_binary("app"),
            function: tables.intern_function("_Z4workv", "work()"),
            file: tables.intern_file("work.cpp"),
            line: 42,
        };

        let key = KeyProjection::parse("function,line")
            .unwrap()
            .project(&location);
        assert_eq!(key.binary, None);
        assert_eq!(key.line, Some(42));
        assert_eq!(key.display_parts(&tables).unwrap(), vec!["work()", "42"]);

        let mut other = SymbolTables::new();
        other.intern_function("main", "main");
        let remapped = key.remap(&tables, &mut other).unwrap();
        assert_eq!(remapped.function, Some(3));
        assert_eq!(
            remapped.names(&other).unwrap(),
            key.names(&tables).unwrap()
        );
    }
}
