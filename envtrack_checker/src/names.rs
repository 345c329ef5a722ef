// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The two name types the layer stack keys its tables by.

use std::fmt;

/// The name of a source module, e.g. `myapp.routes`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ModuleName(String);

impl ModuleName {
    /// Builds a module name from its dotted path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The dotted path this module name wraps.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully-qualified symbol name: the module that defines it plus its local name.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct QualifiedName {
    module: ModuleName,
    symbol: String,
}

impl QualifiedName {
    /// Builds a qualified name for `symbol`, defined in `module`.
    pub fn new(module: ModuleName, symbol: impl Into<String>) -> Self {
        Self { module, symbol: symbol.into() }
    }

    /// The module this name is defined in.
    #[must_use]
    pub fn module(&self) -> &ModuleName {
        &self.module
    }

    /// The symbol's local (unqualified) name.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.symbol)
    }
}
