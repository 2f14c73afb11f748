// src/platform/symbols.rs

//! Runtime resolution of native windowing entry points.
//!
//! Backends describe the symbols they need as a plain struct of function
//! and data pointers, filled once through a `SymbolLoader`. Each lookup
//! states its policy: `required` symbols fail construction with
//! `PlatformError::MissingSymbol`, `optional` ones degrade a feature.

use super::error::PlatformError;
use libloading::Library;
use log::{debug, info, trace};

/// An opened native library plus the soname it was found under.
pub struct SymbolLoader {
    lib: Library,
    name: &'static str,
}

impl SymbolLoader {
    /// Opens the first library of `sonames` that loads.
    pub fn open(sonames: &[&'static str]) -> Result<Self, PlatformError> {
        for &name in sonames {
            // SAFETY: the windowing client libraries run no unsafe
            // initialisers on load.
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    info!("Loaded {}", name);
                    return Ok(SymbolLoader { lib, name });
                }
                Err(e) => debug!("Could not load {}: {}", name, e),
            }
        }
        Err(PlatformError::LibraryNotFound(sonames.to_vec()))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolves a symbol that must exist. `symbol` is NUL-terminated;
    /// `since` names the library release that introduced it.
    ///
    /// # Safety
    ///
    /// `T` must match the C type of the symbol (a function pointer type
    /// for functions, `*const X` for data symbols). The returned value is
    /// only valid while this loader is alive.
    pub unsafe fn required<T: Copy>(
        &self,
        symbol: &[u8],
        since: &'static str,
    ) -> Result<T, PlatformError> {
        match self.lib.get::<T>(symbol) {
            Ok(sym) => {
                trace!("Resolved {}", display_name(symbol));
                Ok(*sym)
            }
            Err(_) => Err(PlatformError::MissingSymbol {
                symbol: display_name(symbol),
                library: self.name.to_string(),
                since,
            }),
        }
    }

    /// Resolves a symbol whose absence only disables a feature.
    ///
    /// # Safety
    ///
    /// Same contract as [`SymbolLoader::required`].
    pub unsafe fn optional<T: Copy>(&self, symbol: &[u8]) -> Option<T> {
        match self.lib.get::<T>(symbol) {
            Ok(sym) => Some(*sym),
            Err(_) => {
                debug!(
                    "Optional symbol {} missing from {}",
                    display_name(symbol),
                    self.name
                );
                None
            }
        }
    }
}

fn display_name(symbol: &[u8]) -> String {
    let trimmed = symbol.strip_suffix(b"\0").unwrap_or(symbol);
    String::from_utf8_lossy(trimmed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn it_should_report_every_tried_soname() {
        let err = SymbolLoader::open(&["libcore-window-does-not-exist.so.9"])
            .err()
            .unwrap();
        assert!(matches!(err, PlatformError::LibraryNotFound(ref names) if names.len() == 1));
    }

    #[test_log::test]
    fn it_should_strip_the_terminator_in_names() {
        assert_eq!(display_name(b"wl_display_connect\0"), "wl_display_connect");
    }
}
