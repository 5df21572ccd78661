//! Dynamic Library Loader
//!
//! Safe wrapper around libloading for loading shared libraries.

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};

use super::FfiError;

/// Where a wrapped library comes from
#[derive(Clone)]
pub enum LibrarySource {
    /// Explicit path to a shared object, made absolute before loading
    Path(PathBuf),
    /// Library name resolved by the dynamic linker (e.g. `libc.so.6`)
    System(String),
    /// A library that is already loaded and shared with other wrappers
    Loaded(Arc<DynamicLibrary>),
}

impl LibrarySource {
    /// Load the library, or hand back the shared handle
    pub fn open(self) -> Result<Arc<DynamicLibrary>, FfiError> {
        match self {
            LibrarySource::Path(path) => DynamicLibrary::load(path).map(Arc::new),
            LibrarySource::System(name) => DynamicLibrary::load_system(&name).map(Arc::new),
            LibrarySource::Loaded(library) => Ok(library),
        }
    }
}

impl From<Arc<DynamicLibrary>> for LibrarySource {
    fn from(library: Arc<DynamicLibrary>) -> Self {
        LibrarySource::Loaded(library)
    }
}

/// A dynamically loaded library
pub struct DynamicLibrary {
    /// Path or name the library was loaded from
    path: PathBuf,
    /// The loaded library handle
    library: Library,
}

impl DynamicLibrary {
    /// Load a library from the given path.
    ///
    /// Relative paths are resolved against the current directory so the
    /// dynamic linker never searches for them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FfiError> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| {
                    FfiError::LoadError(format!("Failed to resolve '{}': {}", path.display(), e))
                })?
                .join(path)
        };

        // Safety: loading a library runs its initialisers. The caller vouches
        // for the library it asks us to test.
        let library = unsafe {
            Library::new(&path).map_err(|e| {
                FfiError::LoadError(format!(
                    "Failed to load library '{}': {}",
                    path.display(),
                    e
                ))
            })?
        };
        log::debug!("loaded {}", path.display());

        Ok(Self { path, library })
    }

    /// Load a library by name, leaving resolution to the dynamic linker
    pub fn load_system(name: &str) -> Result<Self, FfiError> {
        // Safety: see `load`.
        let library = unsafe {
            Library::new(name).map_err(|e| {
                FfiError::LoadError(format!("Failed to load system library '{}': {}", name, e))
            })?
        };
        log::debug!("loaded system library {}", name);

        Ok(Self {
            path: PathBuf::from(name),
            library,
        })
    }

    /// Get the path (or system name) of this library
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a function symbol to its address
    pub fn get_symbol(&self, name: &str) -> Result<usize, FfiError> {
        let c_name = CString::new(name)
            .map_err(|_| FfiError::InvalidSymbol(format!("Invalid symbol name: {}", name)))?;

        // Safety: the address is only called through a declared signature,
        // and the caller is responsible for that signature matching.
        let symbol: Symbol<*const ()> = unsafe {
            self.library.get(c_name.as_bytes_with_nul()).map_err(|e| {
                FfiError::SymbolNotFound(format!(
                    "Symbol '{}' not found in '{}': {}",
                    name,
                    self.path.display(),
                    e
                ))
            })?
        };

        let addr = *symbol as usize;
        if addr == 0 {
            return Err(FfiError::SymbolNotFound(format!(
                "Symbol '{}' resolves to NULL in '{}'",
                name,
                self.path.display()
            )));
        }
        Ok(addr)
    }

    /// Check whether the library exports a symbol
    pub fn has_symbol(&self, name: &str) -> bool {
        self.get_symbol(name).is_ok()
    }
}

impl std::fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibrary")
            .field("path", &self.path)
            .finish()
    }
}
