use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};

use libloading::Library;

/// Handle to a plugin's native binary.
///
/// Platform-uniform contract: `open` on an already-open handle replaces it,
/// closing the previous library first; `symbol` and `close` are no-ops
/// returning `None`/`false` while nothing is open. The last failure is
/// retrievable as a string.
#[derive(Default)]
pub struct PluginLibrary {
    path: Option<PathBuf>,
    library: Option<Library>,
    last_error: Option<String>,
}

impl PluginLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the binary at `path`, replacing (and closing) any previously
    /// open handle. Returns whether the open succeeded; on failure the
    /// loader error is kept for [`PluginLibrary::last_error`].
    pub fn open(&mut self, path: &Path) -> bool {
        // Dropping the old handle before the new open keeps at most one
        // copy of the binary mapped at a time.
        self.library = None;
        match unsafe { Library::new(path) } {
            Ok(library) => {
                self.library = Some(library);
                self.path = Some(path.to_path_buf());
                self.last_error = None;
                true
            }
            Err(err) => {
                log::debug!("failed to open {}: {err}", path.display());
                self.path = None;
                self.last_error = Some(err.to_string());
                false
            }
        }
    }

    /// Closes the open handle, if any. Returns `false` when nothing was open.
    pub fn close(&mut self) -> bool {
        if self.library.take().is_some() {
            self.path = None;
            true
        } else {
            false
        }
    }

    /// Resolves an exported symbol to a raw address. Returns `None` while
    /// nothing is open or when the symbol is missing.
    pub fn symbol(&mut self, name: &str) -> Option<*mut c_void> {
        let library = self.library.as_ref()?;
        let mut bytes = Vec::with_capacity(name.len() + 1);
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(0);
        match unsafe { library.get::<*mut c_void>(&bytes) } {
            Ok(symbol) => Some(*symbol),
            Err(err) => {
                self.last_error = Some(err.to_string());
                None
            }
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.library.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Debug for PluginLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLibrary")
            .field("path", &self.path)
            .field("open", &self.library.is_some())
            .finish()
    }
}
