// The file facade: opening, closing, flushing, and the object-level
// surface shared by reading and writing. Typed dataset traffic lives on
// the Reader and Writer views.

use std::cell::RefCell;
use std::sync::Arc;

use sediment_base::{err, ErrorKind, Result};
use tracing::warn;

use crate::binding::{Binding, Hid, LinkTarget, ObjectKind};
use crate::reader::Reader;
use crate::registry::Registry;
use crate::writer::Writer;

/// Default gzip level used by [`crate::writer::DatasetOptions::compressed`].
pub const DEFAULT_DEFLATE: u8 = 6;

/// Datasets smaller than this are stored compact by default.
pub const COMPACT_THRESHOLD: usize = 256;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileMode {
    ReadOnly,
    /// Open for reading and writing, creating the file if missing.
    ReadWrite,
    /// Discard any existing contents.
    Truncate,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FileOptions {
    pub mode: FileMode,
    /// Write the latest file format. External links require this, and it
    /// relaxes the overwrite rules for undersized layouts.
    pub latest_format: bool,
    /// Byte size below which new datasets are stored compact.
    pub compact_threshold: usize,
}

impl Default for FileOptions {
    fn default() -> Self {
        FileOptions {
            mode: FileMode::ReadWrite,
            latest_format: false,
            compact_threshold: COMPACT_THRESHOLD,
        }
    }
}

impl FileOptions {
    pub fn read_only() -> Self {
        FileOptions {
            mode: FileMode::ReadOnly,
            ..Default::default()
        }
    }

    pub fn truncate() -> Self {
        FileOptions {
            mode: FileMode::Truncate,
            ..Default::default()
        }
    }

    pub fn with_latest_format(mut self) -> Self {
        self.latest_format = true;
        self
    }
}

/// An open HDF5 file. All typed traffic goes through [`H5File::reader`]
/// and [`H5File::writer`]; the file owns the binding handle and the
/// committed-datatype registry, both torn down on drop.
pub struct H5File {
    binding: Arc<dyn Binding>,
    fh: Hid,
    opts: FileOptions,
    registry: RefCell<Registry>,
}

impl H5File {
    pub fn open(binding: Arc<dyn Binding>, name: &str, opts: FileOptions) -> Result<H5File> {
        let fh = match opts.mode {
            FileMode::ReadOnly => binding.open_file(name, true)?,
            FileMode::ReadWrite => binding.create_file(name, false, opts.latest_format)?,
            FileMode::Truncate => binding.create_file(name, true, opts.latest_format)?,
        };
        Ok(H5File {
            binding,
            fh,
            opts,
            registry: RefCell::new(Registry::new()),
        })
    }

    pub fn reader(&self) -> Reader<'_> {
        Reader::new(self)
    }

    pub fn writer(&self) -> Result<Writer<'_>> {
        if self.opts.mode == FileMode::ReadOnly {
            return Err(err(ErrorKind::Io("file is open read-only".into())));
        }
        Ok(Writer::new(self))
    }

    /// Forces a file-level synchronization.
    pub fn flush(&self) -> Result<()> {
        self.binding.flush_file(self.fh)
    }

    pub(crate) fn binding(&self) -> &dyn Binding {
        self.binding.as_ref()
    }

    pub(crate) fn fh(&self) -> Hid {
        self.fh
    }

    pub(crate) fn opts(&self) -> &FileOptions {
        &self.opts
    }

    pub(crate) fn registry(&self) -> &RefCell<Registry> {
        &self.registry
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        let path = norm(path)?;
        self.binding.exists(self.fh, &path)
    }

    pub fn object_kind(&self, path: &str) -> Result<ObjectKind> {
        let path = norm(path)?;
        self.binding.object_kind(self.fh, &path)
    }

    /// Member names of a group, with internal `__`-prefixed names
    /// filtered out.
    pub fn group_members(&self, path: &str) -> Result<Vec<String>> {
        Ok(self
            .all_group_members(path)?
            .into_iter()
            .filter(|n| !n.starts_with("__"))
            .collect())
    }

    pub fn all_group_members(&self, path: &str) -> Result<Vec<String>> {
        let path = norm(path)?;
        self.binding.group_members(self.fh, &path)
    }

    /// Where a link points: the target path for a soft link, the
    /// `EXTERNAL::<file>::<path>` form for an external link, None for a
    /// real object.
    pub fn link_target(&self, path: &str) -> Result<Option<String>> {
        let path = norm(path)?;
        Ok(self
            .binding
            .link_info(self.fh, &path)?
            .map(|t| match t {
                LinkTarget::Soft(target) => target,
                LinkTarget::External { file, path } => format!("EXTERNAL::{file}::{path}"),
            }))
    }
}

impl Drop for H5File {
    fn drop(&mut self) {
        if let Err(e) = self.binding.close(self.fh) {
            warn!(target: "sediment", "failed to close file handle: {}", e);
        }
    }
}

/// Normalizes a user path: absolute, no empty components, no trailing
/// slash except the root itself.
pub(crate) fn norm(path: &str) -> Result<String> {
    if path.is_empty() {
        return Err(err(ErrorKind::NoSuchObject("(empty path)".into())));
    }
    if path == "/" {
        return Ok("/".to_string());
    }
    let abs = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let abs = match abs.strip_suffix('/') {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        Some(_) => return Ok("/".to_string()),
        None => abs,
    };
    if abs.split('/').skip(1).any(|c| c.is_empty()) {
        return Err(err(ErrorKind::NoSuchObject(format!(
            "empty component in {path}"
        ))));
    }
    Ok(abs)
}
