// The seam to the lower-level HDF5 binding. The core never touches raw
// file bytes itself; it drives these primitive operations with opaque
// handles and marshals typed values above them. An in-memory
// implementation lives in membind.rs and backs the test suite.

use sediment_base::Result;

use crate::datatype::Datatype;

/// An opaque handle issued by the binding (file, object, dataspace, ...).
pub type Hid = i64;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjectKind {
    Group,
    Dataset,
    Datatype,
    SoftLink,
    ExternalLink,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StorageLayout {
    Compact,
    Contiguous,
    Chunked,
}

/// A datatype for dataset or attribute creation: inline, or a committed
/// datatype referenced by its canonical path.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TypeRef {
    Inline(Datatype),
    Committed(String),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LinkTarget {
    Soft(String),
    External { file: String, path: String },
}

pub trait Binding {
    /// Library version triple, so version-specific workarounds can stay
    /// conditional.
    fn version(&self) -> (u32, u32, u32);

    // Files.
    fn create_file(&self, name: &str, truncate: bool, latest_format: bool) -> Result<Hid>;
    fn open_file(&self, name: &str, read_only: bool) -> Result<Hid>;
    fn flush_file(&self, file: Hid) -> Result<()>;
    /// Releases any handle this binding issued.
    fn close(&self, handle: Hid) -> Result<()>;

    // Objects and links.
    fn exists(&self, file: Hid, path: &str) -> Result<bool>;
    fn object_kind(&self, file: Hid, path: &str) -> Result<ObjectKind>;
    /// Creates missing intermediate groups as well.
    fn create_group(&self, file: Hid, path: &str) -> Result<()>;
    fn group_members(&self, file: Hid, path: &str) -> Result<Vec<String>>;
    /// Removes the link and anything only reachable through it.
    fn delete_link(&self, file: Hid, path: &str) -> Result<()>;
    fn create_soft_link(&self, file: Hid, target: &str, link_path: &str) -> Result<()>;
    fn create_external_link(
        &self,
        file: Hid,
        target_file: &str,
        target_path: &str,
        link_path: &str,
    ) -> Result<()>;
    fn link_info(&self, file: Hid, path: &str) -> Result<Option<LinkTarget>>;
    fn object_address(&self, file: Hid, path: &str) -> Result<u64>;
    fn path_at_address(&self, file: Hid, address: u64) -> Result<Option<String>>;

    // Dataspaces.
    fn create_scalar_space(&self) -> Result<Hid>;
    fn create_simple_space(&self, dims: &[u64], max_dims: &[u64]) -> Result<Hid>;
    fn select_hyperslab(&self, space: Hid, start: &[u64], count: &[u64]) -> Result<()>;
    /// (current dims, max dims). Both empty for a scalar space.
    fn space_dims(&self, space: Hid) -> Result<(Vec<u64>, Vec<u64>)>;

    // Datatypes.
    fn commit_datatype(&self, file: Hid, path: &str, ty: &Datatype) -> Result<()>;
    fn open_datatype(&self, file: Hid, path: &str) -> Result<Datatype>;

    // Datasets.
    #[allow(clippy::too_many_arguments)]
    fn create_dataset(
        &self,
        file: Hid,
        path: &str,
        ty: &TypeRef,
        space: Hid,
        layout: StorageLayout,
        chunk: Option<&[u64]>,
        deflate: Option<u8>,
    ) -> Result<Hid>;
    fn open_dataset(&self, file: Hid, path: &str) -> Result<Hid>;
    fn dataset_space(&self, ds: Hid) -> Result<Hid>;
    fn dataset_type(&self, ds: Hid) -> Result<Datatype>;
    /// The committed path of the dataset's datatype, if it has one.
    fn dataset_type_path(&self, ds: Hid) -> Result<Option<String>>;
    fn dataset_layout(&self, ds: Hid) -> Result<(StorageLayout, Option<Vec<u64>>)>;
    fn set_extent(&self, ds: Hid, dims: &[u64]) -> Result<()>;
    /// Gathers the `file_space` selection of the dataset into the
    /// `mem_space` selection of `out`. Element size is the dataset's.
    fn read_dataset(&self, ds: Hid, mem_space: Hid, file_space: Hid, out: &mut [u8]) -> Result<()>;
    fn write_dataset(&self, ds: Hid, mem_space: Hid, file_space: Hid, data: &[u8]) -> Result<()>;
    /// Variable-length string transfer. Vlen data is pointer-shaped in
    /// every real binding, so it cannot ride the flat byte path.
    fn read_strings(&self, ds: Hid, mem_space: Hid, file_space: Hid) -> Result<Vec<String>>;
    fn write_strings(
        &self,
        ds: Hid,
        mem_space: Hid,
        file_space: Hid,
        vals: &[String],
    ) -> Result<()>;

    // Attributes, addressed by owning object path and attribute name.
    fn attr_exists(&self, file: Hid, path: &str, name: &str) -> Result<bool>;
    fn attr_names(&self, file: Hid, path: &str) -> Result<Vec<String>>;
    fn create_attr(
        &self,
        file: Hid,
        path: &str,
        name: &str,
        ty: &TypeRef,
        dims: Option<&[u64]>,
    ) -> Result<()>;
    fn delete_attr(&self, file: Hid, path: &str, name: &str) -> Result<()>;
    fn attr_type(&self, file: Hid, path: &str, name: &str) -> Result<Datatype>;
    fn attr_dims(&self, file: Hid, path: &str, name: &str) -> Result<Option<Vec<u64>>>;
    fn read_attr(&self, file: Hid, path: &str, name: &str) -> Result<Vec<u8>>;
    fn write_attr(&self, file: Hid, path: &str, name: &str, data: &[u8]) -> Result<()>;
}
