// A typed, path-addressed core over the HDF5 object model:
//
// - A file is a tree of groups, datasets, committed datatypes, and
//   soft/external links, addressed by POSIX-like paths.
// - A dataset couples a datatype (integer/float/string/enum/bit-field/
//   opaque/array/compound/reference) with a dataspace (rank, per-axis
//   current and max sizes) and a storage layout (compact, contiguous, or
//   chunked, optionally gzip-deflated per chunk).
// - Attributes are small named data hung off any object; reserved
//   __...__ attributes carry semantic annotations (type variants).
// - Committed datatypes live once per file under /__DATATYPES__ and are
//   shared by every dataset that mentions them.
//
// The crate sits above a lower-level binding (see binding.rs) that moves
// raw bytes; everything typed happens here: dataspace planning, endian
// and width conversion, enum ordinal handling, compound record packing,
// and scoped handle cleanup. Reads and writes are synchronous and a file
// handle is single-threaded; see the crate docs of the binding seam.

mod arena;
mod binding;
mod compound;
mod dataspace;
mod datatype;
mod elem;
mod enums;
mod file;
mod mdarray;
mod membind;
mod members;
mod reader;
mod registry;
mod writer;


pub use arena::{with_arena, Arena};
pub use binding::{Binding, Hid, LinkTarget, ObjectKind, StorageLayout, TypeRef};
pub use compound::{
    AccessMode, FieldSource, FieldValue, HostKind, MemberSpec, Record, Slot,
};
pub use compound::CompoundLayout;
pub use dataspace::{NaturalBlock, NaturalBlocks};
pub use datatype::{
    ordinal_width_for, CharSet, CompoundField, Datatype, TypeClass, UNLIMITED,
};
pub use elem::Element;
pub use enums::{EnumArray, EnumType, EnumValue, OrdinalStore};
pub use file::{FileMode, FileOptions, H5File, COMPACT_THRESHOLD, DEFAULT_DEFLATE};
pub use mdarray::MdArray;
pub use membind::MemBinding;
pub use members::{FactoryRegistry, MemberCtx, MemberEncoder, MemberFactory};
pub use reader::{NaturalBlockReader, Reader};
pub use registry::{TypeVariant, DATATYPE_GROUP, TYPE_VARIANT_ATTR};
pub use writer::{DatasetOptions, Writer};
