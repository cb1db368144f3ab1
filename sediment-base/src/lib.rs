mod bitfield;
mod codec;
mod error;


pub use bitfield::{pack_padded_rows, unpack_padded_rows, BitField};
pub use codec::{decode_into, decode_vec, encode_into, encode_vec, put_at, take_at, Order};
pub use error::{err, Error, ErrorKind, Result};
