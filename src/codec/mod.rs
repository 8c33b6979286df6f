//! Schema-driven value codec.
//!
//! Values carry no type tags on the wire: a byte sequence only means
//! something together with the [`Kind`] both ends agreed on. See
//! [`encode`] and [`decode`] for the entry points and [`Wire`] for the
//! static bindings.

mod decode;
mod encode;
mod error;
mod kind;
mod leb128;
mod typed;
mod value;

#[doc(hidden)]
pub mod macros;

pub use decode::{decode, decode_from, decode_tuple};
pub use encode::{encode, encode_into, encode_tuple};
pub use error::{DecodeError, EncodeError};
pub use kind::{Case, Field, Kind, Signature, MAX_ZERO_WIDTH_LIST_LEN};
pub use typed::{Wire, WireTuple};
pub use value::Value;
