//! Protocol module containing the message types, the origin allowlist, and the
//! JSON codec.

pub mod codec;
pub mod messages;
pub mod origin;

pub use codec::{decode_request, encode_message, MessageError};
pub use messages::*;
pub use origin::OriginPolicy;
