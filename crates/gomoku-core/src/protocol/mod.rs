//! Protocol module containing message types and the line codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_client_command, decode_server_message, encode_client_command, encode_server_message,
    validate_name, ProtocolError,
};
pub use messages::*;
