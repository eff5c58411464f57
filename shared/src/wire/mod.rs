pub mod control_header;
pub mod error;
pub mod message_kind;
pub mod packet_framer;
pub mod packet_header;
