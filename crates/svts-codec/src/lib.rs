//! ASN.1 BER length/TLV primitives (component B) and the SV frame
//! encoder (component D) for IEC 61850-9-2LE Sampled Values.

pub mod ber;
pub mod frame;
pub mod tags;

pub use ber::{decode_i64, decode_length, decode_u64, iter_tlvs, read_tlv, write_length, write_tlv, Tlv, TlvIter};
pub use frame::{ChannelSample, FrameEncoder, FrameParams};
