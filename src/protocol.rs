//! Wire formats of the two network channels.
//!
//! Both channels use little-endian fixed layouts. Positions on the wire are in millimetres.

mod codec;
mod command;
mod vision;

pub use codec::{decode_exact, encode_to_vec, Decode, Encode, ProtocolError};
pub use command::CommandPacket;
pub use vision::{NoiseConfig, Perturbation, PerturbationError, VanishingConfig, VisionFrame};
