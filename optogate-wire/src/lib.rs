//! Wire protocol: message types and the CBOR/JSON codec framing them
//! over a byte stream (WebSocket or otherwise).

pub mod codec;
pub mod message;
pub mod pixels;

pub use codec::{CodecError, MessageCodec};
pub use message::{FrameMetadata, FramePayload, Message, PixelDtype, SyncPayload};
pub use pixels::{frame_to_payload, payload_to_frame, PixelConversionError};
