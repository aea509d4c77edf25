//! Wire message types: exactly the `frame` (client -> server) and
//! `sync` (server -> client) messages of the protocol, and nothing
//! else. One `sync` is sent per `frame` received.

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelDtype {
    Uint8,
    Uint16,
}

impl PixelDtype {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelDtype::Uint8 => 1,
            PixelDtype::Uint16 => 2,
        }
    }
}

/// Free-form per-frame metadata. `timestamp` is the only key the
/// protocol requires; callers may stash additional fields (e.g.
/// camera-specific diagnostics) alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub timestamp: f64,
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, serde_json::Value>,
}

impl FrameMetadata {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            extra: Default::default(),
        }
    }
}

/// The `frame` message payload: `[ [height, width], dtype, raw_bytes, metadata ]`.
/// Encoded as a heterogeneous sequence (not a map) to match the wire
/// protocol exactly, so a hand-written `Serialize`/`Deserialize` pair
/// replaces the usual derive.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePayload {
    pub height: usize,
    pub width: usize,
    pub dtype: PixelDtype,
    pub data: Vec<u8>,
    pub metadata: FrameMetadata,
}

impl Serialize for FramePayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(4))?;
        seq.serialize_element(&[self.height, self.width])?;
        seq.serialize_element(&self.dtype)?;
        seq.serialize_element(&serde_bytes::Bytes::new(&self.data))?;
        seq.serialize_element(&self.metadata)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for FramePayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FramePayloadVisitor;

        impl<'de> Visitor<'de> for FramePayloadVisitor {
            type Value = FramePayload;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 4-element [shape, dtype, bytes, metadata] sequence")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let shape: [usize; 2] = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let dtype: PixelDtype = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let data: serde_bytes::ByteBuf = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                let metadata: FrameMetadata = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(3, &self))?;
                Ok(FramePayload {
                    height: shape[0],
                    width: shape[1],
                    dtype,
                    data: data.into_vec(),
                    metadata,
                })
            }
        }

        deserializer.deserialize_seq(FramePayloadVisitor)
    }
}

/// The `sync` message payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub send_trigger: bool,
    pub trigger_time: f64,
    pub phase: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Frame { frame: FramePayload },
    Sync { sync: SyncPayload },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_message_round_trips_through_cbor() {
        let msg = Message::Frame {
            frame: FramePayload {
                height: 4,
                width: 4,
                dtype: PixelDtype::Uint8,
                data: (0u8..16).collect(),
                metadata: FrameMetadata::new(1.5),
            },
        };
        let bytes = serde_cbor::to_vec(&msg).unwrap();
        let decoded: Message = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn sync_message_round_trips_through_json() {
        let msg = Message::Sync {
            sync: SyncPayload {
                send_trigger: true,
                trigger_time: 12.5,
                phase: 1.2,
            },
        };
        let text = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, msg);
    }
}
