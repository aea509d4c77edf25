//! Frame-at-a-time message codec. Encoding is picked once, at session
//! construction (`MessageCodec::cbor()` or `MessageCodec::json()`),
//! rather than read from a global flag checked on every call.

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Cbor,
    /// Newline-delimited JSON, for human-readable debugging sessions.
    Json,
}

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("cbor error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct MessageCodec {
    encoding: Encoding,
    buffered_results: VecDeque<Message>,
}

impl MessageCodec {
    pub fn cbor() -> Self {
        Self {
            encoding: Encoding::Cbor,
            buffered_results: VecDeque::new(),
        }
    }

    pub fn json() -> Self {
        Self {
            encoding: Encoding::Json,
            buffered_results: VecDeque::new(),
        }
    }

    fn decode_cbor(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        let available = buf.split();
        let deserializer = serde_cbor::Deserializer::from_slice(&available[..]);
        let decoded: Result<Vec<Message>, serde_cbor::Error> =
            deserializer.into_iter().collect();
        self.buffered_results.extend(decoded?);
        Ok(self.buffered_results.pop_front())
    }

    fn decode_json(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        let Some(newline) = buf.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let line = buf.split_to(newline + 1);
        let text = std::str::from_utf8(&line[..line.len() - 1])
            .map_err(|e| CodecError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        let message: Message = serde_json::from_str(text)?;
        Ok(Some(message))
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        match self.encoding {
            Encoding::Cbor => self.decode_cbor(buf),
            Encoding::Json => self.decode_json(buf),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dest: &mut BytesMut) -> Result<(), CodecError> {
        match self.encoding {
            Encoding::Cbor => {
                let bytes = serde_cbor::to_vec(&item)?;
                dest.extend(bytes);
            }
            Encoding::Json => {
                let mut bytes = serde_json::to_vec(&item)?;
                bytes.push(b'\n');
                dest.extend(bytes);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FrameMetadata, FramePayload, PixelDtype, SyncPayload};
    use bytes::BufMut;

    fn test_frame_message(timestamp: f64) -> Message {
        Message::Frame {
            frame: FramePayload {
                height: 2,
                width: 2,
                dtype: PixelDtype::Uint8,
                data: vec![1, 2, 3, 4],
                metadata: FrameMetadata::new(timestamp),
            },
        }
    }

    #[test]
    fn cbor_decoder_pops_multiple_messages_from_one_buffer() {
        let m1 = test_frame_message(1.0);
        let m2 = test_frame_message(2.0);

        let mut codec = MessageCodec::cbor();
        let mut buf = BytesMut::new();
        buf.put_slice(&serde_cbor::to_vec(&m1).unwrap());
        buf.put_slice(&serde_cbor::to_vec(&m2).unwrap());

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), m1);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), m2);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn cbor_round_trip_through_encode_decode() {
        let msg = Message::Sync {
            sync: SyncPayload {
                send_trigger: false,
                trigger_time: 0.0,
                phase: 0.3,
            },
        };
        let mut codec = MessageCodec::cbor();
        let mut buf = BytesMut::new();
        codec.encode(msg.clone(), &mut buf).unwrap();
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), msg);
    }

    #[test]
    fn json_codec_is_newline_delimited() {
        let msg = test_frame_message(3.0);
        let mut codec = MessageCodec::json();
        let mut buf = BytesMut::new();
        codec.encode(msg.clone(), &mut buf).unwrap();
        assert!(buf.ends_with(b"\n"));
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), msg);
    }
}
