//! Conversions between the wire's `FramePayload` (raw, native-endian
//! bytes plus a dtype tag) and the core's typed [`optogate_core::PixelData`].

use optogate_core::frame::{Frame, PixelData};

use crate::message::{FrameMetadata, FramePayload, PixelDtype};

#[derive(thiserror::Error, Debug)]
pub enum PixelConversionError {
    #[error("pixel byte length {got} does not match {expected} expected for {height}x{width} {dtype:?}")]
    LengthMismatch {
        height: usize,
        width: usize,
        dtype: PixelDtype,
        expected: usize,
        got: usize,
    },
}

pub fn payload_to_frame(payload: &FramePayload) -> Result<Frame, PixelConversionError> {
    let n = payload.height * payload.width;
    let expected_bytes = n * payload.dtype.bytes_per_pixel();
    if payload.data.len() != expected_bytes {
        return Err(PixelConversionError::LengthMismatch {
            height: payload.height,
            width: payload.width,
            dtype: payload.dtype,
            expected: expected_bytes,
            got: payload.data.len(),
        });
    }

    let pixels = match payload.dtype {
        PixelDtype::Uint8 => PixelData::Mono8(payload.data.clone()),
        PixelDtype::Uint16 => {
            let values = payload
                .data
                .chunks_exact(2)
                .map(|chunk| u16::from_ne_bytes([chunk[0], chunk[1]]))
                .collect();
            PixelData::Mono16(values)
        }
    };

    Ok(Frame::new(
        payload.height,
        payload.width,
        pixels,
        payload.metadata.timestamp,
    ))
}

pub fn frame_to_payload(frame: &Frame) -> FramePayload {
    let (dtype, data) = match &frame.pixels {
        PixelData::Mono8(d) => (PixelDtype::Uint8, d.clone()),
        PixelData::Mono16(d) => {
            let mut bytes = Vec::with_capacity(d.len() * 2);
            for v in d {
                bytes.extend_from_slice(&v.to_ne_bytes());
            }
            (PixelDtype::Uint16, bytes)
        }
    };
    FramePayload {
        height: frame.height,
        width: frame.width,
        dtype,
        data,
        metadata: FrameMetadata::new(frame.timestamp_s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mono8_frame() {
        let payload = FramePayload {
            height: 2,
            width: 2,
            dtype: PixelDtype::Uint8,
            data: vec![1, 2, 3, 4],
            metadata: FrameMetadata::new(1.0),
        };
        let frame = payload_to_frame(&payload).unwrap();
        let back = frame_to_payload(&frame);
        assert_eq!(back, payload);
    }

    #[test]
    fn rejects_mismatched_byte_length() {
        let payload = FramePayload {
            height: 2,
            width: 2,
            dtype: PixelDtype::Uint16,
            data: vec![1, 2, 3],
            metadata: FrameMetadata::new(1.0),
        };
        assert!(payload_to_frame(&payload).is_err());
    }
}
