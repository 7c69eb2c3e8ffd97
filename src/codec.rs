//! Length-prefixed frame codec
//!
//! Every application message travels as
//! `length: u32 (big-endian) || payload: [u8; length]`.
//! [`FrameCodec`] plugs into `tokio_util::codec` (`FramedRead`,
//! `FramedWrite`, `Framed`) and knows nothing about what the payloads mean.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::error::FrameError;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default upper bound on a single inbound payload (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Reassembly state for one connection
///
/// The length prefix is consumed as soon as all four bytes are present;
/// the payload is handed out only once it is complete.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Payload length of the frame being assembled, once its prefix is read
    expected_len: Option<usize>,
    /// Largest inbound payload accepted
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with the given inbound payload size limit
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            expected_len: None,
            max_frame_size,
        }
    }

    /// Prefix a payload with its big-endian length
    ///
    /// # Errors
    /// [`FrameError::FrameTooLarge`] if the payload cannot be described by a
    /// 32-bit length.
    pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
        let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
        put_frame(payload, &mut frame)?;
        Ok(frame.to_vec())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Vec<u8>>, FrameError> {
        let len = match self.expected_len {
            Some(len) => len,
            None => {
                if src.len() < LENGTH_PREFIX_LEN {
                    src.reserve(LENGTH_PREFIX_LEN - src.len());
                    return Ok(None);
                }
                let len = src.get_u32() as usize;
                if len > self.max_frame_size {
                    return Err(FrameError::FrameTooLarge {
                        length: len,
                        max: self.max_frame_size,
                    });
                }
                self.expected_len = Some(len);
                len
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        self.expected_len = None;
        Ok(Some(src.split_to(len).to_vec()))
    }

    /// A stream ending mid-frame is an ordinary close; the tail is dropped
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Vec<u8>>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() || self.expected_len.is_some() {
            debug!("Stream closed mid-frame, discarding {} bytes", src.len());
            src.clear();
            self.expected_len = None;
        }
        Ok(None)
    }
}

impl Encoder<Vec<u8>> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Vec<u8>, dst: &mut BytesMut) -> Result<(), FrameError> {
        put_frame(&payload, dst)
    }
}

fn put_frame(payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::FrameTooLarge {
        length: payload.len(),
        max: u32::MAX as usize,
    })?;

    dst.reserve(LENGTH_PREFIX_LEN + payload.len());
    dst.put_u32(len);
    dst.extend_from_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Append `bytes` and drain every complete frame
    fn feed(codec: &mut FrameCodec, buf: &mut BytesMut, bytes: &[u8]) -> Vec<Vec<u8>> {
        buf.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_encode_prefix() {
        let frame = FrameCodec::encode_frame(b"hello").unwrap();
        assert_eq!(&frame[..4], &[0, 0, 0, 5]);
        assert_eq!(&frame[4..], b"hello");
    }

    #[test]
    fn test_encoder_matches_encode_frame() {
        let mut codec = FrameCodec::default();
        let mut dst = BytesMut::new();
        codec.encode(b"abc".to_vec(), &mut dst).unwrap();
        assert_eq!(&dst[..], &FrameCodec::encode_frame(b"abc").unwrap()[..]);
    }

    #[test]
    fn test_single_frame() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let frame = FrameCodec::encode_frame(br#"{"USERNAME":"bob"}"#).unwrap();

        let frames = feed(&mut codec, &mut buf, &frame);
        assert_eq!(frames, vec![br#"{"USERNAME":"bob"}"#.to_vec()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let payload = b"split across many reads".to_vec();
        let frame = FrameCodec::encode_frame(&payload).unwrap();

        let (last, head) = frame.split_last().unwrap();
        for byte in head {
            assert!(feed(&mut codec, &mut buf, &[*byte]).is_empty());
        }
        assert_eq!(feed(&mut codec, &mut buf, &[*last]), vec![payload]);
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let mut bytes = FrameCodec::encode_frame(b"first").unwrap();
        bytes.extend(FrameCodec::encode_frame(b"").unwrap());
        bytes.extend(FrameCodec::encode_frame(b"third").unwrap());
        // Start of a fourth frame that has not fully arrived
        bytes.extend_from_slice(&[0, 0]);

        let frames = feed(&mut codec, &mut buf, &bytes);
        assert_eq!(
            frames,
            vec![b"first".to_vec(), Vec::new(), b"third".to_vec()]
        );
        assert_eq!(buf.len(), 2);

        let frames = feed(&mut codec, &mut buf, &[0, 2, b'o', b'k']);
        assert_eq!(frames, vec![b"ok".to_vec()]);
    }

    #[test]
    fn test_empty_payload() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let frames = feed(&mut codec, &mut buf, &[0, 0, 0, 0]);
        assert_eq!(frames, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_no_partial_delivery() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let frame = FrameCodec::encode_frame(b"abcdef").unwrap();

        assert!(feed(&mut codec, &mut buf, &frame[..7]).is_empty());
        assert_eq!(
            feed(&mut codec, &mut buf, &frame[7..]),
            vec![b"abcdef".to_vec()]
        );
    }

    #[test]
    fn test_frame_too_large() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::from(&[0u8, 0, 0, 9][..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::FrameTooLarge { length: 9, max: 8 }
        ));
    }

    #[test]
    fn test_limit_is_inclusive() {
        let mut codec = FrameCodec::new(3);
        let mut buf = BytesMut::new();
        let frames = feed(
            &mut codec,
            &mut buf,
            &FrameCodec::encode_frame(b"abc").unwrap(),
        );
        assert_eq!(frames, vec![b"abc".to_vec()]);
    }

    #[test]
    fn test_eof_mid_frame_is_clean() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[0u8, 0, 0, 50, b'{'][..]);

        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }
}
