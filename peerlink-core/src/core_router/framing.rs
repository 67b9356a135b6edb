//! Length-prefixed framing
//!
//! One frame is an unsigned-varint length prefix followed by that many bytes
//! of payload, the format used by the overlay's stream helpers on the wire.
//! Every protocol exchange is exactly one frame per direction.

use super::ProtocolError;
use crate::metrics::FRAMES_REJECTED_TOTAL;
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use metrics::counter;
use unsigned_varint::io::ReadError;

/// Upper bound on a single frame payload (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Read exactly one frame from the stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let len = unsigned_varint::aio::read_usize(&mut *reader)
        .await
        .map_err(|e| match e {
            ReadError::Io(io) => ProtocolError::Io(io),
            other => ProtocolError::InvalidLengthPrefix(other.to_string()),
        })?;

    if len > MAX_FRAME_SIZE {
        counter!(FRAMES_REJECTED_TOTAL, "reason" => "oversized").increment(1);
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write one frame to the stream and flush it.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            limit: MAX_FRAME_SIZE,
        });
    }

    let mut len_buf = unsigned_varint::encode::usize_buffer();
    writer
        .write_all(unsigned_varint::encode::usize(payload.len(), &mut len_buf))
        .await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use proptest::prelude::*;

    async fn round_trip(payload: &[u8]) -> Vec<u8> {
        let mut wire = Vec::new();
        write_frame(&mut wire, payload).await.unwrap();
        read_frame(&mut Cursor::new(wire)).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_frame_round_trip() {
        assert_eq!(round_trip(b"").await, b"");
    }

    #[tokio::test]
    async fn test_multibyte_length_prefix() {
        // 300 bytes needs a two-byte varint prefix.
        let payload = vec![7u8; 300];
        assert_eq!(round_trip(&payload).await, payload);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected_without_reading_payload() {
        let mut wire = Vec::new();
        let mut len_buf = unsigned_varint::encode::usize_buffer();
        wire.extend_from_slice(unsigned_varint::encode::usize(
            MAX_FRAME_SIZE + 1,
            &mut len_buf,
        ));

        let err = read_frame(&mut Cursor::new(wire)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_oversized_write_is_rejected() {
        let payload = vec![0u8; MAX_FRAME_SIZE + 1];
        let mut wire = Vec::new();
        let err = write_frame(&mut wire, &payload).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
        assert!(wire.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_payload_is_an_io_error() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"hello world").await.unwrap();
        wire.truncate(wire.len() - 4);

        let err = read_frame(&mut Cursor::new(wire)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }

    proptest! {
        #[test]
        fn prop_frame_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let decoded = futures::executor::block_on(async {
                let mut wire = Vec::new();
                write_frame(&mut wire, &payload).await.unwrap();
                read_frame(&mut Cursor::new(wire)).await.unwrap()
            });
            prop_assert_eq!(decoded, payload);
        }

        #[test]
        fn prop_json_envelope_round_trip(
            path in "/[a-z]{1,12}",
            n in any::<i64>(),
            text in "\\PC{0,64}",
        ) {
            let envelope = serde_json::json!({ "path": path, "body": { "n": n, "text": text } });
            let bytes = serde_json::to_vec(&envelope).unwrap();

            let decoded = futures::executor::block_on(async {
                let mut wire = Vec::new();
                write_frame(&mut wire, &bytes).await.unwrap();
                read_frame(&mut Cursor::new(wire)).await.unwrap()
            });
            let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
            prop_assert_eq!(value, envelope);
        }
    }
}
