use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use swapbook_sdk::objects::{Envelope, WireObject};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use super::WireError;

/// Largest frame accepted from a peer.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(MAX_MESSAGE_SIZE)
        .new_codec()
}

/// Write one length-prefixed envelope and flush.
pub async fn write_envelope<W>(writer: &mut W, envelope: &Envelope) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = envelope.to_bytes().map_err(WireError::Encode)?;
    FramedWrite::new(writer, codec())
        .send(Bytes::from(bytes))
        .await?;
    Ok(())
}

/// Read one length-prefixed envelope.
///
/// `Ok(None)` means the peer closed the stream before sending anything. A
/// stream that ends mid-frame is an I/O error.
pub async fn read_envelope<R>(reader: &mut R) -> Result<Option<Envelope>, WireError>
where
    R: AsyncRead + Unpin,
{
    match FramedRead::new(reader, codec()).next().await {
        None => Ok(None),
        Some(Err(e)) => Err(WireError::Io(e)),
        Some(Ok(frame)) => Envelope::from_bytes(&frame)
            .map(Some)
            .map_err(WireError::Decode),
    }
}
