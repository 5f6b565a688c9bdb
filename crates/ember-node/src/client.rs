//! Interactive line client: stdin lines out as frames, frames in as lines.

use bytes::Bytes;
use ember_protocol::FrameCodec;
use futures::{SinkExt, Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};

/// Connect to `addr`, send each of `lines` to the relay as a frame and write
/// every received frame to `output` as a line. Returns when either side closes.
pub async fn run<S, W>(addr: &str, mut lines: S, mut output: W) -> anyhow::Result<()>
where
    S: Stream<Item = std::io::Result<String>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to {addr}: {e}"))?;
    tracing::info!(%addr, "client: connected");

    let (read_half, write_half) = stream.into_split();
    let mut incoming = FramedRead::new(read_half, FrameCodec);
    let mut outgoing = FramedWrite::new(write_half, FrameCodec);

    loop {
        tokio::select! {
            frame = incoming.next() => match frame {
                Some(Ok(payload)) => {
                    output.write_all(&payload).await?;
                    output.write_all(b"\n").await?;
                    output.flush().await?;
                }
                Some(Err(e)) => {
                    tracing::warn!("client: lost connection to server: {e}");
                    break;
                }
                None => {
                    tracing::warn!("client: server closed the connection");
                    break;
                }
            },
            line = lines.next() => match line.transpose()? {
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    outgoing.send(Bytes::copy_from_slice(line.as_bytes())).await?;
                }
                None => {
                    tracing::info!("client: input closed");
                    break;
                }
            },
        }
    }

    Ok(())
}
