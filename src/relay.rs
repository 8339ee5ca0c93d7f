//! Bidirectional relay with traffic accounting
//!
//! One task per direction: the caller copies `a` into `b` inline while a
//! spawned task copies `b` into `a`. Whichever direction ends first, by
//! end-of-stream or error, shuts down the write side it was feeding so
//! the peer observes end-of-stream promptly. Counts are reported only
//! after both directions have drained.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Buffer size for one copy pass (32KB)
const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// Byte counts for one finished relay session
#[derive(Debug, Clone, Copy)]
pub struct RelayResult {
    /// Bytes forwarded from the first stream into the second
    pub tx: u64,
    /// Bytes forwarded from the second stream into the first
    pub rx: u64,
}

/// Copy bytes between two duplex streams until both directions end.
///
/// There is no timeout: a silent peer holds the session open until one
/// side closes. A broken pipe on either side ends the whole session.
pub async fn relay<A, B>(a: A, b: B) -> RelayResult
where
    A: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    B: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut a_reader, mut a_writer) = tokio::io::split(a);
    let (mut b_reader, mut b_writer) = tokio::io::split(b);

    let reverse = tokio::spawn(async move { copy_half(&mut b_reader, &mut a_writer).await });

    let tx = copy_half(&mut a_reader, &mut b_writer).await;
    let rx = reverse.await.unwrap_or(0);

    RelayResult { tx, rx }
}

/// Copy one direction until end-of-stream or error, then close the
/// destination's write side. Returns the bytes forwarded.
async fn copy_half<R, W>(reader: &mut R, writer: &mut W) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(RELAY_BUFFER_SIZE);
    buf.resize(RELAY_BUFFER_SIZE, 0);
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        if writer.write_all(&buf[..n]).await.is_err() {
            break;
        }
        if writer.flush().await.is_err() {
            break;
        }
        total += n as u64;
    }

    let _ = writer.shutdown().await;
    total
}
