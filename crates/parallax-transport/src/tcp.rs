//! TCP frame I/O
//!
//! Sending is blocking from the caller's point of view: `write_all` retries
//! partial writes until the frame is flushed or the socket reports closed.
//! Receiving blocks until a full frame is available; EOF and I/O errors
//! both surface as `ConnectionLost`, which is the expected signal for peer
//! departure and the only sanctioned way the receive loop terminates.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use parallax_core::{ParallaxError, ParallaxResult};
use parallax_wire::{WireFrame, FRAME_HEADER_SIZE};

use crate::IngressSender;

/// What the receive loop pushes onto the ingress queue
#[derive(Debug)]
pub enum TransportEvent {
    /// One validated frame, in receipt order
    Frame(WireFrame),
    /// The connection is gone; no further events follow
    Closed(ParallaxError),
}

/// Connect to a session hub
pub async fn connect(addr: SocketAddr) -> ParallaxResult<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| ParallaxError::Transport(e.to_string()))?;
    stream
        .set_nodelay(true)
        .map_err(|e| ParallaxError::Transport(e.to_string()))?;
    Ok(stream)
}

/// Bind the hub's listening socket
pub async fn listen(addr: SocketAddr) -> ParallaxResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| ParallaxError::Transport(e.to_string()))
}

/// Write one frame, retrying partial writes until flushed
pub async fn send_frame<W>(writer: &mut W, frame: &WireFrame) -> ParallaxResult<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = frame.encode()?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|_| ParallaxError::ConnectionLost)?;
    Ok(())
}

/// Read exactly one frame, blocking until it is complete
pub async fn read_frame<R>(reader: &mut R) -> ParallaxResult<WireFrame>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|_| ParallaxError::ConnectionLost)?;

    let (message_type, length) = WireFrame::parse_header(&header)?;

    let mut payload = vec![0u8; length];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|_| ParallaxError::ConnectionLost)?;

    Ok(WireFrame::new(message_type, payload))
}

/// Spawn the per-connection receive loop
///
/// Reads frames until the socket closes or a framing error occurs, pushing
/// each onto the ingress queue in receipt order, then a final
/// [`TransportEvent::Closed`]. Dropping the consumer half stops the loop
/// on its next push.
pub fn start_receive_loop<R>(mut reader: R, tx: IngressSender<TransportEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(frame) => {
                    if !tx.push(TransportEvent::Frame(frame)) {
                        break; // Consumer dropped
                    }
                }
                Err(e) => {
                    if !matches!(e, ParallaxError::ConnectionLost) {
                        tracing::warn!("receive loop ending on framing error: {e}");
                    }
                    tx.push(TransportEvent::Closed(e));
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress_channel;
    use parallax_core::MessageType;

    #[tokio::test]
    async fn test_frame_over_tcp() {
        let listener = listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = connect(addr).await.unwrap();
            let frame = WireFrame::new(MessageType::Data, vec![1, 2, 3]);
            send_frame(&mut stream, &frame).await.unwrap();
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let frame = read_frame(&mut stream).await.unwrap();
        assert_eq!(frame.message_type, MessageType::Data);
        assert_eq!(frame.payload, vec![1, 2, 3]);

        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_is_connection_lost() {
        let listener = listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let stream = connect(addr).await.unwrap();
            drop(stream);
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        client.await.unwrap();

        let err = read_frame(&mut stream).await.unwrap_err();
        assert!(matches!(err, ParallaxError::ConnectionLost));
    }

    #[tokio::test]
    async fn test_receive_loop_pushes_then_closes() {
        let listener = listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = connect(addr).await.unwrap();
            for i in 0..3u8 {
                let frame = WireFrame::new(MessageType::Data, vec![i]);
                send_frame(&mut stream, &frame).await.unwrap();
            }
        });

        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, _write_half) = stream.into_split();

        let (tx, mut rx) = ingress_channel();
        let handle = start_receive_loop(read_half, tx);

        for i in 0..3u8 {
            match rx.pop_async().await.unwrap() {
                TransportEvent::Frame(frame) => assert_eq!(frame.payload, vec![i]),
                other => panic!("unexpected event: {other:?}"),
            }
        }

        client.await.unwrap();
        match rx.pop_async().await.unwrap() {
            TransportEvent::Closed(ParallaxError::ConnectionLost) => {}
            other => panic!("unexpected event: {other:?}"),
        }

        handle.await.unwrap();
        assert!(matches!(
            rx.pop_async().await,
            Err(ParallaxError::QueueClosed)
        ));
    }
}
