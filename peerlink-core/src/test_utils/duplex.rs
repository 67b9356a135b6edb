//! In-memory bidirectional byte stream
//!
//! A pair of connected streams implementing the futures IO traits, standing in
//! for a transport stream in protocol tests.

use futures::{AsyncRead, AsyncWrite};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

#[derive(Default)]
struct Pipe {
    buffer: VecDeque<u8>,
    closed: bool,
    reader: Option<Waker>,
}

impl Pipe {
    fn wake_reader(&mut self) {
        if let Some(waker) = self.reader.take() {
            waker.wake();
        }
    }
}

/// One end of an in-memory duplex connection
pub struct DuplexStream {
    read: Arc<Mutex<Pipe>>,
    write: Arc<Mutex<Pipe>>,
}

/// Create a connected pair of duplex streams
pub fn duplex_pair() -> (DuplexStream, DuplexStream) {
    let a = Arc::new(Mutex::new(Pipe::default()));
    let b = Arc::new(Mutex::new(Pipe::default()));
    (
        DuplexStream {
            read: a.clone(),
            write: b.clone(),
        },
        DuplexStream { read: b, write: a },
    )
}

impl AsyncRead for DuplexStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let mut pipe = self.read.lock().expect("lock poisoned");
        if pipe.buffer.is_empty() {
            if pipe.closed {
                return Poll::Ready(Ok(0));
            }
            pipe.reader = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let n = buf.len().min(pipe.buffer.len());
        for slot in buf.iter_mut().take(n) {
            *slot = pipe.buffer.pop_front().expect("length checked");
        }
        Poll::Ready(Ok(n))
    }
}

impl AsyncWrite for DuplexStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut pipe = self.write.lock().expect("lock poisoned");
        if pipe.closed {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        pipe.buffer.extend(buf);
        pipe.wake_reader();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut pipe = self.write.lock().expect("lock poisoned");
        pipe.closed = true;
        pipe.wake_reader();
        Poll::Ready(Ok(()))
    }
}

impl Drop for DuplexStream {
    fn drop(&mut self) {
        if let Ok(mut pipe) = self.write.lock() {
            pipe.closed = true;
            pipe.wake_reader();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_bytes_cross_the_pair() {
        let (mut a, mut b) = duplex_pair();
        a.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        b.write_all(b"pong").await.unwrap();
        a.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_close_wakes_pending_reader() {
        let (mut a, b) = duplex_pair();
        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 1];
            a.read(&mut buf).await
        });

        drop(b);
        assert_eq!(reader.await.unwrap().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_after_peer_close_fails() {
        let (a, mut b) = duplex_pair();
        drop(a);
        assert!(b.write_all(b"x").await.is_err());
    }
}
