//! Optional read deadlines.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;

fn timed_out(limit: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("no data from peer for {limit:?}"),
    )
}

/// Runs `fut`, failing with [`io::ErrorKind::TimedOut`] if `limit` elapses first.
pub(crate) async fn within<T, E>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, E>
where
    E: From<io::Error>,
{
    let Some(limit) = limit else {
        return fut.await;
    };
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(timed_out(limit).into()),
    }
}

/// A reader whose every read must make progress within `limit`.
///
/// The clock starts when a read would block and is cleared each time a read
/// completes, so a slow but steady peer never trips it.
#[derive(Debug)]
pub(crate) struct Timed<'a, R> {
    inner: &'a mut R,
    limit: Option<Duration>,
    timer: Option<Pin<Box<Sleep>>>,
}

impl<'a, R> Timed<'a, R> {
    pub(crate) const fn new(inner: &'a mut R, limit: Option<Duration>) -> Self {
        Self {
            inner,
            limit,
            timer: None,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Timed<'_, R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Poll::Ready(result) = Pin::new(&mut *this.inner).poll_read(cx, buf) {
            this.timer = None;
            return Poll::Ready(result);
        }
        let Some(limit) = this.limit else {
            return Poll::Pending;
        };
        let timer = this
            .timer
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(limit)));
        match timer.as_mut().poll(cx) {
            Poll::Ready(()) => {
                this.timer = None;
                Poll::Ready(Err(timed_out(limit)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
