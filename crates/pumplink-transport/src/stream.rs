//! Link over any async byte stream: a TCP serial bridge, a pty, or an
//! in-memory duplex in tests.

use futures::{SinkExt, StreamExt};
use pumplink_protocol::{OutboundFrame, PumpCodec};
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::link::{FrameWriter, INBOUND_QUEUE_SIZE, Link, LinkInput, ReaderHandle};

pub struct StreamWriter<S> {
    framed: FramedWrite<WriteHalf<S>, PumpCodec>,
}

impl<S: AsyncWrite + Send> FrameWriter for StreamWriter<S> {
    async fn write_frame(&mut self, frame: &OutboundFrame) -> Result<()> {
        self.framed.send(frame.clone()).await?;
        Ok(())
    }
}

/// Split `stream` and spawn its reader task on the current runtime.
pub fn connect_stream<S>(stream: S) -> Link<StreamWriter<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (tx, rx) = mpsc::channel(INBOUND_QUEUE_SIZE);

    let task = tokio::spawn(async move {
        let mut frames = FramedRead::new(read_half, PumpCodec::new());
        loop {
            let input = match frames.next().await {
                Some(Ok(frame)) => LinkInput::Frame(frame),
                // a codec error ends the FramedRead stream
                Some(Err(err)) => {
                    error!(error = %err, "stream read failed");
                    LinkInput::Fault(err.to_string())
                }
                None => {
                    info!("stream closed by peer");
                    LinkInput::Eof
                }
            };
            let last = !matches!(input, LinkInput::Frame(_));
            if tx.send(input).await.is_err() || last {
                break;
            }
        }
        debug!("stream reader stopped");
    });

    Link::new(
        StreamWriter {
            framed: FramedWrite::new(write_half, PumpCodec::new()),
        },
        rx,
        ReaderHandle::Task(task),
    )
}
