//! Pieces shared by every link: what the reader forwards, how frames are
//! written and how the reader is stopped.

use pumplink_protocol::{OutboundFrame, RawFrame};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Result;

/// Capacity of the reader-to-session frame queue.
pub(crate) const INBOUND_QUEUE_SIZE: usize = 64;

/// What the reader activity forwards to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkInput {
    Frame(RawFrame),
    /// The line failed; the reader has stopped.
    Fault(String),
    /// The far end closed the line; the reader has stopped.
    Eof,
}

/// Write side of a link.
///
/// **NOTE**: not object-safe (returns `impl Future`); sessions are generic
/// over the writer. Implementations may use `async fn`.
pub trait FrameWriter: Send {
    /// Write one frame completely.
    fn write_frame(&mut self, frame: &OutboundFrame) -> impl Future<Output = Result<()>> + Send;
}

/// Stops the reader activity. Stopping twice is a no-op.
#[derive(Debug)]
pub enum ReaderHandle {
    /// Blocking reader thread polling a stop flag between timed reads.
    Thread {
        stop: Arc<AtomicBool>,
        join: Option<std::thread::JoinHandle<()>>,
    },
    Task(tokio::task::JoinHandle<()>),
}

impl ReaderHandle {
    pub fn thread(stop: Arc<AtomicBool>, join: std::thread::JoinHandle<()>) -> Self {
        ReaderHandle::Thread {
            stop,
            join: Some(join),
        }
    }

    /// Signal the reader without waiting for it.
    pub fn stop(&mut self) {
        match self {
            // the thread exits within one read timeout
            ReaderHandle::Thread { stop, .. } => {
                if !stop.swap(true, Ordering::SeqCst) {
                    debug!("reader thread signalled");
                }
            }
            ReaderHandle::Task(task) => {
                if !task.is_finished() {
                    debug!("reader task aborted");
                }
                task.abort();
            }
        }
    }

    /// Stop the reader and wait until it has released the line.
    pub async fn shutdown(mut self) {
        self.stop();
        match self {
            ReaderHandle::Thread { join, .. } => {
                if let Some(join) = join {
                    let _ = tokio::task::spawn_blocking(move || join.join()).await;
                }
            }
            ReaderHandle::Task(task) => {
                let _ = task.await;
            }
        }
    }
}

/// An open link: writer, inbound queue and the reader's stop handle.
pub struct Link<W> {
    pub writer: W,
    pub inbound: mpsc::Receiver<LinkInput>,
    pub reader: ReaderHandle,
}

impl<W: FrameWriter> Link<W> {
    pub fn new(writer: W, inbound: mpsc::Receiver<LinkInput>, reader: ReaderHandle) -> Self {
        Self {
            writer,
            inbound,
            reader,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_reader_stop_is_idempotent() {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let join = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        });
        let mut handle = ReaderHandle::thread(Arc::clone(&stop), join);
        handle.stop();
        handle.stop();
        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_thread_reader_shutdown_joins() {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let done = Arc::new(AtomicBool::new(false));
        let exited = Arc::clone(&done);
        let join = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            exited.store(true, Ordering::SeqCst);
        });
        ReaderHandle::thread(stop, join).shutdown().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_task_reader_stop() {
        let task = tokio::spawn(std::future::pending::<()>());
        let mut handle = ReaderHandle::Task(task);
        handle.stop();
        handle.stop();
        if let ReaderHandle::Task(task) = handle {
            assert!(task.await.unwrap_err().is_cancelled());
        }
    }

    #[tokio::test]
    async fn test_task_reader_shutdown() {
        let task = tokio::spawn(std::future::pending::<()>());
        ReaderHandle::Task(task).shutdown().await;
    }
}
