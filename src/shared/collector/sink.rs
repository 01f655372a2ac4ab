use crate::shared::error::CollectionError;
use log::{error, warn};
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_SINK_CAPACITY: usize = 10;

/// Producer side of the collection error conduit. Cheap to clone, one per
/// attempt.
#[derive(Clone, Debug)]
pub struct ErrorSink {
    tx: mpsc::Sender<CollectionError>,
}

/// Consumer side. Only ever logs what it receives.
#[derive(Debug)]
pub struct ErrorReceiver {
    rx: mpsc::Receiver<CollectionError>,
}

pub fn error_channel(capacity: usize) -> (ErrorSink, ErrorReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ErrorSink { tx }, ErrorReceiver { rx })
}

impl ErrorSink {
    /// Never waits. Returns `false` when the error was dropped because the
    /// conduit is full or the receiver is gone.
    pub fn report(&self, err: CollectionError) -> bool {
        match self.tx.try_send(err) {
            Ok(()) => true,
            Err(TrySendError::Full(err)) => {
                warn!("Error sink full, dropping {} error: {}", err.stage(), err);
                false
            }
            Err(TrySendError::Closed(err)) => {
                warn!("Error sink closed, dropping {} error: {}", err.stage(), err);
                false
            }
        }
    }
}

impl ErrorReceiver {
    /// Waits for the next error; `None` once every sink has been dropped.
    pub async fn recv(&mut self) -> Option<CollectionError> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<CollectionError> {
        self.rx.try_recv().ok()
    }

    /// Logs whatever is already queued and returns how many errors that was.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Some(err) = self.try_recv() {
            log_collection_error(&err);
            drained += 1;
        }
        drained
    }
}

pub(crate) fn log_collection_error(err: &CollectionError) {
    error!("Metrics collection error [{}]: {}", err.stage(), err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::{CollectionStage, SampleError};

    fn cpu_error() -> CollectionError {
        CollectionError::CpuRead(SampleError::SystemApi("unavailable".into()))
    }

    #[test]
    fn full_sink_drops_instead_of_blocking() {
        let (sink, mut rx) = error_channel(2);

        assert!(sink.report(cpu_error()));
        assert!(sink.report(cpu_error()));
        assert!(!sink.report(cpu_error()));

        assert_eq!(rx.drain(), 2);
        assert!(sink.report(cpu_error()));
    }

    #[test]
    fn closed_sink_drops() {
        let (sink, rx) = error_channel(DEFAULT_SINK_CAPACITY);
        drop(rx);
        assert!(!sink.report(cpu_error()));
    }

    #[tokio::test]
    async fn receiver_sees_errors_from_every_clone() {
        let (sink, mut rx) = error_channel(DEFAULT_SINK_CAPACITY);
        let other = sink.clone();

        sink.report(cpu_error());
        other.report(CollectionError::MemRead(SampleError::SystemApi("x".into())));
        drop(sink);
        drop(other);

        assert_eq!(rx.recv().await.map(|e| e.stage()), Some(CollectionStage::CpuRead));
        assert_eq!(rx.recv().await.map(|e| e.stage()), Some(CollectionStage::MemRead));
        assert!(rx.recv().await.is_none());
    }
}
