use std::sync::mpsc::{channel, Receiver, Sender};

use thiserror::Error;

use crate::messages::sample::DataSample;

/// Errors that can occur at the transport boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The remote end of the transport has gone away.
    #[error("transport endpoint disconnected")]
    Disconnected,
}

/// Inbound half of the transport abstraction. Implementations decode
/// whatever is on the wire into [`DataSample`]s; the runtime never sees
/// bytes.
pub trait DataReader: Send {
    /// Drains every sample that has arrived since the previous call.
    fn take_samples(&mut self) -> Vec<DataSample>;
}

/// Outbound half of the transport abstraction.
pub trait DataWriter: Send {
    fn write(&mut self, sample: DataSample) -> Result<(), TransportError>;
}

/// In-memory transport endpoint pair, for tests and single-process
/// loopback topologies.
pub fn memory_channel() -> (MemoryWriter, MemoryReader) {
    let (sender, receiver) = channel();
    (
        MemoryWriter {
            sender: Some(sender),
        },
        MemoryReader { receiver },
    )
}

#[derive(Clone)]
pub struct MemoryWriter {
    sender: Option<Sender<DataSample>>,
}

impl MemoryWriter {
    /// Drops the sending half so the paired reader observes disconnection.
    pub fn close(&mut self) {
        self.sender = None;
    }
}

impl DataWriter for MemoryWriter {
    fn write(&mut self, sample: DataSample) -> Result<(), TransportError> {
        let Some(sender) = &self.sender else {
            return Err(TransportError::Disconnected);
        };
        sender
            .send(sample)
            .map_err(|_| TransportError::Disconnected)
    }
}

pub struct MemoryReader {
    receiver: Receiver<DataSample>,
}

impl DataReader for MemoryReader {
    fn take_samples(&mut self) -> Vec<DataSample> {
        self.receiver.try_iter().collect()
    }
}
