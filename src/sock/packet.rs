//! The buffer record queued by the receive and transmit engines.
use crate::driver::{RxBuffer, TxDatagram};

/// One queued datagram.
///
/// The two variants differ in who owns the underlying storage and therefore in how the record is
/// released: a borrowed buffer goes back to the driver of the port it arrived on, an owned
/// datagram is simply dropped (or consumed by a transmit operation).
#[derive(Debug)]
pub(crate) enum Packet {
    /// A received datagram borrowing the driver's buffer.
    Borrowed {
        /// Index of the port the buffer was received on, for recycling.
        port: usize,
        /// The driver's buffer.
        buffer: RxBuffer,
    },
    /// An outbound datagram with locally owned storage.
    Owned {
        /// The datagram waiting for a free transmit slot.
        datagram: TxDatagram,
    },
}

impl Packet {
    /// The number of bytes this record accounts for.
    ///
    /// Received datagrams count header plus payload, outbound datagrams their payload.
    pub(crate) fn buffered_len(&self) -> usize {
        match self {
            Packet::Borrowed { buffer, .. } => buffer.total_len(),
            Packet::Owned { datagram } => datagram.len(),
        }
    }

    /// View the borrowed receive buffer, if this is a received datagram.
    pub(crate) fn rx_buffer(&self) -> Option<&RxBuffer> {
        match self {
            Packet::Borrowed { buffer, .. } => Some(buffer),
            Packet::Owned { .. } => None,
        }
    }

    /// Take the record apart into port index and receive buffer.
    pub(crate) fn into_borrowed(self) -> Option<(usize, RxBuffer)> {
        match self {
            Packet::Borrowed { port, buffer } => Some((port, buffer)),
            Packet::Owned { .. } => None,
        }
    }

    /// Take the record apart into the owned datagram.
    pub(crate) fn into_owned(self) -> Option<TxDatagram> {
        match self {
            Packet::Borrowed { .. } => None,
            Packet::Owned { datagram } => Some(datagram),
        }
    }
}
