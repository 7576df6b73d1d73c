//! The raw datagram socket layer.
//!
//! ## Binding
//!
//! A socket binds to every registered adapter service that can produce a protocol driver
//! instance, one [`Port`] per adapter. A wildcard local address binds all adapters with their
//! default station address; a specific address restricts delivery to the matching adapter.
//! The expensive driver-level configuration is deferred until the first actual I/O call, since
//! bind and connect may be retried or replaced before any traffic flows.
//!
//! ## The receive engine
//!
//! Each port keeps a single receive operation posted to its driver. A completion queues the
//! driver's buffer, without copying it, to the socket's receive FIFO and posts the next receive,
//! unless the buffered bytes have reached the socket's high-water mark. By not reposting, the
//! engine applies flow control; a later [`Socket::receive`] call that drains the queue below the
//! mark posts the receive again. Receive failures are latched as a sticky error that the next
//! `receive` call on an empty queue reports and clears.
//!
//! ## The transmit engine
//!
//! [`Socket::send`] copies the payload into an owned datagram, appends it to the transmit FIFO
//! and pumps queued datagrams onto the port's free transmit slots. Completions free their slot
//! and pump the next datagram. A failed completion is latched and surfaces on the next send
//! attempt, which discards its datagram and clears the latch so that later sends may succeed.
//!
//! ## Synchronization
//!
//! Completions are only dispatched from [`Socket::poll`], which takes `&mut self` like every
//! other operation. The exclusive borrow is the critical section: no completion can interleave
//! with an application call, so the engines never observe half-updated queues. Callers that
//! share a socket between threads wrap it in a lock of their own choosing.
//!
//! [`Port`]: struct.Port.html
//! [`Socket::receive`]: struct.Socket.html#method.receive
//! [`Socket::send`]: struct.Socket.html#method.send
//! [`Socket::poll`]: struct.Socket.html#method.poll
use core::fmt;

use crate::driver;

mod packet;
mod port;
mod registry;
mod socket;
#[cfg(test)]
mod tests;

pub use port::{Port, PortState, TX_SLOTS};
pub use registry::Registry;
pub use socket::{Socket, State, DEFAULT_MAX_RX_BYTES, DEFAULT_MAX_TX_BYTES};

pub(crate) use packet::Packet;

/// A result type for socket operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported to the application, in BSD errno terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The adapter refused the configuration (`EACCES`).
    AccessDenied,
    /// No adapter service could provide the requested local address (`EADDRNOTAVAIL`).
    AddressNotAvailable,
    /// The adapter has no mapping for the address family (`EAFNOSUPPORT`).
    AddressFamilyUnsupported,
    /// The destination host is unreachable (`EHOSTUNREACH`).
    HostUnreachable,
    /// A device or I/O level failure (`EIO`).
    Io,
    /// The destination network is unreachable (`ENETUNREACH`).
    NetworkUnreachable,
    /// The driver ran out of buffer space (`ENOBUFS`).
    NoBufferSpace,
    /// No protocol option of the requested kind is available (`ENOPROTOOPT`).
    NoProtocolOption,
    /// The socket is not bound and configured (`ENOTCONN`).
    NotConnected,
    /// The operation or option is not supported (`EOPNOTSUPP`).
    NotSupported,
    /// Allocation of a packet failed (`ENOMEM`).
    OutOfMemory,
    /// The destination protocol is not supported (`EPROTONOSUPPORT`).
    ProtocolNotSupported,
    /// No data ready or no buffer space; retry later (`EAGAIN`).
    WouldBlock,
}

impl Error {
    /// Map a driver status reported by `configure` onto a socket error.
    pub(crate) fn from_configure(error: driver::Error) -> Self {
        match error {
            driver::Error::AccessDenied => Error::AccessDenied,
            driver::Error::InvalidParameter => Error::AddressNotAvailable,
            driver::Error::NoMapping => Error::AddressFamilyUnsupported,
            driver::Error::OutOfResources => Error::NoBufferSpace,
            driver::Error::Unsupported => Error::NotSupported,
            _ => Error::Io,
        }
    }

    /// Map a latched completion status onto a socket error.
    pub(crate) fn from_completion(error: driver::Error) -> Self {
        match error {
            driver::Error::HostUnreachable => Error::HostUnreachable,
            driver::Error::NetworkUnreachable => Error::NetworkUnreachable,
            driver::Error::PortUnreachable => Error::ProtocolNotSupported,
            driver::Error::ProtocolUnreachable => Error::NoProtocolOption,
            _ => Error::Io,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            Error::AccessDenied => "access denied",
            Error::AddressNotAvailable => "address not available",
            Error::AddressFamilyUnsupported => "address family not supported",
            Error::HostUnreachable => "host unreachable",
            Error::Io => "input/output error",
            Error::NetworkUnreachable => "network unreachable",
            Error::NoBufferSpace => "no buffer space available",
            Error::NoProtocolOption => "protocol option not available",
            Error::NotConnected => "socket not connected",
            Error::NotSupported => "operation not supported",
            Error::OutOfMemory => "out of memory",
            Error::ProtocolNotSupported => "protocol not supported",
            Error::WouldBlock => "operation would block",
        };
        f.write_str(text)
    }
}

/// Names of the socket options understood by this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionName {
    /// Whether transmit payloads carry their own IP header (`IP_HDRINCL`).
    IncludeHeader,
}

/// A socket option together with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOption {
    /// Transmit payloads carry their own IP header (`IP_HDRINCL`).
    IncludeHeader(bool),
}
