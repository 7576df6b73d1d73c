//! The contract between the socket layer and an IPv4 protocol driver.
//!
//! A driver represents one opened protocol instance on a network adapter. It accepts a
//! configuration, a single posted receive operation and a bounded number of concurrent transmit
//! operations. Completions are not delivered through callbacks but drained from the driver with
//! [`Driver::poll`]; the socket layer calls it from its own poll loop and dispatches the events
//! into the receive and transmit engines.
//!
//! Receive buffers are owned by the driver. A completed receive hands out an [`RxBuffer`] that
//! borrows the driver's storage; the socket layer must eventually pass it back through
//! [`Driver::recycle`]. Transmit buffers travel in the other direction: a [`TxDatagram`] owns
//! its payload and is consumed by [`Driver::transmit`].
//!
//! [`Driver::poll`]: trait.Driver.html#tymethod.poll
//! [`Driver::recycle`]: trait.Driver.html#tymethod.recycle
//! [`Driver::transmit`]: trait.Driver.html#tymethod.transmit
//! [`RxBuffer`]: struct.RxBuffer.html
//! [`TxDatagram`]: struct.TxDatagram.html
use alloc::vec::Vec;

use crate::wire::{Address, Protocol};

pub mod external;

pub use external::{External, Service};

/// A result type for driver operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Status codes reported by a protocol driver.
///
/// These mirror the operation statuses of adapter firmware interfaces. The socket layer maps
/// them onto its own error taxonomy; see `sock::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation was aborted, usually by a cancel or reset.
    Aborted,
    /// The caller lacks the permission for the operation.
    AccessDenied,
    /// A receive was posted while one is already pending.
    AlreadyStarted,
    /// The adapter hardware reported a failure.
    Device,
    /// The destination host cannot be reached.
    HostUnreachable,
    /// A parameter was outside the configurable range.
    InvalidParameter,
    /// The destination network cannot be reached.
    NetworkUnreachable,
    /// No address mapping exists for the requested station address.
    NoMapping,
    /// The referenced operation does not exist, e.g. a cancel raced its completion.
    NotFound,
    /// The driver was used before it was configured.
    NotStarted,
    /// The driver ran out of internal buffers or other resources.
    OutOfResources,
    /// The destination port cannot be reached.
    PortUnreachable,
    /// The destination protocol cannot be reached.
    ProtocolUnreachable,
    /// The driver does not implement the requested operation.
    Unsupported,
}

/// Configuration of one protocol driver instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Protocol number delivered to this instance when no override is given.
    pub default_protocol: Protocol,
    /// Deliver datagrams of any protocol number, not just the default one.
    pub accept_any_protocol: bool,
    /// Deliver ICMP error messages.
    pub accept_icmp_errors: bool,
    /// Deliver datagrams sent to the broadcast address.
    pub accept_broadcast: bool,
    /// Deliver all datagrams seen on the link.
    pub accept_promiscuous: bool,
    /// Let the adapter choose the station address instead of `station_address`.
    pub use_default_address: bool,
    /// The local address of this instance, ignored with `use_default_address`.
    pub station_address: Address,
    /// The subnet mask belonging to `station_address`.
    pub subnet_mask: Address,
    /// Type-of-service byte placed in outgoing headers.
    pub type_of_service: u8,
    /// Time-to-live placed in outgoing headers.
    pub time_to_live: u8,
    /// Set the do-not-fragment flag in outgoing headers.
    pub do_not_fragment: bool,
    /// The caller supplies complete IP headers in transmit payloads.
    pub raw_data: bool,
    /// Receive timeout in microseconds, zero meaning none.
    pub receive_timeout: u32,
    /// Transmit timeout in microseconds, zero meaning none.
    pub transmit_timeout: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_protocol: Protocol::Raw,
            accept_any_protocol: false,
            accept_icmp_errors: false,
            accept_broadcast: false,
            accept_promiscuous: false,
            use_default_address: true,
            station_address: Address::ANY,
            subnet_mask: Address::ANY,
            type_of_service: 0,
            time_to_live: 255,
            do_not_fragment: false,
            raw_data: false,
            receive_timeout: 0,
            transmit_timeout: 0,
        }
    }
}

/// A snapshot of the driver's operational state.
#[derive(Debug, Clone, Default)]
pub struct ModeData {
    /// Whether a configuration has been applied.
    pub is_configured: bool,
    /// The active configuration, with adapter-chosen fields filled in.
    pub config: Config,
}

/// Identifies one pending transmit operation of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle(pub u32);

/// Identifies one receive buffer borrowed from a driver.
///
/// Returned to the driver through [`Driver::recycle`] to release the underlying storage.
///
/// [`Driver::recycle`]: trait.Driver.html#tymethod.recycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecycleHandle(pub u64);

/// A received datagram borrowing the driver's buffer.
///
/// The header and the payload fragments reference storage accounted to the driver until the
/// buffer is recycled. Payloads arrive as a fragment list since drivers may scatter one datagram
/// over several internal buffers.
#[derive(Debug)]
pub struct RxBuffer {
    source: Address,
    destination: Address,
    header: Vec<u8>,
    fragments: Vec<Vec<u8>>,
    recycle: RecycleHandle,
}

impl RxBuffer {
    /// Assemble a receive buffer, used by driver implementations.
    pub fn new(
        source: Address,
        destination: Address,
        header: Vec<u8>,
        fragments: Vec<Vec<u8>>,
        recycle: RecycleHandle,
    ) -> Self {
        RxBuffer { source, destination, header, fragments, recycle }
    }

    /// The address the datagram was sent from.
    pub fn source(&self) -> Address {
        self.source
    }

    /// The address the datagram was sent to.
    pub fn destination(&self) -> Address {
        self.destination
    }

    /// The raw IP header bytes.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// The payload fragments in datagram order.
    pub fn fragments(&self) -> &[Vec<u8>] {
        &self.fragments
    }

    /// The length of the IP header in bytes.
    pub fn header_len(&self) -> usize {
        self.header.len()
    }

    /// The length of the payload in bytes, summed over all fragments.
    pub fn data_len(&self) -> usize {
        self.fragments.iter().map(Vec::len).sum()
    }

    /// The length of header and payload together.
    pub fn total_len(&self) -> usize {
        self.header_len() + self.data_len()
    }

    /// The handle identifying the borrowed storage.
    pub fn recycle_handle(&self) -> RecycleHandle {
        self.recycle
    }
}

/// Header overrides attached to a single transmit operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    /// Source address to use instead of the station address.
    pub source: Address,
    /// First-hop gateway, wildcard to let the driver route.
    pub gateway: Address,
    /// Protocol number for this datagram.
    pub protocol: Protocol,
    /// Type-of-service byte for this datagram.
    pub type_of_service: u8,
    /// Time-to-live for this datagram.
    pub time_to_live: u8,
    /// Set the do-not-fragment flag for this datagram.
    pub do_not_fragment: bool,
}

/// An outbound datagram owning its payload.
#[derive(Debug)]
pub struct TxDatagram {
    /// The destination address.
    pub destination: Address,
    /// Per-datagram header overrides, `None` to use the driver configuration.
    pub override_data: Option<Override>,
    payload: Vec<u8>,
}

impl TxDatagram {
    /// Create a datagram for the configured default header fields.
    pub fn new(destination: Address, payload: Vec<u8>) -> Self {
        TxDatagram { destination, override_data: None, payload }
    }

    /// The payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A completion event drained from a driver.
#[derive(Debug)]
pub enum Event {
    /// The posted receive finished, successfully or not.
    Receive(Result<RxBuffer>),
    /// The identified transmit finished, successfully or not.
    Transmit(TxHandle, Result<()>),
}

/// One opened IPv4 protocol instance on a network adapter.
///
/// All operations are asynchronous registrations: they return immediately and report the outcome
/// later through [`poll`]. At most one receive may be posted at a time; the number of concurrent
/// transmits is up to the driver, which signals exhaustion with [`Error::OutOfResources`].
///
/// [`poll`]: #tymethod.poll
/// [`Error::OutOfResources`]: enum.Error.html#variant.OutOfResources
pub trait Driver {
    /// Apply a configuration, or reset the instance with `None`.
    ///
    /// A reset aborts the pending receive operation, if any; the abort surfaces as a receive
    /// completion event carrying [`Error::Aborted`].
    ///
    /// [`Error::Aborted`]: enum.Error.html#variant.Aborted
    fn configure(&mut self, config: Option<&Config>) -> Result<()>;

    /// Snapshot the operational state, including adapter-chosen address fields.
    fn mode_data(&self) -> ModeData;

    /// Post the single receive operation.
    fn receive(&mut self) -> Result<()>;

    /// Post a transmit operation for the datagram.
    fn transmit(&mut self, datagram: TxDatagram) -> Result<TxHandle>;

    /// Request cancellation of the posted receive.
    ///
    /// Returns [`Error::NotFound`] when no receive is pending, which callers treat as the
    /// receive having completed already.
    ///
    /// [`Error::NotFound`]: enum.Error.html#variant.NotFound
    fn cancel_receive(&mut self) -> Result<()>;

    /// Return a borrowed receive buffer to the driver.
    fn recycle(&mut self, buffer: RxBuffer);

    /// Drain the next completion event, if one is ready.
    fn poll(&mut self) -> Option<Event>;
}

/// Creates and destroys protocol driver instances on one network adapter.
///
/// One implementation exists per adapter offering the IPv4 protocol. The socket layer keeps the
/// bindings in a registry and creates a child instance per socket port.
pub trait ServiceBinding {
    /// The driver type produced by this binding.
    type Driver: Driver;

    /// Create a new protocol instance.
    fn create(&mut self) -> Result<Self::Driver>;

    /// Tear down a protocol instance previously produced by `create`.
    fn destroy(&mut self, driver: Self::Driver);
}
