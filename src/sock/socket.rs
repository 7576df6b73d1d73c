//! The socket proper: binding, the receive engine and the transmit engine.
use alloc::vec::Vec;

use crate::driver::{self, Driver, Event, RxBuffer, ServiceBinding, TxDatagram, TxHandle};
use crate::storage::Fifo;
use crate::wire::{Address, Protocol};

use super::{Error, OptionName, Packet, Port, PortState, Result, SocketOption};

/// Default high-water mark of the receive queue, in buffered bytes.
pub const DEFAULT_MAX_RX_BYTES: usize = 64 * 1024;

/// Default high-water mark of the transmit queue, in buffered bytes.
pub const DEFAULT_MAX_TX_BYTES: usize = 64 * 1024;

/// Connection state of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Bound at most, drivers not yet configured.
    Unconnected,
    /// At least one port carries an applied driver configuration.
    Connected,
    /// A receive failure is latched and waits to be reported.
    RxError,
}

/// A raw IPv4 datagram socket.
///
/// The socket owns one [`Port`] per adapter it is bound to and two byte-accounted FIFOs, one per
/// direction. Datagram boundaries are preserved end to end; a receive call that offers a buffer
/// smaller than the queued datagram gets a truncated copy and the remainder is discarded.
///
/// All driver completions are dispatched from [`poll`]; call it whenever the drivers may have
/// made progress.
///
/// [`Port`]: struct.Port.html
/// [`poll`]: #method.poll
pub struct Socket<B: ServiceBinding> {
    protocol: Protocol,
    state: State,
    ports: Vec<Port<B::Driver>>,
    include_header: bool,
    configured: bool,

    rx_packets: Fifo<Packet>,
    rx_bytes: usize,
    max_rx_bytes: usize,
    rx_error: Option<driver::Error>,

    tx_packets: Fifo<Packet>,
    tx_bytes: usize,
    max_tx_bytes: usize,
    tx_error: Option<driver::Error>,
}

impl<B: ServiceBinding> Socket<B> {
    /// Create an unbound socket for the given protocol number.
    pub fn new(protocol: Protocol) -> Self {
        Socket {
            protocol,
            state: State::Unconnected,
            ports: Vec::new(),
            include_header: false,
            configured: false,
            rx_packets: Fifo::new(),
            rx_bytes: 0,
            max_rx_bytes: DEFAULT_MAX_RX_BYTES,
            rx_error: None,
            tx_packets: Fifo::new(),
            tx_bytes: 0,
            max_tx_bytes: DEFAULT_MAX_TX_BYTES,
            tx_error: None,
        }
    }

    /// Bind the socket to a local address.
    ///
    /// One port is created per registered service that can produce a driver instance. The
    /// wildcard address binds every adapter with its default station address; a specific address
    /// is claimed with a host subnet mask and enables delivery of all protocol numbers, matching
    /// raw socket convention. Driver configuration is deferred until the first I/O call.
    pub fn bind(&mut self, registry: &mut super::Registry<B>, local: Address) -> Result<()> {
        if !self.ports.is_empty() {
            return Err(Error::NotSupported);
        }

        for (index, binding) in registry.iter_mut() {
            let driver = match binding.create() {
                Ok(driver) => driver,
                Err(_) => continue,
            };
            self.ports.push(Port::allocate(index, driver, local, self.protocol));
        }

        if self.ports.is_empty() {
            return Err(Error::AddressNotAvailable);
        }
        Ok(())
    }

    /// Set the default destination address, binding to the wildcard address first if unbound.
    pub fn connect(&mut self, registry: &mut super::Registry<B>, remote: Address) -> Result<()> {
        if self.ports.is_empty() {
            self.bind(registry, Address::ANY)?;
        }
        for port in self.ports.iter_mut() {
            port.set_destination(remote);
        }
        Ok(())
    }

    /// Apply the deferred driver configuration on every port.
    ///
    /// Called implicitly by the I/O operations. Every port is attempted; a port whose driver
    /// refuses the configuration is skipped by the engines from then on, while the remaining
    /// ports come up normally and start receiving. One success is enough to connect the socket.
    /// The first call settles the verdict: it reports the last per-port failure, later calls
    /// succeed and the socket runs on the ports that made it. Reports `NotConnected` on an
    /// unbound socket.
    pub fn ensure_configured(&mut self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(Error::NotConnected);
        }
        if !self.configured {
            let mut failed = None;
            for index in 0..self.ports.len() {
                if self.ports[index].is_configured() {
                    continue;
                }
                match self.ports[index].configure(self.include_header) {
                    Ok(()) => {
                        if self.state == State::Unconnected {
                            self.state = State::Connected;
                        }
                    }
                    Err(error) => {
                        net_debug!("configure: port failed: {:?}", error);
                        failed = Some(Error::from_configure(error));
                    }
                }
            }
            self.configured = true;
            if let Some(error) = failed {
                self.rx_restart();
                return Err(error);
            }
        }
        self.rx_restart();
        Ok(())
    }

    /// The local address of the single bound port.
    pub fn local_addr(&mut self) -> Result<Address> {
        self.ensure_configured()?;
        match self.ports.as_slice() {
            [port] => Ok(port.local_address()),
            _ => Err(Error::NotConnected),
        }
    }

    /// The connected destination address of the single bound port.
    pub fn peer_addr(&self) -> Result<Address> {
        let destination = match self.ports.as_slice() {
            [port] => port.destination(),
            _ => return Err(Error::NotConnected),
        };
        if destination.is_unspecified() {
            return Err(Error::NotConnected);
        }
        Ok(destination)
    }

    /// Read the value of a socket option.
    pub fn option(&self, name: OptionName) -> SocketOption {
        match name {
            OptionName::IncludeHeader => SocketOption::IncludeHeader(self.include_header),
        }
    }

    /// Change a socket option.
    ///
    /// Header inclusion takes effect when the driver configuration is applied, that is on the
    /// first I/O call after bind.
    pub fn set_option(&mut self, option: SocketOption) -> Result<()> {
        match option {
            SocketOption::IncludeHeader(value) => self.include_header = value,
        }
        Ok(())
    }

    /// Receive a single datagram, header included.
    ///
    /// Returns the number of bytes copied and the source address. A datagram larger than `data`
    /// is truncated and the rest of it discarded. With nothing queued, a latched receive error
    /// is reported once and cleared, otherwise the call would block.
    pub fn receive(&mut self, data: &mut [u8]) -> Result<(usize, Address)> {
        self.ensure_configured()?;

        let packet = match self.rx_packets.pop() {
            Some(packet) => packet,
            None => {
                return match self.consume_rx_error() {
                    Some(error) => Err(error),
                    None => Err(Error::WouldBlock),
                };
            }
        };

        self.rx_bytes -= packet.buffered_len();
        // The receive queue only holds buffers borrowed from drivers.
        let (origin, buffer) = match packet.into_borrowed() {
            Some(parts) => parts,
            None => return Err(Error::Io),
        };
        let source = buffer.source();
        let copied = copy_datagram(&buffer, data);
        net_trace!("rx: delivered {} of {} bytes from {}", copied, buffer.total_len(), source);
        if let Some(port) = self.ports.get_mut(origin) {
            port.driver_mut().recycle(buffer);
        }
        self.rx_restart();
        Ok((copied, source))
    }

    /// Like [`receive`], but leave the datagram queued.
    ///
    /// The empty-queue behavior is the same: a latched receive error is reported once and
    /// cleared, peeking or not.
    ///
    /// [`receive`]: #method.receive
    pub fn peek(&mut self, data: &mut [u8]) -> Result<(usize, Address)> {
        self.ensure_configured()?;
        match self.rx_packets.peek().and_then(Packet::rx_buffer) {
            Some(buffer) => Ok((copy_datagram(buffer, data), buffer.source())),
            None => match self.consume_rx_error() {
                Some(error) => Err(error),
                None => Err(Error::WouldBlock),
            },
        }
    }

    /// Send a datagram to the connected destination address.
    pub fn send(&mut self, data: &[u8]) -> Result<usize> {
        let destination = match self.ports.first() {
            Some(port) => port.destination(),
            None => Address::ANY,
        };
        self.send_to(data, destination)
    }

    /// Send a datagram to an explicit destination address.
    ///
    /// Reports `WouldBlock` while the queued bytes are at the high-water mark. A transmit error
    /// latched by an earlier datagram is reported here as an I/O error instead of queueing the
    /// datagram; reporting clears the latch, so the next attempt can succeed.
    pub fn send_to(&mut self, data: &[u8], destination: Address) -> Result<usize> {
        self.ensure_configured()?;

        if destination.is_unspecified() {
            return Err(Error::NotConnected);
        }
        if self.tx_bytes >= self.max_tx_bytes {
            return Err(Error::WouldBlock);
        }

        let mut payload = Vec::new();
        if payload.try_reserve_exact(data.len()).is_err() {
            return Err(Error::OutOfMemory);
        }
        payload.extend_from_slice(data);
        let datagram = TxDatagram::new(destination, payload);

        if let Some(error) = self.tx_error.take() {
            net_debug!("tx: reporting latched error: {:?}", error);
            return Err(Error::Io);
        }
        self.tx_bytes += datagram.len();
        self.tx_packets.push(Packet::Owned { datagram });
        self.tx_start();
        Ok(data.len())
    }

    /// Dispatch pending driver completions on every port.
    ///
    /// Returns the number of events handled. This is the only place completions mutate socket
    /// state, which is what makes the exclusive borrow the crate's critical section.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        for index in 0..self.ports.len() {
            while let Some(event) = self.ports[index].driver_mut().poll() {
                handled += 1;
                match event {
                    Event::Receive(result) => self.rx_complete(index, result),
                    Event::Transmit(handle, status) => self.tx_complete(index, handle, status),
                }
            }
        }
        handled
    }

    /// Cancel the pending receive operation on every port.
    ///
    /// A driver reporting the operation as not found lost a race against its completion; both
    /// outcomes count as success. The abort surfaces as a completion event and is absorbed by
    /// the receive engine without latching an error.
    pub fn rx_cancel(&mut self) -> Result<()> {
        for port in self.ports.iter_mut() {
            if !port.is_receive_pending() {
                continue;
            }
            match port.driver_mut().cancel_receive() {
                Ok(()) | Err(driver::Error::NotFound) => (),
                Err(_) => return Err(Error::Io),
            }
        }
        Ok(())
    }

    /// Shut the socket down and release every resource.
    ///
    /// Queued transmit datagrams that never reached a driver are dropped. In-flight operations
    /// are drained or aborted, the receive engine is stopped by resetting each driver, queued
    /// receive buffers are recycled and the driver instances are handed back to their service
    /// bindings. The socket returns to the unbound state and may be bound again.
    pub fn close(&mut self, registry: &mut super::Registry<B>) -> Result<()> {
        for port in self.ports.iter_mut() {
            port.set_state(PortState::CloseStarted);
        }

        while let Some(packet) = self.tx_packets.pop() {
            self.tx_bytes -= packet.buffered_len();
        }

        // Completions that are already waiting settle their accounting first.
        self.poll();

        for index in 0..self.ports.len() {
            let aborted = self.ports[index].abort_transmits();
            self.tx_bytes -= aborted;
            self.ports[index].set_state(PortState::CloseTxDone);

            if let Err(error) = self.ports[index].close_rx_stop() {
                net_debug!("close: driver reset failed: {:?}", error);
            }
            self.ports[index].set_receive_pending(false);

            // Drain the abort notification; a receive that won the race against the reset
            // hands out a buffer which goes straight back.
            while let Some(event) = self.ports[index].driver_mut().poll() {
                if let Event::Receive(Ok(buffer)) = event {
                    self.ports[index].driver_mut().recycle(buffer);
                }
            }
            self.ports[index].set_state(PortState::Closed);
        }

        while let Some(packet) = self.rx_packets.pop() {
            self.rx_bytes -= packet.buffered_len();
            if let Some((origin, buffer)) = packet.into_borrowed() {
                if let Some(port) = self.ports.get_mut(origin) {
                    port.driver_mut().recycle(buffer);
                }
            }
        }

        for port in self.ports.drain(..) {
            let service = port.service();
            let driver = port.into_driver();
            if let Some(binding) = registry.get_mut(service) {
                binding.destroy(driver);
            }
        }

        self.state = State::Unconnected;
        self.configured = false;
        self.rx_error = None;
        self.tx_error = None;
        Ok(())
    }

    /// The socket's connection state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The protocol number the socket was created for.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Whether every port carries an applied driver configuration.
    pub fn is_configured(&self) -> bool {
        !self.ports.is_empty() && self.ports.iter().all(Port::is_configured)
    }

    /// Bytes currently held in the receive queue, headers included.
    pub fn receive_backlog(&self) -> usize {
        self.rx_bytes
    }

    /// Bytes currently queued or in flight towards the drivers.
    pub fn transmit_backlog(&self) -> usize {
        self.tx_bytes
    }

    /// The receive queue's high-water mark.
    pub fn max_receive(&self) -> usize {
        self.max_rx_bytes
    }

    /// Change the receive queue's high-water mark (`SO_RCVBUF`).
    ///
    /// Lowering it below the current backlog stops the receive engine until the queue drains.
    pub fn set_max_receive(&mut self, bytes: usize) {
        self.max_rx_bytes = bytes;
    }

    /// The transmit queue's high-water mark.
    pub fn max_transmit(&self) -> usize {
        self.max_tx_bytes
    }

    /// Change the transmit queue's high-water mark (`SO_SNDBUF`).
    pub fn set_max_transmit(&mut self, bytes: usize) {
        self.max_tx_bytes = bytes;
    }

    /// The socket's ports, one per adapter bound.
    pub fn ports(&self) -> &[Port<B::Driver>] {
        &self.ports
    }

    /// Mutable access to one port, e.g. to reach the driver of a simulation.
    pub fn port_mut(&mut self, index: usize) -> Option<&mut Port<B::Driver>> {
        self.ports.get_mut(index)
    }

    /// Report and clear the latched receive error, un-wedging the ports it stopped.
    fn consume_rx_error(&mut self) -> Option<Error> {
        let error = self.rx_error.take()?;
        if self.state == State::RxError {
            self.state = State::Connected;
        }
        for port in self.ports.iter_mut() {
            if port.state() == PortState::RxError {
                port.set_state(PortState::Open);
            }
        }
        self.rx_restart();
        Some(Error::from_completion(error))
    }

    /// Post the port's single receive operation if the engine conditions hold.
    ///
    /// No-op while a receive is pending, the port is closing or in error, an error is latched,
    /// or the queue sits at the high-water mark. An immediate driver failure latches the sticky
    /// receive error.
    fn rx_start(&mut self, index: usize) {
        let port = &mut self.ports[index];
        if port.is_receive_pending() || !port.is_configured() || port.state() != PortState::Open {
            return;
        }
        if self.rx_error.is_some() || self.rx_bytes >= self.max_rx_bytes {
            return;
        }
        match port.driver_mut().receive() {
            Ok(()) => port.set_receive_pending(true),
            Err(error) => {
                net_debug!("rx: start failed: {:?}", error);
                if self.rx_error.is_none() {
                    self.rx_error = Some(error);
                }
                self.state = State::RxError;
            }
        }
    }

    fn rx_restart(&mut self) {
        for index in 0..self.ports.len() {
            self.rx_start(index);
        }
    }

    /// Handle a receive completion on the given port.
    fn rx_complete(&mut self, index: usize, result: driver::Result<RxBuffer>) {
        self.ports[index].set_receive_pending(false);
        match result {
            Ok(buffer) => {
                if self.ports[index].state() >= PortState::CloseStarted {
                    // Arrived during teardown, nobody will read it.
                    self.ports[index].driver_mut().recycle(buffer);
                    return;
                }
                net_trace!("rx: queued {} bytes from {}", buffer.total_len(), buffer.source());
                self.rx_bytes += buffer.total_len();
                self.rx_packets.push(Packet::Borrowed { port: index, buffer });
                self.rx_start(index);
            }
            // The echo of a cancel or reset; the engine restarts on the next receive call.
            Err(driver::Error::Aborted) => (),
            Err(error) => {
                net_debug!("rx: completion failed: {:?}", error);
                if self.rx_error.is_none() {
                    self.rx_error = Some(error);
                }
                if self.ports[index].state() == PortState::Open {
                    self.ports[index].set_state(PortState::RxError);
                }
                self.state = State::RxError;
            }
        }
    }

    /// Pump queued datagrams onto free transmit slots.
    fn tx_start(&mut self) {
        while !self.tx_packets.is_empty() {
            let target = self.ports.iter().position(|port| {
                port.is_configured() && port.state() == PortState::Open && port.has_free_slot()
            });
            let index = match target {
                Some(index) => index,
                None => break,
            };
            let datagram = match self.tx_packets.pop().and_then(Packet::into_owned) {
                Some(datagram) => datagram,
                None => continue,
            };
            let length = datagram.len();
            if let Err(error) = self.ports[index].transmit(datagram) {
                net_debug!("tx: start failed: {:?}", error);
                self.tx_bytes -= length;
                if self.tx_error.is_none() {
                    self.tx_error = Some(error);
                }
                break;
            }
        }
    }

    /// Handle a transmit completion on the given port.
    fn tx_complete(&mut self, index: usize, handle: TxHandle, status: driver::Result<()>) {
        if let Some(length) = self.ports[index].complete_transmit(handle) {
            self.tx_bytes -= length;
        }
        if let Err(error) = status {
            net_debug!("tx: completion failed: {:?}", error);
            if self.tx_error.is_none() {
                self.tx_error = Some(error);
            }
        }
        self.tx_start();
    }
}

/// Copy header and payload fragments into `data`, truncating at its end.
fn copy_datagram(buffer: &RxBuffer, data: &mut [u8]) -> usize {
    let mut copied = 0;
    let parts = core::iter::once(buffer.header())
        .chain(buffer.fragments().iter().map(Vec::as_slice));
    for part in parts {
        if copied == data.len() {
            break;
        }
        let take = core::cmp::min(part.len(), data.len() - copied);
        data[copied..copied + take].copy_from_slice(&part[..take]);
        copied += take;
    }
    copied
}
