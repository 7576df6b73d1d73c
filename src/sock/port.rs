//! One binding of a socket to a network adapter.
use crate::driver::{self, Config, Driver, ModeData, TxDatagram, TxHandle};
use crate::wire::{Address, Protocol};

/// Number of transmit operations a port keeps in flight at most.
pub const TX_SLOTS: usize = 4;

/// Lifecycle states of a port.
///
/// The ordering matters: the receive engine only runs while the state is below `CloseStarted`,
/// and completions arriving later than that release their buffers instead of queueing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PortState {
    /// The port is operational.
    Open,
    /// A receive completion failed; the sticky error holds the cause.
    RxError,
    /// Close has begun, in-flight transmits are draining.
    CloseStarted,
    /// All transmits finished, the receive engine is being stopped.
    CloseTxDone,
    /// Teardown is complete.
    Closed,
}

/// One transmit operation in flight on a port.
#[derive(Debug, Clone, Copy)]
struct TxSlot {
    handle: TxHandle,
    length: usize,
}

/// A binding between a socket and one adapter's protocol driver.
///
/// The port owns the child driver instance, the configuration that will be applied to it and the
/// transmit slot bookkeeping. At most one receive operation is pending per port at any time;
/// this invariant is maintained by the receive engine and checked with [`is_receive_pending`].
///
/// [`is_receive_pending`]: #method.is_receive_pending
#[derive(Debug)]
pub struct Port<D> {
    /// The registry slot of the service this port was created through.
    service: usize,

    driver: D,
    config: Config,
    mode: ModeData,
    destination: Address,
    configured: bool,
    state: PortState,
    rx_pending: bool,
    tx_slots: [Option<TxSlot>; TX_SLOTS],
}

impl<D: Driver> Port<D> {
    /// Set up a port for a fresh driver instance.
    ///
    /// The adapter configuration is only recorded here; it is applied when the socket is
    /// configured lazily on the first I/O call. A wildcard local address requests the adapter's
    /// default station address and restricts delivery to the default protocol; an explicit
    /// address claims the address with a host subnet mask and accepts any protocol number.
    pub(crate) fn allocate(
        service: usize,
        driver: D,
        local: Address,
        protocol: Protocol,
    ) -> Self {
        let wildcard = local.is_unspecified();
        let config = Config {
            default_protocol: protocol,
            accept_any_protocol: !wildcard,
            accept_icmp_errors: false,
            accept_broadcast: false,
            accept_promiscuous: false,
            use_default_address: wildcard,
            station_address: if wildcard { Address::ANY } else { local },
            subnet_mask: if wildcard { Address::ANY } else { Address::BROADCAST },
            type_of_service: 0,
            time_to_live: 255,
            do_not_fragment: false,
            raw_data: false,
            receive_timeout: 0,
            transmit_timeout: 0,
        };

        Port {
            service,
            driver,
            config,
            mode: ModeData::default(),
            destination: Address::ANY,
            configured: false,
            state: PortState::Open,
            rx_pending: false,
            tx_slots: [None; TX_SLOTS],
        }
    }

    /// Apply the recorded configuration to the driver and refresh the mode snapshot.
    pub(crate) fn configure(&mut self, include_header: bool) -> driver::Result<()> {
        if include_header {
            // The IP header will be included with the data on transmit.
            self.config.raw_data = true;
        }
        self.driver.configure(Some(&self.config))?;
        self.mode = self.driver.mode_data();
        self.configured = true;
        Ok(())
    }

    /// Reset the driver, abandoning the pending receive operation.
    ///
    /// This is the mechanism that stops the receive engine during shutdown; the abandoned
    /// receive surfaces as an aborted completion.
    pub(crate) fn close_rx_stop(&mut self) -> driver::Result<()> {
        self.driver.configure(None)
    }

    /// Start a transmit for the datagram, occupying a free slot.
    pub(crate) fn transmit(&mut self, datagram: TxDatagram) -> driver::Result<()> {
        let length = datagram.len();
        let slot = match self.tx_slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => slot,
            None => return Err(driver::Error::OutOfResources),
        };
        let handle = self.driver.transmit(datagram)?;
        *slot = Some(TxSlot { handle, length });
        Ok(())
    }

    /// Release the slot of a completed transmit and return the datagram length.
    pub(crate) fn complete_transmit(&mut self, handle: TxHandle) -> Option<usize> {
        for slot in self.tx_slots.iter_mut() {
            match slot {
                Some(tx) if tx.handle == handle => {
                    let length = tx.length;
                    *slot = None;
                    return Some(length);
                }
                _ => (),
            }
        }
        None
    }

    /// Drop all in-flight transmit slots and return the bytes they accounted for.
    pub(crate) fn abort_transmits(&mut self) -> usize {
        let mut length = 0;
        for slot in self.tx_slots.iter_mut() {
            if let Some(tx) = slot.take() {
                length += tx.length;
            }
        }
        length
    }

    /// Whether a transmit slot is free.
    pub(crate) fn has_free_slot(&self) -> bool {
        self.tx_slots.iter().any(|slot| slot.is_none())
    }

    /// Number of transmits in flight.
    pub fn active_transmits(&self) -> usize {
        self.tx_slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether the single receive operation is posted to the driver.
    pub fn is_receive_pending(&self) -> bool {
        self.rx_pending
    }

    pub(crate) fn set_receive_pending(&mut self, pending: bool) {
        self.rx_pending = pending;
    }

    /// The port's lifecycle state.
    pub fn state(&self) -> PortState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: PortState) {
        self.state = state;
    }

    /// Whether the adapter configuration was applied.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// The default destination address set by `connect`.
    pub fn destination(&self) -> Address {
        self.destination
    }

    pub(crate) fn set_destination(&mut self, destination: Address) {
        self.destination = destination;
    }

    /// The local address, as reported by the adapter after configuration.
    pub fn local_address(&self) -> Address {
        self.mode.config.station_address
    }

    /// The registry slot of the service this port was created through.
    pub fn service(&self) -> usize {
        self.service
    }

    /// The configuration recorded for (or applied to) the driver.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Access the underlying driver, e.g. to drive a simulation.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub(crate) fn into_driver(self) -> D {
        self.driver
    }
}
