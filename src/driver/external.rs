//! A stub driver whose datagrams come from an external source.
//!
//! Inbound datagrams are injected by the test or simulation harness and handed out as receive
//! completions; outbound datagrams are captured for inspection. Every operation can be made to
//! fail on demand to exercise the error paths of the socket layer.
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::wire::Address;

use super::{
    Config, Driver, Error, Event, ModeData, Result, RecycleHandle, RxBuffer, ServiceBinding,
    TxDatagram, TxHandle,
};

/// One injected inbound datagram waiting for a posted receive.
#[derive(Debug)]
struct Incoming {
    source: Address,
    header: Vec<u8>,
    fragments: Vec<Vec<u8>>,
}

/// A software protocol driver fed from the outside.
#[derive(Debug)]
pub struct External {
    /// The address the adapter assigns when the configuration requests a default address.
    assigned: Address,

    /// The applied configuration, `None` while unconfigured.
    config: Option<Config>,

    /// Injected datagrams not yet handed to a receive operation.
    incoming: VecDeque<Incoming>,

    /// Completion events waiting to be drained.
    events: VecDeque<Event>,

    /// Captured transmit datagrams whose completion was delivered.
    sent: Vec<TxDatagram>,

    /// Transmits held back while auto-completion is off.
    inflight: Vec<(TxHandle, TxDatagram)>,

    /// Whether a receive operation is posted.
    rx_posted: bool,

    /// Number of handed-out receive buffers not yet recycled.
    outstanding: usize,

    /// Complete transmits as soon as they are posted.
    auto_complete: bool,

    next_tx: u32,
    next_recycle: u64,

    fail_configure: Option<Error>,
    fail_receive: Option<Error>,
    fail_rx_completion: Option<Error>,
    fail_transmit: Option<Error>,
    fail_tx_completion: Option<Error>,
}

impl External {
    /// Create a driver whose adapter owns the given address.
    pub fn new(assigned: Address) -> Self {
        External {
            assigned,
            config: None,
            incoming: VecDeque::new(),
            events: VecDeque::new(),
            sent: Vec::new(),
            inflight: Vec::new(),
            rx_posted: false,
            outstanding: 0,
            auto_complete: true,
            next_tx: 0,
            next_recycle: 0,
            fail_configure: None,
            fail_receive: None,
            fail_rx_completion: None,
            fail_transmit: None,
            fail_tx_completion: None,
        }
    }

    /// Inject an inbound datagram with a fragmented payload.
    pub fn inject(&mut self, source: Address, header: Vec<u8>, fragments: Vec<Vec<u8>>) {
        self.incoming.push_back(Incoming { source, header, fragments });
    }

    /// Inject an inbound datagram with a contiguous payload.
    pub fn inject_datagram(&mut self, source: Address, header: Vec<u8>, payload: Vec<u8>) {
        self.inject(source, header, alloc::vec![payload]);
    }

    /// Whether a receive operation is currently posted.
    pub fn is_receive_posted(&self) -> bool {
        self.rx_posted
    }

    /// Number of receive buffers handed out and not yet recycled.
    pub fn outstanding_buffers(&self) -> usize {
        self.outstanding
    }

    /// The datagrams transmitted so far, in completion order.
    pub fn sent(&self) -> &[TxDatagram] {
        &self.sent
    }

    /// Remove and return the captured transmit datagrams.
    pub fn take_sent(&mut self) -> Vec<TxDatagram> {
        core::mem::replace(&mut self.sent, Vec::new())
    }

    /// Number of transmits posted but not yet completed.
    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    /// Hold posted transmits until [`complete_transmit`] instead of completing them right away.
    ///
    /// [`complete_transmit`]: #method.complete_transmit
    pub fn set_auto_complete(&mut self, auto: bool) {
        self.auto_complete = auto;
    }

    /// Complete the oldest held-back transmit with the given status.
    pub fn complete_transmit(&mut self, status: Result<()>) {
        if self.inflight.is_empty() {
            return;
        }
        let (handle, datagram) = self.inflight.remove(0);
        self.sent.push(datagram);
        self.events.push_back(Event::Transmit(handle, status));
    }

    /// Fail the next `configure` call with the given status.
    pub fn fail_next_configure(&mut self, error: Error) {
        self.fail_configure = Some(error);
    }

    /// Fail the next `receive` call immediately with the given status.
    pub fn fail_next_receive(&mut self, error: Error) {
        self.fail_receive = Some(error);
    }

    /// Complete the next posted receive with the given status instead of a datagram.
    pub fn fail_next_rx_completion(&mut self, error: Error) {
        self.fail_rx_completion = Some(error);
    }

    /// Fail the next `transmit` call immediately with the given status.
    pub fn fail_next_transmit(&mut self, error: Error) {
        self.fail_transmit = Some(error);
    }

    /// Complete the next posted transmit with the given status.
    pub fn fail_next_tx_completion(&mut self, error: Error) {
        self.fail_tx_completion = Some(error);
    }
}

impl Driver for External {
    fn configure(&mut self, config: Option<&Config>) -> Result<()> {
        if let Some(error) = self.fail_configure.take() {
            return Err(error);
        }

        match config {
            Some(config) => {
                let mut applied = config.clone();
                if applied.use_default_address {
                    applied.station_address = self.assigned;
                }
                self.config = Some(applied);
            }
            None => {
                self.config = None;
                if self.rx_posted {
                    self.rx_posted = false;
                    self.events.push_back(Event::Receive(Err(Error::Aborted)));
                }
            }
        }
        Ok(())
    }

    fn mode_data(&self) -> ModeData {
        ModeData {
            is_configured: self.config.is_some(),
            config: self.config.clone().unwrap_or_default(),
        }
    }

    fn receive(&mut self) -> Result<()> {
        if self.config.is_none() {
            return Err(Error::NotStarted);
        }
        if self.rx_posted {
            return Err(Error::AlreadyStarted);
        }
        if let Some(error) = self.fail_receive.take() {
            return Err(error);
        }
        self.rx_posted = true;
        Ok(())
    }

    fn transmit(&mut self, datagram: TxDatagram) -> Result<TxHandle> {
        if self.config.is_none() {
            return Err(Error::NotStarted);
        }
        if let Some(error) = self.fail_transmit.take() {
            return Err(error);
        }

        let handle = TxHandle(self.next_tx);
        self.next_tx += 1;
        if self.auto_complete {
            let status = match self.fail_tx_completion.take() {
                Some(error) => Err(error),
                None => Ok(()),
            };
            self.sent.push(datagram);
            self.events.push_back(Event::Transmit(handle, status));
        } else {
            self.inflight.push((handle, datagram));
        }
        Ok(handle)
    }

    fn cancel_receive(&mut self) -> Result<()> {
        if !self.rx_posted {
            return Err(Error::NotFound);
        }
        self.rx_posted = false;
        self.events.push_back(Event::Receive(Err(Error::Aborted)));
        Ok(())
    }

    fn recycle(&mut self, buffer: RxBuffer) {
        let _ = buffer;
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    fn poll(&mut self) -> Option<Event> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }

        if self.rx_posted {
            if let Some(error) = self.fail_rx_completion.take() {
                self.rx_posted = false;
                return Some(Event::Receive(Err(error)));
            }
            if let Some(incoming) = self.incoming.pop_front() {
                self.rx_posted = false;
                self.outstanding += 1;
                let recycle = RecycleHandle(self.next_recycle);
                self.next_recycle += 1;
                let buffer = RxBuffer::new(
                    incoming.source,
                    self.assigned,
                    incoming.header,
                    incoming.fragments,
                    recycle,
                );
                return Some(Event::Receive(Ok(buffer)));
            }
        }

        None
    }
}

/// A service binding producing [`External`] drivers for one simulated adapter.
///
/// [`External`]: struct.External.html
#[derive(Debug)]
pub struct Service {
    address: Address,
    created: usize,
    destroyed: usize,
    fail_create: Option<Error>,
}

impl Service {
    /// A binding for an adapter owning the given address.
    pub fn new(address: Address) -> Self {
        Service {
            address,
            created: 0,
            destroyed: 0,
            fail_create: None,
        }
    }

    /// The adapter's own address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Number of driver instances created.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Number of driver instances handed back.
    pub fn destroyed(&self) -> usize {
        self.destroyed
    }

    /// Fail the next `create` call with the given status.
    pub fn fail_next_create(&mut self, error: Error) {
        self.fail_create = Some(error);
    }
}

impl ServiceBinding for Service {
    type Driver = External;

    fn create(&mut self) -> Result<External> {
        if let Some(error) = self.fail_create.take() {
            return Err(error);
        }
        self.created += 1;
        Ok(External::new(self.address))
    }

    fn destroy(&mut self, driver: External) {
        let _ = driver;
        self.destroyed += 1;
    }
}
