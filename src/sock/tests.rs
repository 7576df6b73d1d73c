use alloc::vec;
use alloc::vec::Vec;

use crate::driver::{self, Service};
use crate::wire::{Address, Protocol};

use super::{Error, OptionName, PortState, Registry, Socket, SocketOption, State};

fn adapter(d: u8) -> Address {
    Address::new(10, 0, 0, d)
}

fn stack(adapters: u8) -> (Registry<Service>, Socket<Service>) {
    let mut registry = Registry::new();
    for d in 1..=adapters {
        registry.register(Service::new(adapter(d)));
    }
    (registry, Socket::new(Protocol::Icmp))
}

fn header(len: usize) -> Vec<u8> {
    vec![0x45; len]
}

#[test]
fn bind_creates_one_port_per_adapter() {
    let (mut registry, mut socket) = stack(2);
    socket.bind(&mut registry, Address::ANY).unwrap();
    assert_eq!(socket.ports().len(), 2);
    assert!(!socket.is_configured());

    // No adapters, no port, no binding.
    let mut empty = Registry::<Service>::new();
    let mut other = Socket::<Service>::new(Protocol::Icmp);
    assert_eq!(other.bind(&mut empty, Address::ANY), Err(Error::AddressNotAvailable));
}

#[test]
fn wildcard_and_explicit_bind_configurations() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    let config = socket.ports()[0].config();
    assert!(config.use_default_address);
    assert!(!config.accept_any_protocol);
    assert_eq!(config.time_to_live, 255);

    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, adapter(1)).unwrap();
    let config = socket.ports()[0].config();
    assert!(!config.use_default_address);
    assert!(config.accept_any_protocol);
    assert_eq!(config.station_address, adapter(1));
    assert_eq!(config.subnet_mask, Address::BROADCAST);
}

#[test]
fn io_configures_lazily_and_starts_the_receive_engine() {
    let (mut registry, mut socket) = stack(2);
    socket.bind(&mut registry, Address::ANY).unwrap();

    let mut buffer = [0u8; 32];
    assert_eq!(socket.receive(&mut buffer), Err(Error::WouldBlock));
    assert!(socket.is_configured());
    assert_eq!(socket.state(), State::Connected);
    for index in 0..2 {
        assert!(socket.ports()[index].is_receive_pending());
        assert!(socket.port_mut(index).unwrap().driver_mut().is_receive_posted());
    }
}

#[test]
fn receive_returns_datagram_and_source() {
    let (mut registry, mut socket) = stack(2);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();

    let source = Address::new(192, 0, 2, 7);
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .inject_datagram(source, header(40), vec![0xab; 100]);
    socket.poll();
    assert_eq!(socket.receive_backlog(), 140);

    let mut buffer = [0u8; 200];
    assert_eq!(socket.receive(&mut buffer), Ok((140, source)));
    assert_eq!(&buffer[..40], &header(40)[..]);
    assert_eq!(&buffer[40..140], &[0xab; 100][..]);
    assert_eq!(socket.receive_backlog(), 0);
    assert_eq!(socket.port_mut(0).unwrap().driver_mut().outstanding_buffers(), 0);
}

#[test]
fn delivered_bytes_match_enqueued_bytes() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();

    let source = adapter(9);
    let lengths = [10usize, 300, 1];
    let mut enqueued = 0;
    for &len in lengths.iter() {
        socket
            .port_mut(0)
            .unwrap()
            .driver_mut()
            .inject_datagram(source, header(20), vec![0x11; len]);
        enqueued += 20 + len;
    }
    socket.poll();
    assert_eq!(socket.receive_backlog(), enqueued);

    let mut delivered = 0;
    let mut buffer = [0u8; 512];
    while let Ok((copied, _)) = socket.receive(&mut buffer) {
        delivered += copied;
    }
    assert_eq!(delivered, enqueued);
    assert_eq!(socket.receive_backlog(), 0);
}

#[test]
fn undersized_buffer_truncates_and_discards() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();

    let source = adapter(9);
    let driver = socket.port_mut(0).unwrap().driver_mut();
    driver.inject_datagram(source, header(20), vec![0x22; 80]);
    driver.inject_datagram(source, header(20), vec![0x33; 5]);
    socket.poll();

    // 30 of 100 bytes fit; the remaining 70 are gone with the datagram.
    let mut small = [0u8; 30];
    assert_eq!(socket.receive(&mut small), Ok((30, source)));
    assert_eq!(&small[20..], &[0x22; 10][..]);

    let mut buffer = [0u8; 64];
    assert_eq!(socket.receive(&mut buffer), Ok((25, source)));
    assert_eq!(&buffer[20..25], &[0x33; 5][..]);
    assert_eq!(socket.receive(&mut buffer), Err(Error::WouldBlock));
}

#[test]
fn receive_flow_control_stops_and_restarts_posting() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.set_max_receive(64);
    socket.ensure_configured().unwrap();

    let source = adapter(9);
    for _ in 0..3 {
        socket
            .port_mut(0)
            .unwrap()
            .driver_mut()
            .inject_datagram(source, header(20), vec![0u8; 30]);
    }
    socket.poll();

    // Two datagrams of 50 bytes reach the mark; the third stays with the driver.
    assert_eq!(socket.receive_backlog(), 100);
    assert!(!socket.ports()[0].is_receive_pending());
    assert!(!socket.port_mut(0).unwrap().driver_mut().is_receive_posted());

    let mut buffer = [0u8; 64];
    assert_eq!(socket.receive(&mut buffer), Ok((50, source)));
    assert!(socket.ports()[0].is_receive_pending());
    socket.poll();
    assert_eq!(socket.receive_backlog(), 100);
}

#[test]
fn at_most_one_receive_pending_per_port() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();
    assert!(socket.ports()[0].is_receive_pending());

    // Restart attempts while a receive is pending must not double-post; the stub driver
    // would answer a second post with AlreadyStarted and the engine would latch it.
    socket.ensure_configured().unwrap();
    let mut buffer = [0u8; 16];
    assert_eq!(socket.receive(&mut buffer), Err(Error::WouldBlock));
    assert_eq!(socket.state(), State::Connected);
    assert!(socket.ports()[0].is_receive_pending());
}

#[test]
fn sticky_receive_error_reports_once_then_clears() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();

    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .fail_next_rx_completion(driver::Error::HostUnreachable);
    socket.poll();
    assert_eq!(socket.state(), State::RxError);
    assert_eq!(socket.ports()[0].state(), PortState::RxError);

    let mut buffer = [0u8; 16];
    assert_eq!(socket.receive(&mut buffer), Err(Error::HostUnreachable));
    assert_eq!(socket.state(), State::Connected);
    assert_eq!(socket.ports()[0].state(), PortState::Open);
    // Cleared, and the engine is running again.
    assert_eq!(socket.receive(&mut buffer), Err(Error::WouldBlock));
    assert!(socket.ports()[0].is_receive_pending());
}

#[test]
fn queued_datagrams_shadow_the_sticky_error() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();

    let source = adapter(9);
    let driver = socket.port_mut(0).unwrap().driver_mut();
    driver.inject_datagram(source, header(20), vec![0x44; 8]);
    socket.poll();
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .fail_next_rx_completion(driver::Error::NetworkUnreachable);
    socket.poll();

    // Queued data is delivered before the error surfaces.
    let mut buffer = [0u8; 64];
    assert_eq!(socket.receive(&mut buffer), Ok((28, source)));
    assert_eq!(socket.receive(&mut buffer), Err(Error::NetworkUnreachable));
    assert_eq!(socket.receive(&mut buffer), Err(Error::WouldBlock));
}

#[test]
fn peek_leaves_the_datagram_queued() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();

    let source = adapter(9);
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .inject_datagram(source, header(20), vec![0x55; 12]);
    socket.poll();

    let mut buffer = [0u8; 64];
    assert_eq!(socket.peek(&mut buffer), Ok((32, source)));
    assert_eq!(socket.receive_backlog(), 32);
    assert_eq!(socket.receive(&mut buffer), Ok((32, source)));
    assert_eq!(socket.receive_backlog(), 0);
}

#[test]
fn peek_on_an_empty_queue_consumes_the_sticky_error() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .fail_next_rx_completion(driver::Error::HostUnreachable);
    socket.poll();

    let mut buffer = [0u8; 16];
    assert_eq!(socket.peek(&mut buffer), Err(Error::HostUnreachable));
    // Cleared like a plain receive would have; the engine is running again.
    assert_eq!(socket.receive(&mut buffer), Err(Error::WouldBlock));
    assert_eq!(socket.state(), State::Connected);
    assert!(socket.ports()[0].is_receive_pending());
}

#[test]
fn transmit_accounting_balances() {
    let (mut registry, mut socket) = stack(1);
    socket.connect(&mut registry, adapter(2)).unwrap();
    socket.ensure_configured().unwrap();
    socket.port_mut(0).unwrap().driver_mut().set_auto_complete(false);

    assert_eq!(socket.send(&[0u8; 100]), Ok(100));
    assert_eq!(socket.send(&[0u8; 28]), Ok(28));
    assert_eq!(socket.transmit_backlog(), 128);
    assert_eq!(socket.ports()[0].active_transmits(), 2);

    socket.port_mut(0).unwrap().driver_mut().complete_transmit(Ok(()));
    socket.poll();
    assert_eq!(socket.transmit_backlog(), 28);

    socket.port_mut(0).unwrap().driver_mut().complete_transmit(Ok(()));
    socket.poll();
    assert_eq!(socket.transmit_backlog(), 0);
    assert_eq!(socket.ports()[0].active_transmits(), 0);
    assert_eq!(socket.port_mut(0).unwrap().driver_mut().sent().len(), 2);
}

#[test]
fn send_at_high_water_mark_would_block() {
    let (mut registry, mut socket) = stack(1);
    socket.connect(&mut registry, adapter(2)).unwrap();
    socket.set_max_transmit(64);
    socket.port_mut(0).unwrap().driver_mut().set_auto_complete(false);

    assert_eq!(socket.send(&[0u8; 64]), Ok(64));
    assert_eq!(socket.send(&[0u8; 64]), Err(Error::WouldBlock));
    assert_eq!(socket.transmit_backlog(), 64);

    socket.port_mut(0).unwrap().driver_mut().complete_transmit(Ok(()));
    socket.poll();
    assert_eq!(socket.send(&[0u8; 64]), Ok(64));
}

#[test]
fn queued_transmits_wait_for_a_free_slot() {
    let (mut registry, mut socket) = stack(1);
    socket.connect(&mut registry, adapter(2)).unwrap();
    socket.ensure_configured().unwrap();
    socket.port_mut(0).unwrap().driver_mut().set_auto_complete(false);

    for _ in 0..super::TX_SLOTS + 2 {
        assert_eq!(socket.send(&[0u8; 8]), Ok(8));
    }
    assert_eq!(socket.ports()[0].active_transmits(), super::TX_SLOTS);
    assert_eq!(socket.port_mut(0).unwrap().driver_mut().inflight(), super::TX_SLOTS);

    socket.port_mut(0).unwrap().driver_mut().complete_transmit(Ok(()));
    socket.poll();
    // The completion freed a slot and the pump filled it from the queue.
    assert_eq!(socket.ports()[0].active_transmits(), super::TX_SLOTS);
    assert_eq!(socket.transmit_backlog(), (super::TX_SLOTS + 1) * 8);
}

#[test]
fn sticky_transmit_error_reports_on_next_send() {
    let (mut registry, mut socket) = stack(1);
    socket.connect(&mut registry, adapter(2)).unwrap();
    socket.ensure_configured().unwrap();
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .fail_next_tx_completion(driver::Error::NetworkUnreachable);

    assert_eq!(socket.send(&[0u8; 16]), Ok(16));
    socket.poll();
    assert_eq!(socket.send(&[0u8; 16]), Err(Error::Io));
    // Reporting cleared the latch; the engine keeps working.
    assert_eq!(socket.send(&[0u8; 16]), Ok(16));
    socket.poll();
    assert_eq!(socket.transmit_backlog(), 0);
}

#[test]
fn full_queue_wins_over_the_transmit_latch() {
    let (mut registry, mut socket) = stack(1);
    socket.connect(&mut registry, adapter(2)).unwrap();
    socket.ensure_configured().unwrap();
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .fail_next_tx_completion(driver::Error::HostUnreachable);
    assert_eq!(socket.send(&[0u8; 16]), Ok(16));
    socket.poll();

    // At the high-water mark the would-block verdict comes first; the latch stays put
    // until a send gets past the queue checks.
    socket.set_max_transmit(0);
    assert_eq!(socket.send(&[0u8; 16]), Err(Error::WouldBlock));
    socket.set_max_transmit(64);
    assert_eq!(socket.send(&[0u8; 16]), Err(Error::Io));
    assert_eq!(socket.send(&[0u8; 16]), Ok(16));
}

#[test]
fn immediate_receive_failure_latches_the_sticky_error() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .fail_next_receive(driver::Error::OutOfResources);

    // The post itself fails; no completion is ever going to arrive.
    socket.ensure_configured().unwrap();
    assert_eq!(socket.state(), State::RxError);
    assert!(!socket.ports()[0].is_receive_pending());

    let mut buffer = [0u8; 16];
    assert_eq!(socket.receive(&mut buffer), Err(Error::Io));
    assert_eq!(socket.receive(&mut buffer), Err(Error::WouldBlock));
    assert!(socket.ports()[0].is_receive_pending());
}

#[test]
fn immediate_transmit_failure_latches_the_sticky_error() {
    let (mut registry, mut socket) = stack(1);
    socket.connect(&mut registry, adapter(2)).unwrap();
    socket.ensure_configured().unwrap();
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .fail_next_transmit(driver::Error::OutOfResources);

    // The datagram never reaches the driver; its bytes are rolled back.
    assert_eq!(socket.send(&[0u8; 16]), Ok(16));
    assert_eq!(socket.transmit_backlog(), 0);

    assert_eq!(socket.send(&[0u8; 16]), Err(Error::Io));
    assert_eq!(socket.send(&[0u8; 16]), Ok(16));
    socket.poll();
    assert_eq!(socket.transmit_backlog(), 0);
}

#[test]
fn connect_round_trips_the_peer_address() {
    let (mut registry, mut socket) = stack(1);
    let remote = Address::new(192, 168, 7, 9);
    socket.connect(&mut registry, remote).unwrap();

    let peer = socket.peer_addr().unwrap();
    assert_eq!(peer, remote);
    assert_eq!(
        Address::from_network_integer(peer.to_network_integer()),
        remote,
    );
}

#[test]
fn address_queries_need_exactly_one_port() {
    let (mut registry, mut socket) = stack(2);
    socket.connect(&mut registry, adapter(9)).unwrap();
    assert_eq!(socket.local_addr(), Err(Error::NotConnected));
    assert_eq!(socket.peer_addr(), Err(Error::NotConnected));

    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    assert_eq!(socket.peer_addr(), Err(Error::NotConnected));
    // The adapter substitutes its own address for the wildcard.
    assert_eq!(socket.local_addr(), Ok(adapter(1)));
}

#[test]
fn send_without_destination_is_not_connected() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    assert_eq!(socket.send(&[0u8; 4]), Err(Error::NotConnected));
    assert_eq!(socket.send_to(&[0u8; 4], adapter(3)), Ok(4));
}

#[test]
fn io_on_an_unbound_socket_is_not_connected() {
    let (_registry, mut socket) = stack(1);
    let mut buffer = [0u8; 16];
    assert_eq!(socket.receive(&mut buffer), Err(Error::NotConnected));
    assert_eq!(socket.send_to(&[0u8; 4], adapter(3)), Err(Error::NotConnected));
}

#[test]
fn configure_failure_maps_to_socket_error() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .fail_next_configure(driver::Error::NoMapping);
    assert_eq!(socket.ensure_configured(), Err(Error::AddressFamilyUnsupported));
    assert!(!socket.is_configured());
    // The verdict is settled on the first call; the error is reported exactly once.
    socket.ensure_configured().unwrap();
    assert!(!socket.ports()[0].is_configured());
}

#[test]
fn partial_configure_failure_keeps_healthy_ports_running() {
    let (mut registry, mut socket) = stack(2);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket
        .port_mut(1)
        .unwrap()
        .driver_mut()
        .fail_next_configure(driver::Error::Device);

    // The failing port is reported, but the walk covers every port and one
    // success is enough to connect the socket and start its receive engine.
    assert_eq!(socket.ensure_configured(), Err(Error::Io));
    assert_eq!(socket.state(), State::Connected);
    assert!(socket.ports()[0].is_configured());
    assert!(!socket.ports()[1].is_configured());
    assert!(socket.ports()[0].is_receive_pending());
    assert!(!socket.ports()[1].is_receive_pending());

    socket.ensure_configured().unwrap();
    let source = adapter(9);
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .inject_datagram(source, header(20), vec![0x77; 4]);
    socket.poll();
    let mut buffer = [0u8; 64];
    assert_eq!(socket.receive(&mut buffer), Ok((24, source)));
}

#[test]
fn header_inclusion_option_reaches_the_driver() {
    let (mut registry, mut socket) = stack(1);
    assert_eq!(socket.option(OptionName::IncludeHeader), SocketOption::IncludeHeader(false));
    socket.set_option(SocketOption::IncludeHeader(true)).unwrap();
    assert_eq!(socket.option(OptionName::IncludeHeader), SocketOption::IncludeHeader(true));

    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();
    assert!(socket.ports()[0].config().raw_data);
}

#[test]
fn cancel_absorbs_the_abort_and_allows_restart() {
    let (mut registry, mut socket) = stack(1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    socket.ensure_configured().unwrap();
    assert!(socket.ports()[0].is_receive_pending());

    socket.rx_cancel().unwrap();
    socket.poll();
    assert_eq!(socket.state(), State::Connected);

    // Cancelling again races a completed (absent) receive; that still succeeds.
    socket.rx_cancel().unwrap();

    let mut buffer = [0u8; 16];
    assert_eq!(socket.receive(&mut buffer), Err(Error::WouldBlock));
    assert!(socket.ports()[0].is_receive_pending());
}

#[test]
fn close_releases_every_resource() {
    let (mut registry, mut socket) = stack(2);
    socket.connect(&mut registry, adapter(9)).unwrap();
    socket.ensure_configured().unwrap();
    socket.port_mut(0).unwrap().driver_mut().set_auto_complete(false);

    // Queued receive buffers, an in-flight transmit and a queued datagram to unwind.
    socket
        .port_mut(0)
        .unwrap()
        .driver_mut()
        .inject_datagram(adapter(8), header(20), vec![0x66; 40]);
    socket.poll();
    for _ in 0..super::TX_SLOTS + 1 {
        assert_eq!(socket.send(&[0u8; 8]), Ok(8));
    }
    assert!(socket.receive_backlog() > 0);
    assert!(socket.transmit_backlog() > 0);

    socket.close(&mut registry).unwrap();
    assert_eq!(socket.state(), State::Unconnected);
    assert_eq!(socket.ports().len(), 0);
    assert_eq!(socket.receive_backlog(), 0);
    assert_eq!(socket.transmit_backlog(), 0);
    for index in 0..2 {
        let service = registry.get_mut(index).unwrap();
        assert_eq!(service.created(), 1);
        assert_eq!(service.destroyed(), 1);
    }

    // A closed socket can be bound again.
    socket.bind(&mut registry, Address::ANY).unwrap();
    assert_eq!(socket.ports().len(), 2);
}

#[test]
fn removed_services_are_skipped_on_bind() {
    let (mut registry, mut socket) = stack(2);
    registry.remove(0).unwrap();
    assert_eq!(registry.len(), 1);
    socket.bind(&mut registry, Address::ANY).unwrap();
    assert_eq!(socket.ports().len(), 1);
    assert_eq!(socket.ports()[0].service(), 1);
}
