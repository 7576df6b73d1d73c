//! Wire-level types used by the socket layer.
//!
//! Only the types that cross the interface to the protocol driver live here: the IPv4 address in
//! its four-octet network byte order form and the IP protocol number. Packet parsing and
//! serialization belong to the driver, not to this crate.
use core::fmt;

use byteorder::{ByteOrder, NetworkEndian};

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// The wildcard address, matching any local network stack.
    pub const ANY: Address = Address([0x00; 4]);

    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 4]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode the address into a `u32` in network endian byte order.
    pub fn to_network_integer(self) -> u32 {
        NetworkEndian::read_u32(&self.0)
    }

    /// Decode a network endian `u32` into an address.
    pub fn from_network_integer(value: u32) -> Self {
        let mut bytes = [0; 4];
        NetworkEndian::write_u32(&mut bytes, value);
        Address(bytes)
    }

    /// Query whether the address is the wildcard address.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0x00; 4]
    }

    /// Query whether the address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 4]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        /// Hop-by-hop options.
        HopByHop = 0x00,
        /// Internet control message protocol.
        Icmp     = 0x01,
        /// Internet group management protocol.
        Igmp     = 0x02,
        /// Transmission control protocol.
        Tcp      = 0x06,
        /// User datagram protocol.
        Udp      = 0x11,
        /// Reserved value, used by raw sockets that supply their own header.
        Raw      = 0xff,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::HopByHop    => write!(f, "Hop-by-Hop"),
            Protocol::Icmp        => write!(f, "ICMP"),
            Protocol::Igmp        => write!(f, "IGMP"),
            Protocol::Tcp         => write!(f, "TCP"),
            Protocol::Udp         => write!(f, "UDP"),
            Protocol::Raw         => write!(f, "Raw"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id),
        }
    }
}
