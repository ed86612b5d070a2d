//! Ethernet II framing plus the 802.1Q tag used on all switch-generated
//! control packets.

use core::fmt;

use byteorder::{ByteOrder, NetworkEndian};

wire_enum! {
    /// An enum-like type for representing the ethertype field.
    pub struct EtherType (u16) {
        /// Frame payload is Ipv4.
        IPV4 = 0x0800,
        /// Frame payload is Ipv6.
        IPV6 = 0x86DD,
        /// Frame carries an 802.1Q vlan tag.
        VLAN = 0x8100,
    }
}

/// A six-octet IEEE 802 hardware address, in network byte order.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct EtherAddr(pub [u8; 6]);

impl EtherAddr {
    /// The all-ones broadcast address.
    pub const BROADCAST: EtherAddr = EtherAddr([0xff; 6]);

    /// Construct an address from a six-octet slice.
    ///
    /// # Panics
    /// Panics if `data` is not six octets long.
    pub fn from_bytes(data: &[u8]) -> EtherAddr {
        let mut bytes = [0; 6];
        bytes.copy_from_slice(data);
        EtherAddr(bytes)
    }

    /// The address as a byte slice.
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the group bit is set.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Query whether this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the address names a single station.
    pub fn is_unicast(&self) -> bool {
        !(self.is_multicast() || self.is_broadcast())
    }
}

impl fmt::Display for EtherAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Length of an untagged Ethernet II header.
pub const ETHER_HEADER_LEN: usize = 14;

/// An Ethernet II header view.
#[derive(Debug, Clone, Copy)]
pub struct EtherHeader<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> EtherHeader<T> {
    /// Check the buffer length and wrap it.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= ETHER_HEADER_LEN {
            Ok(Self { buf })
        } else {
            Err(buf)
        }
    }

    /// Wrap a buffer whose length has already been checked.
    #[inline]
    pub fn parse_unchecked(buf: T) -> Self {
        Self { buf }
    }

    /// Destination hardware address.
    #[inline]
    pub fn dst_addr(&self) -> EtherAddr {
        EtherAddr::from_bytes(&self.buf.as_ref()[0..6])
    }

    /// Source hardware address.
    #[inline]
    pub fn src_addr(&self) -> EtherAddr {
        EtherAddr::from_bytes(&self.buf.as_ref()[6..12])
    }

    /// The ethertype field.
    #[inline]
    pub fn ethertype(&self) -> EtherType {
        NetworkEndian::read_u16(&self.buf.as_ref()[12..14]).into()
    }

    /// The bytes following the header.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[ETHER_HEADER_LEN..]
    }
}

impl<T: AsMut<[u8]>> EtherHeader<T> {
    /// Set the destination hardware address.
    #[inline]
    pub fn set_dst_addr(&mut self, value: EtherAddr) {
        self.buf.as_mut()[0..6].copy_from_slice(value.as_bytes());
    }

    /// Set the source hardware address.
    #[inline]
    pub fn set_src_addr(&mut self, value: EtherAddr) {
        self.buf.as_mut()[6..12].copy_from_slice(value.as_bytes());
    }

    /// Set the ethertype field.
    #[inline]
    pub fn set_ethertype(&mut self, value: EtherType) {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[12..14], value.into());
    }
}

/// Length of an 802.1Q tag (TCI plus the inner ethertype).
pub const VLAN_TAG_LEN: usize = 4;

/// The four tag bytes that follow a `EtherType::VLAN` ethertype.
#[derive(Debug, Clone, Copy)]
pub struct VlanTag<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> VlanTag<T> {
    /// Check the buffer length and wrap it.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= VLAN_TAG_LEN {
            Ok(Self { buf })
        } else {
            Err(buf)
        }
    }

    /// Wrap a buffer whose length has already been checked.
    #[inline]
    pub fn parse_unchecked(buf: T) -> Self {
        Self { buf }
    }

    /// Priority code point.
    #[inline]
    pub fn priority(&self) -> u8 {
        self.buf.as_ref()[0] >> 5
    }

    /// The 12-bit vlan identifier.
    #[inline]
    pub fn vid(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf.as_ref()[0..2]) & 0x0fff
    }

    /// Ethertype of the encapsulated payload.
    #[inline]
    pub fn ethertype(&self) -> EtherType {
        NetworkEndian::read_u16(&self.buf.as_ref()[2..4]).into()
    }

    /// The bytes following the tag.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[VLAN_TAG_LEN..]
    }
}

impl<T: AsMut<[u8]>> VlanTag<T> {
    /// Set the priority code point.
    #[inline]
    pub fn set_priority(&mut self, value: u8) {
        assert!(value <= 7);
        self.buf.as_mut()[0] = (self.buf.as_mut()[0] & 0x1f) | (value << 5);
    }

    /// Set the 12-bit vlan identifier.
    #[inline]
    pub fn set_vid(&mut self, value: u16) {
        assert!(value <= 0x0fff);
        let keep = u16::from(self.buf.as_mut()[0] & 0xf0) << 8;
        NetworkEndian::write_u16(&mut self.buf.as_mut()[0..2], keep | value);
    }

    /// Set the ethertype of the encapsulated payload.
    #[inline]
    pub fn set_ethertype(&mut self, value: EtherType) {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[2..4], value.into());
    }
}
