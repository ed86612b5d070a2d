//! The fixed 40-byte IPv6 header and address helpers.

use core::fmt;

use byteorder::{ByteOrder, NetworkEndian};

use crate::ether::EtherAddr;

wire_enum! {
    /// An enum-like type for representing the IPv6 next-header field.
    pub struct IpProtocol (u8) {
        /// Payload is Tcp.
        TCP = 6,
        /// Payload is Udp.
        UDP = 17,
        /// Payload is Icmpv6.
        ICMPV6 = 58,
    }
}

/// The minimum MTU every IPv6 link must support (RFC 8200 §5).
pub const IPV6_MIN_MTU: usize = 1280;

/// A sixteen-octet IPv6 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Ipv6Addr(pub [u8; 16]);

impl Ipv6Addr {
    /// The unspecified address `::`.
    pub const UNSPECIFIED: Ipv6Addr = Ipv6Addr([0x00; 16]);

    /// The link-local all-nodes group `ff02::1`.
    pub const ALL_NODES: Ipv6Addr = Ipv6Addr([
        0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01,
    ]);

    /// The link-local all-routers group `ff02::2`.
    pub const ALL_ROUTERS: Ipv6Addr = Ipv6Addr([
        0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x02,
    ]);

    /// The interface-local all-nodes group `ff01::1`.
    pub const INTERFACE_LOCAL_ALL_NODES: Ipv6Addr = Ipv6Addr([
        0xff, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01,
    ]);

    /// Construct an address from eight 16-bit groups.
    pub const fn new(
        a0: u16,
        a1: u16,
        a2: u16,
        a3: u16,
        a4: u16,
        a5: u16,
        a6: u16,
        a7: u16,
    ) -> Ipv6Addr {
        Ipv6Addr([
            (a0 >> 8) as u8,
            a0 as u8,
            (a1 >> 8) as u8,
            a1 as u8,
            (a2 >> 8) as u8,
            a2 as u8,
            (a3 >> 8) as u8,
            a3 as u8,
            (a4 >> 8) as u8,
            a4 as u8,
            (a5 >> 8) as u8,
            a5 as u8,
            (a6 >> 8) as u8,
            a6 as u8,
            (a7 >> 8) as u8,
            a7 as u8,
        ])
    }

    /// Construct an address from a sixteen-octet slice.
    ///
    /// # Panics
    /// Panics if `data` is not sixteen octets long.
    pub fn from_bytes(data: &[u8]) -> Ipv6Addr {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(data);
        Ipv6Addr(bytes)
    }

    /// The address as a byte slice.
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether this is the unspecified address.
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// Query whether the address is in `ff00::/8`.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] == 0xff
    }

    /// Query whether the address is in the link-local unicast range
    /// `fe80::/10`.
    pub const fn is_link_local(&self) -> bool {
        self.0[0] == 0xfe && self.0[1] & 0xc0 == 0x80
    }

    /// Query whether this is the link-local all-nodes group `ff02::1`.
    pub fn is_all_nodes(&self) -> bool {
        *self == Self::ALL_NODES
    }

    /// The solicited-node multicast group for this address (RFC 4291
    /// §2.7.1): `ff02::1:ff00:0/104` plus the low 24 address bits.
    pub fn solicited_node(&self) -> Ipv6Addr {
        let mut bytes = [0; 16];
        bytes[0] = 0xff;
        bytes[1] = 0x02;
        bytes[11] = 0x01;
        bytes[12] = 0xff;
        bytes[13..16].copy_from_slice(&self.0[13..16]);
        Ipv6Addr(bytes)
    }

    /// The `33:33` hardware address an IPv6 multicast group maps onto
    /// (RFC 2464 §7).
    pub fn multicast_ether(&self) -> EtherAddr {
        EtherAddr([0x33, 0x33, self.0[12], self.0[13], self.0[14], self.0[15]])
    }

    /// The modified-EUI-64 link-local address derived from `mac`.
    pub fn link_local_from_mac(mac: &EtherAddr) -> Ipv6Addr {
        let m = mac.as_bytes();
        let mut bytes = [0; 16];
        bytes[0] = 0xfe;
        bytes[1] = 0x80;
        bytes[8] = m[0] ^ 0x02;
        bytes[9] = m[1];
        bytes[10] = m[2];
        bytes[11] = 0xff;
        bytes[12] = 0xfe;
        bytes[13] = m[3];
        bytes[14] = m[4];
        bytes[15] = m[5];
        Ipv6Addr(bytes)
    }

    /// Query whether this address falls inside `net/prefix_len`.
    pub fn is_in_subnet(&self, net: &Ipv6Addr, prefix_len: u8) -> bool {
        self.masked(prefix_len) == net.masked(prefix_len)
    }

    /// This address with all bits past `prefix_len` cleared.
    pub fn masked(&self, prefix_len: u8) -> Ipv6Addr {
        assert!(prefix_len <= 128);
        let mut bytes = self.0;
        let full = usize::from(prefix_len) / 8;
        let rem = prefix_len % 8;
        if full < 16 {
            if rem != 0 {
                bytes[full] &= 0xff << (8 - rem);
                bytes[full + 1..].fill(0);
            } else {
                bytes[full..].fill(0);
            }
        }
        Ipv6Addr(bytes)
    }
}

impl fmt::Display for Ipv6Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut groups = [0u16; 8];
        for (i, chunk) in self.0.chunks(2).enumerate() {
            groups[i] = NetworkEndian::read_u16(chunk);
        }

        // Longest run of zero groups collapses to "::" (RFC 5952).
        let (mut best_at, mut best_len) = (0, 0);
        let (mut at, mut len) = (0, 0);
        for (i, &g) in groups.iter().enumerate() {
            if g == 0 {
                if len == 0 {
                    at = i;
                }
                len += 1;
                if len > best_len {
                    best_at = at;
                    best_len = len;
                }
            } else {
                len = 0;
            }
        }

        if best_len < 2 {
            write!(f, "{:x}", groups[0])?;
            for g in &groups[1..] {
                write!(f, ":{:x}", g)?;
            }
            return Ok(());
        }
        for (i, g) in groups[..best_at].iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:x}", g)?;
        }
        write!(f, "::")?;
        for (i, g) in groups[best_at + best_len..].iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:x}", g)?;
        }
        Ok(())
    }
}

/// Length of the fixed IPv6 header.
pub const IPV6_HEADER_LEN: usize = 40;

/// A 40-byte header with only the version nibble filled in.
pub const IPV6_HEADER_TEMPLATE: [u8; IPV6_HEADER_LEN] = [
    0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// The fixed IPv6 header view.
#[derive(Debug, Clone, Copy)]
pub struct Ipv6Header<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> Ipv6Header<T> {
    /// Check the buffer length and wrap it.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= IPV6_HEADER_LEN {
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

    /// The 40 header bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf.as_ref()[0..IPV6_HEADER_LEN]
    }

    /// Copy the header into an owned array-backed view.
    #[inline]
    pub fn to_owned(&self) -> Ipv6Header<[u8; IPV6_HEADER_LEN]> {
        let mut buf = [0; IPV6_HEADER_LEN];
        buf.copy_from_slice(self.as_bytes());
        Ipv6Header { buf }
    }

    /// Query whether the version nibble reads 6.
    #[inline]
    pub fn check_version(&self) -> bool {
        (self.buf.as_ref()[0] >> 4) == 6
    }

    /// The traffic class octet.
    #[inline]
    pub fn traffic_class(&self) -> u8 {
        (self.buf.as_ref()[0] << 4) | (self.buf.as_ref()[1] >> 4)
    }

    /// The 20-bit flow label.
    #[inline]
    pub fn flow_label(&self) -> u32 {
        NetworkEndian::read_u24(&self.buf.as_ref()[1..4]) & 0x0fffff
    }

    /// Length of the payload following this header.
    #[inline]
    pub fn payload_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf.as_ref()[4..6])
    }

    /// The next-header protocol number.
    #[inline]
    pub fn next_header(&self) -> IpProtocol {
        self.buf.as_ref()[6].into()
    }

    /// The hop limit.
    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.buf.as_ref()[7]
    }

    /// The source address.
    #[inline]
    pub fn src_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from_bytes(&self.buf.as_ref()[8..24])
    }

    /// The destination address.
    #[inline]
    pub fn dst_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from_bytes(&self.buf.as_ref()[24..40])
    }

    /// The bytes following the header.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[IPV6_HEADER_LEN..]
    }
}

impl<T: AsMut<[u8]>> Ipv6Header<T> {
    /// Force the version nibble to 6.
    #[inline]
    pub fn adjust_version(&mut self) {
        self.buf.as_mut()[0] = (self.buf.as_mut()[0] & 0x0f) | (6 << 4);
    }

    /// Set the traffic class octet.
    #[inline]
    pub fn set_traffic_class(&mut self, value: u8) {
        self.buf.as_mut()[0] = (self.buf.as_mut()[0] & 0xf0) | (value >> 4);
        self.buf.as_mut()[1] = (self.buf.as_mut()[1] & 0x0f) | (value << 4);
    }

    /// Set the 20-bit flow label.
    #[inline]
    pub fn set_flow_label(&mut self, value: u32) {
        assert!(value <= 0xfffff);
        let keep = u32::from(self.buf.as_mut()[1] & 0xf0) << 16;
        NetworkEndian::write_u24(&mut self.buf.as_mut()[1..4], keep | value);
    }

    /// Set the payload length.
    #[inline]
    pub fn set_payload_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[4..6], value);
    }

    /// Set the next-header protocol number.
    #[inline]
    pub fn set_next_header(&mut self, value: IpProtocol) {
        self.buf.as_mut()[6] = value.into();
    }

    /// Set the hop limit.
    #[inline]
    pub fn set_hop_limit(&mut self, value: u8) {
        self.buf.as_mut()[7] = value;
    }

    /// Set the source address.
    #[inline]
    pub fn set_src_addr(&mut self, value: &Ipv6Addr) {
        self.buf.as_mut()[8..24].copy_from_slice(value.as_bytes());
    }

    /// Set the destination address.
    #[inline]
    pub fn set_dst_addr(&mut self, value: &Ipv6Addr) {
        self.buf.as_mut()[24..40].copy_from_slice(value.as_bytes());
    }
}
