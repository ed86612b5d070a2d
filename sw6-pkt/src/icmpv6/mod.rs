//! The ICMPv6 header, checksum handling, and the NDP message bodies
//! carried inside it.

use byteorder::{ByteOrder, NetworkEndian};

use crate::checksum;
use crate::ipv6::{IpProtocol, Ipv6Addr};

pub mod ndp;

wire_enum! {
    /// An enum-like type for representing ICMPv6 message types.
    pub struct Icmpv6Type (u8) {
        /// Destination unreachable error.
        DST_UNREACHABLE = 1,
        /// Packet too big error.
        PKT_TOO_BIG = 2,
        /// Time exceeded error.
        TIME_EXCEEDED = 3,
        /// Parameter problem error.
        PARAM_PROBLEM = 4,
        /// Echo request.
        ECHO_REQUEST = 128,
        /// Echo reply.
        ECHO_REPLY = 129,
        /// NDP router solicitation.
        ROUTER_SOLICIT = 133,
        /// NDP router advertisement.
        ROUTER_ADVERT = 134,
        /// NDP neighbor solicitation.
        NEIGHBOR_SOLICIT = 135,
        /// NDP neighbor advertisement.
        NEIGHBOR_ADVERT = 136,
        /// NDP redirect.
        REDIRECT = 137,
    }
}

/// Code for hop-limit-exceeded time exceeded errors.
pub const CODE_TIME_EXCEEDED_HOPLIMIT: u8 = 0;
/// The only assigned packet-too-big code.
pub const CODE_PKT_TOO_BIG: u8 = 0;
/// The code carried by every NDP message.
pub const CODE_NDP: u8 = 0;

/// Length of the ICMPv6 header (type, code, checksum).
pub const ICMPV6_HEADER_LEN: usize = 4;
/// Length of the unused field opening error-message bodies.
pub const ICMPV6_UNUSED_LEN: usize = 4;
/// Length of the MTU field opening a packet-too-big body.
pub const ICMPV6_MTU_LEN: usize = 4;

/// An ICMPv6 header view.
#[derive(Debug, Clone, Copy)]
pub struct Icmpv6Header<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> Icmpv6Header<T> {
    /// Check the buffer length and wrap it.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= ICMPV6_HEADER_LEN {
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

    /// Copy the header into an owned array-backed view.
    #[inline]
    pub fn to_owned(&self) -> Icmpv6Header<[u8; ICMPV6_HEADER_LEN]> {
        let mut buf = [0; ICMPV6_HEADER_LEN];
        buf.copy_from_slice(&self.buf.as_ref()[0..ICMPV6_HEADER_LEN]);
        Icmpv6Header { buf }
    }

    /// The message type.
    #[inline]
    pub fn msg_type(&self) -> Icmpv6Type {
        self.buf.as_ref()[0].into()
    }

    /// The message code.
    #[inline]
    pub fn code(&self) -> u8 {
        self.buf.as_ref()[1]
    }

    /// The checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf.as_ref()[2..4])
    }

    /// The message body following the header.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.buf.as_ref()[ICMPV6_HEADER_LEN..]
    }
}

impl<T: AsMut<[u8]>> Icmpv6Header<T> {
    /// Set the message type.
    #[inline]
    pub fn set_msg_type(&mut self, value: Icmpv6Type) {
        self.buf.as_mut()[0] = value.into();
    }

    /// Set the message code.
    #[inline]
    pub fn set_code(&mut self, value: u8) {
        self.buf.as_mut()[1] = value;
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[2..4], value);
    }
}

/// Compute the checksum for the full ICMPv6 message `msg` (whose checksum
/// field must read zero) exchanged between `src` and `dst`.
pub fn compute_checksum(src: &Ipv6Addr, dst: &Ipv6Addr, msg: &[u8]) -> u16 {
    let pseudo = checksum::ipv6_pseudo_header(src, dst, IpProtocol::ICMPV6, msg.len() as u32);
    !checksum::combine(&[pseudo, checksum::sum(msg)])
}

/// Verify the checksum of a received ICMPv6 message, including its stored
/// checksum field.
pub fn verify_checksum(src: &Ipv6Addr, dst: &Ipv6Addr, msg: &[u8]) -> bool {
    if msg.len() < ICMPV6_HEADER_LEN {
        return false;
    }
    let pseudo = checksum::ipv6_pseudo_header(src, dst, IpProtocol::ICMPV6, msg.len() as u32);
    checksum::combine(&[pseudo, checksum::sum(msg)]) == 0xffff
}
