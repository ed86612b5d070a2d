//! NDP message bodies and the option TLVs they carry (RFC 4861 §4).
//!
//! Every view covers the full ICMPv6 message, so field offsets include the
//! 4-byte ICMPv6 header, matching the wire layout diagrams in the RFC.

use core::fmt;

use byteorder::{ByteOrder, NetworkEndian};

use crate::cursor::WriteCursor;
use crate::ether::EtherAddr;
use crate::ipv6::Ipv6Addr;

/// Neighbor-advertisement flag bits as carried in the 4-byte flags field.
pub mod na_flags {
    /// Sender is a router.
    pub const ROUTER: u32 = 0x8000_0000;
    /// Advertisement answers a solicitation.
    pub const SOLICITED: u32 = 0x4000_0000;
    /// Advertisement overrides cached entries.
    pub const OVERRIDE: u32 = 0x2000_0000;
}

/// A router solicitation message.
#[derive(Debug)]
pub struct RouterSolicitMsg<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> RouterSolicitMsg<T> {
    /// Check the buffer length and wrap it.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= 8 {
            Ok(Self { buf })
        } else {
            Err(buf)
        }
    }

    /// The option TLVs after the reserved field.
    #[inline]
    pub fn option_bytes(&self) -> &[u8] {
        &self.buf.as_ref()[8..]
    }
}

/// A router advertisement message.
#[derive(Debug)]
pub struct RouterAdvertMsg<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> RouterAdvertMsg<T> {
    /// Check the buffer length and wrap it.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= 16 {
            Ok(Self { buf })
        } else {
            Err(buf)
        }
    }

    /// The hop limit the router suggests for outgoing packets.
    #[inline]
    pub fn cur_hop_limit(&self) -> u8 {
        self.buf.as_ref()[4]
    }

    /// The managed-address-configuration flag.
    #[inline]
    pub fn m_flag(&self) -> bool {
        self.buf.as_ref()[5] >> 7 == 1
    }

    /// The other-configuration flag.
    #[inline]
    pub fn o_flag(&self) -> bool {
        (self.buf.as_ref()[5] >> 6) & 1 == 1
    }

    /// Router lifetime in seconds.
    #[inline]
    pub fn router_lifetime(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf.as_ref()[6..8])
    }

    /// Reachable time in milliseconds.
    #[inline]
    pub fn reachable_time(&self) -> u32 {
        NetworkEndian::read_u32(&self.buf.as_ref()[8..12])
    }

    /// Retransmission timer in milliseconds.
    #[inline]
    pub fn retrans_timer(&self) -> u32 {
        NetworkEndian::read_u32(&self.buf.as_ref()[12..16])
    }

    /// The option TLVs after the fixed fields.
    #[inline]
    pub fn option_bytes(&self) -> &[u8] {
        &self.buf.as_ref()[16..]
    }
}

/// A neighbor solicitation message.
#[derive(Debug)]
pub struct NeighborSolicitMsg<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> NeighborSolicitMsg<T> {
    /// Check the buffer length and wrap it.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= 24 {
            Ok(Self { buf })
        } else {
            Err(buf)
        }
    }

    /// The address whose link-layer binding is being solicited.
    #[inline]
    pub fn target_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from_bytes(&self.buf.as_ref()[8..24])
    }

    /// The option TLVs after the target address.
    #[inline]
    pub fn option_bytes(&self) -> &[u8] {
        &self.buf.as_ref()[24..]
    }
}

/// A neighbor advertisement message.
#[derive(Debug)]
pub struct NeighborAdvertMsg<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> NeighborAdvertMsg<T> {
    /// Check the buffer length and wrap it.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= 24 {
            Ok(Self { buf })
        } else {
            Err(buf)
        }
    }

    /// The raw R/S/O flag word.
    #[inline]
    pub fn flags(&self) -> u32 {
        NetworkEndian::read_u32(&self.buf.as_ref()[4..8])
    }

    /// The address the advertisement is about.
    #[inline]
    pub fn target_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from_bytes(&self.buf.as_ref()[8..24])
    }

    /// The option TLVs after the target address.
    #[inline]
    pub fn option_bytes(&self) -> &[u8] {
        &self.buf.as_ref()[24..]
    }
}

const OPT_SOURCE_LINK_LAYER: u8 = 1;
const OPT_TARGET_LINK_LAYER: u8 = 2;
/// Prefix-information option type, emitted in router advertisements.
pub const OPT_PREFIX_INFO: u8 = 3;
/// MTU option type, emitted in router advertisements.
pub const OPT_MTU: u8 = 5;

/// Why an option list failed to parse.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NdpOptionError {
    /// An option ran past the end of the message.
    Truncated,
    /// An option declared a length of zero units.
    ZeroLength,
    /// A link-layer address option was not one unit long.
    BadLinkAddrLen,
}

impl fmt::Display for NdpOptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NdpOptionError::Truncated => write!(f, "NDP option truncated"),
            NdpOptionError::ZeroLength => write!(f, "NDP option with zero length"),
            NdpOptionError::BadLinkAddrLen => {
                write!(f, "NDP link-layer address option with bad length")
            }
        }
    }
}

/// The two option kinds the agent acts on, pulled out of a TLV walk.
///
/// Unknown option types are skipped by their declared length rather than
/// rejected; a later duplicate of a known option wins.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct NdpOptions {
    /// Source link-layer address option, when present.
    pub source_link_layer: Option<EtherAddr>,
    /// Target link-layer address option, when present.
    pub target_link_layer: Option<EtherAddr>,
}

impl NdpOptions {
    /// Walk the TLV sequence in `bytes`.
    pub fn parse(mut bytes: &[u8]) -> Result<NdpOptions, NdpOptionError> {
        let mut options = NdpOptions::default();
        while !bytes.is_empty() {
            if bytes.len() < 2 {
                return Err(NdpOptionError::Truncated);
            }
            let opt_type = bytes[0];
            let opt_len = usize::from(bytes[1]) * 8;
            if opt_len == 0 {
                return Err(NdpOptionError::ZeroLength);
            }
            if opt_len > bytes.len() {
                return Err(NdpOptionError::Truncated);
            }
            match opt_type {
                OPT_SOURCE_LINK_LAYER | OPT_TARGET_LINK_LAYER => {
                    if bytes[1] != 1 {
                        return Err(NdpOptionError::BadLinkAddrLen);
                    }
                    let mac = EtherAddr::from_bytes(&bytes[2..8]);
                    if opt_type == OPT_SOURCE_LINK_LAYER {
                        options.source_link_layer = Some(mac);
                    } else {
                        options.target_link_layer = Some(mac);
                    }
                }
                _ => {}
            }
            bytes = &bytes[opt_len..];
        }
        Ok(options)
    }

    /// Number of bytes `emit` will write.
    pub fn wire_len(&self) -> usize {
        let mut len = 0;
        if self.source_link_layer.is_some() {
            len += 8;
        }
        if self.target_link_layer.is_some() {
            len += 8;
        }
        len
    }

    /// Serialize the present options as TLVs.
    pub fn emit(&self, cursor: &mut WriteCursor<'_>) {
        if let Some(mac) = self.source_link_layer {
            cursor.write_u8(OPT_SOURCE_LINK_LAYER);
            cursor.write_u8(1);
            cursor.write_slice(mac.as_bytes());
        }
        if let Some(mac) = self.target_link_layer {
            cursor.write_u8(OPT_TARGET_LINK_LAYER);
            cursor.write_u8(1);
            cursor.write_slice(mac.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static NS_BYTES: [u8; 32] = [
        // type, code, checksum, reserved
        0x87, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        // target fe80::99
        0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x99,
        // source link-layer option
        0x01, 0x01, 0x02, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    ];

    #[test]
    fn neighbor_solicit_view() {
        let ns = NeighborSolicitMsg::parse(&NS_BYTES[..]).unwrap();
        assert_eq!(
            ns.target_addr(),
            Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0x99)
        );
        let options = NdpOptions::parse(ns.option_bytes()).unwrap();
        assert_eq!(
            options.source_link_layer,
            Some(EtherAddr([0x02, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e]))
        );
        assert_eq!(options.target_link_layer, None);

        assert!(NeighborSolicitMsg::parse(&NS_BYTES[..23]).is_err());
    }

    #[test]
    fn neighbor_advert_view() {
        let mut bytes = NS_BYTES;
        bytes[0] = 0x88;
        bytes[4..8].copy_from_slice(&0x60000000u32.to_be_bytes());
        bytes[24] = 0x02; // target link-layer option

        let na = NeighborAdvertMsg::parse(&bytes[..]).unwrap();
        assert_eq!(na.flags(), na_flags::SOLICITED | na_flags::OVERRIDE);
        assert_eq!(
            na.target_addr(),
            Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0x99)
        );
        let options = NdpOptions::parse(na.option_bytes()).unwrap();
        assert_eq!(
            options.target_link_layer,
            Some(EtherAddr([0x02, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e]))
        );
    }

    #[test]
    fn unknown_options_skipped() {
        // nonce option (type 14), then a source link-layer address
        let bytes = [
            0x0e, 0x01, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, //
            0x01, 0x01, 0x02, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        ];
        let options = NdpOptions::parse(&bytes[..]).unwrap();
        assert_eq!(
            options.source_link_layer,
            Some(EtherAddr([0x02, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e]))
        );
    }

    #[test]
    fn malformed_options_rejected() {
        assert_eq!(
            NdpOptions::parse(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
            Err(NdpOptionError::ZeroLength)
        );
        assert_eq!(
            NdpOptions::parse(&[0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
            Err(NdpOptionError::Truncated)
        );
        assert_eq!(NdpOptions::parse(&[0x01]), Err(NdpOptionError::Truncated));
        assert_eq!(
            NdpOptions::parse(&[
                0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ]),
            Err(NdpOptionError::BadLinkAddrLen)
        );
        assert_eq!(NdpOptions::parse(&[]), Ok(NdpOptions::default()));
    }

    #[test]
    fn options_emit_round_trip() {
        let options = NdpOptions {
            source_link_layer: Some(EtherAddr([1, 2, 3, 4, 5, 6])),
            target_link_layer: None,
        };
        let mut buf = [0u8; 8];
        assert_eq!(options.wire_len(), buf.len());
        options.emit(&mut WriteCursor::new(&mut buf[..]));
        assert_eq!(NdpOptions::parse(&buf[..]), Ok(options));
    }
}
