//! The 8-byte UDP header, parsed only far enough to classify DHCPv6
//! traffic on the ingress path.

use byteorder::{ByteOrder, NetworkEndian};

/// Length of the UDP header.
pub const UDP_HEADER_LEN: usize = 8;

/// A UDP header view.
#[derive(Debug, Clone, Copy)]
pub struct UdpHeader<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> UdpHeader<T> {
    /// Check the buffer length and wrap it.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= UDP_HEADER_LEN {
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
    pub fn to_owned(&self) -> UdpHeader<[u8; UDP_HEADER_LEN]> {
        let mut buf = [0; UDP_HEADER_LEN];
        buf.copy_from_slice(&self.buf.as_ref()[0..UDP_HEADER_LEN]);
        UdpHeader { buf }
    }

    /// The source port.
    #[inline]
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf.as_ref()[0..2])
    }

    /// The destination port.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf.as_ref()[2..4])
    }

    /// Length of the UDP header plus payload.
    #[inline]
    pub fn packet_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf.as_ref()[4..6])
    }

    /// The checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf.as_ref()[6..8])
    }

    /// The bytes following the header.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[UDP_HEADER_LEN..]
    }
}

impl<T: AsMut<[u8]>> UdpHeader<T> {
    /// Set the source port.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[0..2], value);
    }

    /// Set the destination port.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[2..4], value);
    }

    /// Set the length field.
    #[inline]
    pub fn set_packet_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[4..6], value);
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[6..8], value);
    }
}
