//! Construction of fully framed outbound ICMPv6 packets.
//!
//! Every control packet this switch originates is VLAN-tagged and carries
//! network-control precedence in the IPv6 traffic class, so the frame
//! layout is fixed: Ethernet, 802.1Q tag, IPv6, ICMPv6, body.

use sw6_pkt::ether::{EtherAddr, EtherHeader, EtherType, VlanTag, ETHER_HEADER_LEN, VLAN_TAG_LEN};
use sw6_pkt::icmpv6::{self, Icmpv6Header, Icmpv6Type, ICMPV6_HEADER_LEN};
use sw6_pkt::ipv6::{IpProtocol, Ipv6Addr, Ipv6Header, IPV6_HEADER_LEN};
use sw6_pkt::WriteCursor;

use crate::services::PacketTx;
use crate::types::{TxPacket, VlanId};

/// Bytes in front of the IPv6 header on a generated frame.
pub const L2_LEN: usize = ETHER_HEADER_LEN + VLAN_TAG_LEN;
/// Offset of the ICMPv6 header in a generated frame.
pub const ICMP_OFFSET: usize = L2_LEN + IPV6_HEADER_LEN;

/// Total frame length of an ICMPv6 packet carrying `body_len` body bytes.
pub const fn icmpv6_packet_len(body_len: usize) -> usize {
    ICMP_OFFSET + ICMPV6_HEADER_LEN + body_len
}

/// Traffic class for generated control packets: CS7 (network control).
const TRAFFIC_CLASS_NC: u8 = 0xe0;

/// Allocate and fill a complete ICMPv6 frame.
///
/// `write_body` is handed a cursor over exactly `body_len` bytes at the
/// body offset and must fill all of them; the checksum is computed over the
/// finished message and the IPv6 pseudo-header. The returned packet is
/// ready to transmit.
pub fn build_icmpv6_packet<F>(
    tx: &dyn PacketTx,
    dst_mac: EtherAddr,
    src_mac: EtherAddr,
    vlan: VlanId,
    dst_ip: &Ipv6Addr,
    src_ip: &Ipv6Addr,
    msg_type: Icmpv6Type,
    code: u8,
    body_len: usize,
    write_body: F,
) -> TxPacket
where
    F: FnOnce(&mut WriteCursor<'_>),
{
    let total_len = icmpv6_packet_len(body_len);
    let mut pkt = tx.allocate_packet(total_len);
    let buf = pkt.as_mut_slice();

    let mut eth = EtherHeader::parse_unchecked(&mut buf[..ETHER_HEADER_LEN]);
    eth.set_dst_addr(dst_mac);
    eth.set_src_addr(src_mac);
    eth.set_ethertype(EtherType::VLAN);

    let mut tag = VlanTag::parse_unchecked(&mut buf[ETHER_HEADER_LEN..L2_LEN]);
    tag.set_vid(vlan.0);
    tag.set_ethertype(EtherType::IPV6);

    let mut ipv6 = Ipv6Header::parse_unchecked(&mut buf[L2_LEN..ICMP_OFFSET]);
    ipv6.adjust_version();
    ipv6.set_traffic_class(TRAFFIC_CLASS_NC);
    ipv6.set_payload_len((ICMPV6_HEADER_LEN + body_len) as u16);
    ipv6.set_next_header(IpProtocol::ICMPV6);
    ipv6.set_hop_limit(255);
    ipv6.set_src_addr(src_ip);
    ipv6.set_dst_addr(dst_ip);

    let mut icmp = Icmpv6Header::parse_unchecked(&mut buf[ICMP_OFFSET..ICMP_OFFSET + ICMPV6_HEADER_LEN]);
    icmp.set_msg_type(msg_type);
    icmp.set_code(code);
    icmp.set_checksum(0);

    let body_start = ICMP_OFFSET + ICMPV6_HEADER_LEN;
    let mut cursor = WriteCursor::new(&mut buf[body_start..body_start + body_len]);
    write_body(&mut cursor);
    debug_assert_eq!(cursor.pos(), body_len);

    let cksum = icmpv6::compute_checksum(src_ip, dst_ip, &buf[ICMP_OFFSET..]);
    Icmpv6Header::parse_unchecked(&mut buf[ICMP_OFFSET..]).set_checksum(cksum);

    pkt
}
