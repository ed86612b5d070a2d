//! The ingress entry point and the NDP dispatch state machine.

use std::sync::Arc;

use log::{debug, info, warn};

use sw6_pkt::ether::EtherAddr;
use sw6_pkt::icmpv6::ndp::{
    na_flags, NdpOptions, NeighborAdvertMsg, NeighborSolicitMsg, RouterSolicitMsg,
};
use sw6_pkt::icmpv6::{
    self, Icmpv6Header, Icmpv6Type, CODE_NDP, CODE_PKT_TOO_BIG, CODE_TIME_EXCEEDED_HOPLIMIT,
    ICMPV6_HEADER_LEN, ICMPV6_MTU_LEN, ICMPV6_UNUSED_LEN,
};
use sw6_pkt::ipv6::{IpProtocol, Ipv6Addr, Ipv6Header, IPV6_HEADER_LEN, IPV6_MIN_MTU};
use sw6_pkt::udp::UdpHeader;

use crate::icmp::{build_icmpv6_packet, icmpv6_packet_len};
use crate::radv;
use crate::services::{
    is_dhcp6_relay_or_server, Dhcp6Relay, NeighborUpdater, PacketTx, PortStatsSink, RouteLookup,
};
use crate::state::SwitchState;
use crate::types::{PortDescriptor, PortId, RouterId, RxPacket, VlanId};

/// Borrowed bundle of the headers already parsed off a packet, handed to
/// each NDP handler. Valid only for the duration of one dispatch call and
/// never stored.
pub(crate) struct IcmpHeaders<'a> {
    #[allow(dead_code)]
    pub(crate) dst: EtherAddr,
    pub(crate) src: EtherAddr,
    pub(crate) ipv6: &'a Ipv6Header<[u8; IPV6_HEADER_LEN]>,
    pub(crate) icmp6: &'a Icmpv6Header<[u8; ICMPV6_HEADER_LEN]>,
}

/// The IPv6 control-plane packet handler.
///
/// One instance serves the whole switch. Packet entry points take `&self`
/// plus the state snapshot the caller captured, so concurrent receive
/// threads may share the handler freely.
pub struct Ipv6Handler {
    pub(crate) routes: Arc<dyn RouteLookup>,
    pub(crate) neighbors: Arc<dyn NeighborUpdater>,
    pub(crate) tx: Arc<dyn PacketTx>,
    pub(crate) stats: Arc<dyn PortStatsSink>,
    dhcp: Arc<dyn Dhcp6Relay>,
}

impl Ipv6Handler {
    /// Wire up a handler with its collaborators.
    pub fn new(
        routes: Arc<dyn RouteLookup>,
        neighbors: Arc<dyn NeighborUpdater>,
        tx: Arc<dyn PacketTx>,
        stats: Arc<dyn PortStatsSink>,
        dhcp: Arc<dyn Dhcp6Relay>,
    ) -> Ipv6Handler {
        Ipv6Handler {
            routes,
            neighbors,
            tx,
            stats,
            dhcp,
        }
    }

    /// Handle a received IPv6 frame. `l3_offset` points just past the
    /// Ethernet (and tag) bytes; `dst`/`src` are the frame's MAC addresses.
    pub fn handle_packet(
        &self,
        state: &SwitchState,
        pkt: RxPacket,
        dst: EtherAddr,
        src: EtherAddr,
        l3_offset: usize,
    ) {
        let port = pkt.src_port();
        let l3 = match pkt.data().get(l3_offset..) {
            Some(l3) => l3,
            None => {
                self.stats.pkt_dropped(port);
                return;
            }
        };
        let l3_len = l3.len();
        let ipv6 = match Ipv6Header::parse(l3) {
            Ok(hdr) => hdr.to_owned(),
            Err(_) => {
                self.stats.pkt_dropped(port);
                return;
            }
        };
        if !ipv6.check_version() {
            self.stats.pkt_dropped(port);
            return;
        }
        debug!(
            "IPv6 ({} bytes) port {} vlan {} src {} ({}) dst {} ({}) next-header {}",
            l3_len,
            port,
            pkt.src_vlan(),
            ipv6.src_addr(),
            src,
            ipv6.dst_addr(),
            dst,
            ipv6.next_header().raw()
        );

        // Trailing link-layer bytes (e.g. FCS) are not part of the payload;
        // a payload length past the data on hand is a truncated packet.
        let payload_len = usize::from(ipv6.payload_len());
        if payload_len > l3_len - IPV6_HEADER_LEN {
            self.stats.pkt_dropped(port);
            return;
        }
        let l4_start = l3_offset + IPV6_HEADER_LEN;
        let l4 = &pkt.data()[l4_start..l4_start + payload_len];

        // DHCPv6 solicits legitimately arrive with hop limit 1; divert them
        // before the hop-limit policy below can answer with time exceeded.
        if ipv6.next_header() == IpProtocol::UDP {
            let udp = match UdpHeader::parse(l4) {
                Ok(udp) => udp,
                Err(_) => {
                    self.stats.pkt_dropped(port);
                    return;
                }
            };
            if is_dhcp6_relay_or_server(&udp) {
                debug!(
                    "DHCPv6 UDP packet, source port {} destination port {}",
                    udp.src_port(),
                    udp.dst_port()
                );
                let udp = udp.to_owned();
                self.dhcp.handle_packet(pkt, dst, src, ipv6, udp);
                return;
            }
        }

        let dst_addr = ipv6.dst_addr();
        let intf = if dst_addr.is_multicast() {
            // Multicast lands on the ingress VLAN's interface; ICMPv6 group
            // traffic is consumed below for NDP, the rest goes to the host.
            state.interface_in_vlan(pkt.src_vlan())
        } else if dst_addr.is_link_local() {
            state
                .interface_in_vlan(pkt.src_vlan())
                .filter(|intf| intf.has_address(&dst_addr))
        } else {
            state.interface_for_address(RouterId(0), &dst_addr)
        };

        // Destined to us: accept a hop limit of 1. Anything we would have
        // to forward needs a hop limit that survives the next hop.
        let min_hop_limit = if intf.is_some() { 0 } else { 1 };
        if ipv6.hop_limit() <= min_hop_limit {
            debug!("hop limit exceeded for packet from {}", ipv6.src_addr());
            self.stats.pkt_dropped(port);
            self.stats.ipv6_hop_exceeded(port);
            let cpu_mac = self.tx.local_mac();
            self.send_time_exceeded(state, pkt.src_vlan(), cpu_mac, cpu_mac, &ipv6, l4);
            return;
        }

        if let Some(intf) = intf {
            let intf_id = intf.id;
            let intf_mtu = intf.mtu;
            if payload_len > intf_mtu as usize {
                self.send_packet_too_big(
                    state,
                    port,
                    pkt.src_vlan(),
                    src,
                    dst,
                    &ipv6,
                    intf_mtu,
                    l4,
                );
                self.stats.pkt_dropped(port);
                return;
            }

            let pkt = if ipv6.next_header() == IpProtocol::ICMPV6 {
                match self.handle_icmpv6(state, pkt, dst, src, &ipv6, l4_start, payload_len) {
                    Some(pkt) => pkt,
                    // Consumed by the NDP machinery.
                    None => return,
                }
            } else {
                pkt
            };

            // Anything the controller does not consume goes up to the host
            // stack: ping, ssh, bgp and friends.
            if self.tx.send_to_host(intf_id, pkt) {
                self.stats.pkt_to_host(port, l3_len);
            } else {
                self.stats.pkt_dropped(port);
            }
            return;
        }

        // Never solicit for multicast or the all-nodes group.
        if !dst_addr.is_multicast() && !dst_addr.is_all_nodes() {
            self.resolve_dest_and_handle_packet(state, &ipv6, pkt, dst, src, l4_start, payload_len);
        }
    }

    /// Dispatch an ICMPv6 message destined to the switch. Returns the
    /// packet unconsumed when it is ordinary payload for the host stack.
    fn handle_icmpv6(
        &self,
        state: &SwitchState,
        pkt: RxPacket,
        dst: EtherAddr,
        src: EtherAddr,
        ipv6: &Ipv6Header<[u8; IPV6_HEADER_LEN]>,
        l4_start: usize,
        l4_len: usize,
    ) -> Option<RxPacket> {
        let port = pkt.src_port();
        let msg = &pkt.data()[l4_start..l4_start + l4_len];
        let icmp6 = match Icmpv6Header::parse(msg) {
            Ok(hdr) => hdr.to_owned(),
            Err(_) => {
                self.stats.pkt_dropped(port);
                return None;
            }
        };
        if !icmpv6::verify_checksum(&ipv6.src_addr(), &ipv6.dst_addr(), msg) {
            debug!("bad ICMPv6 checksum from {}", ipv6.src_addr());
            self.stats.pkt_dropped(port);
            return None;
        }

        let hdr = IcmpHeaders {
            dst,
            src,
            ipv6,
            icmp6: &icmp6,
        };
        match icmp6.msg_type() {
            Icmpv6Type::ROUTER_SOLICIT => {
                self.handle_router_solicitation(state, &pkt, &hdr, msg);
                None
            }
            Icmpv6Type::ROUTER_ADVERT => {
                self.handle_router_advertisement(&pkt, &hdr);
                None
            }
            Icmpv6Type::NEIGHBOR_SOLICIT => {
                self.handle_neighbor_solicitation(state, &pkt, &hdr, msg);
                None
            }
            Icmpv6Type::NEIGHBOR_ADVERT => {
                self.handle_neighbor_advertisement(state, &pkt, &hdr, msg);
                None
            }
            Icmpv6Type::REDIRECT => {
                self.stats.ipv6_ndp_received(port);
                // Redirects are never acted on.
                self.stats.pkt_dropped(port);
                None
            }
            _ => Some(pkt),
        }
    }

    /// Validation common to all NDP message types (RFC 4861 §§6-7).
    fn check_ndp_packet(&self, hdr: &IcmpHeaders<'_>, pkt: &RxPacket) -> bool {
        let port = pkt.src_port();
        if hdr.ipv6.hop_limit() != 255 {
            debug!(
                "bad NDP request ({}): hop limit should be 255, got {}",
                hdr.icmp6.msg_type().raw(),
                hdr.ipv6.hop_limit()
            );
            self.stats.ipv6_ndp_bad(port);
            return false;
        }
        if hdr.icmp6.code() != 0 {
            debug!(
                "bad NDP request ({}): code should be 0, got {}",
                hdr.icmp6.msg_type().raw(),
                hdr.icmp6.code()
            );
            self.stats.ipv6_ndp_bad(port);
            return false;
        }
        true
    }

    fn handle_router_solicitation(
        &self,
        state: &SwitchState,
        pkt: &RxPacket,
        hdr: &IcmpHeaders<'_>,
        msg: &[u8],
    ) {
        let port = pkt.src_port();
        self.stats.ipv6_ndp_received(port);
        if !self.check_ndp_packet(hdr, pkt) {
            return;
        }

        let rs = match RouterSolicitMsg::parse(msg) {
            Ok(rs) => rs,
            Err(_) => {
                self.stats.ipv6_ndp_bad(port);
                return;
            }
        };

        let vlan = match state.vlan(pkt.src_vlan()) {
            Some(vlan) => vlan,
            None => {
                self.stats.pkt_dropped(port);
                return;
            }
        };
        let intf = match state.interface(vlan.interface) {
            Some(intf) => intf,
            None => {
                self.stats.pkt_dropped(port);
                return;
            }
        };

        let mut dst_mac = hdr.src;
        match NdpOptions::parse(rs.option_bytes()) {
            Ok(options) => {
                if let Some(mac) = options.source_link_layer {
                    dst_mac = mac;
                }
            }
            Err(err) => {
                warn!("{}", err);
                self.stats.pkt_dropped(port);
                return;
            }
        }

        let mut dst_ip = hdr.ipv6.src_addr();
        if dst_ip.is_unspecified() {
            dst_ip = Ipv6Addr::INTERFACE_LOCAL_ALL_NODES;
        }

        debug!(
            "sending router advertisement in response to solicitation from {} ({})",
            dst_ip, dst_mac
        );
        // Only servers downstream solicit us, so replying out the ingress
        // port is safe.
        let advert = radv::build_advertisement(&*self.tx, intf, dst_mac, dst_ip);
        self.tx
            .send_network_control(advert, Some(PortDescriptor::from_rx(pkt)));
    }

    fn handle_router_advertisement(&self, pkt: &RxPacket, hdr: &IcmpHeaders<'_>) {
        let port = pkt.src_port();
        self.stats.ipv6_ndp_received(port);
        if !self.check_ndp_packet(hdr, pkt) {
            return;
        }

        if !hdr.ipv6.src_addr().is_link_local() {
            debug!(
                "bad router advertisement: source address must be link-local: {}",
                hdr.ipv6.src_addr()
            );
            self.stats.ipv6_ndp_bad(port);
            return;
        }

        // This switch does not learn from peer routers.
        debug!(
            "dropping router advertisement from {}",
            hdr.ipv6.src_addr()
        );
        self.stats.pkt_dropped(port);
    }

    fn handle_neighbor_solicitation(
        &self,
        state: &SwitchState,
        pkt: &RxPacket,
        hdr: &IcmpHeaders<'_>,
        msg: &[u8],
    ) {
        let port = pkt.src_port();
        self.stats.ipv6_ndp_received(port);
        if !self.check_ndp_packet(hdr, pkt) {
            return;
        }

        let ns = match NeighborSolicitMsg::parse(msg) {
            Ok(ns) => ns,
            Err(_) => {
                self.stats.ipv6_ndp_bad(port);
                return;
            }
        };
        let target = ns.target_addr();
        if target.is_multicast() {
            debug!("bad neighbor solicitation: target is multicast: {}", target);
            self.stats.ipv6_ndp_bad(port);
            return;
        }
        debug!("got neighbor solicitation for {}", target);

        let vlan = match state.vlan(pkt.src_vlan()) {
            Some(vlan) => vlan,
            None => {
                // The VLAN may have been removed since the packet was
                // punted.
                self.stats.pkt_dropped(port);
                return;
            }
        };

        let options = match NdpOptions::parse(ns.option_bytes()) {
            Ok(options) => options,
            Err(err) => {
                debug!("{}", err);
                self.stats.ipv6_ndp_bad(port);
                return;
            }
        };

        // RFC 4861: the source link-layer option must not be included when
        // the source address is unspecified, and must be included in
        // multicast solicitations.
        if (options.source_link_layer.is_none() && hdr.ipv6.dst_addr().is_multicast())
            || (options.source_link_layer.is_some() && hdr.ipv6.src_addr().is_unspecified())
        {
            debug!(
                "bad neighbor solicitation from {}: inconsistent source link-layer option",
                hdr.ipv6.src_addr()
            );
            self.stats.ipv6_ndp_bad(port);
            return;
        }

        if !state.is_ingress_valid(pkt) {
            info!(
                "dropping invalid NS ingressing on port {} on vlan {} for {}",
                port, vlan.id, target
            );
            return;
        }

        let entry = vlan.ndp_response_table.get(&target).copied();
        let port_desc = PortDescriptor::from_rx(pkt);
        if let Some(mac) = options.source_link_layer {
            // The solicitor told us its binding; let the cache engine learn
            // or refresh it.
            if entry.is_none() {
                self.neighbors.received_ndp_not_mine(
                    vlan.id,
                    hdr.ipv6.src_addr(),
                    mac,
                    port_desc,
                    Icmpv6Type::NEIGHBOR_SOLICIT,
                    0,
                );
                return;
            }
            self.neighbors.received_ndp_mine(
                vlan.id,
                hdr.ipv6.src_addr(),
                mac,
                port_desc,
                Icmpv6Type::NEIGHBOR_SOLICIT,
                0,
            );
        }

        if let Some(entry) = entry {
            // The target is ours to answer for; reply out the ingress port.
            self.send_neighbor_advertisement(
                pkt.src_vlan(),
                entry.mac,
                target,
                hdr.src,
                hdr.ipv6.src_addr(),
                Some(port_desc),
            );
        }
    }

    fn handle_neighbor_advertisement(
        &self,
        state: &SwitchState,
        pkt: &RxPacket,
        hdr: &IcmpHeaders<'_>,
        msg: &[u8],
    ) {
        let port = pkt.src_port();
        self.stats.ipv6_ndp_received(port);
        if !self.check_ndp_packet(hdr, pkt) {
            return;
        }

        let na = match NeighborAdvertMsg::parse(msg) {
            Ok(na) => na,
            Err(_) => {
                self.stats.ipv6_ndp_bad(port);
                return;
            }
        };
        let flags = na.flags();
        let target = na.target_addr();

        let mut target_mac = hdr.src;
        match NdpOptions::parse(na.option_bytes()) {
            Ok(options) => {
                if let Some(mac) = options.target_link_layer {
                    target_mac = mac;
                }
            }
            Err(err) => {
                debug!("{}", err);
                self.stats.ipv6_ndp_bad(port);
                return;
            }
        }

        if target_mac.is_multicast() || target_mac.is_broadcast() {
            // A group address can never be a valid unicast neighbor.
            debug!(
                "ignoring neighbor advertisement for {} with multicast MAC {}",
                target, target_mac
            );
            self.stats.pkt_dropped(port);
            return;
        }

        let vlan = match state.vlan(pkt.src_vlan()) {
            Some(vlan) => vlan,
            None => {
                self.stats.pkt_dropped(port);
                return;
            }
        };

        debug!("got neighbor advertisement for {} ({})", target, target_mac);

        let port_desc = PortDescriptor::from_rx(pkt);
        if vlan.ndp_response_table.contains_key(&hdr.ipv6.dst_addr()) {
            self.neighbors.received_ndp_mine(
                vlan.id,
                target,
                target_mac,
                port_desc,
                Icmpv6Type::NEIGHBOR_ADVERT,
                flags,
            );
        } else {
            self.neighbors.received_ndp_not_mine(
                vlan.id,
                target,
                target_mac,
                port_desc,
                Icmpv6Type::NEIGHBOR_ADVERT,
                flags,
            );
        }
    }

    /// Answer a hop-limit violation with a time exceeded error carrying as
    /// much of the offending packet as the minimum MTU allows.
    pub(crate) fn send_time_exceeded(
        &self,
        state: &SwitchState,
        vlan: VlanId,
        dst_mac: EtherAddr,
        src_mac: EtherAddr,
        orig: &Ipv6Header<[u8; IPV6_HEADER_LEN]>,
        payload: &[u8],
    ) {
        let src_ip = match state.vlan_ipv6(vlan) {
            Some(ip) => ip,
            None => {
                warn!("no IPv6 address on vlan {} to source time exceeded from", vlan);
                return;
            }
        };

        let full_len = ICMPV6_UNUSED_LEN + IPV6_HEADER_LEN + payload.len();
        let body_len = full_len.min(IPV6_MIN_MTU - IPV6_HEADER_LEN - ICMPV6_HEADER_LEN);
        let quoted = body_len - ICMPV6_UNUSED_LEN - IPV6_HEADER_LEN;

        let pkt = build_icmpv6_packet(
            &*self.tx,
            dst_mac,
            src_mac,
            vlan,
            &orig.src_addr(),
            &src_ip,
            Icmpv6Type::TIME_EXCEEDED,
            CODE_TIME_EXCEEDED_HOPLIMIT,
            body_len,
            |cursor| {
                cursor.write_u32(0); // unused field
                cursor.write_slice(orig.as_bytes());
                cursor.write_slice(&payload[..quoted]);
            },
        );
        debug!(
            "sending time exceeded to {} from {} body {} bytes",
            orig.src_addr(),
            src_ip,
            body_len
        );
        self.tx.send_packet_switched(pkt);
    }

    /// Answer an oversized packet with a packet-too-big error carrying the
    /// egress MTU and as much of the offender as fits.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn send_packet_too_big(
        &self,
        state: &SwitchState,
        port: PortId,
        vlan: VlanId,
        dst_mac: EtherAddr,
        src_mac: EtherAddr,
        orig: &Ipv6Header<[u8; IPV6_HEADER_LEN]>,
        mtu: u32,
        payload: &[u8],
    ) {
        let src_ip = match state.vlan_ipv6(vlan) {
            Some(ip) => ip,
            None => {
                warn!("no IPv6 address on vlan {} to source packet too big from", vlan);
                return;
            }
        };

        // The whole generated frame has to fit the minimum MTU.
        let limit = IPV6_MIN_MTU - icmpv6_packet_len(0);
        let full_len = ICMPV6_MTU_LEN + IPV6_HEADER_LEN + payload.len();
        let body_len = full_len.min(limit);
        let quoted = body_len - ICMPV6_MTU_LEN - IPV6_HEADER_LEN;

        let pkt = build_icmpv6_packet(
            &*self.tx,
            dst_mac,
            src_mac,
            vlan,
            &orig.src_addr(),
            &src_ip,
            Icmpv6Type::PKT_TOO_BIG,
            CODE_PKT_TOO_BIG,
            body_len,
            |cursor| {
                cursor.write_u32(mtu);
                cursor.write_slice(orig.as_bytes());
                cursor.write_slice(&payload[..quoted]);
            },
        );
        debug!(
            "sending packet too big to {} from {} mtu {}",
            orig.src_addr(),
            src_ip,
            mtu
        );
        self.tx.send_packet_switched(pkt);
        self.stats.pkt_too_big(port);
    }

    /// Send a neighbor advertisement binding `src_ip` to `src_mac`.
    ///
    /// An unspecified `dst_ip` produces an unsolicited advertisement to the
    /// interface-local all-nodes group.
    pub(crate) fn send_neighbor_advertisement(
        &self,
        vlan: VlanId,
        src_mac: EtherAddr,
        src_ip: Ipv6Addr,
        dst_mac: EtherAddr,
        dst_ip: Ipv6Addr,
        port: Option<PortDescriptor>,
    ) {
        debug!(
            "sending neighbor advertisement to {} ({}): for {} ({})",
            dst_ip, dst_mac, src_ip, src_mac
        );

        let mut flags = na_flags::ROUTER | na_flags::OVERRIDE;
        let dst_ip = if dst_ip.is_unspecified() {
            Ipv6Addr::INTERFACE_LOCAL_ALL_NODES
        } else {
            flags |= na_flags::SOLICITED;
            dst_ip
        };

        let options = NdpOptions {
            target_link_layer: Some(src_mac),
            ..NdpOptions::default()
        };
        let body_len = ICMPV6_UNUSED_LEN + 16 + options.wire_len();

        let pkt = build_icmpv6_packet(
            &*self.tx,
            dst_mac,
            src_mac,
            vlan,
            &dst_ip,
            &src_ip,
            Icmpv6Type::NEIGHBOR_ADVERT,
            CODE_NDP,
            body_len,
            |cursor| {
                cursor.write_u32(flags);
                cursor.write_slice(src_ip.as_bytes());
                options.emit(cursor);
            },
        );
        self.tx.send_network_control(pkt, port);
    }

    /// Send a neighbor solicitation for `neighbor` addressed to
    /// `dst_ip`/`dst_mac`.
    #[allow(clippy::too_many_arguments)]
    fn send_neighbor_solicitation(
        &self,
        dst_ip: Ipv6Addr,
        dst_mac: EtherAddr,
        src_ip: Ipv6Addr,
        src_mac: EtherAddr,
        neighbor: Ipv6Addr,
        vlan: VlanId,
        port: Option<PortDescriptor>,
        options: &NdpOptions,
    ) {
        let body_len = ICMPV6_UNUSED_LEN + 16 + options.wire_len();
        let pkt = build_icmpv6_packet(
            &*self.tx,
            dst_mac,
            src_mac,
            vlan,
            &dst_ip,
            &src_ip,
            Icmpv6Type::NEIGHBOR_SOLICIT,
            CODE_NDP,
            body_len,
            |cursor| {
                cursor.write_u32(0); // reserved
                cursor.write_slice(neighbor.as_bytes());
                options.emit(cursor);
            },
        );
        self.tx.send_network_control(pkt, port);
    }

    /// Solicit `target` through its solicited-node multicast group, sourcing
    /// from the link-local address derived from `src_mac`.
    pub(crate) fn send_multicast_neighbor_solicitation(
        &self,
        target: Ipv6Addr,
        src_mac: EtherAddr,
        vlan: VlanId,
    ) {
        let solicited_node = target.solicited_node();
        let dst_mac = solicited_node.multicast_ether();
        let src_ip = Ipv6Addr::link_local_from_mac(&src_mac);

        let options = NdpOptions {
            source_link_layer: Some(src_mac),
            ..NdpOptions::default()
        };

        debug!(
            "sending neighbor solicitation for {} on vlan {}",
            target, vlan
        );
        self.send_neighbor_solicitation(
            solicited_node,
            dst_mac,
            src_ip,
            src_mac,
            target,
            vlan,
            None,
            &options,
        );
    }

    /// Solicit a known neighbor directly; used by the cache engine's probe
    /// path. Refuses targets outside the VLAN interface's subnets.
    #[allow(clippy::too_many_arguments)]
    pub fn send_unicast_neighbor_solicitation(
        &self,
        state: &SwitchState,
        target_ip: Ipv6Addr,
        target_mac: EtherAddr,
        src_ip: Ipv6Addr,
        src_mac: EtherAddr,
        vlan: VlanId,
        port: Option<PortDescriptor>,
    ) {
        let attached = state
            .interface_in_vlan(vlan)
            .map(|intf| intf.is_attached(&target_ip))
            .unwrap_or(false);
        if !attached {
            debug!(
                "unicast neighbor solicitation not sent, {} is not on the subnets of vlan {}",
                target_ip, vlan
            );
            return;
        }

        debug!(
            "sending unicast neighbor solicitation to {} ({}) on vlan {} from {} ({})",
            target_ip, target_mac, vlan, src_ip, src_mac
        );
        self.send_neighbor_solicitation(
            target_ip,
            target_mac,
            src_ip,
            src_mac,
            target_ip,
            vlan,
            port,
            &NdpOptions::default(),
        );
    }

    /// Advertise every owned IPv6 address unsolicited, addressed to the
    /// broadcast hardware address. Used after events that may have
    /// invalidated peers' neighbor caches.
    pub fn flood_neighbor_advertisements(&self, state: &SwitchState) {
        for intf in state.interfaces.values() {
            for &(addr, _) in &intf.addresses {
                self.send_neighbor_advertisement(
                    intf.vlan,
                    intf.mac,
                    addr,
                    EtherAddr::BROADCAST,
                    Ipv6Addr::UNSPECIFIED,
                    None,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use sw6_pkt::icmpv6::ndp::{NeighborAdvertMsg, RouterAdvertMsg};

    const ICMP_START: usize = L3_OFFSET + IPV6_HEADER_LEN;

    fn ns_frame(target: Ipv6Addr, slla: Option<EtherAddr>) -> Vec<u8> {
        build_frame(
            INTF_MAC,
            HOST_MAC,
            local_addr(),
            host_addr(),
            Icmpv6Type::NEIGHBOR_SOLICIT,
            CODE_NDP,
            &ns_body(target, slla),
        )
    }

    #[test]
    fn ns_with_bad_hop_limit_is_dropped() {
        let f = fixture();
        let mut frame = ns_frame(local_addr(), Some(HOST_MAC));
        set_hop_limit(&mut frame, 64);
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.ndp_received), 1);
        assert_eq!(count(&f.stats.ndp_bad), 1);
        assert!(f.tx.take().is_empty());
        assert!(f.neighbors.take().is_empty());
    }

    #[test]
    fn ns_with_bad_code_is_dropped() {
        let f = fixture();
        let frame = build_frame(
            INTF_MAC,
            HOST_MAC,
            local_addr(),
            host_addr(),
            Icmpv6Type::NEIGHBOR_SOLICIT,
            1,
            &ns_body(local_addr(), Some(HOST_MAC)),
        );
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.ndp_bad), 1);
        assert!(f.tx.take().is_empty());
    }

    #[test]
    fn ns_for_owned_address_is_answered() {
        let f = fixture();
        let frame = ns_frame(local_addr(), Some(HOST_MAC));
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);

        let events = f.neighbors.take();
        assert_eq!(
            events,
            vec![NeighborEvent::Mine {
                vlan: VLAN,
                ip: host_addr(),
                mac: HOST_MAC,
                port: PortDescriptor::Physical(PORT),
                msg_type: Icmpv6Type::NEIGHBOR_SOLICIT,
                flags: 0,
            }]
        );

        let sent = f.tx.take();
        assert_eq!(sent.len(), 1);
        let (data, port) = match &sent[0] {
            Sent::NetworkControl(data, port) => (data, *port),
            other => panic!("expected network control packet, got {:?}", other),
        };
        assert_eq!(port, Some(PortDescriptor::Physical(PORT)));
        assert_eq!(&data[0..6], HOST_MAC.as_bytes());
        assert_eq!(&data[6..12], INTF_MAC.as_bytes());

        let ipv6 = Ipv6Header::parse(&data[L3_OFFSET..]).unwrap();
        assert_eq!(ipv6.src_addr(), local_addr());
        assert_eq!(ipv6.dst_addr(), host_addr());
        assert_eq!(ipv6.hop_limit(), 255);

        let msg = &data[ICMP_START..];
        let na = NeighborAdvertMsg::parse(msg).unwrap();
        assert_eq!(data[ICMP_START], u8::from(Icmpv6Type::NEIGHBOR_ADVERT));
        assert_eq!(
            na.flags(),
            na_flags::ROUTER | na_flags::SOLICITED | na_flags::OVERRIDE
        );
        assert_eq!(na.target_addr(), local_addr());
        let options = NdpOptions::parse(na.option_bytes()).unwrap();
        assert_eq!(options.target_link_layer, Some(INTF_MAC));
        assert!(icmpv6::verify_checksum(&local_addr(), &host_addr(), msg));
    }

    #[test]
    fn ns_without_slla_is_still_answered() {
        let f = fixture();
        let frame = ns_frame(local_addr(), None);
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert!(f.neighbors.take().is_empty());
        assert_eq!(f.tx.take().len(), 1);
    }

    #[test]
    fn multicast_ns_without_slla_is_rejected() {
        let f = fixture();
        let group = local_addr().solicited_node();
        let frame = build_frame(
            group.multicast_ether(),
            HOST_MAC,
            group,
            host_addr(),
            Icmpv6Type::NEIGHBOR_SOLICIT,
            CODE_NDP,
            &ns_body(local_addr(), None),
        );
        f.handler.handle_packet(
            &f.state,
            rx(&frame),
            group.multicast_ether(),
            HOST_MAC,
            L3_OFFSET,
        );
        assert_eq!(count(&f.stats.ndp_bad), 1);
        assert!(f.tx.take().is_empty());
        assert!(f.neighbors.take().is_empty());
    }

    #[test]
    fn ns_from_unspecified_with_slla_is_rejected() {
        let f = fixture();
        let group = local_addr().solicited_node();
        let frame = build_frame(
            group.multicast_ether(),
            HOST_MAC,
            group,
            Ipv6Addr::UNSPECIFIED,
            Icmpv6Type::NEIGHBOR_SOLICIT,
            CODE_NDP,
            &ns_body(local_addr(), Some(HOST_MAC)),
        );
        f.handler.handle_packet(
            &f.state,
            rx(&frame),
            group.multicast_ether(),
            HOST_MAC,
            L3_OFFSET,
        );
        assert_eq!(count(&f.stats.ndp_bad), 1);
        assert!(f.neighbors.take().is_empty());
    }

    #[test]
    fn ns_with_multicast_target_is_rejected() {
        let f = fixture();
        let frame = ns_frame(Ipv6Addr::ALL_NODES, Some(HOST_MAC));
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.ndp_bad), 1);
        assert!(f.tx.take().is_empty());
    }

    #[test]
    fn ns_for_unknown_target_notifies_not_mine_without_reply() {
        let f = fixture();
        let target = Ipv6Addr::new(0x2401, 0xdb00, 0x2110, 0x3001, 0, 0, 0, 0xaa);
        let group = target.solicited_node();
        let frame = build_frame(
            group.multicast_ether(),
            HOST_MAC,
            group,
            host_addr(),
            Icmpv6Type::NEIGHBOR_SOLICIT,
            CODE_NDP,
            &ns_body(target, Some(HOST_MAC)),
        );
        f.handler.handle_packet(
            &f.state,
            rx(&frame),
            group.multicast_ether(),
            HOST_MAC,
            L3_OFFSET,
        );
        assert_eq!(
            f.neighbors.take(),
            vec![NeighborEvent::NotMine {
                vlan: VLAN,
                ip: host_addr(),
                mac: HOST_MAC,
                port: PortDescriptor::Physical(PORT),
                msg_type: Icmpv6Type::NEIGHBOR_SOLICIT,
                flags: 0,
            }]
        );
        assert!(f.tx.take().is_empty());
    }

    #[test]
    fn ns_from_non_forwarding_lag_member_is_ignored() {
        let f = fixture();
        let frame = ns_frame(local_addr(), Some(HOST_MAC));
        f.handler.handle_packet(
            &f.state,
            rx_on(&frame, PortId(2), Some(AGG)),
            INTF_MAC,
            HOST_MAC,
            L3_OFFSET,
        );
        assert_eq!(count(&f.stats.ndp_received), 1);
        assert_eq!(count(&f.stats.ndp_bad), 0);
        assert_eq!(count(&f.stats.dropped), 0);
        assert!(f.tx.take().is_empty());
        assert!(f.neighbors.take().is_empty());
    }

    #[test]
    fn na_for_owned_destination_takes_mine_path_with_parsed_mac() {
        let f = fixture();
        let frame = build_frame(
            INTF_MAC,
            HOST_MAC,
            local_addr(),
            host_addr(),
            Icmpv6Type::NEIGHBOR_ADVERT,
            CODE_NDP,
            &na_body(0, host_addr(), Some(HOST_MAC)),
        );
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(
            f.neighbors.take(),
            vec![NeighborEvent::Mine {
                vlan: VLAN,
                ip: host_addr(),
                mac: HOST_MAC,
                port: PortDescriptor::Physical(PORT),
                msg_type: Icmpv6Type::NEIGHBOR_ADVERT,
                flags: 0,
            }]
        );
    }

    #[test]
    fn unsolicited_na_to_all_nodes_takes_not_mine_path() {
        let f = fixture();
        let frame = build_frame(
            Ipv6Addr::ALL_NODES.multicast_ether(),
            HOST_MAC,
            Ipv6Addr::ALL_NODES,
            host_addr(),
            Icmpv6Type::NEIGHBOR_ADVERT,
            CODE_NDP,
            &na_body(na_flags::OVERRIDE, host_addr(), Some(HOST_MAC)),
        );
        f.handler.handle_packet(
            &f.state,
            rx(&frame),
            Ipv6Addr::ALL_NODES.multicast_ether(),
            HOST_MAC,
            L3_OFFSET,
        );
        assert_eq!(
            f.neighbors.take(),
            vec![NeighborEvent::NotMine {
                vlan: VLAN,
                ip: host_addr(),
                mac: HOST_MAC,
                port: PortDescriptor::Physical(PORT),
                msg_type: Icmpv6Type::NEIGHBOR_ADVERT,
                flags: na_flags::OVERRIDE,
            }]
        );
    }

    #[test]
    fn na_with_multicast_target_mac_is_dropped() {
        let f = fixture();
        let frame = build_frame(
            INTF_MAC,
            HOST_MAC,
            local_addr(),
            host_addr(),
            Icmpv6Type::NEIGHBOR_ADVERT,
            CODE_NDP,
            &na_body(0, host_addr(), Some(EtherAddr([0x33, 0x33, 0, 0, 0, 1]))),
        );
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.dropped), 1);
        assert!(f.neighbors.take().is_empty());
    }

    #[test]
    fn ra_from_link_local_peer_is_dropped_without_learning() {
        let f = fixture();
        let peer_ll = Ipv6Addr::link_local_from_mac(&HOST_MAC);
        let frame = build_frame(
            Ipv6Addr::ALL_NODES.multicast_ether(),
            HOST_MAC,
            Ipv6Addr::ALL_NODES,
            peer_ll,
            Icmpv6Type::ROUTER_ADVERT,
            CODE_NDP,
            &[0u8; 12],
        );
        f.handler.handle_packet(
            &f.state,
            rx(&frame),
            Ipv6Addr::ALL_NODES.multicast_ether(),
            HOST_MAC,
            L3_OFFSET,
        );
        assert_eq!(count(&f.stats.ndp_received), 1);
        assert_eq!(count(&f.stats.ndp_bad), 0);
        assert_eq!(count(&f.stats.dropped), 1);
        assert!(f.tx.take().is_empty());
        assert!(f.neighbors.take().is_empty());
    }

    #[test]
    fn ra_from_global_source_is_malformed() {
        let f = fixture();
        let frame = build_frame(
            Ipv6Addr::ALL_NODES.multicast_ether(),
            HOST_MAC,
            Ipv6Addr::ALL_NODES,
            host_addr(),
            Icmpv6Type::ROUTER_ADVERT,
            CODE_NDP,
            &[0u8; 12],
        );
        f.handler.handle_packet(
            &f.state,
            rx(&frame),
            Ipv6Addr::ALL_NODES.multicast_ether(),
            HOST_MAC,
            L3_OFFSET,
        );
        assert_eq!(count(&f.stats.ndp_bad), 1);
        assert_eq!(count(&f.stats.dropped), 0);
    }

    #[test]
    fn rs_reply_goes_to_slla_mac() {
        let f = fixture();
        let solicitor_mac = EtherAddr([0x02, 0x09, 0x09, 0x09, 0x09, 0x09]);
        let peer_ll = Ipv6Addr::link_local_from_mac(&HOST_MAC);
        let frame = build_frame(
            Ipv6Addr::ALL_ROUTERS.multicast_ether(),
            HOST_MAC,
            Ipv6Addr::ALL_ROUTERS,
            peer_ll,
            Icmpv6Type::ROUTER_SOLICIT,
            CODE_NDP,
            &rs_body(Some(solicitor_mac)),
        );
        f.handler.handle_packet(
            &f.state,
            rx(&frame),
            Ipv6Addr::ALL_ROUTERS.multicast_ether(),
            HOST_MAC,
            L3_OFFSET,
        );

        let sent = f.tx.take();
        assert_eq!(sent.len(), 1);
        let (data, port) = match &sent[0] {
            Sent::NetworkControl(data, port) => (data, *port),
            other => panic!("expected network control packet, got {:?}", other),
        };
        assert_eq!(port, Some(PortDescriptor::Physical(PORT)));
        assert_eq!(&data[0..6], solicitor_mac.as_bytes());
        assert_eq!(&data[6..12], INTF_MAC.as_bytes());

        let ipv6 = Ipv6Header::parse(&data[L3_OFFSET..]).unwrap();
        assert_eq!(ipv6.src_addr(), Ipv6Addr::link_local_from_mac(&INTF_MAC));
        assert_eq!(ipv6.dst_addr(), peer_ll);

        let msg = &data[ICMP_START..];
        assert_eq!(data[ICMP_START], u8::from(Icmpv6Type::ROUTER_ADVERT));
        let ra = RouterAdvertMsg::parse(msg).unwrap();
        assert_eq!(ra.cur_hop_limit(), 255);
        assert!(!ra.m_flag());
        assert!(!ra.o_flag());
        assert_eq!(ra.router_lifetime(), 1800);
        assert_eq!(ra.reachable_time(), 0);
        assert_eq!(ra.retrans_timer(), 0);

        // source link-layer, mtu, then one prefix information option
        let options = ra.option_bytes();
        assert_eq!(options[0..2], [0x01, 0x01]);
        assert_eq!(&options[2..8], INTF_MAC.as_bytes());
        assert_eq!(options[8..12], [0x05, 0x01, 0x00, 0x00]);
        assert_eq!(options[12..16], 1500u32.to_be_bytes());
        assert_eq!(options[16..20], [0x03, 0x04, 64, 0xc0]);
        assert_eq!(options[20..24], 2592000u32.to_be_bytes());
        assert_eq!(options[24..28], 604800u32.to_be_bytes());
        assert_eq!(&options[32..48], local_addr().masked(64).as_bytes());
        assert_eq!(options.len(), 48);

        assert!(icmpv6::verify_checksum(
            &Ipv6Addr::link_local_from_mac(&INTF_MAC),
            &peer_ll,
            msg
        ));
    }

    #[test]
    fn rs_reply_falls_back_to_frame_source_mac() {
        let f = fixture();
        let peer_ll = Ipv6Addr::link_local_from_mac(&HOST_MAC);
        let frame = build_frame(
            Ipv6Addr::ALL_ROUTERS.multicast_ether(),
            HOST_MAC,
            Ipv6Addr::ALL_ROUTERS,
            peer_ll,
            Icmpv6Type::ROUTER_SOLICIT,
            CODE_NDP,
            &rs_body(None),
        );
        f.handler.handle_packet(
            &f.state,
            rx(&frame),
            Ipv6Addr::ALL_ROUTERS.multicast_ether(),
            HOST_MAC,
            L3_OFFSET,
        );
        let sent = f.tx.take();
        match &sent[..] {
            [Sent::NetworkControl(data, _)] => assert_eq!(&data[0..6], HOST_MAC.as_bytes()),
            other => panic!("expected one network control packet, got {:?}", other),
        }
    }

    #[test]
    fn rs_from_unspecified_source_is_answered_interface_local() {
        let f = fixture();
        let frame = build_frame(
            Ipv6Addr::ALL_ROUTERS.multicast_ether(),
            HOST_MAC,
            Ipv6Addr::ALL_ROUTERS,
            Ipv6Addr::UNSPECIFIED,
            Icmpv6Type::ROUTER_SOLICIT,
            CODE_NDP,
            &rs_body(None),
        );
        f.handler.handle_packet(
            &f.state,
            rx(&frame),
            Ipv6Addr::ALL_ROUTERS.multicast_ether(),
            HOST_MAC,
            L3_OFFSET,
        );
        let sent = f.tx.take();
        match &sent[..] {
            [Sent::NetworkControl(data, _)] => {
                let ipv6 = Ipv6Header::parse(&data[L3_OFFSET..]).unwrap();
                assert_eq!(ipv6.dst_addr(), Ipv6Addr::INTERFACE_LOCAL_ALL_NODES);
            }
            other => panic!("expected one network control packet, got {:?}", other),
        }
    }

    #[test]
    fn redirect_is_counted_and_dropped() {
        let f = fixture();
        let frame = build_frame(
            INTF_MAC,
            HOST_MAC,
            local_addr(),
            host_addr(),
            Icmpv6Type::REDIRECT,
            CODE_NDP,
            &[0u8; 36],
        );
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.ndp_received), 1);
        assert_eq!(count(&f.stats.dropped), 1);
        assert!(f.tx.take().is_empty());
        assert!(f.neighbors.take().is_empty());
    }

    #[test]
    fn unrecognized_icmpv6_is_forwarded_to_host() {
        let f = fixture();
        let frame = build_frame(
            INTF_MAC,
            HOST_MAC,
            local_addr(),
            host_addr(),
            Icmpv6Type::ECHO_REQUEST,
            0,
            &[0u8; 8],
        );
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        let sent = f.tx.take();
        match &sent[..] {
            [Sent::ToHost(interface, data)] => {
                assert_eq!(*interface, INTF);
                assert_eq!(data, &frame);
            }
            other => panic!("expected host delivery, got {:?}", other),
        }
        assert_eq!(count(&f.stats.to_host), 1);
        assert_eq!(count(&f.stats.dropped), 0);
    }

    #[test]
    fn failed_host_delivery_counts_as_drop() {
        let f = fixture();
        f.tx.host_ok.store(false, std::sync::atomic::Ordering::Relaxed);
        let frame = build_frame(
            INTF_MAC,
            HOST_MAC,
            local_addr(),
            host_addr(),
            Icmpv6Type::ECHO_REQUEST,
            0,
            &[0u8; 8],
        );
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.to_host), 0);
        assert_eq!(count(&f.stats.dropped), 1);
    }

    #[test]
    fn bad_icmpv6_checksum_is_dropped_silently() {
        let f = fixture();
        let mut frame = ns_frame(local_addr(), Some(HOST_MAC));
        frame[ICMP_START + 12] ^= 0x01; // flip a target-address bit
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.dropped), 1);
        assert_eq!(count(&f.stats.ndp_received), 0);
        assert_eq!(count(&f.stats.ndp_bad), 0);
        assert!(f.tx.take().is_empty());
    }

    #[test]
    fn hop_limit_violation_answers_with_time_exceeded() {
        let f = fixture();
        let frame = build_raw_frame(remote_addr(), host_addr(), IpProtocol::TCP, 1, 100);
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.dropped), 1);
        assert_eq!(count(&f.stats.hop_exceeded), 1);

        let sent = f.tx.take();
        let data = match &sent[..] {
            [Sent::Switched(data)] => data,
            other => panic!("expected switched packet, got {:?}", other),
        };
        assert_eq!(&data[0..6], CPU_MAC.as_bytes());
        assert_eq!(&data[6..12], CPU_MAC.as_bytes());

        let ipv6 = Ipv6Header::parse(&data[L3_OFFSET..]).unwrap();
        assert_eq!(ipv6.src_addr(), local_addr());
        assert_eq!(ipv6.dst_addr(), host_addr());

        let msg = &data[ICMP_START..];
        assert_eq!(msg[0], u8::from(Icmpv6Type::TIME_EXCEEDED));
        assert_eq!(msg[1], CODE_TIME_EXCEEDED_HOPLIMIT);
        // unused field, then the offending header and payload
        assert_eq!(&msg[4..8], &[0, 0, 0, 0]);
        assert_eq!(&msg[8..48], &frame[L3_OFFSET..L3_OFFSET + IPV6_HEADER_LEN]);
        assert_eq!(msg.len(), ICMPV6_HEADER_LEN + ICMPV6_UNUSED_LEN + IPV6_HEADER_LEN + 100);
        assert!(icmpv6::verify_checksum(&local_addr(), &host_addr(), msg));
    }

    #[test]
    fn oversized_time_exceeded_body_is_truncated() {
        let f = fixture();
        let frame = build_raw_frame(remote_addr(), host_addr(), IpProtocol::TCP, 1, 1400);
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        let sent = f.tx.take();
        let data = match &sent[..] {
            [Sent::Switched(data)] => data,
            other => panic!("expected switched packet, got {:?}", other),
        };
        let body_len = IPV6_MIN_MTU - IPV6_HEADER_LEN - ICMPV6_HEADER_LEN;
        assert_eq!(data.len(), icmpv6_packet_len(body_len));
    }

    #[test]
    fn dhcpv6_with_hop_limit_one_is_handed_off() {
        let f = fixture();
        let frame = build_udp_frame(local_addr(), host_addr(), 546, 547, 1, 60);
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(*f.dhcp.handled.lock().unwrap(), vec![(546, 547)]);
        assert_eq!(count(&f.stats.hop_exceeded), 0);
        assert_eq!(count(&f.stats.dropped), 0);
        assert!(f.tx.take().is_empty());
    }

    #[test]
    fn ordinary_udp_goes_to_host() {
        let f = fixture();
        let frame = build_udp_frame(local_addr(), host_addr(), 1000, 2000, 64, 20);
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert!(f.dhcp.handled.lock().unwrap().is_empty());
        assert_eq!(count(&f.stats.to_host), 1);
        match &f.tx.take()[..] {
            [Sent::ToHost(interface, _)] => assert_eq!(*interface, INTF),
            other => panic!("expected host delivery, got {:?}", other),
        }
    }

    #[test]
    fn local_mtu_violation_answers_with_packet_too_big() {
        let f = fixture();
        let frame = build_raw_frame(local_addr(), host_addr(), IpProtocol::TCP, 64, 1600);
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.too_big), 1);
        assert_eq!(count(&f.stats.dropped), 1);

        let sent = f.tx.take();
        let data = match &sent[..] {
            [Sent::Switched(data)] => data,
            other => panic!("expected switched packet, got {:?}", other),
        };
        assert_eq!(&data[0..6], HOST_MAC.as_bytes());
        assert_eq!(&data[6..12], INTF_MAC.as_bytes());

        let msg = &data[ICMP_START..];
        assert_eq!(msg[0], u8::from(Icmpv6Type::PKT_TOO_BIG));
        assert_eq!(&msg[4..8], &1500u32.to_be_bytes());
        // the generated frame itself stays inside the minimum MTU
        assert_eq!(data.len(), IPV6_MIN_MTU);
    }

    #[test]
    fn truncated_ipv6_header_is_dropped() {
        let f = fixture();
        let frame = build_raw_frame(local_addr(), host_addr(), IpProtocol::TCP, 64, 20);
        f.handler.handle_packet(
            &f.state,
            rx(&frame[..L3_OFFSET + 12]),
            INTF_MAC,
            HOST_MAC,
            L3_OFFSET,
        );
        assert_eq!(count(&f.stats.dropped), 1);
        assert!(f.tx.take().is_empty());
    }

    #[test]
    fn payload_length_past_frame_end_is_dropped() {
        let f = fixture();
        let mut frame = build_raw_frame(local_addr(), host_addr(), IpProtocol::TCP, 64, 20);
        let mut ipv6 =
            Ipv6Header::parse_unchecked(&mut frame[L3_OFFSET..L3_OFFSET + IPV6_HEADER_LEN]);
        ipv6.set_payload_len(500);
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(count(&f.stats.dropped), 1);
        assert!(f.tx.take().is_empty());
    }

    #[test]
    fn trailing_frame_padding_is_ignored() {
        let f = fixture();
        let mut frame = build_frame(
            INTF_MAC,
            HOST_MAC,
            local_addr(),
            host_addr(),
            Icmpv6Type::NEIGHBOR_SOLICIT,
            CODE_NDP,
            &ns_body(local_addr(), Some(HOST_MAC)),
        );
        frame.extend_from_slice(&[0xa5; 4]); // FCS-style trailer
        f.handler
            .handle_packet(&f.state, rx(&frame), INTF_MAC, HOST_MAC, L3_OFFSET);
        assert_eq!(f.tx.take().len(), 1);
        assert_eq!(count(&f.stats.dropped), 0);
    }

    #[test]
    fn flood_advertises_every_owned_address() {
        let f = fixture();
        f.handler.flood_neighbor_advertisements(&f.state);
        let sent = f.tx.take();
        assert_eq!(sent.len(), 2);
        for entry in &sent {
            let (data, port) = match entry {
                Sent::NetworkControl(data, port) => (data, *port),
                other => panic!("expected network control packet, got {:?}", other),
            };
            assert_eq!(port, None);
            assert_eq!(&data[0..6], EtherAddr::BROADCAST.as_bytes());
            let ipv6 = Ipv6Header::parse(&data[L3_OFFSET..]).unwrap();
            assert_eq!(ipv6.dst_addr(), Ipv6Addr::INTERFACE_LOCAL_ALL_NODES);
            let na = NeighborAdvertMsg::parse(&data[ICMP_START..]).unwrap();
            assert_eq!(na.flags(), na_flags::ROUTER | na_flags::OVERRIDE);
        }
    }

    #[test]
    fn unicast_ns_requires_attached_target() {
        let f = fixture();
        f.handler.send_unicast_neighbor_solicitation(
            &f.state,
            remote_addr(),
            HOST_MAC,
            local_addr(),
            INTF_MAC,
            VLAN,
            None,
        );
        assert!(f.tx.take().is_empty());

        f.handler.send_unicast_neighbor_solicitation(
            &f.state,
            host_addr(),
            HOST_MAC,
            local_addr(),
            INTF_MAC,
            VLAN,
            None,
        );
        let sent = f.tx.take();
        let data = match &sent[..] {
            [Sent::NetworkControl(data, None)] => data,
            other => panic!("expected one network control packet, got {:?}", other),
        };
        assert_eq!(&data[0..6], HOST_MAC.as_bytes());
        assert_eq!(data[ICMP_START], u8::from(Icmpv6Type::NEIGHBOR_SOLICIT));
        let ipv6 = Ipv6Header::parse(&data[L3_OFFSET..]).unwrap();
        assert_eq!(ipv6.dst_addr(), host_addr());
        // the probe carries no options
        assert_eq!(data.len(), icmpv6_packet_len(ICMPV6_UNUSED_LEN + 16));
    }
}
