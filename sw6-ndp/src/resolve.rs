//! Destination resolution: route lookup, next-hop walking, MTU policy and
//! on-demand neighbor solicitation.

use log::debug;

use sw6_pkt::ether::EtherAddr;
use sw6_pkt::ipv6::{Ipv6Addr, Ipv6Header, IPV6_HEADER_LEN};

use crate::handler::Ipv6Handler;
use crate::state::SwitchState;
use crate::types::{PortId, RouterId, RxPacket};

impl Ipv6Handler {
    /// Resolve the destination of a packet the switch cannot yet forward.
    ///
    /// Either answers with packet-too-big, or triggers neighbor
    /// solicitations for unresolved next hops; the original packet is
    /// dropped in every case — retransmission is the sender's business.
    pub(crate) fn resolve_dest_and_handle_packet(
        &self,
        state: &SwitchState,
        ipv6: &Ipv6Header<[u8; IPV6_HEADER_LEN]>,
        pkt: RxPacket,
        dst: EtherAddr,
        src: EtherAddr,
        l4_start: usize,
        l4_len: usize,
    ) {
        let port = pkt.src_port();
        let target_ip = ipv6.dst_addr();

        let route = match self.routes.longest_match(state, &target_ip, RouterId(0)) {
            Some(route) if route.resolved => route,
            _ => {
                // No way to reach the destination.
                self.stats.ipv6_dst_lookup_failure(port);
                return;
            }
        };

        for next_hop in &route.next_hops {
            let intf = match state.interface(next_hop.interface) {
                Some(intf) => intf,
                None => continue,
            };
            let source = match intf.address_to_reach(&next_hop.gateway) {
                Some((source, _)) => source,
                None => continue,
            };
            let target = if route.connected {
                target_ip
            } else {
                next_hop.gateway
            };
            if source == target {
                // The destination is the switch itself; nothing to resolve.
                continue;
            }

            if l4_len > intf.mtu as usize {
                let payload = &pkt.data()[l4_start..l4_start + l4_len];
                self.send_packet_too_big(
                    state,
                    port,
                    pkt.src_vlan(),
                    src,
                    dst,
                    ipv6,
                    intf.mtu,
                    payload,
                );
                self.stats.pkt_dropped(port);
                return;
            }

            let vlan_id = intf.vlan;
            if let Some(vlan) = state.vlan(vlan_id) {
                match vlan.ndp_cache.get(&target) {
                    None => {
                        self.send_multicast_neighbor_solicitation(target, intf.mac, vlan_id);
                        // The cache engine owns retries and aging.
                        self.neighbors.sent_neighbor_solicitation(vlan_id, target);
                    }
                    Some(entry) => {
                        debug!(
                            "not sending neighbor solicitation for {}, {} entry already exists",
                            target,
                            if entry.pending { "pending" } else { "resolved" }
                        );
                    }
                }
            }
        }

        // The packet could not be forwarded yet.
        self.stats.pkt_dropped(port);
    }

    /// Trigger neighbor solicitations for a bare target address, without an
    /// original packet; used for background re-resolution.
    pub fn send_multicast_neighbor_solicitations(
        &self,
        state: &SwitchState,
        ingress_port: PortId,
        target_ip: &Ipv6Addr,
    ) {
        if target_ip.is_multicast() || target_ip.is_all_nodes() {
            return;
        }

        let route = match self.routes.longest_match(state, target_ip, RouterId(0)) {
            Some(route) if route.resolved => route,
            _ => {
                self.stats.ipv6_dst_lookup_failure(ingress_port);
                return;
            }
        };

        for next_hop in &route.next_hops {
            let intf = match state.interface(next_hop.interface) {
                Some(intf) => intf,
                None => continue,
            };
            let source = match intf.address_to_reach(&next_hop.gateway) {
                Some((source, _)) => source,
                None => continue,
            };
            let target = if route.connected {
                *target_ip
            } else {
                next_hop.gateway
            };
            if source == target {
                continue;
            }

            let vlan_id = intf.vlan;
            if let Some(vlan) = state.vlan(vlan_id) {
                match vlan.ndp_cache.get(&target) {
                    None => {
                        self.send_multicast_neighbor_solicitation(target, intf.mac, vlan_id);
                        self.neighbors.sent_neighbor_solicitation(vlan_id, target);
                    }
                    Some(entry) => {
                        debug!(
                            "not sending neighbor solicitation for {}, {} entry already exists",
                            target,
                            if entry.pending { "pending" } else { "resolved" }
                        );
                    }
                }
            }
        }
    }
}
