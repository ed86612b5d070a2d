//! Traits for the collaborators the engine drives but does not own:
//! routing, the neighbor-cache update engine, DHCPv6, packet transmission
//! and the statistics sinks. The agent wires real implementations in;
//! tests substitute recorders.

use std::sync::Arc;

use sw6_pkt::ether::EtherAddr;
use sw6_pkt::icmpv6::Icmpv6Type;
use sw6_pkt::ipv6::{Ipv6Addr, Ipv6Header, IPV6_HEADER_LEN};
use sw6_pkt::udp::{UdpHeader, UDP_HEADER_LEN};

use crate::state::SwitchState;
use crate::types::{InterfaceId, PortDescriptor, PortId, RouterId, RxPacket, TxPacket, VlanId};

/// One next hop of a route: the interface to leave through and, for
/// non-connected routes, the gateway to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    /// Egress interface.
    pub interface: InterfaceId,
    /// Gateway address; for connected routes this is the subnet address and
    /// the final destination is resolved instead.
    pub gateway: Ipv6Addr,
}

/// The result of a longest-prefix route lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Whether the route's next hops are usable.
    pub resolved: bool,
    /// Whether the destination is on a directly connected subnet.
    pub connected: bool,
    /// The ECMP next-hop set.
    pub next_hops: Vec<NextHop>,
}

/// Longest-prefix route lookup against a state snapshot. Owned by the
/// routing table; the engine only queries it.
pub trait RouteLookup: Send + Sync {
    /// The most specific route for `addr` in `router`'s domain.
    fn longest_match(
        &self,
        state: &SwitchState,
        addr: &Ipv6Addr,
        router: RouterId,
    ) -> Option<Arc<Route>>;
}

/// The neighbor-cache update engine. The engine reports observations and
/// sent solicitations; retries, aging and de-duplication all live behind
/// this trait.
pub trait NeighborUpdater: Send + Sync {
    /// An NDP message concerning an address this switch answers for.
    fn received_ndp_mine(
        &self,
        vlan: VlanId,
        ip: Ipv6Addr,
        mac: EtherAddr,
        port: PortDescriptor,
        msg_type: Icmpv6Type,
        flags: u32,
    );

    /// An NDP message concerning an address this switch does not answer for.
    fn received_ndp_not_mine(
        &self,
        vlan: VlanId,
        ip: Ipv6Addr,
        mac: EtherAddr,
        port: PortDescriptor,
        msg_type: Icmpv6Type,
        flags: u32,
    );

    /// A neighbor solicitation for `target` left the box.
    fn sent_neighbor_solicitation(&self, vlan: VlanId, target: Ipv6Addr);
}

/// Packet allocation and transmission.
pub trait PacketTx: Send + Sync {
    /// Allocate an outbound buffer of exactly `len` bytes.
    fn allocate_packet(&self, len: usize) -> TxPacket {
        TxPacket::new(len)
    }

    /// Transmit through the regular switching pipeline (L2 rewrite applies).
    fn send_packet_switched(&self, pkt: TxPacket);

    /// Transmit at network-control priority, optionally pinned to a port.
    fn send_network_control(&self, pkt: TxPacket, port: Option<PortDescriptor>);

    /// Deliver a received packet to the host stack of `interface`.
    /// Returns false if delivery failed.
    fn send_to_host(&self, interface: InterfaceId, pkt: RxPacket) -> bool;

    /// The CPU port's hardware address.
    fn local_mac(&self) -> EtherAddr;
}

/// Per-port statistics sink. Fire-and-forget: no return values are
/// consulted, and implementations must not block.
pub trait PortStatsSink: Send + Sync {
    /// A packet was dropped without further action.
    fn pkt_dropped(&self, _port: PortId) {}
    /// A packet was handed to the host stack.
    fn pkt_to_host(&self, _port: PortId, _l3_len: usize) {}
    /// A packet-too-big error was generated.
    fn pkt_too_big(&self, _port: PortId) {}
    /// A packet violated the hop-limit policy.
    fn ipv6_hop_exceeded(&self, _port: PortId) {}
    /// An NDP message was received.
    fn ipv6_ndp_received(&self, _port: PortId) {}
    /// An NDP message failed validation.
    fn ipv6_ndp_bad(&self, _port: PortId) {}
    /// A destination had no usable route.
    fn ipv6_dst_lookup_failure(&self, _port: PortId) {}
}

/// UDP port the DHCPv6 server/relay side listens on.
pub const DHCP6_SERVER_PORT: u16 = 547;
/// UDP port the DHCPv6 client side listens on.
pub const DHCP6_CLIENT_PORT: u16 = 546;

/// Whether a UDP header addresses the DHCPv6 relay/server convention.
pub fn is_dhcp6_relay_or_server<T: AsRef<[u8]>>(udp: &UdpHeader<T>) -> bool {
    udp.dst_port() == DHCP6_SERVER_PORT || udp.dst_port() == DHCP6_CLIENT_PORT
}

/// The DHCPv6 relay/server collaborator. Packets matching
/// [`is_dhcp6_relay_or_server`] are handed over wholesale.
pub trait Dhcp6Relay: Send + Sync {
    /// Take ownership of a DHCPv6 packet. `ipv6` and `udp` are owned copies
    /// of the already-parsed headers; the UDP payload starts after them in
    /// `pkt`'s data.
    fn handle_packet(
        &self,
        pkt: RxPacket,
        dst_mac: EtherAddr,
        src_mac: EtherAddr,
        ipv6: Ipv6Header<[u8; IPV6_HEADER_LEN]>,
        udp: UdpHeader<[u8; UDP_HEADER_LEN]>,
    );
}
