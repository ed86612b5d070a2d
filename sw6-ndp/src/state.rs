//! Read-only model of the switch-state snapshot the engine consumes.
//!
//! The surrounding agent publishes copy-on-write snapshots; one `Arc`'d
//! [`SwitchState`] stays consistent for the whole of a packet's handling.
//! Nothing here is mutated by this crate — the neighbor tables embedded in
//! each VLAN are updated only by the external neighbor-cache engine between
//! snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use sw6_pkt::ether::EtherAddr;
use sw6_pkt::ipv6::Ipv6Addr;

use crate::types::{AggregatePortId, InterfaceId, PortId, RouterId, RxPacket, VlanId};

/// Per-interface NDP and router-advertisement configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdpConfig {
    /// Interval between unsolicited router advertisements; zero disables
    /// advertising on the interface.
    pub router_advertisement_seconds: u32,
    /// Hop limit suggested to hosts.
    pub cur_hop_limit: u8,
    /// Router lifetime advertised, in seconds.
    pub router_lifetime: u16,
    /// Valid lifetime for advertised prefixes, in seconds.
    pub prefix_valid_lifetime: u32,
    /// Preferred lifetime for advertised prefixes, in seconds.
    pub prefix_preferred_lifetime: u32,
    /// The managed-address-configuration flag.
    pub managed: bool,
    /// The other-configuration flag.
    pub other: bool,
}

impl Default for NdpConfig {
    fn default() -> NdpConfig {
        NdpConfig {
            router_advertisement_seconds: 0,
            cur_hop_limit: 255,
            router_lifetime: 1800,
            prefix_valid_lifetime: 2592000,
            prefix_preferred_lifetime: 604800,
            managed: false,
            other: false,
        }
    }
}

/// One routed interface of the switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface id.
    pub id: InterfaceId,
    /// Routing domain the interface belongs to.
    pub router: RouterId,
    /// VLAN the interface serves.
    pub vlan: VlanId,
    /// Interface hardware address.
    pub mac: EtherAddr,
    /// Interface MTU.
    pub mtu: u32,
    /// Assigned IPv6 addresses with prefix lengths.
    pub addresses: Vec<(Ipv6Addr, u8)>,
    /// NDP configuration.
    pub ndp: NdpConfig,
}

impl Interface {
    /// Whether `addr` is one of this interface's own addresses.
    pub fn has_address(&self, addr: &Ipv6Addr) -> bool {
        self.addresses.iter().any(|(own, _)| own == addr)
    }

    /// The address (and prefix length) this interface would source traffic
    /// from to reach `dst`, if any subnet matches.
    pub fn address_to_reach(&self, dst: &Ipv6Addr) -> Option<(Ipv6Addr, u8)> {
        self.addresses
            .iter()
            .find(|(own, len)| dst.is_in_subnet(own, *len))
            .copied()
    }

    /// Whether `addr` falls inside any of this interface's subnets.
    pub fn is_attached(&self, addr: &Ipv6Addr) -> bool {
        self.address_to_reach(addr).is_some()
    }

    /// The interface's link-local address, derived from its MAC.
    pub fn link_local(&self) -> Ipv6Addr {
        Ipv6Addr::link_local_from_mac(&self.mac)
    }
}

/// A static responder binding: an address this switch answers neighbor
/// solicitations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdpResponseEntry {
    /// Hardware address bound to the responder address.
    pub mac: EtherAddr,
    /// Owning interface.
    pub interface: InterfaceId,
}

/// A learned neighbor binding in the VLAN's NDP cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborEntry {
    /// Learned hardware address; meaningless while pending.
    pub mac: EtherAddr,
    /// Port the neighbor was learned on.
    pub port: crate::types::PortDescriptor,
    /// Whether resolution is still outstanding.
    pub pending: bool,
}

/// One VLAN with its L3 binding and neighbor tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vlan {
    /// VLAN id.
    pub id: VlanId,
    /// The interface routing this VLAN.
    pub interface: InterfaceId,
    /// Addresses the switch responds to solicitations for.
    pub ndp_response_table: HashMap<Ipv6Addr, NdpResponseEntry>,
    /// Dynamically learned neighbors.
    pub ndp_cache: HashMap<Ipv6Addr, NeighborEntry>,
}

/// Aggregate (LAG) membership, used to validate NDP ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatePort {
    /// Aggregate id.
    pub id: AggregatePortId,
    /// Member ports and whether each is currently forwarding.
    pub members: Vec<(PortId, bool)>,
}

impl AggregatePort {
    /// Whether `port` is a forwarding member.
    pub fn is_forwarding_member(&self, port: PortId) -> bool {
        self.members
            .iter()
            .any(|&(member, forwarding)| member == port && forwarding)
    }
}

/// An immutable snapshot of the switch configuration and learned tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchState {
    /// Routed interfaces by id.
    pub interfaces: HashMap<InterfaceId, Interface>,
    /// VLANs by id.
    pub vlans: HashMap<VlanId, Vlan>,
    /// Aggregate ports by id.
    pub aggregate_ports: HashMap<AggregatePortId, AggregatePort>,
}

impl SwitchState {
    /// Look up an interface by id.
    pub fn interface(&self, id: InterfaceId) -> Option<&Interface> {
        self.interfaces.get(&id)
    }

    /// Look up a VLAN by id.
    pub fn vlan(&self, id: VlanId) -> Option<&Vlan> {
        self.vlans.get(&id)
    }

    /// The interface serving `vlan`, if both exist.
    pub fn interface_in_vlan(&self, vlan: VlanId) -> Option<&Interface> {
        self.vlan(vlan)
            .and_then(|vlan| self.interface(vlan.interface))
    }

    /// The interface in `router`'s domain owning `addr` exactly.
    pub fn interface_for_address(&self, router: RouterId, addr: &Ipv6Addr) -> Option<&Interface> {
        self.interfaces
            .values()
            .find(|intf| intf.router == router && intf.has_address(addr))
    }

    /// The first configured IPv6 address of `vlan`'s interface; used as the
    /// source of generated ICMPv6 errors.
    pub fn vlan_ipv6(&self, vlan: VlanId) -> Option<Ipv6Addr> {
        self.interface_in_vlan(vlan)
            .and_then(|intf| intf.addresses.first())
            .map(|&(addr, _)| addr)
    }

    /// Whether `pkt`'s ingress is consistent with its aggregate membership:
    /// a frame claiming an aggregate must have arrived on a member that is
    /// currently forwarding.
    pub fn is_ingress_valid(&self, pkt: &RxPacket) -> bool {
        match pkt.src_aggregate() {
            None => true,
            Some(aggregate) => self
                .aggregate_ports
                .get(&aggregate)
                .map(|agg| agg.is_forwarding_member(pkt.src_port()))
                .unwrap_or(false),
        }
    }
}

/// An old/new snapshot pair delivered by the state-update pipeline.
#[derive(Debug, Clone)]
pub struct StateDelta {
    old: Arc<SwitchState>,
    new: Arc<SwitchState>,
}

impl StateDelta {
    /// Wrap a published snapshot transition.
    pub fn new(old: Arc<SwitchState>, new: Arc<SwitchState>) -> StateDelta {
        StateDelta { old, new }
    }

    /// The snapshot being replaced.
    pub fn old(&self) -> &SwitchState {
        &self.old
    }

    /// The snapshot taking effect.
    pub fn new_state(&self) -> &SwitchState {
        &self.new
    }

    /// Interface transitions: `(None, Some)` added, `(Some, None)` removed,
    /// `(Some, Some)` changed. Unchanged interfaces are not reported.
    pub fn interface_deltas(&self) -> Vec<(Option<&Interface>, Option<&Interface>)> {
        let mut deltas = Vec::new();
        for (id, old_intf) in &self.old.interfaces {
            match self.new.interfaces.get(id) {
                None => deltas.push((Some(old_intf), None)),
                Some(new_intf) if new_intf != old_intf => {
                    deltas.push((Some(old_intf), Some(new_intf)))
                }
                Some(_) => {}
            }
        }
        for (id, new_intf) in &self.new.interfaces {
            if !self.old.interfaces.contains_key(id) {
                deltas.push((None, Some(new_intf)));
            }
        }
        deltas
    }
}
