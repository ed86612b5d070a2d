//! Router advertisements: packet construction and the per-interface
//! periodic advertiser lifecycle (RFC 4861 §6.2).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use sw6_pkt::ether::EtherAddr;
use sw6_pkt::icmpv6::ndp::{OPT_MTU, OPT_PREFIX_INFO};
use sw6_pkt::icmpv6::{Icmpv6Type, CODE_NDP};
use sw6_pkt::ipv6::Ipv6Addr;
use sw6_pkt::WriteCursor;

use crate::icmp::{build_icmpv6_packet, icmpv6_packet_len};
use crate::services::PacketTx;
use crate::state::{Interface, StateDelta};
use crate::types::{InterfaceId, TxPacket};

const OPT_SOURCE_LINK_LAYER: u8 = 1;

/// Fixed RA fields after the ICMPv6 header: hop limit, flags, router
/// lifetime, reachable time, retransmission timer.
const RA_FIXED_LEN: usize = 12;
/// A source link-layer address option.
const RA_LLADDR_OPT_LEN: usize = 8;
/// An MTU option.
const RA_MTU_OPT_LEN: usize = 8;
/// A prefix-information option.
const RA_PREFIX_OPT_LEN: usize = 32;

fn advertised_prefixes(intf: &Interface) -> impl Iterator<Item = (Ipv6Addr, u8)> + '_ {
    intf.addresses
        .iter()
        .filter(|(addr, _)| !addr.is_link_local())
        .map(|&(addr, len)| (addr.masked(len), len))
}

/// ICMPv6 body length of the advertisement `intf` is configured to send.
pub fn ra_body_len(intf: &Interface) -> usize {
    RA_FIXED_LEN
        + RA_LLADDR_OPT_LEN
        + RA_MTU_OPT_LEN
        + RA_PREFIX_OPT_LEN * advertised_prefixes(intf).count()
}

/// Total frame length of the advertisement `intf` is configured to send.
pub fn ra_packet_size(intf: &Interface) -> usize {
    icmpv6_packet_len(ra_body_len(intf))
}

fn write_ra_body(intf: &Interface, cursor: &mut WriteCursor<'_>) {
    let ndp = &intf.ndp;
    cursor.write_u8(ndp.cur_hop_limit);
    let mut flags = 0u8;
    if ndp.managed {
        flags |= 0x80;
    }
    if ndp.other {
        flags |= 0x40;
    }
    cursor.write_u8(flags);
    cursor.write_u16(ndp.router_lifetime);
    cursor.write_u32(0); // reachable time: unspecified
    cursor.write_u32(0); // retransmission timer: unspecified

    cursor.write_u8(OPT_SOURCE_LINK_LAYER);
    cursor.write_u8(1);
    cursor.write_slice(intf.mac.as_bytes());

    cursor.write_u8(OPT_MTU);
    cursor.write_u8(1);
    cursor.write_u16(0); // reserved
    cursor.write_u32(intf.mtu);

    for (prefix, prefix_len) in advertised_prefixes(intf) {
        cursor.write_u8(OPT_PREFIX_INFO);
        cursor.write_u8(4);
        cursor.write_u8(prefix_len);
        cursor.write_u8(0xc0); // on-link, autonomous
        cursor.write_u32(ndp.prefix_valid_lifetime);
        cursor.write_u32(ndp.prefix_preferred_lifetime);
        cursor.write_u32(0); // reserved
        cursor.write_slice(prefix.as_bytes());
    }
}

/// Build a complete router advertisement from `intf`'s configuration,
/// sourced from its link-local address.
pub fn build_advertisement(
    tx: &dyn PacketTx,
    intf: &Interface,
    dst_mac: EtherAddr,
    dst_ip: Ipv6Addr,
) -> TxPacket {
    let src_ip = intf.link_local();
    build_icmpv6_packet(
        tx,
        dst_mac,
        intf.mac,
        intf.vlan,
        &dst_ip,
        &src_ip,
        Icmpv6Type::ROUTER_ADVERT,
        CODE_NDP,
        ra_body_len(intf),
        |cursor| write_ra_body(intf, cursor),
    )
}

/// Periodic-send state for one RA-enabled interface.
#[derive(Debug)]
pub struct RouteAdvertiser {
    interface: InterfaceId,
    interval: Duration,
    next_due: Instant,
}

impl RouteAdvertiser {
    fn new(interface: InterfaceId, interval: Duration, now: Instant) -> RouteAdvertiser {
        RouteAdvertiser {
            interface,
            interval,
            // First advertisement goes out on the next driver pass.
            next_due: now,
        }
    }

    /// The interface this advertiser serves.
    pub fn interface(&self) -> InterfaceId {
        self.interface
    }

    /// Whether an advertisement is due at `now`.
    pub fn due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    fn advertise(&self, state: &crate::state::SwitchState, tx: &dyn PacketTx) {
        let intf = match state.interface(self.interface) {
            Some(intf) => intf,
            None => {
                // The interface vanished from the snapshot before the
                // lifecycle caught up; the pending delta will remove us.
                debug!("no interface {} in snapshot, skipping RA", self.interface);
                return;
            }
        };
        debug!("sending router advertisement on interface {}", self.interface);
        let advert = build_advertisement(
            tx,
            intf,
            Ipv6Addr::ALL_NODES.multicast_ether(),
            Ipv6Addr::ALL_NODES,
        );
        tx.send_network_control(advert, None);
    }

    fn rearm(&mut self, now: Instant) {
        self.next_due = now + self.interval;
    }
}

/// Owns one [`RouteAdvertiser`] per RA-enabled interface, driven by
/// interface configuration deltas.
///
/// Mutation runs under the state-update pipeline's single-writer
/// discipline; `&mut self` makes that explicit. Duplicate registration and
/// removal of an absent advertiser are programming faults and panic.
pub struct RaLifecycle {
    tx: Arc<dyn PacketTx>,
    advertisers: HashMap<InterfaceId, RouteAdvertiser>,
}

impl RaLifecycle {
    /// An empty lifecycle bound to its transmit sink.
    pub fn new(tx: Arc<dyn PacketTx>) -> RaLifecycle {
        RaLifecycle {
            tx,
            advertisers: HashMap::new(),
        }
    }

    fn ra_enabled(intf: &Interface) -> bool {
        intf.ndp.router_advertisement_seconds > 0
    }

    /// Apply an interface configuration delta. A changed interface is
    /// remove-then-add, which resets its periodic timer.
    pub fn state_updated(&mut self, delta: &StateDelta, now: Instant) {
        for (old, new) in delta.interface_deltas() {
            match (old, new) {
                (None, Some(added)) => self.interface_added(added, now),
                (Some(removed), None) => self.interface_deleted(removed),
                (Some(changed_old), Some(changed_new)) => {
                    self.interface_deleted(changed_old);
                    self.interface_added(changed_new, now);
                }
                (None, None) => {}
            }
        }
    }

    fn interface_added(&mut self, intf: &Interface, now: Instant) {
        if !Self::ra_enabled(intf) {
            return;
        }
        let interval = Duration::from_secs(u64::from(intf.ndp.router_advertisement_seconds));
        let previous = self
            .advertisers
            .insert(intf.id, RouteAdvertiser::new(intf.id, interval, now));
        assert!(
            previous.is_none(),
            "duplicate router advertiser for interface {}",
            intf.id
        );
    }

    fn interface_deleted(&mut self, intf: &Interface) {
        if !Self::ra_enabled(intf) {
            return;
        }
        let removed = self.advertisers.remove(&intf.id);
        assert!(
            removed.is_some(),
            "no router advertiser registered for interface {}",
            intf.id
        );
    }

    /// Emit advertisements for every due interface and re-arm their timers.
    /// The external driver decides the polling cadence; nothing here blocks.
    pub fn run_due(&mut self, state: &crate::state::SwitchState, now: Instant) {
        for advertiser in self.advertisers.values_mut() {
            if advertiser.due(now) {
                advertiser.advertise(state, &*self.tx);
                advertiser.rearm(now);
            }
        }
    }

    /// Number of registered advertisers.
    pub fn advertiser_count(&self) -> usize {
        self.advertisers.len()
    }

    /// The registered advertiser for `interface`, if any.
    pub fn advertiser(&self, interface: InterfaceId) -> Option<&RouteAdvertiser> {
        self.advertisers.get(&interface)
    }
}
