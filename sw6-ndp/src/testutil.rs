//! Recording collaborators and packet fixtures shared by the engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use sw6_pkt::ether::{EtherAddr, EtherHeader, EtherType, VlanTag, ETHER_HEADER_LEN};
use sw6_pkt::icmpv6::Icmpv6Type;
use sw6_pkt::ipv6::{IpProtocol, Ipv6Addr, Ipv6Header, IPV6_HEADER_LEN};
use sw6_pkt::udp::{UdpHeader, UDP_HEADER_LEN};

use crate::handler::Ipv6Handler;
use crate::icmp;
use crate::services::{
    Dhcp6Relay, NeighborUpdater, NextHop, PacketTx, PortStatsSink, Route, RouteLookup,
};
use crate::state::{
    AggregatePort, Interface, NdpConfig, NdpResponseEntry, SwitchState, Vlan,
};
use crate::types::{
    AggregatePortId, InterfaceId, PortDescriptor, PortId, RouterId, RxPacket, TxPacket, VlanId,
};

pub(crate) const CPU_MAC: EtherAddr = EtherAddr([0x02, 0x00, 0x00, 0xcc, 0xcc, 0x01]);
pub(crate) const INTF_MAC: EtherAddr = EtherAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x05]);
pub(crate) const HOST_MAC: EtherAddr = EtherAddr([0x02, 0xaa, 0xbb, 0x00, 0x00, 0x09]);

pub(crate) const VLAN: VlanId = VlanId(1);
pub(crate) const PORT: PortId = PortId(3);
pub(crate) const INTF: InterfaceId = InterfaceId(5);
pub(crate) const AGG: AggregatePortId = AggregatePortId(7);

/// Offset of the IPv6 header in frames built by [`build_frame`].
pub(crate) const L3_OFFSET: usize = icmp::L2_LEN;

pub(crate) fn local_addr() -> Ipv6Addr {
    Ipv6Addr::new(0x2401, 0xdb00, 0x2110, 0x3001, 0, 0, 0, 1)
}

pub(crate) fn host_addr() -> Ipv6Addr {
    Ipv6Addr::new(0x2401, 0xdb00, 0x2110, 0x3001, 0, 0, 0, 0x99)
}

pub(crate) fn gateway_addr() -> Ipv6Addr {
    Ipv6Addr::new(0x2401, 0xdb00, 0x2110, 0x3001, 0, 0, 0, 2)
}

pub(crate) fn remote_addr() -> Ipv6Addr {
    Ipv6Addr::new(0x2401, 0xdb00, 0x9999, 0, 0, 0, 0, 1)
}

/// A transmitted packet, by the path it left through.
#[derive(Debug, Clone)]
pub(crate) enum Sent {
    Switched(Vec<u8>),
    NetworkControl(Vec<u8>, Option<PortDescriptor>),
    ToHost(InterfaceId, Vec<u8>),
}

pub(crate) struct TestTx {
    pub(crate) sent: Mutex<Vec<Sent>>,
    pub(crate) host_ok: AtomicBool,
}

impl Default for TestTx {
    fn default() -> TestTx {
        TestTx {
            sent: Mutex::new(Vec::new()),
            host_ok: AtomicBool::new(true),
        }
    }
}

impl TestTx {
    pub(crate) fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl PacketTx for TestTx {
    fn send_packet_switched(&self, pkt: TxPacket) {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Switched(pkt.as_slice().to_vec()));
    }

    fn send_network_control(&self, pkt: TxPacket, port: Option<PortDescriptor>) {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::NetworkControl(pkt.as_slice().to_vec(), port));
    }

    fn send_to_host(&self, interface: InterfaceId, pkt: RxPacket) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::ToHost(interface, pkt.data().to_vec()));
        self.host_ok.load(Ordering::Relaxed)
    }

    fn local_mac(&self) -> EtherAddr {
        CPU_MAC
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NeighborEvent {
    Mine {
        vlan: VlanId,
        ip: Ipv6Addr,
        mac: EtherAddr,
        port: PortDescriptor,
        msg_type: Icmpv6Type,
        flags: u32,
    },
    NotMine {
        vlan: VlanId,
        ip: Ipv6Addr,
        mac: EtherAddr,
        port: PortDescriptor,
        msg_type: Icmpv6Type,
        flags: u32,
    },
    Solicited {
        vlan: VlanId,
        target: Ipv6Addr,
    },
}

#[derive(Default)]
pub(crate) struct TestNeighbors {
    pub(crate) events: Mutex<Vec<NeighborEvent>>,
}

impl TestNeighbors {
    pub(crate) fn take(&self) -> Vec<NeighborEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl NeighborUpdater for TestNeighbors {
    fn received_ndp_mine(
        &self,
        vlan: VlanId,
        ip: Ipv6Addr,
        mac: EtherAddr,
        port: PortDescriptor,
        msg_type: Icmpv6Type,
        flags: u32,
    ) {
        self.events.lock().unwrap().push(NeighborEvent::Mine {
            vlan,
            ip,
            mac,
            port,
            msg_type,
            flags,
        });
    }

    fn received_ndp_not_mine(
        &self,
        vlan: VlanId,
        ip: Ipv6Addr,
        mac: EtherAddr,
        port: PortDescriptor,
        msg_type: Icmpv6Type,
        flags: u32,
    ) {
        self.events.lock().unwrap().push(NeighborEvent::NotMine {
            vlan,
            ip,
            mac,
            port,
            msg_type,
            flags,
        });
    }

    fn sent_neighbor_solicitation(&self, vlan: VlanId, target: Ipv6Addr) {
        self.events
            .lock()
            .unwrap()
            .push(NeighborEvent::Solicited { vlan, target });
    }
}

#[derive(Default)]
pub(crate) struct TestStats {
    pub(crate) dropped: AtomicU32,
    pub(crate) to_host: AtomicU32,
    pub(crate) too_big: AtomicU32,
    pub(crate) hop_exceeded: AtomicU32,
    pub(crate) ndp_received: AtomicU32,
    pub(crate) ndp_bad: AtomicU32,
    pub(crate) lookup_failure: AtomicU32,
}

pub(crate) fn count(counter: &AtomicU32) -> u32 {
    counter.load(Ordering::Relaxed)
}

impl PortStatsSink for TestStats {
    fn pkt_dropped(&self, _port: PortId) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
    fn pkt_to_host(&self, _port: PortId, _l3_len: usize) {
        self.to_host.fetch_add(1, Ordering::Relaxed);
    }
    fn pkt_too_big(&self, _port: PortId) {
        self.too_big.fetch_add(1, Ordering::Relaxed);
    }
    fn ipv6_hop_exceeded(&self, _port: PortId) {
        self.hop_exceeded.fetch_add(1, Ordering::Relaxed);
    }
    fn ipv6_ndp_received(&self, _port: PortId) {
        self.ndp_received.fetch_add(1, Ordering::Relaxed);
    }
    fn ipv6_ndp_bad(&self, _port: PortId) {
        self.ndp_bad.fetch_add(1, Ordering::Relaxed);
    }
    fn ipv6_dst_lookup_failure(&self, _port: PortId) {
        self.lookup_failure.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
pub(crate) struct TestDhcp {
    /// (source port, destination port) of every handed-off packet.
    pub(crate) handled: Mutex<Vec<(u16, u16)>>,
}

impl Dhcp6Relay for TestDhcp {
    fn handle_packet(
        &self,
        _pkt: RxPacket,
        _dst_mac: EtherAddr,
        _src_mac: EtherAddr,
        _ipv6: Ipv6Header<[u8; IPV6_HEADER_LEN]>,
        udp: UdpHeader<[u8; UDP_HEADER_LEN]>,
    ) {
        self.handled
            .lock()
            .unwrap()
            .push((udp.src_port(), udp.dst_port()));
    }
}

#[derive(Default)]
pub(crate) struct TestRoutes {
    routes: Mutex<HashMap<Ipv6Addr, Arc<Route>>>,
}

impl TestRoutes {
    pub(crate) fn add(&self, addr: Ipv6Addr, route: Route) {
        self.routes.lock().unwrap().insert(addr, Arc::new(route));
    }

    pub(crate) fn add_via_gateway(&self, addr: Ipv6Addr, gateway: Ipv6Addr) {
        self.add(
            addr,
            Route {
                resolved: true,
                connected: false,
                next_hops: vec![NextHop {
                    interface: INTF,
                    gateway,
                }],
            },
        );
    }
}

impl RouteLookup for TestRoutes {
    fn longest_match(
        &self,
        _state: &SwitchState,
        addr: &Ipv6Addr,
        _router: RouterId,
    ) -> Option<Arc<Route>> {
        self.routes.lock().unwrap().get(addr).cloned()
    }
}

pub(crate) struct Fixture {
    pub(crate) handler: Ipv6Handler,
    pub(crate) routes: Arc<TestRoutes>,
    pub(crate) neighbors: Arc<TestNeighbors>,
    pub(crate) tx: Arc<TestTx>,
    pub(crate) stats: Arc<TestStats>,
    pub(crate) dhcp: Arc<TestDhcp>,
    pub(crate) state: SwitchState,
}

pub(crate) fn test_interface() -> Interface {
    Interface {
        id: INTF,
        router: RouterId(0),
        vlan: VLAN,
        mac: INTF_MAC,
        mtu: 1500,
        addresses: vec![
            (local_addr(), 64),
            (Ipv6Addr::link_local_from_mac(&INTF_MAC), 64),
        ],
        ndp: NdpConfig {
            router_advertisement_seconds: 30,
            ..NdpConfig::default()
        },
    }
}

pub(crate) fn test_state() -> SwitchState {
    let intf = test_interface();
    let link_local = Ipv6Addr::link_local_from_mac(&INTF_MAC);

    let mut response_table = HashMap::new();
    response_table.insert(
        local_addr(),
        NdpResponseEntry {
            mac: INTF_MAC,
            interface: INTF,
        },
    );
    response_table.insert(
        link_local,
        NdpResponseEntry {
            mac: INTF_MAC,
            interface: INTF,
        },
    );

    let mut state = SwitchState::default();
    state.interfaces.insert(INTF, intf);
    state.vlans.insert(
        VLAN,
        Vlan {
            id: VLAN,
            interface: INTF,
            ndp_response_table: response_table,
            ndp_cache: HashMap::new(),
        },
    );
    state.aggregate_ports.insert(
        AGG,
        AggregatePort {
            id: AGG,
            members: vec![(PortId(1), true), (PortId(2), false)],
        },
    );
    state
}

pub(crate) fn fixture() -> Fixture {
    let routes = Arc::new(TestRoutes::default());
    let neighbors = Arc::new(TestNeighbors::default());
    let tx = Arc::new(TestTx::default());
    let stats = Arc::new(TestStats::default());
    let dhcp = Arc::new(TestDhcp::default());
    let handler = Ipv6Handler::new(
        routes.clone(),
        neighbors.clone(),
        tx.clone(),
        stats.clone(),
        dhcp.clone(),
    );
    Fixture {
        handler,
        routes,
        neighbors,
        tx,
        stats,
        dhcp,
        state: test_state(),
    }
}

pub(crate) fn rx(frame: &[u8]) -> RxPacket {
    RxPacket::new(Bytes::copy_from_slice(frame), PORT, None, VLAN)
}

pub(crate) fn rx_on(frame: &[u8], port: PortId, aggregate: Option<AggregatePortId>) -> RxPacket {
    RxPacket::new(Bytes::copy_from_slice(frame), port, aggregate, VLAN)
}

/// A complete ICMPv6 frame as the builder would emit it (hop limit 255,
/// VLAN tagged, valid checksum).
pub(crate) fn build_frame(
    dst_mac: EtherAddr,
    src_mac: EtherAddr,
    dst_ip: Ipv6Addr,
    src_ip: Ipv6Addr,
    msg_type: Icmpv6Type,
    code: u8,
    body: &[u8],
) -> Vec<u8> {
    let tx = TestTx::default();
    let pkt = icmp::build_icmpv6_packet(
        &tx,
        dst_mac,
        src_mac,
        VLAN,
        &dst_ip,
        &src_ip,
        msg_type,
        code,
        body.len(),
        |cursor| cursor.write_slice(body),
    );
    pkt.as_slice().to_vec()
}

/// A VLAN-tagged frame with an arbitrary L4 protocol and a zeroed payload.
pub(crate) fn build_raw_frame(
    dst_ip: Ipv6Addr,
    src_ip: Ipv6Addr,
    proto: IpProtocol,
    hop_limit: u8,
    payload_len: usize,
) -> Vec<u8> {
    let mut frame = vec![0u8; L3_OFFSET + IPV6_HEADER_LEN + payload_len];

    let mut eth = EtherHeader::parse_unchecked(&mut frame[..ETHER_HEADER_LEN]);
    eth.set_dst_addr(INTF_MAC);
    eth.set_src_addr(HOST_MAC);
    eth.set_ethertype(EtherType::VLAN);

    let mut tag = VlanTag::parse_unchecked(&mut frame[ETHER_HEADER_LEN..L3_OFFSET]);
    tag.set_vid(VLAN.0);
    tag.set_ethertype(EtherType::IPV6);

    let mut ipv6 = Ipv6Header::parse_unchecked(&mut frame[L3_OFFSET..L3_OFFSET + IPV6_HEADER_LEN]);
    ipv6.adjust_version();
    ipv6.set_payload_len(payload_len as u16);
    ipv6.set_next_header(proto);
    ipv6.set_hop_limit(hop_limit);
    ipv6.set_src_addr(&src_ip);
    ipv6.set_dst_addr(&dst_ip);

    frame
}

/// A VLAN-tagged UDP frame with the given ports and a `payload_len`-byte
/// zeroed UDP payload.
pub(crate) fn build_udp_frame(
    dst_ip: Ipv6Addr,
    src_ip: Ipv6Addr,
    src_port: u16,
    dst_port: u16,
    hop_limit: u8,
    payload_len: usize,
) -> Vec<u8> {
    let mut frame = build_raw_frame(
        dst_ip,
        src_ip,
        IpProtocol::UDP,
        hop_limit,
        UDP_HEADER_LEN + payload_len,
    );
    let l4 = L3_OFFSET + IPV6_HEADER_LEN;
    let mut udp = UdpHeader::parse_unchecked(&mut frame[l4..l4 + UDP_HEADER_LEN]);
    udp.set_src_port(src_port);
    udp.set_dst_port(dst_port);
    udp.set_packet_len((UDP_HEADER_LEN + payload_len) as u16);
    frame
}

/// Overwrite the hop limit; the ICMPv6 checksum does not cover it.
pub(crate) fn set_hop_limit(frame: &mut [u8], hop_limit: u8) {
    frame[L3_OFFSET + 7] = hop_limit;
}

/// The reserved field, target address and optional source link-layer
/// option of a neighbor solicitation body.
pub(crate) fn ns_body(target: Ipv6Addr, slla: Option<EtherAddr>) -> Vec<u8> {
    let mut body = vec![0u8; 20];
    body[4..20].copy_from_slice(target.as_bytes());
    if let Some(mac) = slla {
        body.push(0x01);
        body.push(0x01);
        body.extend_from_slice(mac.as_bytes());
    }
    body
}

/// The flags, target address and optional target link-layer option of a
/// neighbor advertisement body.
pub(crate) fn na_body(flags: u32, target: Ipv6Addr, tlla: Option<EtherAddr>) -> Vec<u8> {
    let mut body = vec![0u8; 20];
    body[0..4].copy_from_slice(&flags.to_be_bytes());
    body[4..20].copy_from_slice(target.as_bytes());
    if let Some(mac) = tlla {
        body.push(0x02);
        body.push(0x01);
        body.extend_from_slice(mac.as_bytes());
    }
    body
}

/// The reserved field and optional source link-layer option of a router
/// solicitation body.
pub(crate) fn rs_body(slla: Option<EtherAddr>) -> Vec<u8> {
    let mut body = vec![0u8; 4];
    if let Some(mac) = slla {
        body.push(0x01);
        body.push(0x01);
        body.extend_from_slice(mac.as_bytes());
    }
    body
}
