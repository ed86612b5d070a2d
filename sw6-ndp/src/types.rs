//! Identifier newtypes and the packet handles crossing the engine boundary.

use core::fmt;

use bytes::{Bytes, BytesMut};

macro_rules! id_type {
    (
        $(#[$outer:meta])*
        pub struct $name:ident($repr:ty)
    ) => {
        $(#[$outer])*
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
        pub struct $name(pub $repr);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// A VLAN identifier (12 bits on the wire, widened for bookkeeping).
    pub struct VlanId(u16)
}

id_type! {
    /// A physical switch port.
    pub struct PortId(u32)
}

id_type! {
    /// An aggregate (LAG) port.
    pub struct AggregatePortId(u32)
}

id_type! {
    /// A routed interface (SVI).
    pub struct InterfaceId(u32)
}

id_type! {
    /// A virtual routing domain; all lookups in this crate use domain 0.
    pub struct RouterId(u32)
}

/// Where a packet entered or should leave the switch: a physical port, or
/// the aggregate it is a member of.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum PortDescriptor {
    /// A plain physical port.
    Physical(PortId),
    /// An aggregate (LAG) port.
    Aggregate(AggregatePortId),
}

impl PortDescriptor {
    /// The descriptor a reply to `pkt` should be pinned to.
    pub fn from_rx(pkt: &RxPacket) -> PortDescriptor {
        match pkt.src_aggregate() {
            Some(aggregate) => PortDescriptor::Aggregate(aggregate),
            None => PortDescriptor::Physical(pkt.src_port()),
        }
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDescriptor::Physical(port) => write!(f, "port {}", port),
            PortDescriptor::Aggregate(aggregate) => write!(f, "aggregate {}", aggregate),
        }
    }
}

/// A received frame plus its ingress metadata.
///
/// Owns the frame bytes for the duration of handling; the parsing layers
/// only ever borrow into it.
#[derive(Debug, Clone)]
pub struct RxPacket {
    data: Bytes,
    src_port: PortId,
    src_aggregate: Option<AggregatePortId>,
    src_vlan: VlanId,
}

impl RxPacket {
    /// Wrap a received frame.
    pub fn new(
        data: Bytes,
        src_port: PortId,
        src_aggregate: Option<AggregatePortId>,
        src_vlan: VlanId,
    ) -> RxPacket {
        RxPacket {
            data,
            src_port,
            src_aggregate,
            src_vlan,
        }
    }

    /// The frame bytes, starting at the Ethernet header.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Total frame length.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame is empty (never true for real ingress).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The physical ingress port.
    #[inline]
    pub fn src_port(&self) -> PortId {
        self.src_port
    }

    /// The aggregate the ingress port belongs to, if any.
    #[inline]
    pub fn src_aggregate(&self) -> Option<AggregatePortId> {
        self.src_aggregate
    }

    /// The ingress VLAN.
    #[inline]
    pub fn src_vlan(&self) -> VlanId {
        self.src_vlan
    }
}

/// An outbound packet buffer, sized exactly at allocation and never grown.
#[derive(Debug)]
pub struct TxPacket {
    buf: BytesMut,
}

impl TxPacket {
    /// Allocate a zero-filled buffer of exactly `len` bytes.
    pub fn new(len: usize) -> TxPacket {
        TxPacket {
            buf: BytesMut::zeroed(len),
        }
    }

    /// Buffer length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The packet bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// The packet bytes, writable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Freeze into an immutable handle for transmission.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
