/*!

Flits, the packets they belong to, and the arena where the flits live while in the network.

A packet is decomposed into flits when it becomes the next packet to be injected by its node. Each flit is stored into the `FlitPool` and referenced everywhere else (buffers, channels, events) by a `FlitHandle`.
A handle carries the generation of its slot, so a handle kept after its flit has been retired is detected instead of silently reading another flit.

*/

use std::cell::{Cell,RefCell};
use std::rc::Rc;
use quantifiable_derive::Quantifiable;//the derive macro
use crate::quantify::Quantifiable;

///Type of the packets, for request/reply traffic.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Quantifiable)]
pub enum FlitType
{
	ReadRequest,
	ReadReply,
	WriteRequest,
	WriteReply,
	///Traffic without replies.
	Any,
}

impl FlitType
{
	pub fn is_request(&self) -> bool
	{
		match self
		{
			FlitType::ReadRequest | FlitType::WriteRequest => true,
			_ => false,
		}
	}
}

///The phases of the multi-phase routing algorithms.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Quantifiable)]
pub enum RoutingPhase
{
	///Nothing decided yet. Set when the packet enters its first router.
	Inject,
	///A minimal first hop has been done and the intermediate is to be decided at the next router.
	SelectIntermediate,
	RouteToIntermediate,
	RouteToDestination,
}

///The state seen when an adaptive decision was taken, to later know how wrong the estimation was.
#[derive(Clone,Debug,Default,PartialEq,Quantifiable)]
pub struct DecisionSample
{
	pub source_router: usize,
	pub destination_router: usize,
	pub minimal_port: usize,
	pub nonminimal_port: usize,
	pub minimal_hops: usize,
	pub nonminimal_hops: usize,
	pub minimal_queue: usize,
	pub nonminimal_queue: usize,
	///Queue at the global port of the look-ahead router, if any.
	pub minimal_global_queue: usize,
	pub nonminimal_global_queue: usize,
	pub decision_cycle: usize,
}

impl DecisionSample
{
	///The latency estimated for the path that was taken, given by the queues along it plus its hops.
	pub fn estimated_latency(&self, minimal:bool) -> usize
	{
		if minimal
		{
			self.minimal_queue+self.minimal_global_queue+self.minimal_hops
		}
		else
		{
			self.nonminimal_queue+self.nonminimal_global_queue+self.nonminimal_hops
		}
	}
}

///Information stored in the packet for the `Routing` algorithms to operate.
///It is shared by every flit of the packet, so the decisions taken for the head flit are seen by the rest.
#[derive(Clone,Debug,Quantifiable)]
pub struct RoutingInfo
{
	pub phase: RoutingPhase,
	///Node used as intermediate for non-minimal routes.
	pub intermediate: Option<usize>,
	///Whether the packet goes through a minimal route.
	pub minimal: bool,
	///The decision was forced minimal, without comparing queues.
	pub force_minimal: bool,
	///Number of edges traversed (Router--Router).
	pub hops: usize,
	///Set by the bias learning routing.
	pub sample: Option<DecisionSample>,
	///The decision was taken while exploring.
	pub explored: bool,
}

impl RoutingInfo
{
	pub fn new() -> RoutingInfo
	{
		RoutingInfo{
			phase: RoutingPhase::Inject,
			intermediate: None,
			minimal: true,
			force_minimal: false,
			hops: 0,
			sample: None,
			explored: false,
		}
	}
	///Forget anything decided. The hop count is kept.
	pub fn reset(&mut self)
	{
		let hops=self.hops;
		*self=RoutingInfo::new();
		self.hops=hops;
	}
}

///Mark of the packets that were given by a host, to be reported back when the whole message is received.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Quantifiable)]
pub struct MessageTag
{
	///The identifier returned to the host. It is the identifier of the last packet of the message.
	pub message: usize,
	///Whether this is the last packet of the message.
	pub last: bool,
}

///A portion of a message. They are divided into flits.
///All flits must go through the same queues without flits of other packets in between.
#[derive(Debug,Quantifiable)]
pub struct Packet
{
	pub id: usize,
	///Node that created the packet.
	pub source: usize,
	///Node that is the destination of the packet.
	pub destination: usize,
	///Number of flits.
	pub size: usize,
	pub class: usize,
	pub kind: FlitType,
	///Cycle when the packet was created. For replies, the cycle in which their request was created.
	pub creation_cycle: usize,
	///Created while measuring. Only those are included in the statistics.
	pub measured: bool,
	pub message: Option<MessageTag>,
	///Information for the routing
	pub routing_info: RefCell<RoutingInfo>,
	///The cycle in which the leading flit left its first router.
	pub network_departure: Cell<Option<usize>>,
	///The cycle in which the leading flit reached the router of its destination.
	pub network_arrival: Cell<Option<usize>>,
}

impl Packet
{
	///Cycles between leaving the source router and reaching the destination router.
	pub fn network_latency(&self) -> Option<usize>
	{
		match (self.network_departure.get(),self.network_arrival.get())
		{
			(Some(departure),Some(arrival)) => Some(arrival.saturating_sub(departure)),
			_ => None,
		}
	}
}

///The unit of flow control.
#[derive(Debug,Quantifiable)]
pub struct Flit
{
	pub id: usize,
	///The packet to what this flit belongs
	pub packet: Rc<Packet>,
	///position inside the packet
	pub index: usize,
	///The virtual channel of the buffer currently holding the flit, or of the channel it is traversing.
	pub virtual_channel: usize,
	///Cycle in which it entered its first router.
	pub injection_cycle: Option<usize>,
	///Cycle in which it entered its current buffer.
	pub arrival_cycle: usize,
}

impl Flit
{
	///Whether the flit is leading a packet. Routers check this to make requests.
	pub fn is_head(&self) -> bool
	{
		self.index==0
	}
	///Whether this flit is the last one of a packet. Routers use this to release resources.
	pub fn is_tail(&self) -> bool
	{
		self.index+1==self.packet.size
	}
}

///Stable reference to a flit in a `FlitPool`.
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash,Quantifiable)]
pub struct FlitHandle
{
	index: usize,
	generation: usize,
}

#[derive(Debug,Quantifiable)]
struct PoolSlot
{
	generation: usize,
	flit: Option<Flit>,
}

///Arena of flits. Released slots are reused by later allocations, so the memory stays bounded by the maximum number of simultaneous flits.
#[derive(Debug,Quantifiable)]
pub struct FlitPool
{
	slots: Vec<PoolSlot>,
	free: Vec<usize>,
	live: usize,
}

impl FlitPool
{
	pub fn new() -> FlitPool
	{
		FlitPool{
			slots: vec![],
			free: vec![],
			live: 0,
		}
	}
	///Stores a flit and returns its handle.
	pub fn allocate(&mut self, flit:Flit) -> FlitHandle
	{
		self.live+=1;
		match self.free.pop()
		{
			Some(index) =>
			{
				let slot=&mut self.slots[index];
				assert!(slot.flit.is_none(),"reusing an occupied slot {} of the flit pool",index);
				slot.flit=Some(flit);
				FlitHandle{index,generation:slot.generation}
			},
			None =>
			{
				let index=self.slots.len();
				self.slots.push(PoolSlot{generation:0,flit:Some(flit)});
				FlitHandle{index,generation:0}
			},
		}
	}
	fn slot(&self, handle:FlitHandle) -> &PoolSlot
	{
		let slot=&self.slots[handle.index];
		if slot.generation!=handle.generation || slot.flit.is_none()
		{
			panic!("stale flit handle {:?}, the slot is at generation {}",handle,slot.generation);
		}
		slot
	}
	pub fn get(&self, handle:FlitHandle) -> &Flit
	{
		match self.slot(handle).flit
		{
			Some(ref flit) => flit,
			None => unreachable!(),
		}
	}
	pub fn get_mut(&mut self, handle:FlitHandle) -> &mut Flit
	{
		self.slot(handle);
		match self.slots[handle.index].flit
		{
			Some(ref mut flit) => flit,
			None => unreachable!(),
		}
	}
	///Whether the handle still refers to a flit.
	pub fn is_live(&self, handle:FlitHandle) -> bool
	{
		let slot=&self.slots[handle.index];
		slot.generation==handle.generation && slot.flit.is_some()
	}
	///Takes the flit out of the pool. Releasing twice the same handle is a bug and panics.
	pub fn release(&mut self, handle:FlitHandle) -> Flit
	{
		self.slot(handle);
		let slot=&mut self.slots[handle.index];
		slot.generation+=1;
		self.free.push(handle.index);
		self.live-=1;
		match slot.flit.take()
		{
			Some(flit) => flit,
			None => unreachable!(),
		}
	}
	///Number of flits currently stored.
	pub fn live(&self) -> usize
	{
		self.live
	}
	///Number of slots ever created.
	pub fn capacity(&self) -> usize
	{
		self.slots.len()
	}
}
