/*!

The routing algorithms. A `Routing` is asked for an output port and a range of virtual channels when the head flit of a packet reaches the front of an input buffer.

The algorithm is selected by name in the configuration:
* `Minimal`, the shortest route.
* `UGAL{threshold:0, in_flight:false, local_queue_factor:1}`, which compares the queues of the minimal route and of the route through a uniformly random intermediate.
* `VALn{adaptive:false}`, Valiant through a restricted random intermediate.
* `PAR`, a minimal first hop, reconsidered at the second router.
* `DGB{learning_rate:0.25, explore_rate:0.25, epoch:50, history:5, learnset_period:50, local_queue_factor:8}`, UGAL with a bias learnt per destination and port.

Non-minimal routes are split into phases, using different classes of virtual channels to avoid deadlock. See `virtual_channel_class`.

*/

mod minimal;
mod ugal;
mod valn;
mod par;
mod dgb;

use std::cell::RefCell;
use std::ops::Range;
use ::rand::rngs::StdRng;
pub use self::minimal::Minimal;
pub use self::ugal::Ugal;
pub use self::valn::Valn;
pub use self::par::Par;
pub use self::dgb::Dgb;
use crate::config::{object_name,RouterConfig,TopologyFamily};
use crate::config_parser::ConfigurationValue;
use crate::error::Error;
use crate::flit::{Packet,RoutingInfo,RoutingPhase};
use crate::learning::{CongestionBiasLearner,LearnerParameters};
use crate::router::OccupancySnapshot;
use crate::topology::Topology;

///Where a head flit must go.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Decision
{
	pub port: usize,
	///Any free virtual channel in this range may be allocated.
	pub virtual_channels: Range<usize>,
}

///What a routing can see while deciding at a router.
pub struct RoutingContext<'a>
{
	pub topology: &'a dyn Topology,
	pub router_index: usize,
	pub virtual_channels: usize,
	pub occupancy: &'a OccupancySnapshot,
	///The learner of the router, when the routing requires one.
	pub learner: Option<&'a mut CongestionBiasLearner>,
	pub cycle: usize,
	pub rng: &'a RefCell<StdRng>,
}

impl<'a> RoutingContext<'a>
{
	///The virtual channels of `class` when they are split into `classes` equal parts.
	pub fn class_range(&self, class:usize, classes:usize) -> Range<usize>
	{
		let per_class=self.virtual_channels/classes;
		class*per_class..(class+1)*per_class
	}
	///The decision of leaving the network if the packet is at the router of its destination.
	pub fn ejection(&self, packet:&Packet) -> Option<Decision>
	{
		if self.topology.node_router(packet.destination)!=self.router_index
		{
			return None;
		}
		Some(Decision{
			port: self.topology.outport(self.router_index,packet.source,packet.destination),
			virtual_channels: 0..self.virtual_channels,
		})
	}
	///The queue at an output port of this router.
	pub fn queue(&self, port:usize, in_flight_adjusted:bool) -> usize
	{
		if in_flight_adjusted
		{
			self.occupancy.net_queue(self.router_index,port)
		}
		else
		{
			self.occupancy.queue(self.router_index,port)
		}
	}
}

///The interface of the routing algorithms.
pub trait Routing : std::fmt::Debug
{
	///Choose the output of the head flit of `packet`, that is at `input_port` of the router in the context.
	///Packets just injected arrive by a port to a node; then the routing state is reset.
	fn route(&self, context:&mut RoutingContext, packet:&Packet, input_port:usize) -> Decision;
	///Number of classes in which the virtual channels are split.
	fn virtual_channel_classes(&self, family:TopologyFamily) -> usize;
	fn name(&self) -> &'static str;
	///Parameters for the learners of the routers, if the routing learns.
	fn learner_parameters(&self) -> Option<LearnerParameters>
	{
		None
	}
	///Cycles between the generation of learnsets.
	fn learnset_period(&self) -> Option<usize>
	{
		None
	}
	///Cycles a learnset takes to reach its router. `None` for the latency of the longest channel.
	fn learnset_latency(&self) -> Option<usize>
	{
		None
	}
}

///Build the routing from its configuration, checking the routers have enough virtual channels for it.
pub fn new_routing(cv:&ConfigurationValue, topology:&dyn Topology, router:&RouterConfig) -> Result<Box<dyn Routing>,Error>
{
	let routing:Box<dyn Routing> = match object_name(cv)?
	{
		"Minimal" | "Shortest" => Box::new(Minimal::new(cv)?),
		"UGAL" | "Ugal" => Box::new(Ugal::new(cv)?),
		"VALn" | "Valiant" => Box::new(Valn::new(cv)?),
		"PAR" | "Par" => Box::new(Par::new(cv)?),
		"DGB" | "Dgb" => Box::new(Dgb::new(cv,topology,router)?),
		name => return Err(Error::unknown_configuration_object(source_location!(),"routing",name)),
	};
	let required=routing.virtual_channel_classes(topology.family());
	if required>router.virtual_channels
	{
		return Err(Error::insufficient_virtual_channels(source_location!(),routing.name(),required,router.virtual_channels));
	}
	Ok(routing)
}

///Whether the packet has just been injected, so nothing is decided for it yet.
pub fn is_injection(context:&RoutingContext, input_port:usize) -> bool
{
	input_port<context.topology.concentration()
}

///The node the packet is currently heading to. At the intermediate router the packet changes to the destination phase.
pub fn current_target(context:&RoutingContext, packet:&Packet, info:&mut RoutingInfo) -> usize
{
	if info.phase==RoutingPhase::RouteToIntermediate
	{
		match info.intermediate
		{
			Some(intermediate) if context.topology.node_router(intermediate)!=context.router_index => return intermediate,
			_ => info.phase=RoutingPhase::RouteToDestination,
		}
	}
	packet.destination
}

///The class of virtual channels for the next hop of a packet.
///
///In the flattened butterfly the classes follow the phases: a single class for minimal routing, `[to intermediate, to destination]` for two phases, and `[first hop, to intermediate, to destination]` with a first hop of reconsideration.
///In the dragonfly the classes follow the groups: `[before, at]` the destination group for minimal routing, and `[source group, intermediate group towards the intermediate, towards the destination, destination group]` otherwise.
pub fn virtual_channel_class(context:&RoutingContext, packet:&Packet, info:&RoutingInfo, classes:usize) -> usize
{
	let topology=context.topology;
	match topology.family()
	{
		TopologyFamily::FlattenedButterfly => match (classes,info.phase)
		{
			(1,_) => 0,
			(2,RoutingPhase::RouteToIntermediate) => 0,
			(2,_) => 1,
			(_,RoutingPhase::Inject) | (_,RoutingPhase::SelectIntermediate) => 0,
			(_,RoutingPhase::RouteToIntermediate) => 1,
			(_,RoutingPhase::RouteToDestination) => 2,
		},
		TopologyFamily::Dragonfly =>
		{
			let group=topology.group(context.router_index);
			let destination_group=topology.group(topology.node_router(packet.destination));
			if classes<=2
			{
				return if group==destination_group {1} else {0};
			}
			match (info.phase,info.intermediate)
			{
				(RoutingPhase::RouteToIntermediate,Some(intermediate)) =>
				{
					if group==topology.group(topology.node_router(intermediate)) {1} else {0}
				},
				_ =>
				{
					if group==destination_group {3} else if info.minimal {0} else {2}
				},
			}
		},
	}
}

///The two candidate routes of an adaptive decision.
#[derive(Clone,Debug)]
pub struct Candidates
{
	pub minimal_port: usize,
	pub nonminimal_port: usize,
	pub minimal_hops: usize,
	pub nonminimal_hops: usize,
	pub minimal_queue: usize,
	pub nonminimal_queue: usize,
}

impl Candidates
{
	pub fn new(context:&RoutingContext, packet:&Packet, intermediate:usize, in_flight_adjusted:bool) -> Candidates
	{
		let topology=context.topology;
		let router=context.router_index;
		let destination_router=topology.node_router(packet.destination);
		let intermediate_router=topology.node_router(intermediate);
		let minimal_port=topology.outport(router,packet.source,packet.destination);
		let nonminimal_port=topology.outport(router,packet.source,intermediate);
		Candidates{
			minimal_port,
			nonminimal_port,
			minimal_hops: topology.router_hop_count(router,destination_router),
			nonminimal_hops: topology.router_hop_count(router,intermediate_router)+topology.router_hop_count(intermediate_router,destination_router),
			minimal_queue: context.queue(minimal_port,in_flight_adjusted),
			nonminimal_queue: context.queue(nonminimal_port,in_flight_adjusted),
		}
	}
	///The queues multiplied by `factor` at the local port when one candidate port is global and the other local.
	pub fn weighted_queues(&self, context:&RoutingContext, factor:usize) -> (usize,usize)
	{
		let topology=context.topology;
		let router=context.router_index;
		let minimal_global=topology.is_global_port(router,self.minimal_port);
		let nonminimal_global=topology.is_global_port(router,self.nonminimal_port);
		match (minimal_global,nonminimal_global)
		{
			(true,false) => (self.minimal_queue,self.nonminimal_queue*factor),
			(false,true) => (self.minimal_queue*factor,self.nonminimal_queue),
			_ => (self.minimal_queue,self.nonminimal_queue),
		}
	}
	///The UGAL comparison, `h_min*q_min <= h_non*q_non + threshold`.
	pub fn prefer_minimal(&self, context:&RoutingContext, factor:usize, threshold:i64) -> bool
	{
		let (minimal_queue,nonminimal_queue)=self.weighted_queues(context,factor);
		((self.minimal_hops*minimal_queue) as i64) <= ((self.nonminimal_hops*nonminimal_queue) as i64)+threshold
	}
}

///Sets the routing information of a packet after an adaptive decision at its source router.
pub fn set_decision(info:&mut RoutingInfo, intermediate:usize, minimal:bool)
{
	info.intermediate=Some(intermediate);
	info.minimal=minimal;
	info.phase = if minimal { RoutingPhase::RouteToDestination } else { RoutingPhase::RouteToIntermediate };
}

///Route to the current target of the packet, in the class of its phase.
pub fn follow_phase(context:&RoutingContext, packet:&Packet, info:&mut RoutingInfo, classes:usize) -> Decision
{
	let target=current_target(context,packet,info);
	let port=context.topology.outport(context.router_index,packet.source,target);
	let class=virtual_channel_class(context,packet,info,classes);
	Decision{
		port,
		virtual_channels: context.class_range(class,classes),
	}
}

#[cfg(test)]
pub mod tests
{
	use super::*;
	use std::cell::Cell;
	use std::rc::Rc;
	use ::rand::SeedableRng;
	use crate::config::TopologyConfig;
	use crate::config::parse_configuration;
	use crate::flit::FlitType;
	use crate::topology::new_topology;

	pub fn packet(source:usize, destination:usize) -> Packet
	{
		Packet{
			id: 0,
			source,
			destination,
			size: 1,
			class: 0,
			kind: FlitType::Any,
			creation_cycle: 0,
			measured: true,
			message: None,
			routing_info: RefCell::new(RoutingInfo::new()),
			network_departure: Cell::new(None),
			network_arrival: Cell::new(None),
		}
	}

	///An empty snapshot for all the routers of the topology.
	pub fn empty_snapshot(topology:&dyn Topology) -> OccupancySnapshot
	{
		let mut snapshot=OccupancySnapshot::new();
		for router in 0..topology.num_routers()
		{
			let ports=topology.ports(router);
			snapshot.record(router,vec![0;ports],vec![0;ports]);
		}
		snapshot
	}

	pub fn dragonfly() -> Rc<dyn Topology>
	{
		new_topology(&TopologyConfig::Dragonfly{p:2,a:4,h:2,channel_latency:10,global_channel_latency:100}).expect("valid topology")
	}

	pub fn flatfly() -> Rc<dyn Topology>
	{
		new_topology(&TopologyConfig::FlattenedButterfly{k:4,n:2,concentration:1,channel_latency:2}).expect("valid topology")
	}

	fn router_config(virtual_channels:usize) -> RouterConfig
	{
		RouterConfig{virtual_channels,buffer_size:8,speculative:false,allocator_iterations:1}
	}

	#[test]
	fn routings_are_built_by_name()
	{
		let topology=dragonfly();
		for (text,classes) in [("Minimal",2),("UGAL{threshold:0}",4),("VALn{adaptive:true}",4),("PAR",4),("DGB",4)].iter()
		{
			let cv=parse_configuration(text).expect("parses");
			let routing=new_routing(&cv,topology.as_ref(),&router_config(4)).expect("enough virtual channels");
			assert_eq!(routing.virtual_channel_classes(TopologyFamily::Dragonfly),*classes);
		}
		let cv=parse_configuration("Oblivious").expect("parses");
		assert!(new_routing(&cv,topology.as_ref(),&router_config(4)).is_err());
	}

	#[test]
	fn too_few_virtual_channels_are_reported()
	{
		let cv=parse_configuration("UGAL").expect("parses");
		match new_routing(&cv,dragonfly().as_ref(),&router_config(3))
		{
			Err(Error{kind:crate::error::ErrorKind::InsufficientVirtualChannels{required,available,..},..}) =>
			{
				assert_eq!(required,4);
				assert_eq!(available,3);
			},
			_ => panic!("three virtual channels are not enough for UGAL in a dragonfly"),
		}
		let cv=parse_configuration("PAR").expect("parses");
		assert!(new_routing(&cv,flatfly().as_ref(),&router_config(2)).is_err());
		assert!(new_routing(&cv,flatfly().as_ref(),&router_config(3)).is_ok());
	}

	#[test]
	fn classes_of_the_dragonfly()
	{
		let topology=dragonfly();
		let snapshot=empty_snapshot(topology.as_ref());
		let rng=RefCell::new(StdRng::seed_from_u64(0));
		//Node 0 at router 0 in group 0; node 16 at router 8 in group 2; node 8 at router 4 in group 1.
		let p=packet(0,8);
		let mut info=RoutingInfo::new();
		set_decision(&mut info,16,false);
		let at=|router:usize|RoutingContext{topology:topology.as_ref(),router_index:router,virtual_channels:4,occupancy:&snapshot,learner:None,cycle:0,rng:&rng};
		assert_eq!(virtual_channel_class(&at(0),&p,&info,4),0);
		assert_eq!(virtual_channel_class(&at(9),&p,&info,4),1);
		info.phase=RoutingPhase::RouteToDestination;
		assert_eq!(virtual_channel_class(&at(8),&p,&info,4),2);
		assert_eq!(virtual_channel_class(&at(5),&p,&info,4),3);
		set_decision(&mut info,16,true);
		assert_eq!(virtual_channel_class(&at(0),&p,&info,4),0);
		assert_eq!(virtual_channel_class(&at(0),&p,&info,2),0);
		assert_eq!(virtual_channel_class(&at(4),&p,&info,2),1);
		//The phase changes at the intermediate router.
		set_decision(&mut info,16,false);
		let context=at(8);
		assert_eq!(current_target(&context,&p,&mut info),8);
		assert_eq!(info.phase,RoutingPhase::RouteToDestination);
	}
}
