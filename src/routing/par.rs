
use ::rand::Rng;
use super::{Candidates,Decision,Routing,RoutingContext,follow_phase,is_injection,set_decision};
use crate::config::{object_name,object_pairs,unknown_field,TopologyFamily};
use crate::config_parser::ConfigurationValue;
use crate::error::Error;
use crate::flit::{Packet,RoutingInfo,RoutingPhase};
use crate::topology::{Location,Topology};

///Progressive Adaptive Routing.
///The source router takes a UGAL decision with the in-flight discounted queues. A packet sent minimally may still be diverted at its second router, as long as it has not left the group of its source.
#[derive(Debug)]
pub struct Par
{
}

impl Routing for Par
{
	fn route(&self, context:&mut RoutingContext, packet:&Packet, input_port:usize) -> Decision
	{
		if let Some(decision)=context.ejection(packet)
		{
			return decision;
		}
		let mut info=packet.routing_info.borrow_mut();
		if is_injection(context,input_port)
		{
			info.reset();
			let intermediate=match context.topology.family()
			{
				TopologyFamily::Dragonfly => context.topology.uniform_intermediate(context.rng),
				TopologyFamily::FlattenedButterfly => context.topology.random_intermediate(packet.source,packet.destination,context.rng),
			};
			self.decide(context,packet,&mut info,intermediate,RoutingPhase::SelectIntermediate);
		}
		else if info.phase==RoutingPhase::SelectIntermediate
		{
			let intermediate = if self.may_reconsider(context,packet,&info)
			{
				match context.topology.family()
				{
					TopologyFamily::Dragonfly => self.intermediate_by_global_port(context,packet),
					TopologyFamily::FlattenedButterfly => info.intermediate,
				}
			}
			else
			{
				None
			};
			match intermediate
			{
				Some(intermediate) => self.decide(context,packet,&mut info,intermediate,RoutingPhase::RouteToDestination),
				None => info.phase=RoutingPhase::RouteToDestination,
			}
		}
		let classes=self.virtual_channel_classes(context.topology.family());
		follow_phase(context,packet,&mut info,classes)
	}
	fn virtual_channel_classes(&self, family:TopologyFamily) -> usize
	{
		match family
		{
			TopologyFamily::FlattenedButterfly => 3,
			TopologyFamily::Dragonfly => 4,
		}
	}
	fn name(&self) -> &'static str
	{
		"PAR"
	}
}

impl Par
{
	pub fn new(cv:&ConfigurationValue) -> Result<Par,Error>
	{
		let name=object_name(cv)?;
		for &(ref field,ref _value) in object_pairs(cv,name)?
		{
			match field.as_ref()
			{
				"legend_name" => (),
				_ => return Err(unknown_field(name,field,cv)),
			}
		}
		Ok(Par{})
	}
	///Compares the routes and updates the packet. A minimal decision moves the packet to `minimal_phase`.
	fn decide(&self, context:&RoutingContext, packet:&Packet, info:&mut RoutingInfo, intermediate:usize, minimal_phase:RoutingPhase)
	{
		if context.topology.forces_minimal(context.router_index,intermediate,packet.destination)
		{
			info.force_minimal=true;
			set_decision(info,intermediate,true);
			return;
		}
		info.force_minimal=false;
		let candidates=Candidates::new(context,packet,intermediate,true);
		let minimal=candidates.minimal_hops*candidates.minimal_queue <= candidates.nonminimal_hops*(candidates.nonminimal_queue+1);
		set_decision(info,intermediate,minimal);
		if minimal
		{
			info.phase=minimal_phase;
		}
	}
	///Whether this is the second router of a packet sent minimally, still in the group of its source.
	fn may_reconsider(&self, context:&RoutingContext, packet:&Packet, info:&RoutingInfo) -> bool
	{
		let topology=context.topology;
		if info.hops!=1
		{
			return false;
		}
		match topology.family()
		{
			TopologyFamily::Dragonfly =>
			{
				let group=topology.group(context.router_index);
				group==topology.group(topology.node_router(packet.source)) && group!=topology.group(topology.node_router(packet.destination))
			},
			TopologyFamily::FlattenedButterfly => true,
		}
	}
	///A random node in the group reached by a random global port of the current router.
	///The ports towards the group of the destination are not candidates. `None` if there is no other.
	fn intermediate_by_global_port(&self, context:&RoutingContext, packet:&Packet) -> Option<usize>
	{
		let topology:&dyn Topology=context.topology;
		let router=context.router_index;
		let destination_group=topology.group(topology.node_router(packet.destination));
		let groups:Vec<usize>=(topology.concentration()..topology.ports(router)).filter(|&port|topology.is_global_port(router,port)).filter_map(|port|match topology.neighbour(router,port).0
		{
			Location::RouterPort{router_index,..} => Some(topology.group(router_index)),
			_ => None,
		}).filter(|&group|group!=destination_group).collect();
		if groups.is_empty()
		{
			return None;
		}
		let mut rng=context.rng.borrow_mut();
		let group=groups[rng.gen_range(0..groups.len())];
		let target_router=rng.gen_range(topology.group_routers(group));
		Some(target_router*topology.concentration()+rng.gen_range(0..topology.concentration()))
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use std::cell::RefCell;
	use ::rand::rngs::StdRng;
	use ::rand::SeedableRng;
	use crate::routing::tests::{dragonfly,empty_snapshot,packet};

	#[test]
	fn second_router_may_divert()
	{
		let topology=dragonfly();
		let mut snapshot=empty_snapshot(topology.as_ref());
		let rng=RefCell::new(StdRng::seed_from_u64(7));
		let routing=Par{};
		//Node 2 at router 1 towards node 19 at router 9. Router 1 reaches group 2 through router 0.
		let p=packet(2,19);
		let mut context=RoutingContext{topology:topology.as_ref(),router_index:1,virtual_channels:4,occupancy:&snapshot,learner:None,cycle:0,rng:&rng};
		let first=routing.route(&mut context,&p,0);
		assert_eq!(first.port,topology.outport(1,2,19));
		{
			let info=p.routing_info.borrow();
			if !info.force_minimal
			{
				assert_eq!(info.phase,RoutingPhase::SelectIntermediate);
			}
		}
		assert_eq!(first.virtual_channels,0..1);
		//At router 0 the global port towards group 2 is full.
		p.routing_info.borrow_mut().phase=RoutingPhase::SelectIntermediate;
		p.routing_info.borrow_mut().force_minimal=false;
		p.routing_info.borrow_mut().hops=1;
		let ports=topology.ports(0);
		let minimal_port=topology.outport(0,2,19);
		let mut used=vec![0;ports];
		used[minimal_port]=100;
		snapshot.record(0,used,vec![0;ports]);
		let input_port=match topology.neighbour(1,first.port).0
		{
			Location::RouterPort{router_port,..} => router_port,
			_ => panic!("router 1 must reach router 0"),
		};
		let mut context=RoutingContext{topology:topology.as_ref(),router_index:0,virtual_channels:4,occupancy:&snapshot,learner:None,cycle:0,rng:&rng};
		let second=routing.route(&mut context,&p,input_port);
		let info=p.routing_info.borrow();
		let intermediate=info.intermediate.expect("a new intermediate");
		let intermediate_group=topology.group(topology.node_router(intermediate));
		//The other global port of router 0 leads to group 1.
		assert_eq!(intermediate_group,1);
		assert!(!info.minimal);
		assert_eq!(info.phase,RoutingPhase::RouteToIntermediate);
		assert_ne!(second.port,minimal_port);
		assert_eq!(second.virtual_channels,0..1);
	}

	#[test]
	fn later_routers_follow_the_destination()
	{
		let topology=dragonfly();
		let snapshot=empty_snapshot(topology.as_ref());
		let rng=RefCell::new(StdRng::seed_from_u64(7));
		let routing=Par{};
		let p=packet(2,19);
		{
			let mut info=p.routing_info.borrow_mut();
			info.phase=RoutingPhase::SelectIntermediate;
			info.intermediate=Some(19);
			info.hops=2;
		}
		let mut context=RoutingContext{topology:topology.as_ref(),router_index:8,virtual_channels:4,occupancy:&snapshot,learner:None,cycle:0,rng:&rng};
		let decision=routing.route(&mut context,&p,5);
		assert_eq!(p.routing_info.borrow().phase,RoutingPhase::RouteToDestination);
		assert_eq!(decision.port,topology.outport(8,2,19));
		assert_eq!(decision.virtual_channels,3..4);
	}
}
