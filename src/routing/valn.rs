
use super::{Candidates,Decision,Routing,RoutingContext,follow_phase,is_injection,set_decision};
use crate::config::{as_bool,object_name,object_pairs,unknown_field,TopologyFamily};
use crate::config_parser::ConfigurationValue;
use crate::error::Error;
use crate::flit::Packet;

///Valiant routing through a random intermediate node.
///The intermediate is restricted by the topology to avoid routes that revisit routers. Packets whose intermediate gives no detour go minimally.
///With `adaptive` the Valiant route is taken only when UGAL would take it.
#[derive(Debug)]
pub struct Valn
{
	adaptive: bool,
}

impl Routing for Valn
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
			let intermediate=context.topology.random_intermediate(packet.source,packet.destination,context.rng);
			if context.topology.forces_minimal(context.router_index,intermediate,packet.destination)
			{
				info.force_minimal=true;
				set_decision(&mut info,intermediate,true);
			}
			else if self.adaptive
			{
				let minimal=Candidates::new(context,packet,intermediate,false).prefer_minimal(context,1,0);
				set_decision(&mut info,intermediate,minimal);
			}
			else
			{
				set_decision(&mut info,intermediate,false);
			}
		}
		let classes=self.virtual_channel_classes(context.topology.family());
		follow_phase(context,packet,&mut info,classes)
	}
	fn virtual_channel_classes(&self, family:TopologyFamily) -> usize
	{
		match family
		{
			TopologyFamily::FlattenedButterfly => 2,
			TopologyFamily::Dragonfly => 4,
		}
	}
	fn name(&self) -> &'static str
	{
		"VALn"
	}
}

impl Valn
{
	pub fn new(cv:&ConfigurationValue) -> Result<Valn,Error>
	{
		let mut adaptive=false;
		let name=object_name(cv)?;
		for &(ref field,ref value) in object_pairs(cv,name)?
		{
			match field.as_ref()
			{
				"adaptive" => adaptive=as_bool(value,"adaptive")?,
				"legend_name" => (),
				_ => return Err(unknown_field(name,field,cv)),
			}
		}
		Ok(Valn{adaptive})
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use std::cell::RefCell;
	use ::rand::rngs::StdRng;
	use ::rand::SeedableRng;
	use crate::flit::RoutingPhase;
	use crate::routing::tests::{dragonfly,empty_snapshot,packet};
	use crate::topology::Location;

	#[test]
	fn packets_visit_their_intermediate()
	{
		let topology=dragonfly();
		let snapshot=empty_snapshot(topology.as_ref());
		let rng=RefCell::new(StdRng::seed_from_u64(11));
		let routing=Valn{adaptive:false};
		for destination in [19,40,71].iter().cloned()
		{
			let p=packet(0,destination);
			let mut router=0;
			let mut input_port=0;
			let mut visited=vec![];
			let mut hops=0;
			loop
			{
				visited.push(router);
				let mut context=RoutingContext{topology:topology.as_ref(),router_index:router,virtual_channels:4,occupancy:&snapshot,learner:None,cycle:0,rng:&rng};
				let decision=routing.route(&mut context,&p,input_port);
				match topology.neighbour(router,decision.port).0
				{
					Location::RouterPort{router_index,router_port} =>
					{
						router=router_index;
						input_port=router_port;
						hops+=1;
						assert!(hops<=6,"a route of Valiant has at most 6 hops in a dragonfly");
					},
					_ => break,
				}
			}
			let info=p.routing_info.borrow();
			assert_eq!(info.phase,RoutingPhase::RouteToDestination);
			let intermediate=info.intermediate.expect("intermediate drawn at injection");
			if !info.force_minimal
			{
				assert!(visited.contains(&topology.node_router(intermediate)));
			}
		}
	}
}
