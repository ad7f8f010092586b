
use super::{Candidates,Decision,Routing,RoutingContext,follow_phase,is_injection,set_decision};
use crate::config::{as_bool,as_f64,as_usize,object_name,object_pairs,unknown_field,TopologyFamily};
use crate::config_parser::ConfigurationValue;
use crate::error::Error;
use crate::flit::Packet;

///Universal Globally-Adaptive Load-balanced routing.
///At the source router it compares the queue of the minimal port with the queue of the port towards a uniformly random intermediate, each weighted by the hops of its route.
#[derive(Debug)]
pub struct Ugal
{
	///Added to the non-minimal side of the comparison. Positive values favour minimal routes.
	threshold: i64,
	///Discount the flits still travelling through the channel from the queues.
	in_flight: bool,
	///Multiplier of the local queue when the two candidates are one global and one local port.
	local_queue_factor: usize,
}

impl Routing for Ugal
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
			let intermediate=context.topology.uniform_intermediate(context.rng);
			if context.topology.forces_minimal(context.router_index,intermediate,packet.destination)
			{
				info.force_minimal=true;
				set_decision(&mut info,intermediate,true);
			}
			else
			{
				let candidates=Candidates::new(context,packet,intermediate,self.in_flight);
				let minimal=candidates.prefer_minimal(context,self.local_queue_factor,self.threshold);
				set_decision(&mut info,intermediate,minimal);
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
		"UGAL"
	}
}

impl Ugal
{
	pub fn new(cv:&ConfigurationValue) -> Result<Ugal,Error>
	{
		let mut threshold=0;
		let mut in_flight=false;
		let mut local_queue_factor=1;
		let name=object_name(cv)?;
		for &(ref field,ref value) in object_pairs(cv,name)?
		{
			match field.as_ref()
			{
				"threshold" => threshold=as_f64(value,"threshold")?.round() as i64,
				"in_flight" => in_flight=as_bool(value,"in_flight")?,
				"local_queue_factor" => local_queue_factor=as_usize(value,"local_queue_factor")?,
				"legend_name" => (),
				_ => return Err(unknown_field(name,field,cv)),
			}
		}
		Ok(Ugal{threshold,in_flight,local_queue_factor})
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use std::cell::RefCell;
	use ::rand::rngs::StdRng;
	use ::rand::SeedableRng;
	use crate::config::parse_configuration;
	use crate::routing::tests::{empty_snapshot,flatfly,packet};
	use crate::flit::RoutingPhase;

	#[test]
	fn empty_network_routes_minimally()
	{
		let topology=flatfly();
		let snapshot=empty_snapshot(topology.as_ref());
		let rng=RefCell::new(StdRng::seed_from_u64(3));
		let routing=Ugal::new(&parse_configuration("UGAL").expect("parses")).expect("valid routing");
		for destination in 1..16
		{
			let p=packet(0,destination);
			let mut context=RoutingContext{topology:topology.as_ref(),router_index:0,virtual_channels:2,occupancy:&snapshot,learner:None,cycle:0,rng:&rng};
			let decision=routing.route(&mut context,&p,0);
			assert_eq!(decision.port,topology.outport(0,0,destination));
			assert!(p.routing_info.borrow().minimal);
			assert_eq!(p.routing_info.borrow().phase,RoutingPhase::RouteToDestination);
			assert_eq!(decision.virtual_channels,1..2);
		}
	}

	#[test]
	fn congested_minimal_port_is_avoided()
	{
		let topology=flatfly();
		let mut snapshot=empty_snapshot(topology.as_ref());
		let ports=topology.ports(0);
		let destination=3;
		let minimal_port=topology.outport(0,0,destination);
		let mut used=vec![0;ports];
		used[minimal_port]=50;
		snapshot.record(0,used,vec![0;ports]);
		let rng=RefCell::new(StdRng::seed_from_u64(3));
		let routing=Ugal::new(&parse_configuration("UGAL{threshold:0}").expect("parses")).expect("valid routing");
		let mut nonminimal=0;
		for _ in 0..100
		{
			let p=packet(0,destination);
			let mut context=RoutingContext{topology:topology.as_ref(),router_index:0,virtual_channels:2,occupancy:&snapshot,learner:None,cycle:0,rng:&rng};
			let decision=routing.route(&mut context,&p,0);
			let info=p.routing_info.borrow();
			let intermediate=info.intermediate.expect("an intermediate is always drawn");
			//Intermediates in the column of the destination share the minimal port.
			if !info.force_minimal && topology.outport(0,0,intermediate)!=minimal_port
			{
				assert!(!info.minimal);
				assert_ne!(decision.port,minimal_port);
				assert_eq!(decision.virtual_channels,0..1);
				nonminimal+=1;
			}
		}
		assert!(nonminimal>0);
	}
}
