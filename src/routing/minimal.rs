
use super::{Decision,Routing,RoutingContext,follow_phase,is_injection};
use crate::config::{object_name,object_pairs,unknown_field,TopologyFamily};
use crate::config_parser::ConfigurationValue;
use crate::error::Error;
use crate::flit::{Packet,RoutingPhase};

///The shortest route given by the topology. No intermediates.
#[derive(Debug)]
pub struct Minimal
{
}

impl Routing for Minimal
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
			info.phase=RoutingPhase::RouteToDestination;
		}
		let classes=self.virtual_channel_classes(context.topology.family());
		follow_phase(context,packet,&mut info,classes)
	}
	fn virtual_channel_classes(&self, family:TopologyFamily) -> usize
	{
		match family
		{
			TopologyFamily::FlattenedButterfly => 1,
			TopologyFamily::Dragonfly => 2,
		}
	}
	fn name(&self) -> &'static str
	{
		"Minimal"
	}
}

impl Minimal
{
	pub fn new(cv:&ConfigurationValue) -> Result<Minimal,Error>
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
		Ok(Minimal{})
	}
}
