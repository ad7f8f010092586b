
use super::{Candidates,Decision,Routing,RoutingContext,follow_phase,is_injection,set_decision};
use crate::config::{as_f64,as_usize,object_name,object_pairs,unknown_field,RouterConfig,TopologyFamily};
use crate::config_parser::ConfigurationValue;
use crate::error::Error;
use crate::flit::{DecisionSample,Packet};
use crate::learning::{LearnerParameters,TrainingInput};
use crate::topology::Topology;

///Decoupled Global Bias routing.
///A UGAL decision at the source router where the queue of the non-minimal route is corrected by a bias. The bias of each pair (destination router, non-minimal port) is learnt by the `CongestionBiasLearner` of the router from the latencies estimated at past decisions and from the differentials sent back by the destination routers.
#[derive(Debug)]
pub struct Dgb
{
	parameters: LearnerParameters,
	///Cycles between learnsets.
	learnset_period: usize,
	learnset_latency: Option<usize>,
	///Multiplier of the local queue when the two candidates are one global and one local port.
	local_queue_factor: usize,
}

impl Routing for Dgb
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
			let topology=context.topology;
			let intermediate=topology.random_intermediate(packet.source,packet.destination,context.rng);
			if topology.forces_minimal(context.router_index,intermediate,packet.destination)
			{
				info.force_minimal=true;
				set_decision(&mut info,intermediate,true);
			}
			else
			{
				let candidates=Candidates::new(context,packet,intermediate,true);
				let (minimal_queue,nonminimal_queue)=candidates.weighted_queues(context,self.local_queue_factor);
				let sample=self.sample(context,packet,intermediate,&candidates);
				let input=TrainingInput{
					sample: &sample,
					minimal_port_is_global: topology.is_global_port(context.router_index,candidates.minimal_port),
					channel_difference: topology.channel_difference(packet.source,intermediate,packet.destination),
				};
				let rng=context.rng;
				let learner=match context.learner
				{
					Some(ref mut learner) => learner,
					None => panic!("DGB routing at router {} without a learner",context.router_index),
				};
				let bias=learner.train(&input,rng);
				let nonminimal_weight=((candidates.nonminimal_hops as i64)*(nonminimal_queue as i64+bias)).max(0);
				let minimal=((candidates.minimal_hops*minimal_queue) as i64) <= nonminimal_weight;
				learner.register_decision(&sample,minimal);
				set_decision(&mut info,intermediate,minimal);
				info.explored=learner.take_explored(sample.destination_router,sample.nonminimal_port);
				info.sample=Some(sample);
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
		"DGB"
	}
	fn learner_parameters(&self) -> Option<LearnerParameters>
	{
		Some(self.parameters.clone())
	}
	fn learnset_period(&self) -> Option<usize>
	{
		Some(self.learnset_period)
	}
	fn learnset_latency(&self) -> Option<usize>
	{
		self.learnset_latency
	}
}

impl Dgb
{
	pub fn new(cv:&ConfigurationValue, topology:&dyn Topology, router:&RouterConfig) -> Result<Dgb,Error>
	{
		let capacity=router.virtual_channels*router.buffer_size;
		let mut parameters=LearnerParameters::new(capacity,capacity);
		let mut learnset_period=50;
		let mut learnset_latency=None;
		let mut local_queue_factor=match topology.family()
		{
			TopologyFamily::Dragonfly => 8,
			TopologyFamily::FlattenedButterfly => 1,
		};
		let name=object_name(cv)?;
		for &(ref field,ref value) in object_pairs(cv,name)?
		{
			match field.as_ref()
			{
				"learning_rate" => parameters.learning_rate=as_f64(value,"learning_rate")?,
				"explore_rate" => parameters.explore_rate=as_f64(value,"explore_rate")?,
				"epoch" => parameters.epoch=as_usize(value,"epoch")?,
				"history" => parameters.history=as_usize(value,"history")?,
				"learnset_period" => learnset_period=as_usize(value,"learnset_period")?,
				"learnset_latency" => learnset_latency=Some(as_usize(value,"learnset_latency")?),
				"local_queue_factor" => local_queue_factor=as_usize(value,"local_queue_factor")?,
				"legend_name" => (),
				_ => return Err(unknown_field(name,field,cv)),
			}
		}
		if parameters.history==0 || learnset_period==0 || learnset_latency==Some(0)
		{
			return Err(Error::ill_formed_configuration(source_location!(),cv.clone()).with_message(format!("DGB requires positive history, learnset_period and learnset_latency")));
		}
		Ok(Dgb{parameters,learnset_period,learnset_latency,local_queue_factor})
	}
	///The state of the decision, for the learner.
	fn sample(&self, context:&RoutingContext, packet:&Packet, intermediate:usize, candidates:&Candidates) -> DecisionSample
	{
		let topology=context.topology;
		let global_queue=|target:usize| match topology.lookahead(context.router_index,target)
		{
			Some((router,port)) => context.occupancy.net_queue(router,port),
			None => 0,
		};
		DecisionSample{
			source_router: context.router_index,
			destination_router: topology.node_router(packet.destination),
			minimal_port: candidates.minimal_port,
			nonminimal_port: candidates.nonminimal_port,
			minimal_hops: candidates.minimal_hops,
			nonminimal_hops: candidates.nonminimal_hops,
			minimal_queue: candidates.minimal_queue,
			nonminimal_queue: candidates.nonminimal_queue,
			minimal_global_queue: global_queue(packet.destination),
			nonminimal_global_queue: global_queue(intermediate),
			decision_cycle: context.cycle,
		}
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
	use crate::learning::CongestionBiasLearner;
	use crate::routing::tests::{dragonfly,empty_snapshot,flatfly,packet};

	fn learner(topology:&dyn Topology, router:usize, routing:&Dgb) -> CongestionBiasLearner
	{
		let parameters=routing.learner_parameters().expect("DGB learns");
		CongestionBiasLearner::new(router,topology.num_routers(),topology.ports(router),topology.learnset_slots(),topology.family()==TopologyFamily::Dragonfly,parameters)
	}

	#[test]
	fn defaults_depend_on_the_topology()
	{
		let cv=parse_configuration("DGB").expect("parses");
		let router=RouterConfig{virtual_channels:4,buffer_size:8,speculative:false,allocator_iterations:1};
		let routing=Dgb::new(&cv,dragonfly().as_ref(),&router).expect("valid routing");
		assert_eq!(routing.local_queue_factor,8);
		assert_eq!(routing.learnset_period(),Some(50));
		let parameters=routing.learner_parameters().expect("DGB learns");
		assert_eq!(parameters.max_global_buffer,32);
		assert_eq!(parameters.history,5);
		let routing=Dgb::new(&cv,flatfly().as_ref(),&router).expect("valid routing");
		assert_eq!(routing.local_queue_factor,1);
		let cv=parse_configuration("DGB{history:0}").expect("parses");
		assert!(Dgb::new(&cv,flatfly().as_ref(),&router).is_err());
	}

	#[test]
	fn decisions_are_sampled()
	{
		let topology=dragonfly();
		let snapshot=empty_snapshot(topology.as_ref());
		let rng=RefCell::new(StdRng::seed_from_u64(13));
		let cv=parse_configuration("DGB").expect("parses");
		let router=RouterConfig{virtual_channels:4,buffer_size:8,speculative:false,allocator_iterations:1};
		let routing=Dgb::new(&cv,topology.as_ref(),&router).expect("valid routing");
		let mut bias_learner=learner(topology.as_ref(),0,&routing);
		let mut sampled=0;
		for destination in 8..72
		{
			let p=packet(0,destination);
			let mut context=RoutingContext{topology:topology.as_ref(),router_index:0,virtual_channels:4,occupancy:&snapshot,learner:Some(&mut bias_learner),cycle:100,rng:&rng};
			routing.route(&mut context,&p,0);
			let info=p.routing_info.borrow();
			match info.sample
			{
				Some(ref sample) =>
				{
					assert!(!info.force_minimal);
					assert_eq!(sample.source_router,0);
					assert_eq!(sample.destination_router,topology.node_router(destination));
					assert_eq!(sample.decision_cycle,100);
					//An empty network never needs a detour.
					assert!(info.minimal || info.explored);
					sampled+=1;
				},
				None => assert!(info.force_minimal),
			}
		}
		assert!(sampled>0);
	}

	#[test]
	fn forced_decisions_skip_the_learner()
	{
		let topology=dragonfly();
		let snapshot=empty_snapshot(topology.as_ref());
		let rng=RefCell::new(StdRng::seed_from_u64(13));
		let cv=parse_configuration("DGB").expect("parses");
		let router=RouterConfig{virtual_channels:4,buffer_size:8,speculative:false,allocator_iterations:1};
		let routing=Dgb::new(&cv,topology.as_ref(),&router).expect("valid routing");
		//Destinations in the group of the source are always minimal. No learner is needed for them.
		for destination in 2..8
		{
			let p=packet(0,destination);
			let mut context=RoutingContext{topology:topology.as_ref(),router_index:0,virtual_channels:4,occupancy:&snapshot,learner:None,cycle:0,rng:&rng};
			routing.route(&mut context,&p,0);
			let info=p.routing_info.borrow();
			assert!(info.force_minimal);
			assert!(info.sample.is_none());
		}
	}
}
