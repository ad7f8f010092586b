
use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem::size_of;
use std::ops::Range;
use ::rand::rngs::StdRng;
use log::trace;
use quantifiable_derive::Quantifiable;//the derive macro
use super::{CreditTracker,OccupancySnapshot};
use crate::allocator::{Allocator,IslipAllocator,Request,RoundRobinArbiter};
use crate::config::RouterConfig;
use crate::config_parser::ConfigurationValue;
use crate::event::{CyclePosition,Event,EventGeneration};
use crate::flit::{FlitHandle,FlitPool,Packet};
use crate::learning::CongestionBiasLearner;
use crate::quantify::Quantifiable;
use crate::routing::{Routing,RoutingContext};
use crate::topology::{Location,Topology};

///The stage of the packet at the front of an input virtual channel.
#[derive(Clone,Debug,PartialEq,Eq)]
enum InputState
{
	///Waiting for a head flit.
	Idle,
	///Routed, requesting any output virtual channel in the range.
	VcAllocation{
		port: usize,
		virtual_channels: Range<usize>,
	},
	///Owns an output virtual channel until its tail leaves.
	Active{
		port: usize,
		virtual_channel: usize,
	},
}

impl Quantifiable for InputState
{
	fn total_memory(&self) -> usize
	{
		size_of::<Self>()
	}
	fn print_memory_breakdown(&self)
	{
		unimplemented!();
	}
	fn forecast_total_memory(&self) -> usize
	{
		self.total_memory()
	}
}

///The buffer of an input virtual channel.
#[derive(Debug,Quantifiable)]
struct InputBuffer
{
	flits: VecDeque<FlitHandle>,
	state: InputState,
	///Cycle in which the current state was reached. A stage is never done in the same cycle as the previous one, except with speculation.
	stage_cycle: usize,
}

///What a router needs from the network to process a cycle.
pub struct CycleContext<'a>
{
	pub topology: &'a dyn Topology,
	pub routing: &'a dyn Routing,
	pub occupancy: &'a OccupancySnapshot,
	pub pool: &'a mut FlitPool,
	pub cycle: usize,
	pub rng: &'a RefCell<StdRng>,
}

///Counters of a router since the last reset.
#[derive(Clone,Debug,Default,Quantifiable)]
pub struct RouterStatistics
{
	///The first cycle included in the statistics.
	pub begin_cycle: usize,
	pub flits_switched: usize,
	///Switch grants wasted because the speculative virtual channel allocation failed.
	pub misspeculations: usize,
	///Accumulated over time, averaged per port.
	pub buffer_occupation_per_vc: Vec<f64>,
}

///Input queued router with virtual channels and credit-based flow control.
///Each head flit goes through route computation (RC), virtual channel allocation (VA), switch allocation (SA) and switch traversal (ST), one stage per cycle.
///With speculation the switch is requested while the virtual channel is being allocated.
#[derive(Debug,Quantifiable)]
pub struct Router
{
	///Its index in the topology
	index: usize,
	virtual_channels: usize,
	buffer_size: usize,
	speculative: bool,
	///Indexed as `[port][virtual_channel]`.
	input: Vec<Vec<InputBuffer>>,
	///Credits towards the neighbour by each output port.
	output: Vec<CreditTracker>,
	///The input `(port,virtual_channel)` that holds each output virtual channel. Indexed as `[port][virtual_channel]`.
	owner: Vec<Vec<Option<(usize,usize)>>>,
	///Flits sent by each output virtual channel that have not arrived to the neighbour.
	in_flight: Vec<Vec<usize>>,
	///Clients and resources are `port*virtual_channels+virtual_channel`.
	vc_allocator: IslipAllocator,
	///Chooses the virtual channel of each input port that requests the switch.
	input_arbiters: Vec<RoundRobinArbiter>,
	///Chooses the input port that goes through each output port.
	output_arbiters: Vec<RoundRobinArbiter>,
	///Present when the routing learns.
	learner: Option<CongestionBiasLearner>,
	statistics: RouterStatistics,
}

impl Router
{
	pub fn new(index:usize, topology:&dyn Topology, config:&RouterConfig, learner:Option<CongestionBiasLearner>) -> Router
	{
		let ports=topology.ports(index);
		let virtual_channels=config.virtual_channels;
		let input=(0..ports).map(|_|(0..virtual_channels).map(|_|InputBuffer{
			flits: VecDeque::with_capacity(config.buffer_size),
			state: InputState::Idle,
			stage_cycle: 0,
		}).collect()).collect();
		let output=(0..ports).map(|port|
			if port<topology.concentration() { CreditTracker::unlimited(virtual_channels) } else { CreditTracker::new(virtual_channels,config.buffer_size) }
		).collect();
		Router{
			index,
			virtual_channels,
			buffer_size: config.buffer_size,
			speculative: config.speculative,
			input,
			output,
			owner: vec![vec![None;virtual_channels];ports],
			in_flight: vec![vec![0;virtual_channels];ports],
			vc_allocator: IslipAllocator::new(ports*virtual_channels,ports*virtual_channels,config.allocator_iterations),
			input_arbiters: vec![RoundRobinArbiter::new(virtual_channels);ports],
			output_arbiters: vec![RoundRobinArbiter::new(ports);ports],
			learner,
			statistics: RouterStatistics{
				begin_cycle: 0,
				flits_switched: 0,
				misspeculations: 0,
				buffer_occupation_per_vc: vec![0f64;virtual_channels],
			},
		}
	}
	pub fn index(&self) -> usize
	{
		self.index
	}
	pub fn ports(&self) -> usize
	{
		self.input.len()
	}
	pub fn virtual_channels(&self) -> usize
	{
		self.virtual_channels
	}
	pub fn learner(&self) -> Option<&CongestionBiasLearner>
	{
		self.learner.as_ref()
	}
	pub fn learner_mut(&mut self) -> Option<&mut CongestionBiasLearner>
	{
		self.learner.as_mut()
	}
	pub fn statistics(&self) -> &RouterStatistics
	{
		&self.statistics
	}
	///Puts a flit arriving by `port` into the buffer of its virtual channel.
	///# Panics
	///If the virtual channel does not exist or its buffer is full, which would mean the credits are broken.
	pub fn insert(&mut self, pool:&mut FlitPool, handle:FlitHandle, port:usize, cycle:usize)
	{
		let flit=pool.get_mut(handle);
		let vc=flit.virtual_channel;
		if vc>=self.virtual_channels
		{
			panic!("flit {} arrived to router {} by the virtual channel {} of only {}",flit.id,self.index,vc,self.virtual_channels);
		}
		let buffer=&mut self.input[port][vc].flits;
		if buffer.len()>=self.buffer_size
		{
			panic!("flit {} arrived to the full buffer of router {} port {} virtual channel {}",flit.id,self.index,port,vc);
		}
		flit.arrival_cycle=cycle;
		buffer.push_back(handle);
	}
	///A flit sent by `port` has arrived to the neighbour.
	pub fn flit_arrived(&mut self, port:usize, virtual_channel:usize)
	{
		let count=&mut self.in_flight[port][virtual_channel];
		if *count==0
		{
			panic!("router {} port {} virtual channel {} has no flit in flight",self.index,port,virtual_channel);
		}
		*count-=1;
	}
	pub fn receive_credit(&mut self, port:usize, virtual_channel:usize)
	{
		self.output[port].restore(virtual_channel);
	}
	///Used credits and flits in flight of each output port, summed over the virtual channels.
	pub fn occupancy(&self) -> (Vec<usize>,Vec<usize>)
	{
		let used=self.output.iter().map(|tracker|tracker.used_total()).collect();
		let in_flight=self.in_flight.iter().map(|port|port.iter().sum()).collect();
		(used,in_flight)
	}
	pub fn available_credits(&self, port:usize, virtual_channel:usize) -> usize
	{
		self.output[port].available(virtual_channel)
	}
	pub fn in_flight(&self, port:usize, virtual_channel:usize) -> usize
	{
		self.in_flight[port][virtual_channel]
	}
	pub fn buffered(&self, port:usize, virtual_channel:usize) -> usize
	{
		self.input[port][virtual_channel].flits.len()
	}
	///Number of flits in all the input buffers.
	pub fn buffered_total(&self) -> usize
	{
		self.input.iter().map(|port|port.iter().map(|buffer|buffer.flits.len()).sum::<usize>()).sum()
	}
	///Advances every stage of the pipeline by a cycle, returning the flits and credits sent.
	pub fn process(&mut self, context:CycleContext) -> Vec<EventGeneration>
	{
		let CycleContext{topology,routing,occupancy,pool,cycle,rng}=context;
		let ports=self.input.len();
		let vcs=self.virtual_channels;
		for port in self.input.iter()
		{
			for (vc,buffer) in port.iter().enumerate()
			{
				self.statistics.buffer_occupation_per_vc[vc]+=buffer.flits.len() as f64/ports as f64;
			}
		}
		//-- switch requests, as they stand before the allocation of virtual channels.
		//Each entry is (output port, priority) for the input (port,vc).
		let mut switch_requests:Vec<Vec<Option<(usize,usize)>>>=vec![vec![None;vcs];ports];
		for port in 0..ports
		{
			for vc in 0..vcs
			{
				let buffer=&self.input[port][vc];
				let front=match buffer.flits.front()
				{
					Some(&handle) => pool.get(handle),
					None => continue,
				};
				if buffer.stage_cycle>=cycle || front.arrival_cycle>=cycle
				{
					continue;
				}
				match buffer.state
				{
					InputState::Active{port:out_port,virtual_channel:out_vc} =>
					{
						if self.output[out_port].has_credit(out_vc)
						{
							switch_requests[port][vc]=Some((out_port,1));
						}
					},
					InputState::VcAllocation{port:out_port,ref virtual_channels} if self.speculative =>
					{
						if virtual_channels.clone().any(|out_vc|self.owner[out_port][out_vc].is_none() && self.output[out_port].has_credit(out_vc))
						{
							switch_requests[port][vc]=Some((out_port,0));
						}
					},
					_ => (),
				}
			}
		}
		//-- VA
		for port in 0..ports
		{
			for vc in 0..vcs
			{
				let buffer=&self.input[port][vc];
				if buffer.stage_cycle>=cycle
				{
					continue;
				}
				if let InputState::VcAllocation{port:out_port,ref virtual_channels} = buffer.state
				{
					for out_vc in virtual_channels.clone()
					{
						if self.owner[out_port][out_vc].is_none()
						{
							self.vc_allocator.add_request(Request{client:port*vcs+vc,resource:out_port*vcs+out_vc,priority:0});
						}
					}
				}
			}
		}
		for request in self.vc_allocator.perform_allocation()
		{
			let (port,vc)=(request.client/vcs,request.client%vcs);
			let (out_port,out_vc)=(request.resource/vcs,request.resource%vcs);
			self.owner[out_port][out_vc]=Some((port,vc));
			trace!("cycle {} router {}: input {}.{} allocated output {}.{}",cycle,self.index,port,vc,out_port,out_vc);
			let buffer=&mut self.input[port][vc];
			buffer.state=InputState::Active{port:out_port,virtual_channel:out_vc};
			buffer.stage_cycle=cycle;
		}
		//-- SA, separable input first.
		let mut chosen:Vec<Option<usize>>=vec![None;ports];
		for port in 0..ports
		{
			let candidates=(0..vcs).filter_map(|vc|switch_requests[port][vc].map(|(_,priority)|(vc,priority)));
			chosen[port]=self.input_arbiters[port].arbitrate(candidates);
		}
		let mut events=vec![];
		for out_port in 0..ports
		{
			let candidates=(0..ports).filter_map(|port|match chosen[port]
			{
				Some(vc) => match switch_requests[port][vc]
				{
					Some((requested,priority)) if requested==out_port => Some((port,priority)),
					_ => None,
				},
				None => None,
			});
			let port=match self.output_arbiters[out_port].arbitrate(candidates)
			{
				Some(port) => port,
				None => continue,
			};
			let vc=match chosen[port]
			{
				Some(vc) => vc,
				None => unreachable!(),
			};
			let out_vc=match self.input[port][vc].state
			{
				InputState::Active{port:p,virtual_channel} if p==out_port && self.output[out_port].has_credit(virtual_channel) => virtual_channel,
				_ =>
				{
					//Speculation without a virtual channel or without its credit.
					trace!("cycle {} router {}: misspeculation of input {}.{} towards port {}",cycle,self.index,port,vc,out_port);
					self.statistics.misspeculations+=1;
					continue;
				}
			};
			self.input_arbiters[port].update(vc);
			self.output_arbiters[out_port].update(port);
			self.switch_traversal(topology,pool,cycle,(port,vc),(out_port,out_vc),&mut events);
		}
		//-- RC
		for port in 0..ports
		{
			for vc in 0..vcs
			{
				let buffer=&mut self.input[port][vc];
				if buffer.state!=InputState::Idle
				{
					continue;
				}
				let handle=match buffer.flits.front()
				{
					Some(&handle) => handle,
					None => continue,
				};
				let flit=pool.get(handle);
				if !flit.is_head()
				{
					panic!("flit {} of packet {} is at the front of an idle buffer of router {} without being a head",flit.id,flit.packet.id,self.index);
				}
				let mut routing_context=RoutingContext{
					topology,
					router_index: self.index,
					virtual_channels: vcs,
					occupancy,
					learner: self.learner.as_mut(),
					cycle,
					rng,
				};
				let decision=routing.route(&mut routing_context,&flit.packet,port);
				if decision.virtual_channels.start>=decision.virtual_channels.end || decision.virtual_channels.end>vcs || decision.port>=ports
				{
					panic!("routing {} gave the invalid decision {:?} at router {}",routing.name(),decision,self.index);
				}
				trace!("cycle {} router {}: packet {} at input {}.{} routed to port {} with virtual channels {:?}",cycle,self.index,flit.packet.id,port,vc,decision.port,decision.virtual_channels);
				buffer.state=InputState::VcAllocation{port:decision.port,virtual_channels:decision.virtual_channels};
				buffer.stage_cycle=cycle;
			}
		}
		events
	}
}

impl Router
{
	///Moves the flit at the front of the input `(port,vc)` to the output `(port,vc)`.
	fn switch_traversal(&mut self, topology:&dyn Topology, pool:&mut FlitPool, cycle:usize, input:(usize,usize), output:(usize,usize), events:&mut Vec<EventGeneration>)
	{
		let (port,vc)=input;
		let (out_port,out_vc)=output;
		let handle=match self.input[port][vc].flits.pop_front()
		{
			Some(handle) => handle,
			None => panic!("switch granted to the empty buffer of router {} port {} virtual channel {}",self.index,port,vc),
		};
		self.output[out_port].consume(out_vc);
		self.in_flight[out_port][out_vc]+=1;
		self.statistics.flits_switched+=1;
		let flit=pool.get_mut(handle);
		flit.virtual_channel=out_vc;
		let packet=flit.packet.clone();
		let is_tail=flit.is_tail();
		let ejection=out_port<topology.concentration();
		if flit.is_head()
		{
			if packet.network_departure.get().is_none()
			{
				packet.network_departure.set(Some(cycle+1));
			}
			if ejection
			{
				if packet.network_arrival.get().is_none()
				{
					packet.network_arrival.set(Some(cycle+1));
				}
			}
			else
			{
				packet.routing_info.borrow_mut().hops+=1;
			}
		}
		events.push(EventGeneration{
			delay: 1+topology.channel_latency(self.index,out_port),
			position: CyclePosition::Begin,
			event: Event::FlitToLocation{
				flit: handle,
				previous: Location::RouterPort{router_index:self.index,router_port:out_port},
				new: topology.neighbour(self.index,out_port).0,
			},
		});
		events.push(EventGeneration{
			delay: topology.channel_latency(self.index,port),
			position: CyclePosition::Begin,
			event: Event::Credit{
				location: topology.neighbour(self.index,port).0,
				virtual_channel: vc,
			},
		});
		if is_tail
		{
			self.owner[out_port][out_vc]=None;
			let buffer=&mut self.input[port][vc];
			buffer.state=InputState::Idle;
			buffer.stage_cycle=cycle;
			if ejection
			{
				self.register_difference(topology,&packet);
			}
		}
	}
	///Registers how wrong the estimation of the decision of an ejected packet was.
	fn register_difference(&mut self, topology:&dyn Topology, packet:&Packet)
	{
		let learner=match self.learner
		{
			Some(ref mut learner) => learner,
			None => return,
		};
		let info=packet.routing_info.borrow();
		if info.force_minimal
		{
			return;
		}
		let (sample,latency)=match (info.sample.as_ref(),packet.network_latency())
		{
			(Some(sample),Some(latency)) => (sample,latency),
			_ => return,
		};
		let difference=latency as f64 - sample.estimated_latency(info.minimal) as f64;
		if info.minimal
		{
			learner.register_minimal_difference(sample.source_router,difference);
		}
		else if let Some(intermediate)=info.intermediate
		{
			let slot=topology.learnset_slot(sample.source_router,topology.node_router(intermediate));
			learner.register_nonminimal_difference(sample.source_router,sample.nonminimal_port,slot,difference);
		}
	}
	///Adds the statistics of this router to those of the previous routers. The last router averages the occupation.
	pub fn aggregate_statistics(&self, statistics:Option<ConfigurationValue>, total_routers:usize, cycle:usize) -> ConfigurationValue
	{
		let cycle_span=cycle.saturating_sub(self.statistics.begin_cycle).max(1);
		let mut occupation:Vec<f64>=self.statistics.buffer_occupation_per_vc.iter().map(|x|x/cycle_span as f64).collect();
		let mut flits_switched=self.statistics.flits_switched as f64;
		let mut misspeculations=self.statistics.misspeculations as f64;
		let mut explorations=self.learner.as_ref().map(|learner|learner.explorations()).unwrap_or(0) as f64;
		if let Some(previous)=statistics
		{
			if let ConfigurationValue::Object(cv_name,previous_pairs) = previous
			{
				if cv_name!="InputQueued"
				{
					panic!("incompatible statistics, should be `InputQueued` object not `{}`",cv_name);
				}
				for (ref name,ref value) in previous_pairs
				{
					match (name.as_ref(),value)
					{
						("flits_switched",&ConfigurationValue::Number(x)) => flits_switched+=x,
						("misspeculations",&ConfigurationValue::Number(x)) => misspeculations+=x,
						("explorations",&ConfigurationValue::Number(x)) => explorations+=x,
						("average_buffer_occupation_per_vc",&ConfigurationValue::Array(ref prev_a)) =>
						{
							for (c,p) in occupation.iter_mut().zip(prev_a.iter())
							{
								if let &ConfigurationValue::Number(x)=p
								{
									*c += x;
								}
								else
								{
									panic!("The non-number {:?} cannot be added",p);
								}
							}
						},
						_ => panic!("Nothing to do with field {} in InputQueued statistics",name),
					}
				}
			}
			else
			{
				panic!("received incompatible statistics");
			}
		}
		if self.index+1==total_routers
		{
			let factor=1f64 / total_routers as f64;
			for x in occupation.iter_mut()
			{
				*x *= factor;
			}
		}
		ConfigurationValue::Object(String::from("InputQueued"),vec![
			(String::from("flits_switched"),ConfigurationValue::Number(flits_switched)),
			(String::from("misspeculations"),ConfigurationValue::Number(misspeculations)),
			(String::from("explorations"),ConfigurationValue::Number(explorations)),
			(String::from("average_buffer_occupation_per_vc"),ConfigurationValue::Array(occupation.iter().map(|x|ConfigurationValue::Number(*x)).collect())),
		])
	}
	pub fn reset_statistics(&mut self, next_cycle:usize)
	{
		self.statistics.begin_cycle=next_cycle;
		self.statistics.flits_switched=0;
		self.statistics.misspeculations=0;
		for x in self.statistics.buffer_occupation_per_vc.iter_mut()
		{
			*x=0f64;
		}
		if let Some(ref mut learner)=self.learner
		{
			learner.reset_statistics();
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use std::cell::Cell;
	use std::rc::Rc;
	use ::rand::SeedableRng;
	use crate::config::TopologyConfig;
	use crate::flit::{Flit,FlitType,RoutingInfo};
	use crate::routing::Minimal;
	use crate::routing::tests::empty_snapshot;
	use crate::topology::new_topology;

	///Two routers joined by a channel of 3 cycles, one node each.
	fn pair() -> Rc<dyn Topology>
	{
		new_topology(&TopologyConfig::FlattenedButterfly{k:2,n:1,concentration:1,channel_latency:3}).expect("valid topology")
	}

	fn config(virtual_channels:usize, buffer_size:usize, speculative:bool) -> RouterConfig
	{
		RouterConfig{virtual_channels,buffer_size,speculative,allocator_iterations:1}
	}

	///Allocates the flits of a packet from node 0 to node 1.
	fn packet(pool:&mut FlitPool, id:usize, size:usize) -> Vec<FlitHandle>
	{
		let packet=Rc::new(Packet{
			id,
			source: 0,
			destination: 1,
			size,
			class: 0,
			kind: FlitType::Any,
			creation_cycle: 0,
			measured: true,
			message: None,
			routing_info: RefCell::new(RoutingInfo::new()),
			network_departure: Cell::new(None),
			network_arrival: Cell::new(None),
		});
		(0..size).map(|index|pool.allocate(Flit{
			id: id*100+index,
			packet: packet.clone(),
			index,
			virtual_channel: 0,
			injection_cycle: Some(0),
			arrival_cycle: 0,
		})).collect()
	}

	///Processes the router during the cycles given, returning the cycles in which flits were sent.
	fn run(router:&mut Router, topology:&dyn Topology, pool:&mut FlitPool, cycles:Range<usize>) -> Vec<(usize,EventGeneration)>
	{
		let routing=Minimal{};
		let snapshot=empty_snapshot(topology);
		let rng=RefCell::new(StdRng::seed_from_u64(0));
		let mut sent=vec![];
		for cycle in cycles
		{
			let events=router.process(CycleContext{topology,routing:&routing,occupancy:&snapshot,pool:&mut *pool,cycle,rng:&rng});
			sent.extend(events.into_iter().map(|event|(cycle,event)));
		}
		sent
	}

	fn flit_cycles(events:&[(usize,EventGeneration)]) -> Vec<usize>
	{
		events.iter().filter_map(|&(cycle,ref generation)|match generation.event
		{
			Event::FlitToLocation{..} => Some(cycle),
			_ => None,
		}).collect()
	}

	#[test]
	fn one_stage_per_cycle()
	{
		let topology=pair();
		let mut pool=FlitPool::new();
		let mut router=Router::new(0,topology.as_ref(),&config(2,4,false),None);
		for handle in packet(&mut pool,0,2)
		{
			router.insert(&mut pool,handle,0,0);
		}
		let events=run(&mut router,topology.as_ref(),&mut pool,0..6);
		//RC at 0, VA at 1, SA and ST at 2.
		assert_eq!(flit_cycles(&events),vec![2,3]);
		for &(cycle,ref generation) in events.iter()
		{
			match generation.event
			{
				Event::FlitToLocation{previous,new,..} =>
				{
					assert_eq!(generation.delay,4);
					assert_eq!(previous,Location::RouterPort{router_index:0,router_port:1});
					assert_eq!(new,Location::RouterPort{router_index:1,router_port:1});
				},
				Event::Credit{location,virtual_channel} =>
				{
					assert!(cycle==2 || cycle==3);
					assert_eq!(generation.delay,1);
					assert_eq!(location,Location::NodePort(0));
					assert_eq!(virtual_channel,0);
				},
				_ => panic!("unexpected event"),
			}
		}
		assert_eq!(router.buffered_total(),0);
		assert_eq!(router.statistics().flits_switched,2);
		let head=match events[0].1.event
		{
			Event::FlitToLocation{flit,..} => pool.get(flit),
			_ => panic!("the head is the first flit sent"),
		};
		assert_eq!(head.packet.network_departure.get(),Some(3));
		assert_eq!(head.packet.routing_info.borrow().hops,1);
	}

	#[test]
	fn routers_can_be_printed()
	{
		let topology=pair();
		let router=Router::new(0,topology.as_ref(),&config(2,4,true),None);
		let text=format!("{:?}",router);
		assert!(text.contains("IslipAllocator"));
		assert!(text.contains("RoundRobinArbiter"));
	}

	#[test]
	fn speculation_saves_a_cycle()
	{
		let topology=pair();
		let mut pool=FlitPool::new();
		let mut router=Router::new(0,topology.as_ref(),&config(2,4,true),None);
		for handle in packet(&mut pool,0,2)
		{
			router.insert(&mut pool,handle,0,0);
		}
		let events=run(&mut router,topology.as_ref(),&mut pool,0..6);
		assert_eq!(flit_cycles(&events),vec![1,2]);
		assert_eq!(router.statistics().misspeculations,0);
	}

	#[test]
	fn credits_stall_the_output()
	{
		let topology=pair();
		let mut pool=FlitPool::new();
		let mut router=Router::new(0,topology.as_ref(),&config(1,1,false),None);
		let first=packet(&mut pool,0,1);
		router.insert(&mut pool,first[0],0,0);
		let events=run(&mut router,topology.as_ref(),&mut pool,0..3);
		assert_eq!(flit_cycles(&events),vec![2]);
		assert_eq!(router.available_credits(1,0),0);
		assert_eq!(router.in_flight(1,0),1);
		let second=packet(&mut pool,1,1);
		router.insert(&mut pool,second[0],0,3);
		let events=run(&mut router,topology.as_ref(),&mut pool,3..10);
		assert!(flit_cycles(&events).is_empty());
		assert_eq!(router.buffered(0,0),1);
		//The first flit arrives and leaves the next router.
		router.flit_arrived(1,0);
		router.receive_credit(1,0);
		assert_eq!(router.in_flight(1,0),0);
		let events=run(&mut router,topology.as_ref(),&mut pool,10..12);
		assert_eq!(flit_cycles(&events),vec![10]);
		assert_eq!(router.occupancy(),(vec![0,1],vec![0,1]));
	}

	#[test]
	#[should_panic]
	fn full_buffers_reject_flits()
	{
		let topology=pair();
		let mut pool=FlitPool::new();
		let mut router=Router::new(0,topology.as_ref(),&config(1,1,false),None);
		for handle in packet(&mut pool,0,2)
		{
			router.insert(&mut pool,handle,0,0);
		}
	}

	#[test]
	#[should_panic]
	fn unknown_virtual_channels_are_rejected()
	{
		let topology=pair();
		let mut pool=FlitPool::new();
		let mut router=Router::new(0,topology.as_ref(),&config(2,4,false),None);
		let handles=packet(&mut pool,0,1);
		pool.get_mut(handles[0]).virtual_channel=2;
		router.insert(&mut pool,handles[0],0,0);
	}

	#[test]
	fn statistics_are_aggregated()
	{
		let topology=pair();
		let mut pool=FlitPool::new();
		let mut routers:Vec<Router>=(0..2).map(|index|Router::new(index,topology.as_ref(),&config(2,4,false),None)).collect();
		for handle in packet(&mut pool,0,2)
		{
			routers[0].insert(&mut pool,handle,0,0);
		}
		run(&mut routers[0],topology.as_ref(),&mut pool,0..6);
		let mut statistics=None;
		for router in routers.iter()
		{
			statistics=Some(router.aggregate_statistics(statistics,2,6));
		}
		match statistics
		{
			Some(ConfigurationValue::Object(name,pairs)) =>
			{
				assert_eq!(name,"InputQueued");
				assert_eq!(pairs[0],(String::from("flits_switched"),ConfigurationValue::Number(2.0)));
			},
			_ => panic!("expected an object"),
		}
		routers[0].reset_statistics(6);
		assert_eq!(routers[0].statistics().flits_switched,0);
	}
}
