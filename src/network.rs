/*!

The network: the routers, the channels between them and the events travelling through the channels.

Each cycle is processed in two calls. `deliver` processes the events of the begin of the cycle, returning the flits that reached their nodes and the credits for the injection ports. Then, once the nodes have injected, `process` takes the snapshot of occupancies, runs the routers in index order, exchanges the learnsets and closes the cycle.

*/

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::mem::size_of;
use std::rc::Rc;
use ::rand::rngs::StdRng;
use log::{debug,trace};
use crate::config::{SimulationConfig,TopologyFamily};
use crate::config_parser::ConfigurationValue;
use crate::error::Error;
use crate::event::{Event,EventQueue};
use crate::flit::{Flit,FlitPool};
use crate::learning::CongestionBiasLearner;
use crate::quantify::Quantifiable;
use crate::router::{CreditTracker,CycleContext,OccupancySnapshot,Router};
use crate::routing::{new_routing,Routing};
use crate::topology::{new_topology,Location,Topology};

///What the network gives back to the nodes at the begin of a cycle.
#[derive(Debug,Default)]
pub struct Delivery
{
	///Flits that have arrived to their destination node, in arrival order. They are already out of the pool.
	pub ejected: Vec<Flit>,
	///Credits returned to the injection ports, as `(node,virtual_channel)`.
	pub credits: Vec<(usize,usize)>,
}

pub struct Network
{
	///The topology defining the conectivity.
	topology: Rc<dyn Topology>,
	///The collection of all the routers in the network.
	routers: Vec<Router>,
	routing: Box<dyn Routing>,
	event_queue: EventQueue,
	///Every flit between its injection and its ejection.
	pool: FlitPool,
	///Queues of every router as they were at the begin of the current cycle.
	occupancy: OccupancySnapshot,
	///Cycles between learnsets, if the routing learns.
	learnset_period: Option<usize>,
	///Cycles a learnset takes to reach its router.
	learnset_delay: usize,
	buffer_size: usize,
}

impl Quantifiable for Network
{
	fn total_memory(&self) -> usize
	{
		size_of::<Self>() + self.topology.total_memory() + self.routers.total_memory() + self.event_queue.total_memory() + self.pool.total_memory() + self.occupancy.total_memory()
	}
	fn print_memory_breakdown(&self)
	{
		println!("\ttopology={}",self.topology.total_memory());
		println!("\trouters={}",self.routers.total_memory());
		println!("\tevent_queue={}",self.event_queue.total_memory());
		println!("\tflit pool={} with {} slots",self.pool.total_memory(),self.pool.capacity());
	}
	fn forecast_total_memory(&self) -> usize
	{
		unimplemented!();
	}
}

impl Network
{
	pub fn new(config:&SimulationConfig) -> Result<Network,Error>
	{
		let topology=new_topology(&config.topology)?;
		let routing=new_routing(&config.routing,topology.as_ref(),&config.router)?;
		let parameters=routing.learner_parameters();
		let num_routers=topology.num_routers();
		let routers=(0..num_routers).map(|index|{
			let learner=parameters.as_ref().map(|parameters|CongestionBiasLearner::new(index,num_routers,topology.ports(index),topology.learnset_slots(),topology.family()==TopologyFamily::Dragonfly,parameters.clone()));
			Router::new(index,topology.as_ref(),&config.router,learner)
		}).collect();
		let maximum_latency=config.topology.maximum_channel_latency().max(1);
		let learnset_delay=routing.learnset_latency().unwrap_or(maximum_latency);
		debug!("network of {} routers and {} nodes with routing {}",num_routers,topology.num_nodes(),routing.name());
		Ok(Network{
			learnset_period: routing.learnset_period(),
			topology,
			routers,
			routing,
			event_queue: EventQueue::new(maximum_latency.max(learnset_delay)+3),
			pool: FlitPool::new(),
			occupancy: OccupancySnapshot::new(),
			learnset_delay,
			buffer_size: config.router.buffer_size,
		})
	}
	pub fn topology(&self) -> &dyn Topology
	{
		self.topology.as_ref()
	}
	pub fn routing(&self) -> &dyn Routing
	{
		self.routing.as_ref()
	}
	pub fn routers(&self) -> &[Router]
	{
		&self.routers
	}
	///Flits injected and not yet ejected.
	pub fn flits_in_network(&self) -> usize
	{
		self.pool.live()
	}
	///Whether no flit is in the network. Credits and learnsets may still be travelling.
	pub fn is_idle(&self) -> bool
	{
		self.pool.live()==0
	}
	///Whether there are neither flits nor events of any kind.
	pub fn is_quiescent(&self) -> bool
	{
		self.pool.live()==0 && self.event_queue.pending()==0
	}
	///Sends a flit from `node` towards its router. It arrives at the begin of the next cycle.
	///The caller must hold a credit for the virtual channel of the flit.
	pub fn inject(&mut self, flit:Flit, node:usize)
	{
		if node>=self.topology.num_nodes()
		{
			panic!("node {} injecting into a network of {} nodes",node,self.topology.num_nodes());
		}
		trace!("node {} injects flit {} of packet {}",node,flit.id,flit.packet.id);
		let handle=self.pool.allocate(flit);
		let event=Event::FlitToLocation{
			flit: handle,
			previous: Location::NodePort(node),
			new: self.topology.node_neighbour(node).0,
		};
		self.event_queue.enqueue_begin(event,1);
	}
	///Processes the flit arrivals and credits of the begin of the cycle.
	pub fn deliver(&mut self, cycle:usize) -> Delivery
	{
		let mut delivery=Delivery::default();
		for event in self.event_queue.take_begin()
		{
			match event
			{
				Event::FlitToLocation{flit:handle,previous,new} =>
				{
					match previous
					{
						Location::RouterPort{router_index,router_port} =>
						{
							let virtual_channel=self.pool.get(handle).virtual_channel;
							self.routers[router_index].flit_arrived(router_port,virtual_channel);
						},
						Location::NodePort(_) => self.pool.get_mut(handle).injection_cycle=Some(cycle),
						Location::None => panic!("flit sent from nowhere"),
					}
					match new
					{
						Location::RouterPort{router_index,router_port} =>
						{
							{
								let flit=self.pool.get(handle);
								if flit.is_head() && router_port>=self.topology.concentration() && self.topology.node_router(flit.packet.destination)==router_index && flit.packet.network_arrival.get().is_none()
								{
									flit.packet.network_arrival.set(Some(cycle));
								}
							}
							self.routers[router_index].insert(&mut self.pool,handle,router_port,cycle);
						},
						Location::NodePort(node) =>
						{
							let flit=self.pool.release(handle);
							if node!=flit.packet.destination
							{
								panic!("Packet {} reached wrong node, {} instead of {}!",flit.packet.id,node,flit.packet.destination);
							}
							delivery.ejected.push(flit);
						},
						Location::None => panic!("Flit went nowhere previous={:?}",previous),
					}
				},
				Event::Credit{location,virtual_channel} => match location
				{
					Location::RouterPort{router_index,router_port} => self.routers[router_index].receive_credit(router_port,virtual_channel),
					Location::NodePort(node) => delivery.credits.push((node,virtual_channel)),
					Location::None => panic!("credit sent to nowhere"),
				},
				Event::Learnset{..} => panic!("Learnsets should not arrive at the begin of a cycle"),
			}
		}
		delivery
	}
	///Runs the routers for the cycle and processes the events of its end.
	pub fn process(&mut self, cycle:usize, rng:&RefCell<StdRng>)
	{
		for router in self.routers.iter()
		{
			let (used,in_flight)=router.occupancy();
			self.occupancy.record(router.index(),used,in_flight);
		}
		for router in self.routers.iter_mut()
		{
			let context=CycleContext{
				topology: self.topology.as_ref(),
				routing: self.routing.as_ref(),
				occupancy: &self.occupancy,
				pool: &mut self.pool,
				cycle,
				rng,
			};
			for generation in router.process(context)
			{
				self.event_queue.enqueue(generation);
			}
		}
		if let Some(period)=self.learnset_period
		{
			if cycle>0 && cycle%period==0
			{
				self.send_learnsets(cycle);
			}
		}
		for event in self.event_queue.take_end()
		{
			match event
			{
				Event::Learnset{router,learnset} => match self.routers[router].learner_mut()
				{
					Some(learner) => learner.receive_learnset(&learnset),
					None => panic!("learnset sent to router {} without a learner",router),
				},
				_ => panic!("Flits and credits should not arrive at the end of a cycle"),
			}
		}
		self.event_queue.advance();
	}
	///Every learner sends to each deciding router the differentials it has gathered for it.
	fn send_learnsets(&mut self, cycle:usize)
	{
		let num_routers=self.routers.len();
		let mut sent=0;
		for router in self.routers.iter_mut()
		{
			if let Some(learner)=router.learner_mut()
			{
				for source_router in 0..num_routers
				{
					if let Some(learnset)=learner.generate_learnset(source_router,cycle)
					{
						self.event_queue.enqueue_end(Event::Learnset{router:source_router,learnset},self.learnset_delay);
						sent+=1;
					}
				}
			}
		}
		trace!("cycle {}: {} learnsets sent",cycle,sent);
	}
	///Checks that every credit of every channel is somewhere: at the sender, travelling back, or as a flit in the channel or in the receiving buffer.
	///`injection` are the credits held by the nodes, indexed by node.
	///# Panics
	///If any credit has been lost or duplicated.
	pub fn check_credits(&self, injection:&[CreditTracker])
	{
		//Credits travelling back, by the location that receives them.
		let mut returning:BTreeMap<(Location,usize),usize>=BTreeMap::new();
		//Flits travelling from a node to its router.
		let mut injected:BTreeMap<(usize,usize),usize>=BTreeMap::new();
		for event in self.event_queue.events()
		{
			match event
			{
				&Event::Credit{location,virtual_channel} => *returning.entry((location,virtual_channel)).or_insert(0)+=1,
				&Event::FlitToLocation{flit,previous:Location::NodePort(node),..} => *injected.entry((node,self.pool.get(flit).virtual_channel)).or_insert(0)+=1,
				_ => (),
			}
		}
		for router in self.routers.iter()
		{
			let index=router.index();
			for port in self.topology.concentration()..router.ports()
			{
				let (neighbour_router,neighbour_port)=match self.topology.neighbour(index,port).0
				{
					Location::RouterPort{router_index,router_port} => (router_index,router_port),
					other => panic!("router port {} of router {} connects to {:?}",port,index,other),
				};
				let location=Location::RouterPort{router_index:index,router_port:port};
				for virtual_channel in 0..router.virtual_channels()
				{
					let pending=returning.get(&(location,virtual_channel)).cloned().unwrap_or(0);
					let total=router.available_credits(port,virtual_channel)+router.in_flight(port,virtual_channel)+self.routers[neighbour_router].buffered(neighbour_port,virtual_channel)+pending;
					if total!=self.buffer_size
					{
						panic!("channel from router {} port {} virtual channel {} accounts {} credits of {}",index,port,virtual_channel,total,self.buffer_size);
					}
				}
			}
		}
		for (node,tracker) in injection.iter().enumerate()
		{
			let (router_index,router_port)=match self.topology.node_neighbour(node).0
			{
				Location::RouterPort{router_index,router_port} => (router_index,router_port),
				other => panic!("node {} connects to {:?}",node,other),
			};
			let router=&self.routers[router_index];
			for virtual_channel in 0..router.virtual_channels()
			{
				let pending=returning.get(&(Location::NodePort(node),virtual_channel)).cloned().unwrap_or(0);
				let travelling=injected.get(&(node,virtual_channel)).cloned().unwrap_or(0);
				let total=tracker.available(virtual_channel)+travelling+router.buffered(router_port,virtual_channel)+pending;
				if total!=self.buffer_size
				{
					panic!("injection of node {} virtual channel {} accounts {} credits of {}",node,virtual_channel,total,self.buffer_size);
				}
			}
		}
	}
	///The statistics of all the routers, as a single `InputQueued` object.
	pub fn aggregate_statistics(&self, cycle:usize) -> ConfigurationValue
	{
		let total=self.routers.len();
		let mut statistics=None;
		for router in self.routers.iter()
		{
			statistics=Some(router.aggregate_statistics(statistics,total,cycle));
		}
		statistics.unwrap_or_else(||ConfigurationValue::None)
	}
	pub fn reset_statistics(&mut self, next_cycle:usize)
	{
		for router in self.routers.iter_mut()
		{
			router.reset_statistics(next_cycle);
		}
	}
	///Total explorations made by the learners since the last reset.
	pub fn explorations(&self) -> usize
	{
		self.routers.iter().filter_map(|router|router.learner()).map(|learner|learner.explorations()).sum()
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use std::cell::Cell;
	use ::rand::SeedableRng;
	use crate::config::parse_configuration;
	use crate::flit::{FlitType,Packet,RoutingInfo};

	fn network(routing:&str) -> Network
	{
		let text=format!("Configuration{{random_seed:1, topology:Dragonfly{{p:2,a:4,h:2,channel_latency:2,global_channel_latency:6}}, router:InputQueued{{virtual_channels:4,buffer_size:2}}, routing:{}, traffic:Host, max_packet_size:4}}",routing);
		let config=SimulationConfig::new(&parse_configuration(&text).expect("parses")).expect("valid configuration");
		Network::new(&config).expect("builds")
	}

	fn packet(source:usize, destination:usize, size:usize) -> Rc<Packet>
	{
		Rc::new(Packet{
			id: 0,
			source,
			destination,
			size,
			class: 0,
			kind: FlitType::Any,
			creation_cycle: 0,
			measured: true,
			message: None,
			routing_info: RefCell::new(RoutingInfo::new()),
			network_departure: Cell::new(None),
			network_arrival: Cell::new(None),
		})
	}

	#[test]
	fn packet_crosses_groups_and_returns_credits()
	{
		let mut network=network("Minimal");
		let rng=RefCell::new(StdRng::seed_from_u64(3));
		let packet=packet(0,71,2);
		let mut injection=vec![CreditTracker::new(4,2);network.topology().num_nodes()];
		let mut ejected=vec![];
		let mut credits=vec![];
		for cycle in 0..200
		{
			let delivery=network.deliver(cycle);
			ejected.extend(delivery.ejected);
			for (node,virtual_channel) in delivery.credits
			{
				injection[node].restore(virtual_channel);
				credits.push((node,virtual_channel));
			}
			if cycle<2
			{
				injection[0].consume(1);
				network.inject(Flit{id:cycle,packet:packet.clone(),index:cycle,virtual_channel:1,injection_cycle:None,arrival_cycle:0},0);
			}
			network.process(cycle,&rng);
			network.check_credits(&injection);
		}
		assert!(network.is_quiescent());
		assert_eq!(ejected.iter().map(|flit|flit.index).collect::<Vec<usize>>(),vec![0,1]);
		assert_eq!(credits,vec![(0,1),(0,1)]);
		assert_eq!(packet.routing_info.borrow().hops,network.topology().hop_count(0,71));
		assert!(packet.network_latency().expect("arrived")>=6);
	}

	#[test]
	fn learnsets_only_with_learning_routings()
	{
		assert_eq!(network("UGAL").explorations(),0);
		assert!(network("UGAL").routers().iter().all(|router|router.learner().is_none()));
		assert!(network("DGB{learnset_latency:7}").routers().iter().all(|router|router.learner().is_some()));
	}
}
