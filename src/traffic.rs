/*!

The traffic manager drives the simulation cycle by cycle.

Each node keeps a queue of pending requests, a queue of pending replies and the flits of the packet it is currently injecting. The replies are always taken before the requests. A node injects at most one flit per cycle and only when it holds a credit for the virtual channel chosen for its current packet.

A simulation goes through the states `WarmingUp`, `Running`, `Draining` and `Done`. The statistics are reset when the warm-up ends. New packets stop when the measurement ends (synthetic traffic), when the trace is exhausted, or when the host calls `stop_injection`. Then the simulation is done once every pending and in-flight flit has been retired.

*/

use std::cell::{Cell,RefCell};
use std::collections::{BTreeMap,VecDeque};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;
use ::rand::rngs::StdRng;
use ::rand::{Rng,SeedableRng};
use log::{debug,info,warn};
use crate::config::{SimulationConfig,TrafficConfig};
use crate::error::Error;
use crate::flit::{Flit,FlitType,MessageTag,Packet,RoutingInfo};
use crate::network::Network;
use crate::pattern::{new_pattern,Pattern};
use crate::router::CreditTracker;
use crate::stats::Statistics;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum SimulationState
{
	WarmingUp,
	Running,
	Draining,
	Done,
}

///A message completely received by a node, as given to the host by `retire`.
#[derive(Clone,Debug,PartialEq)]
pub struct RetiredFlitInfo
{
	///The identifier returned by `inject`.
	pub message: usize,
	pub source: usize,
	pub destination: usize,
	pub class: usize,
	pub kind: FlitType,
	///Flits of the last packet of the message.
	pub size: usize,
	///Virtual channel by which the tail reached the node.
	pub virtual_channel: usize,
	///Cycles since the creation of the message.
	pub latency: usize,
	pub network_latency: Option<usize>,
	pub hops: usize,
	///Whether the last packet took the minimal route.
	pub minimal: bool,
	///The intermediate node chosen for the last packet, if the routing chooses any.
	pub intermediate: Option<usize>,
}

///A line of a trace: `cycle source destination bytes [class]`.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct TraceEntry
{
	pub cycle: usize,
	pub source: usize,
	pub destination: usize,
	pub bytes: usize,
	pub class: usize,
}

///Reads the entries of a trace. Blank lines and lines starting by `#` are ignored. The cycles must not decrease.
pub fn parse_trace(text:&str, path:&Path) -> Result<Vec<TraceEntry>,Error>
{
	let mut entries:Vec<TraceEntry>=vec![];
	for (line_index,line) in text.lines().enumerate()
	{
		let line=line.trim();
		if line.is_empty() || line.starts_with('#')
		{
			continue;
		}
		let bad_line=||Error::could_not_parse_file(source_location!(),path.to_path_buf()).with_message(format!("bad trace line {}: `{}`",line_index+1,line));
		let fields=line.split_whitespace().map(|field|field.parse::<usize>()).collect::<Result<Vec<usize>,_>>().map_err(|_|bad_line())?;
		let entry=match fields.len()
		{
			4 => TraceEntry{cycle:fields[0],source:fields[1],destination:fields[2],bytes:fields[3],class:0},
			5 => TraceEntry{cycle:fields[0],source:fields[1],destination:fields[2],bytes:fields[3],class:fields[4]},
			_ => return Err(bad_line()),
		};
		if let Some(previous)=entries.last()
		{
			if previous.cycle>entry.cycle
			{
				return Err(bad_line().with_message(format!("trace line {} goes back to cycle {} after cycle {}",line_index+1,entry.cycle,previous.cycle)));
			}
		}
		entries.push(entry);
	}
	Ok(entries)
}

pub fn read_trace(path:&Path) -> Result<Vec<TraceEntry>,Error>
{
	let mut file=File::open(path).map_err(|error|Error::could_not_open_file(source_location!(),path.to_path_buf(),error))?;
	let mut text=String::new();
	file.read_to_string(&mut text).map_err(|error|Error::could_not_open_file(source_location!(),path.to_path_buf(),error))?;
	parse_trace(&text,path)
}

///The injection side of a node.
#[derive(Debug,Default)]
struct NodeQueues
{
	requests: VecDeque<Rc<Packet>>,
	replies: VecDeque<Rc<Packet>>,
	///Flits of `requests`.
	request_flits: usize,
	///The remaining flits of the packet being injected.
	current: VecDeque<Flit>,
	///Chosen when the head of the current packet is injected.
	current_virtual_channel: Option<usize>,
	///Messages received, waiting for the host.
	retired: VecDeque<RetiredFlitInfo>,
}

impl NodeQueues
{
	fn is_empty(&self) -> bool
	{
		self.requests.is_empty() && self.replies.is_empty() && self.current.is_empty()
	}
}

pub struct TrafficManager
{
	config: SimulationConfig,
	state: SimulationState,
	cycle: usize,
	network: Network,
	rng: RefCell<StdRng>,
	///Destinations of the synthetic traffic.
	pattern: Option<Box<dyn Pattern>>,
	trace: VecDeque<TraceEntry>,
	nodes: Vec<NodeQueues>,
	///Credits of the injection port of each node.
	injection_credits: Vec<CreditTracker>,
	statistics: Statistics,
	next_packet: usize,
	next_flit: usize,
	///Flits given to the network since the beginning.
	injected_flits: usize,
	retired_flits: usize,
	///The index of the next flit expected for each packet partially received.
	arriving: BTreeMap<usize,usize>,
	injection_stopped: bool,
	///Set when there is nothing to do. Cleared by `wake`.
	sleeping: bool,
	check_credits: bool,
}

impl TrafficManager
{
	pub fn new(config:&SimulationConfig) -> Result<TrafficManager,Error>
	{
		let network=Network::new(config)?;
		let rng=RefCell::new(StdRng::seed_from_u64(config.random_seed));
		let num_nodes=network.topology().num_nodes();
		let mut classes=1;
		let mut pattern=None;
		let mut trace=VecDeque::new();
		match config.traffic
		{
			TrafficConfig::Synthetic{pattern:ref cv,ref class_weights,..} =>
			{
				let mut built=new_pattern(cv)?;
				built.initialize(network.topology(),&rng)?;
				pattern=Some(built);
				classes=class_weights.len();
			},
			TrafficConfig::Trace{ref file} =>
			{
				let entries=read_trace(file)?;
				for entry in entries.iter()
				{
					for &node in [entry.source,entry.destination].iter()
					{
						if node>=num_nodes
						{
							return Err(Error::node_out_of_range(source_location!(),node,num_nodes).with_message(format!("trace {:?} refers to node {}",file,node)));
						}
					}
					classes=classes.max(entry.class+1);
				}
				info!("read {} trace entries from {:?}",entries.len(),file);
				trace=entries.into_iter().collect();
			},
			TrafficConfig::Host => (),
		}
		let virtual_channels=config.router.virtual_channels;
		let buffer_size=config.router.buffer_size;
		Ok(TrafficManager{
			config: config.clone(),
			state: if config.warmup>0 { SimulationState::WarmingUp } else { SimulationState::Running },
			cycle: 0,
			network,
			rng,
			pattern,
			trace,
			nodes: (0..num_nodes).map(|_|NodeQueues::default()).collect(),
			injection_credits: vec![CreditTracker::new(virtual_channels,buffer_size);num_nodes],
			statistics: Statistics::new(num_nodes,classes),
			next_packet: 0,
			next_flit: 0,
			injected_flits: 0,
			retired_flits: 0,
			arriving: BTreeMap::new(),
			injection_stopped: false,
			sleeping: false,
			check_credits: false,
		})
	}
	///Verify the conservation of credits at the end of every cycle. Expensive.
	pub fn set_credit_checking(&mut self, check:bool)
	{
		self.check_credits=check;
	}
	pub fn state(&self) -> SimulationState
	{
		self.state
	}
	pub fn cycle(&self) -> usize
	{
		self.cycle
	}
	pub fn network(&self) -> &Network
	{
		&self.network
	}
	pub fn statistics(&self) -> &Statistics
	{
		&self.statistics
	}
	pub fn injected_flits(&self) -> usize
	{
		self.injected_flits
	}
	pub fn retired_flits(&self) -> usize
	{
		self.retired_flits
	}
	///Flits created but not yet given to the network.
	pub fn pending_flits(&self) -> usize
	{
		self.nodes.iter().map(|node|node.request_flits+node.replies.iter().map(|packet|packet.size).sum::<usize>()+node.current.len()).sum()
	}
	fn check_node(&self, node:usize) -> Result<(),Error>
	{
		let num_nodes=self.nodes.len();
		if node>=num_nodes
		{
			return Err(Error::node_out_of_range(source_location!(),node,num_nodes));
		}
		Ok(())
	}
	///Flits needed for a message of `bytes`.
	fn flits_of(&self, bytes:usize) -> usize
	{
		((bytes+self.config.flit_size-1)/self.config.flit_size).max(1)
	}
	///Queues a message of `size` bytes from the host. Its kind is drawn from `write_fraction` in request/reply traffic.
	///Returns the identifier that `retire` reports when the message is received.
	pub fn inject(&mut self, source:usize, destination:usize, size:usize, class:usize) -> Result<usize,Error>
	{
		let kind=match self.config.read_write
		{
			Some(ref read_write) => if self.rng.borrow_mut().gen_bool(read_write.write_fraction) { FlitType::WriteRequest } else { FlitType::ReadRequest },
			None => FlitType::Any,
		};
		self.inject_kind(source,destination,size,class,kind)
	}
	///As `inject` with an explicit kind.
	pub fn inject_kind(&mut self, source:usize, destination:usize, size:usize, class:usize, kind:FlitType) -> Result<usize,Error>
	{
		self.check_node(source)?;
		self.check_node(destination)?;
		if self.injection_stopped
		{
			warn!("message from {} to {} injected after stopping the injection",source,destination);
		}
		let flits=self.flits_of(size);
		Ok(self.enqueue_message(source,destination,flits,class,kind,true))
	}
	///Free space in the injection queue of `node`, in flits.
	pub fn query_credits(&self, node:usize) -> Result<usize,Error>
	{
		self.check_node(node)?;
		Ok(self.config.injection_queue_size.saturating_sub(self.nodes[node].request_flits))
	}
	///Whether a message of `size` bytes fits in the injection queue of `node`.
	pub fn space_to_send(&self, node:usize, size:usize) -> Result<bool,Error>
	{
		Ok(self.flits_of(size)<=self.query_credits(node)?)
	}
	///Takes the oldest message received by `node`. `None` if there is none or the node does not exist.
	pub fn retire(&mut self, node:usize) -> Option<RetiredFlitInfo>
	{
		match self.nodes.get_mut(node)
		{
			Some(queues) => queues.retired.pop_front(),
			None =>
			{
				warn!("retiring from node {} out of the {} nodes",node,self.nodes.len());
				None
			},
		}
	}
	///No more messages will be created. The simulation ends when the network is drained.
	pub fn stop_injection(&mut self)
	{
		self.injection_stopped=true;
	}
	///Whether the engine has stopped for lack of work. It does nothing until `wake` is called.
	pub fn wants_wake(&self) -> bool
	{
		self.sleeping
	}
	pub fn wake(&mut self)
	{
		self.sleeping=false;
	}
	pub fn is_done(&self) -> bool
	{
		self.state==SimulationState::Done
	}
	///Builds the packets of a message and queues them as requests of `source`. Returns the identifier of its last packet.
	fn enqueue_message(&mut self, source:usize, destination:usize, flits:usize, class:usize, kind:FlitType, tagged:bool) -> usize
	{
		let count=(flits+self.config.max_packet_size-1)/self.config.max_packet_size;
		let message=self.next_packet+count-1;
		let measured=self.state==SimulationState::Running;
		let packets=self.build_packets(source,destination,flits,class,kind,self.cycle,measured,if tagged { Some(message) } else { None });
		let node=&mut self.nodes[source];
		for packet in packets
		{
			node.request_flits+=packet.size;
			node.requests.push_back(packet);
		}
		debug!("cycle {}: node {} queues message {} of {} flits towards {}",self.cycle,source,message,flits,destination);
		message
	}
	///Splits `flits` into packets of at most `max_packet_size` flits.
	fn build_packets(&mut self, source:usize, destination:usize, flits:usize, class:usize, kind:FlitType, creation_cycle:usize, measured:bool, message:Option<usize>) -> Vec<Rc<Packet>>
	{
		let mut packets=vec![];
		let mut remaining=flits.max(1);
		while remaining>0
		{
			let size=remaining.min(self.config.max_packet_size);
			remaining-=size;
			packets.push(Rc::new(Packet{
				id: self.next_packet,
				source,
				destination,
				size,
				class,
				kind,
				creation_cycle,
				measured,
				message: message.map(|message|MessageTag{message,last:remaining==0}),
				routing_info: RefCell::new(RoutingInfo::new()),
				network_departure: Cell::new(None),
				network_arrival: Cell::new(None),
			}));
			self.next_packet+=1;
		}
		packets
	}
	///Advances the simulation a cycle. Returns whether work remains, in flight or pending.
	///An idle host engine returns false, although it is not done until `stop_injection`.
	pub fn step(&mut self) -> bool
	{
		if self.state==SimulationState::Done
		{
			return false;
		}
		if self.admit_trace()
		{
			self.sleeping=false;
		}
		if !self.sleeping
		{
			let delivery=self.network.deliver(self.cycle);
			for (node,virtual_channel) in delivery.credits
			{
				self.injection_credits[node].restore(virtual_channel);
			}
			for flit in delivery.ejected
			{
				self.retire_flit(flit);
			}
			self.generate();
			for node in 0..self.nodes.len()
			{
				self.inject_node(node);
			}
			self.network.process(self.cycle,&self.rng);
			if self.check_credits
			{
				self.network.check_credits(&self.injection_credits);
			}
		}
		self.cycle+=1;
		if self.config.statistics_period>0 && self.cycle%self.config.statistics_period==0
		{
			let snapshot=self.statistics.take_snapshot(self.cycle,self.network.flits_in_network());
			info!("cycle {} {:?}: sent {} accepted {} in flight {} pending {}",self.cycle,self.state,snapshot.sent_flits,snapshot.accepted_flits,snapshot.in_flight,self.pending_flits());
		}
		self.update_state();
		if !self.config.traffic.is_synthetic() && self.state!=SimulationState::Done && !self.has_activity()
		{
			self.sleeping=true;
		}
		self.has_pending_work()
	}
	///Whether there are events or flits in the network or flits waiting at the nodes.
	fn has_activity(&self) -> bool
	{
		!self.network.is_quiescent() || self.nodes.iter().any(|node|!node.is_empty())
	}
	///Synthetic traffic has work until it is done. Trace traffic also has the entries not yet admitted.
	fn has_pending_work(&self) -> bool
	{
		if self.state==SimulationState::Done
		{
			return false;
		}
		match self.config.traffic
		{
			TrafficConfig::Synthetic{..} => true,
			TrafficConfig::Trace{..} => !self.trace.is_empty() || self.has_activity(),
			TrafficConfig::Host => self.has_activity(),
		}
	}
	fn update_state(&mut self)
	{
		if self.state==SimulationState::WarmingUp && self.cycle>=self.config.warmup
		{
			info!("cycle {}: warm-up finished, measuring",self.cycle);
			self.statistics.reset(self.cycle);
			self.network.reset_statistics(self.cycle);
			self.state=SimulationState::Running;
		}
		if self.state==SimulationState::WarmingUp || self.state==SimulationState::Running
		{
			let stop=match self.config.traffic
			{
				TrafficConfig::Synthetic{..} => self.cycle>=self.config.warmup+self.config.measured,
				TrafficConfig::Trace{..} => self.trace.is_empty(),
				TrafficConfig::Host => false,
			};
			if stop || self.injection_stopped
			{
				info!("cycle {}: injection stopped, draining {} flits",self.cycle,self.network.flits_in_network()+self.pending_flits());
				self.injection_stopped=true;
				self.state=SimulationState::Draining;
			}
		}
		if self.state==SimulationState::Draining
		{
			if self.network.is_idle() && self.nodes.iter().all(|node|node.is_empty())
			{
				info!("cycle {}: simulation done",self.cycle);
				self.state=SimulationState::Done;
				self.sleeping=false;
			}
			else if self.cycle>self.config.maximum_cycles
			{
				panic!("deadlock: {} flits still in the network and {} pending at cycle {}",self.network.flits_in_network(),self.pending_flits(),self.cycle);
			}
		}
	}
	///Queues the trace entries of the current cycle. Returns whether any was queued.
	fn admit_trace(&mut self) -> bool
	{
		let mut admitted=false;
		while self.trace.front().map_or(false,|entry|entry.cycle<=self.cycle)
		{
			let entry=match self.trace.pop_front()
			{
				Some(entry) => entry,
				None => break,
			};
			let flits=self.flits_of(entry.bytes);
			let kind=match self.config.read_write
			{
				Some(ref read_write) => if self.rng.borrow_mut().gen_bool(read_write.write_fraction) { FlitType::WriteRequest } else { FlitType::ReadRequest },
				None => FlitType::Any,
			};
			self.enqueue_message(entry.source,entry.destination,flits,entry.class,kind,false);
			admitted=true;
		}
		admitted
	}
	///Creates the synthetic packets of the cycle.
	fn generate(&mut self)
	{
		if self.injection_stopped
		{
			return;
		}
		let (load,packet_size,class_weights)=match self.config.traffic
		{
			TrafficConfig::Synthetic{load,packet_size,ref class_weights,..} => (load,packet_size,class_weights.clone()),
			_ => return,
		};
		let probability=(load/packet_size as f64).min(1.0);
		let total_weight:f64=class_weights.iter().sum();
		for node in 0..self.nodes.len()
		{
			if !self.rng.borrow_mut().gen_bool(probability)
			{
				continue;
			}
			let (kind,flits)=match self.config.read_write
			{
				Some(ref read_write) => if self.rng.borrow_mut().gen_bool(read_write.write_fraction)
				{
					(FlitType::WriteRequest,read_write.write_request_size)
				}
				else
				{
					(FlitType::ReadRequest,read_write.read_request_size)
				},
				None => (FlitType::Any,packet_size),
			};
			if self.nodes[node].request_flits+flits>self.config.injection_queue_size
			{
				self.statistics.track_refused_packet();
				continue;
			}
			let destination=match self.pattern
			{
				Some(ref pattern) => pattern.get_destination(node,self.network.topology(),&self.rng),
				None => return,
			};
			if destination==node
			{
				continue;
			}
			let mut w=self.rng.borrow_mut().gen_range(0.0..total_weight);
			let mut class=0;
			while class+1<class_weights.len() && w>=class_weights[class]
			{
				w-=class_weights[class];
				class+=1;
			}
			self.enqueue_message(node,destination,flits,class,kind,false);
		}
	}
	///Sends the next flit of `node`, if it has one and a credit for it.
	fn inject_node(&mut self, node:usize)
	{
		let queues=&mut self.nodes[node];
		if queues.current.is_empty()
		{
			let packet=match queues.replies.pop_front()
			{
				Some(packet) => packet,
				None => match queues.requests.pop_front()
				{
					Some(packet) =>
					{
						queues.request_flits-=packet.size;
						packet
					},
					None => return,
				},
			};
			for index in 0..packet.size
			{
				queues.current.push_back(Flit{
					id: self.next_flit,
					packet: packet.clone(),
					index,
					virtual_channel: 0,
					injection_cycle: None,
					arrival_cycle: 0,
				});
				self.next_flit+=1;
			}
			queues.current_virtual_channel=None;
		}
		let credits=&mut self.injection_credits[node];
		let virtual_channel=match queues.current_virtual_channel
		{
			Some(virtual_channel) => virtual_channel,
			None =>
			{
				let candidates:Vec<usize>=(0..self.config.router.virtual_channels).filter(|&vc|credits.has_credit(vc)).collect();
				if candidates.is_empty()
				{
					return;
				}
				let virtual_channel=candidates[self.rng.borrow_mut().gen_range(0..candidates.len())];
				queues.current_virtual_channel=Some(virtual_channel);
				virtual_channel
			},
		};
		if !credits.has_credit(virtual_channel)
		{
			return;
		}
		let mut flit=match queues.current.pop_front()
		{
			Some(flit) => flit,
			None => return,
		};
		credits.consume(virtual_channel);
		flit.virtual_channel=virtual_channel;
		if self.state==SimulationState::Running
		{
			self.statistics.track_sent_flit(node,&flit.packet,flit.is_head());
		}
		self.injected_flits+=1;
		self.network.inject(flit,node);
	}
	///Accounts a flit received by its destination node.
	///# Panics
	///If the flit is not the next one of its packet.
	fn retire_flit(&mut self, flit:Flit)
	{
		let packet=flit.packet.clone();
		let expected=self.arriving.entry(packet.id).or_insert(0);
		if *expected!=flit.index
		{
			panic!("flit {} of packet {} retired at node {} as index {} when {} was expected",flit.id,packet.id,packet.destination,flit.index,expected);
		}
		*expected+=1;
		self.retired_flits+=1;
		if self.state==SimulationState::Running
		{
			self.statistics.track_accepted_flit(&flit);
		}
		if packet.measured
		{
			self.statistics.track_latency(&flit,self.cycle);
		}
		if !flit.is_tail()
		{
			return;
		}
		self.arriving.remove(&packet.id);
		if let Some(tag)=packet.message
		{
			if tag.last
			{
				let info=packet.routing_info.borrow();
				self.nodes[packet.destination].retired.push_back(RetiredFlitInfo{
					message: tag.message,
					source: packet.source,
					destination: packet.destination,
					class: packet.class,
					kind: packet.kind,
					size: packet.size,
					virtual_channel: flit.virtual_channel,
					latency: self.cycle.saturating_sub(packet.creation_cycle),
					network_latency: packet.network_latency(),
					hops: info.hops,
					minimal: info.minimal,
					intermediate: info.intermediate,
				});
			}
		}
		if packet.kind.is_request() && packet.message.map_or(true,|tag|tag.last)
		{
			self.generate_reply(&packet);
		}
	}
	///Queues the single reply of a completed request at the node that received it.
	fn generate_reply(&mut self, request:&Packet)
	{
		let (kind,flits)=match self.config.read_write
		{
			Some(ref read_write) => match request.kind
			{
				FlitType::ReadRequest => (FlitType::ReadReply,read_write.read_reply_size),
				FlitType::WriteRequest => (FlitType::WriteReply,read_write.write_reply_size),
				_ => return,
			},
			None => return,
		};
		let packets=self.build_packets(request.destination,request.source,flits,request.class,kind,request.creation_cycle,request.measured,request.message.map(|tag|tag.message));
		self.nodes[request.destination].replies.extend(packets);
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::config::parse_configuration;
	use crate::error::ErrorKind;

	fn configuration(text:&str) -> SimulationConfig
	{
		let _ = env_logger::builder().is_test(true).try_init();
		SimulationConfig::new(&parse_configuration(text).expect("parses")).expect("valid configuration")
	}

	const FLATFLY:&str="FlattenedButterfly{k:4,n:2,concentration:1,channel_latency:2}";
	const DRAGONFLY:&str="Dragonfly{p:2,a:4,h:2,channel_latency:2,global_channel_latency:5}";

	fn host(topology:&str, routing:&str, router:&str) -> TrafficManager
	{
		let config=configuration(&format!("Configuration{{random_seed:5, topology:{}, router:{}, routing:{}, traffic:Host, flit_size:16, max_packet_size:4, maximum_cycles:20000}}",topology,router,routing));
		let mut manager=TrafficManager::new(&config).expect("builds");
		manager.set_credit_checking(true);
		manager
	}

	fn run(manager:&mut TrafficManager)
	{
		while manager.step()
		{
			assert_eq!(manager.injected_flits(),manager.retired_flits()+manager.network().flits_in_network());
		}
	}

	#[test]
	fn synthetic_traffic_is_conserved()
	{
		let config=configuration(&format!("Configuration{{random_seed:1, warmup:100, measured:300, statistics_period:100, topology:{}, router:InputQueued{{virtual_channels:4,buffer_size:4,speculative:true}}, routing:UGAL, traffic:Synthetic{{pattern:Uniform,load:0.3,packet_size:4}}, max_packet_size:4}}",FLATFLY));
		let mut manager=TrafficManager::new(&config).expect("builds");
		manager.set_credit_checking(true);
		assert_eq!(manager.state(),SimulationState::WarmingUp);
		run(&mut manager);
		assert_eq!(manager.state(),SimulationState::Done);
		assert!(manager.cycle()>=400);
		assert!(manager.injected_flits()>0);
		assert_eq!(manager.injected_flits(),manager.retired_flits());
		assert_eq!(manager.pending_flits(),0);
		assert!(manager.network().is_idle());
		let class=manager.statistics().class(0).expect("class 0 is measured");
		assert!(class.accepted_packets>0);
		assert!(class.packet_latency.minimum().expect("latencies measured")>=class.network_latency.minimum().expect("latencies measured"));
		assert!(manager.statistics().snapshots().len()>=4);
	}

	#[test]
	fn every_routing_drains()
	{
		for topology in [FLATFLY,DRAGONFLY].iter()
		{
			for routing in ["Minimal","UGAL","VALn","PAR","DGB{learnset_period:20}"].iter()
			{
				let mut manager=host(topology,routing,"InputQueued{virtual_channels:4,buffer_size:4}");
				let num_nodes=manager.network().topology().num_nodes();
				let mut rng=StdRng::seed_from_u64(17);
				for _ in 0..300
				{
					let source=rng.gen_range(0..num_nodes);
					let destination=(source+rng.gen_range(1..num_nodes))%num_nodes;
					manager.inject(source,destination,64,0).expect("valid nodes");
				}
				manager.stop_injection();
				run(&mut manager);
				assert!(manager.is_done(),"{} on {} did not finish",routing,topology);
				assert_eq!(manager.injected_flits(),300*4);
				assert_eq!(manager.retired_flits(),300*4);
			}
		}
	}

	#[test]
	fn same_seed_same_simulation()
	{
		let simulate=||{
			let config=configuration(&format!("Configuration{{random_seed:9, warmup:50, measured:200, topology:{}, router:InputQueued{{virtual_channels:4,buffer_size:4}}, routing:DGB{{learnset_period:10}}, traffic:Synthetic{{pattern:Uniform,load:0.4,packet_size:2}}, max_packet_size:4}}",DRAGONFLY));
			let mut manager=TrafficManager::new(&config).expect("builds");
			run(&mut manager);
			let class=manager.statistics().class(0).expect("measured").clone();
			(manager.cycle(),manager.injected_flits(),class.accepted_flits,class.packet_latency.average(),class.hops.average(),manager.network().explorations())
		};
		assert_eq!(simulate(),simulate());
		//Each message must take the same route, not only give the same averages.
		let routes=||{
			let mut manager=host(DRAGONFLY,"DGB{learnset_period:10,explore_rate:0.5}","InputQueued{virtual_channels:4,buffer_size:4}");
			let num_nodes=manager.network().topology().num_nodes();
			let mut rng=StdRng::seed_from_u64(23);
			for _ in 0..200
			{
				let source=rng.gen_range(0..num_nodes);
				let destination=(source+rng.gen_range(1..num_nodes))%num_nodes;
				manager.inject(source,destination,64,0).expect("valid nodes");
			}
			manager.stop_injection();
			run(&mut manager);
			let mut retired=vec![];
			for node in 0..num_nodes
			{
				while let Some(info)=manager.retire(node)
				{
					retired.push(info);
				}
			}
			retired
		};
		let first=routes();
		assert_eq!(first.len(),200);
		assert!(first.iter().any(|info|info.intermediate.is_some()));
		assert_eq!(first,routes());
	}

	#[test]
	fn two_routers_add_the_channel_latency()
	{
		let mut manager=host("FlattenedButterfly{k:2,n:1,concentration:1,channel_latency:3}","Minimal","InputQueued{virtual_channels:2,buffer_size:4}");
		let message=manager.inject(0,1,16,0).expect("valid nodes");
		manager.stop_injection();
		run(&mut manager);
		let info=manager.retire(1).expect("the message is received");
		assert_eq!(info.message,message);
		assert_eq!(info.source,0);
		assert_eq!(info.network_latency,Some(3));
		assert_eq!(info.hops,1);
		assert_eq!(manager.retire(1),None);
		assert_eq!(manager.retire(0),None);
	}

	#[test]
	fn single_credit_buffers_still_deliver()
	{
		let mut manager=host(FLATFLY,"UGAL","InputQueued{virtual_channels:2,buffer_size:1}");
		for source in 0..16
		{
			manager.inject(source,15-source,16*10,0).expect("valid nodes");
		}
		manager.stop_injection();
		run(&mut manager);
		assert!(manager.is_done());
		assert_eq!(manager.retired_flits(),16*10);
	}

	#[test]
	fn writes_are_answered_once()
	{
		let config=configuration(&format!("Configuration{{random_seed:3, topology:{}, router:InputQueued{{virtual_channels:2,buffer_size:4}}, routing:Minimal, traffic:Host, flit_size:16, max_packet_size:4, read_write:RequestReply{{read_request_size:1,read_reply_size:4,write_request_size:4,write_reply_size:1}}}}",FLATFLY));
		let mut manager=TrafficManager::new(&config).expect("builds");
		let message=manager.inject_kind(2,9,64,0,FlitType::WriteRequest).expect("valid nodes");
		manager.stop_injection();
		run(&mut manager);
		let request=manager.retire(9).expect("the write is received");
		assert_eq!(request.kind,FlitType::WriteRequest);
		assert_eq!(request.size,4);
		let reply=manager.retire(2).expect("the reply is received");
		assert_eq!(reply.kind,FlitType::WriteReply);
		assert_eq!(reply.message,message);
		assert_eq!(reply.source,9);
		assert_eq!(reply.size,1);
		assert_eq!(manager.retire(2),None);
		assert_eq!(manager.retire(9),None);
		assert_eq!(manager.retired_flits(),5);
	}

	#[test]
	fn messages_are_split_into_packets()
	{
		let entries=parse_trace("# cycle source destination bytes class\n0 0 1 100\n\n5 1 0 16 1\n",Path::new("test.trace")).expect("parses");
		assert_eq!(entries,vec![
			TraceEntry{cycle:0,source:0,destination:1,bytes:100,class:0},
			TraceEntry{cycle:5,source:1,destination:0,bytes:16,class:1},
		]);
		assert!(parse_trace("0 0 1\n",Path::new("test.trace")).is_err());
		assert!(parse_trace("5 0 1 8\n4 1 0 8\n",Path::new("test.trace")).is_err());
		let mut manager=host(FLATFLY,"Minimal","InputQueued{virtual_channels:2,buffer_size:4}");
		let message=manager.inject(0,1,100,0).expect("valid nodes");
		let sizes:Vec<usize>=manager.nodes[0].requests.iter().map(|packet|packet.size).collect();
		assert_eq!(sizes,vec![4,3]);
		assert_eq!(message,manager.nodes[0].requests[1].id);
		assert_eq!(manager.nodes[0].requests[0].message,Some(MessageTag{message,last:false}));
		assert_eq!(manager.query_credits(0).expect("valid node"),4*16-7);
		assert!(manager.space_to_send(0,16*57).expect("valid node"));
		assert!(!manager.space_to_send(0,16*58).expect("valid node"));
	}

	#[test]
	fn host_errors_are_results()
	{
		let mut manager=host(FLATFLY,"Minimal","InputQueued{virtual_channels:2,buffer_size:4}");
		match manager.inject(0,16,8,0)
		{
			Err(Error{kind:ErrorKind::NodeOutOfRange{node:16,num_nodes:16},..}) => (),
			other => panic!("unexpected {:?}",other),
		}
		assert!(manager.query_credits(99).is_err());
		assert!(manager.space_to_send(99,1).is_err());
		assert_eq!(manager.retire(99),None);
	}

	#[test]
	fn idle_engine_asks_to_be_woken()
	{
		let mut manager=host(FLATFLY,"Minimal","InputQueued{virtual_channels:2,buffer_size:4}");
		for _ in 0..3
		{
			assert!(!manager.step());
		}
		assert!(manager.wants_wake());
		assert!(!manager.is_done());
		manager.inject(3,4,16,0).expect("valid nodes");
		for _ in 0..10
		{
			assert!(manager.step());
		}
		assert_eq!(manager.injected_flits(),0);
		manager.wake();
		assert!(!manager.wants_wake());
		let mut steps=0;
		while manager.step()
		{
			steps+=1;
			assert!(steps<100,"the message is never delivered");
		}
		assert_eq!(manager.pending_flits(),0);
		assert_eq!(manager.network().flits_in_network(),0);
		assert!(manager.retire(4).is_some());
		assert!(manager.wants_wake());
		assert!(!manager.is_done());
		manager.stop_injection();
		assert!(!manager.step());
		assert!(manager.is_done());
	}
}
