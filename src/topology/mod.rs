
pub mod flatfly;
pub mod dragonfly;

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;
use ::rand::rngs::StdRng;
use ::rand::Rng;
use quantifiable_derive::Quantifiable;//the derive macro
use self::flatfly::FlattenedButterfly;
use self::dragonfly::Dragonfly;
use crate::config::{TopologyConfig,TopologyFamily};
use crate::error::Error;
use crate::quantify::Quantifiable;

///A location where a flit can be inserted.
///None is used for disconnected ports.
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Quantifiable)]
pub enum Location
{
	RouterPort{
		router_index: usize,
		router_port: usize,
	},
	NodePort(usize),
	None,
}

///A topology describes how routers and nodes are connected.
///The router `index` has `ports(index)` neighbours. The first `concentration()` ports attach nodes, the rest are other routers.
///Nodes are numbered consecutively by router, so the node `x` is attached to the router `x/concentration()` at the port `x%concentration()`.
pub trait Topology : Quantifiable + std::fmt::Debug
{
	fn num_routers(&self) -> usize;
	fn num_nodes(&self) -> usize;
	///Number of nodes attached to each router.
	fn concentration(&self) -> usize;
	fn ports(&self, router_index:usize) -> usize;
	///Neighbours of a router: Location+link class index
	///Nodes are before routers
	fn neighbour(&self, router_index:usize, port:usize) -> (Location,usize);
	///The neighbour of a node: Location+link class index
	fn node_neighbour(&self, node:usize) -> (Location,usize);
	///The router to which the node is attached.
	fn node_router(&self, node:usize) -> usize
	{
		node/self.concentration()
	}
	///The output port at `router_index` of the minimal route from `source` towards the node `destination`.
	///When `destination` is attached to `router_index` it is the ejection port.
	fn outport(&self, router_index:usize, source:usize, destination:usize) -> usize;
	///Number of router to router hops in the minimal route between two routers.
	fn router_hop_count(&self, origin:usize, destination:usize) -> usize;
	///Number of router to router hops in the minimal route between two nodes.
	fn hop_count(&self, source:usize, destination:usize) -> usize
	{
		self.router_hop_count(self.node_router(source),self.node_router(destination))
	}
	///Cycles a flit or a credit spends traversing the channel leaving by this port.
	fn channel_latency(&self, router_index:usize, port:usize) -> usize;
	fn is_global_port(&self, router_index:usize, port:usize) -> bool;
	///The group of a router. In topologies without groups each router is its own group.
	fn group(&self, router_index:usize) -> usize;
	///The routers in a group.
	fn group_routers(&self, group:usize) -> Range<usize>;
	///A random intermediate node, restricted to avoid the candidates whose route would waste hops.
	fn random_intermediate(&self, source:usize, destination:usize, rng:&RefCell<StdRng>) -> usize;
	///An intermediate node chosen uniformly among all the nodes.
	fn uniform_intermediate(&self, rng:&RefCell<StdRng>) -> usize
	{
		rng.borrow_mut().gen_range(0..self.num_nodes())
	}
	///Whether a decision at `router_index` of going through `intermediate` towards `destination` must be minimal without comparing queues.
	fn forces_minimal(&self, router_index:usize, intermediate:usize, destination:usize) -> bool;
	///Difference in channel length between the route through `intermediate` and the minimal one.
	fn channel_difference(&self, source:usize, intermediate:usize, destination:usize) -> usize;
	///The router and port of the first global channel in the minimal route from `router_index` to `target`, if there is any.
	fn lookahead(&self, router_index:usize, target:usize) -> Option<(usize,usize)>;
	///Number of slots in which the latency differentials of non-minimal routes are kept apart.
	fn learnset_slots(&self) -> usize;
	///The slot of the route from `source_router` through `intermediate_router`.
	fn learnset_slot(&self, source_router:usize, intermediate_router:usize) -> usize;
	fn family(&self) -> TopologyFamily;

	///Breadth First Search to compute distances from a router to all others.
	fn bfs(&self, origin:usize) -> Vec<usize>
	{
		let n=self.num_routers();
		#[allow(non_snake_case)]
		let mut R=vec![<usize>::max_value();n];
		R[origin]=0;
		let mut queue=vec![0;n];
		let mut queue_read_index=0;//Next to read
		let mut queue_write_index=1;//Next to write
		queue[0]=origin;
		while queue_read_index<queue_write_index
		{
			let best=queue[queue_read_index];
			queue_read_index+=1;
			for port in self.concentration()..self.ports(best)
			{
				if let (Location::RouterPort{router_index,router_port:_},_link_class) = self.neighbour(best,port)
				{
					let alt=R[best].saturating_add(1);
					if alt<R[router_index]
					{
						R[router_index]=alt;
						queue[queue_write_index]=router_index;
						queue_write_index+=1;
					}
				}
			}
		}
		return R;
	}

	///Check pairs (router,port) with
	/// * non-matching endpoint (this is, going backwards a wire you should return to the same router/node)
	/// * breaking the nodes-first rule
	/// * link classes differing at both ends.
	fn check_adjacency_consistency(&self)
	{
		let n=self.num_routers();
		let c=self.concentration();
		for router_index in 0..n
		{
			for port_index in 0..self.ports(router_index)
			{
				let (neighbour_location, link_class) = self.neighbour(router_index, port_index);
				match neighbour_location
				{
					Location::RouterPort{
						router_index: neighbour_router,
						router_port: neighbour_port,
					} =>
					{
						let (rev_location, rev_link_class) = self.neighbour(neighbour_router, neighbour_port);
						match rev_location
						{
							Location::RouterPort{
								router_index: rev_router,
								router_port: rev_port,
							} =>
							{
								if router_index!=rev_router || port_index!=rev_port
								{
									panic!("Non-matching port ({},{}) to ({},{}) non-returns to ({},{}).",router_index,port_index,neighbour_router,neighbour_port,rev_router,rev_port);
								}
							},
							_ => panic!("It does not even return to a router"),
						};
						if link_class!=rev_link_class
						{
							panic!("port {} at router {} has non-matching link class {} vs {}",port_index,router_index,link_class,rev_link_class);
						}
						if self.channel_latency(router_index,port_index)!=self.channel_latency(neighbour_router,neighbour_port)
						{
							panic!("port {} at router {} has a latency different to its reverse",port_index,router_index);
						}
						if port_index<c
						{
							panic!("port {} at router {} connects to another router and it is <concentration={}",port_index,router_index,c);
						}
					},
					Location::NodePort(node_index) =>
					{
						let (rev_location, rev_link_class) = self.node_neighbour(node_index);
						match rev_location
						{
							Location::RouterPort{
								router_index: rev_router,
								router_port: rev_port,
							} =>
							{
								if router_index!=rev_router || port_index!=rev_port
								{
									panic!("Non-matching port ({},{}) to node {} non-returns to ({},{}).",router_index,port_index,node_index,rev_router,rev_port);
								}
							},
							_ => panic!("It does not even return to a router"),
						};
						if link_class!=rev_link_class
						{
							panic!("port {} at router {} has non-matching link class {} vs {}",port_index,router_index,link_class,rev_link_class);
						}
						if port_index>=c
						{
							panic!("port {} at router {} connects to a node and it is >=concentration={}",port_index,router_index,c);
						}
					},
					Location::None => panic!("disconnected port {} at router {}",port_index,router_index),
				}
			}
		}
	}
}

///Build a topology.
pub fn new_topology(config:&TopologyConfig) -> Result<Rc<dyn Topology>,Error>
{
	let topology:Rc<dyn Topology> = match config
	{
		&TopologyConfig::FlattenedButterfly{k,n,concentration,channel_latency} => Rc::new(FlattenedButterfly::new(k,n,concentration,channel_latency)?),
		&TopologyConfig::Dragonfly{p,a,h,channel_latency,global_channel_latency} => Rc::new(Dragonfly::new(p,a,h,channel_latency,global_channel_latency)?),
	};
	Ok(topology)
}

#[cfg(test)]
mod tests
{
	use super::*;
	use ::rand::SeedableRng;

	///Follow the outports between every pair of routers. Each hop must reduce the hop count by one.
	///Dragonfly minimal routes use the single global link between the groups, so they may be longer than the distance in the graph.
	fn check_minimal_routes(topology:&dyn Topology, compare_with_distance:bool)
	{
		let c=topology.concentration();
		for origin in 0..topology.num_routers()
		{
			let distances=topology.bfs(origin);
			for destination in 0..topology.num_routers()
			{
				let mut remaining=topology.router_hop_count(origin,destination);
				if compare_with_distance
				{
					assert_eq!(remaining,distances[destination],"hop count from {} to {}",origin,destination);
				}
				else
				{
					assert!(remaining>=distances[destination]);
				}
				let target=destination*c;
				let mut current=origin;
				while current!=destination
				{
					let port=topology.outport(current,origin*c,target);
					assert!(port>=c);
					current=match topology.neighbour(current,port).0
					{
						Location::RouterPort{router_index,..} => router_index,
						_ => panic!("outport to a non router"),
					};
					assert_eq!(topology.router_hop_count(current,destination),remaining-1);
					remaining-=1;
				}
				assert!(topology.outport(destination,origin*c,target)<c);
			}
		}
	}

	#[test]
	fn flattened_butterfly_wiring()
	{
		let config=TopologyConfig::FlattenedButterfly{k:4,n:2,concentration:2,channel_latency:2};
		let topology=new_topology(&config).expect("valid topology");
		assert_eq!(topology.num_routers(),16);
		assert_eq!(topology.num_nodes(),32);
		topology.check_adjacency_consistency();
		check_minimal_routes(topology.as_ref(),true);
	}

	#[test]
	fn dragonfly_wiring()
	{
		let config=TopologyConfig::Dragonfly{p:2,a:4,h:2,channel_latency:10,global_channel_latency:100};
		let topology=new_topology(&config).expect("valid topology");
		assert_eq!(topology.num_routers(),4*9);
		topology.check_adjacency_consistency();
		check_minimal_routes(topology.as_ref(),false);
		for origin in 0..topology.num_routers()
		{
			for destination in 0..topology.num_routers()
			{
				assert!(topology.router_hop_count(origin,destination)<=3);
			}
		}
	}

	#[test]
	fn degenerate_topologies_are_rejected()
	{
		assert!(new_topology(&TopologyConfig::FlattenedButterfly{k:0,n:2,concentration:1,channel_latency:1}).is_err());
		assert!(new_topology(&TopologyConfig::FlattenedButterfly{k:4,n:2,concentration:0,channel_latency:1}).is_err());
		assert!(new_topology(&TopologyConfig::Dragonfly{p:0,a:0,h:0,channel_latency:10,global_channel_latency:100}).is_err());
	}

	#[test]
	fn intermediates_are_nodes()
	{
		let rng=RefCell::new(StdRng::seed_from_u64(5));
		for config in [
			TopologyConfig::FlattenedButterfly{k:4,n:2,concentration:1,channel_latency:1},
			TopologyConfig::Dragonfly{p:2,a:4,h:2,channel_latency:10,global_channel_latency:100},
		].iter()
		{
			let topology=new_topology(config).expect("valid topology");
			for _ in 0..200
			{
				let source=rng.borrow_mut().gen_range(0..topology.num_nodes());
				let destination=rng.borrow_mut().gen_range(0..topology.num_nodes());
				let intermediate=topology.random_intermediate(source,destination,&rng);
				assert!(intermediate<topology.num_nodes());
				let slot=topology.learnset_slot(topology.node_router(source),topology.node_router(intermediate));
				assert!(slot<topology.learnset_slots());
			}
		}
	}
}
