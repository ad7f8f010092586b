
use std::cell::RefCell;
use std::ops::Range;
use ::rand::rngs::StdRng;
use ::rand::Rng;
use quantifiable_derive::Quantifiable;//the derive macro
use super::{Topology,Location};
use crate::config::TopologyFamily;
use crate::error::Error;
use crate::quantify::Quantifiable;

///A Cartesian ortahedral region of arbitrary dimension.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct CartesianData
{
	pub sides: Vec<usize>,
	pub size: usize,
}

impl CartesianData
{
	pub fn new(sides:&Vec<usize>) -> CartesianData
	{
		CartesianData{
			sides:sides.clone(),
			size: sides.iter().product(),
		}
	}
	///The coordinates of a router, the lowest dimension first.
	pub fn unpack(&self, mut router_index: usize) -> Vec<usize>
	{
		let mut r=Vec::with_capacity(self.sides.len());
		for side in self.sides.iter()
		{
			r.push(router_index%side);
			router_index/=side;
		}
		r
	}
	pub fn pack(&self, coordinates:&Vec<usize>) -> usize
	{
		let mut r=0;
		let mut stride=1;
		for (i,side) in self.sides.iter().enumerate()
		{
			r+=coordinates[i]*stride;
			stride*=side;
		}
		r
	}
}

///The flattened butterfly, the Cartesian product of `n` complete graphs of `k` routers each.
///Any two routers whose coordinates differ in exactly one dimension are directly connected.
///It is also known as the Hamming graph and as Hyper X.
///
///The ports `0..concentration` attach the nodes. The port `concentration+(k-1)*d+o` goes along the dimension `d` to the router whose coordinate is `o` if `o` is lower than our own coordinate, else `o+1`.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct FlattenedButterfly
{
	cartesian_data: CartesianData,
	k: usize,
	concentration: usize,
	channel_latency: usize,
}

impl Topology for FlattenedButterfly
{
	fn num_routers(&self) -> usize
	{
		self.cartesian_data.size
	}
	fn num_nodes(&self) -> usize
	{
		self.cartesian_data.size*self.concentration
	}
	fn concentration(&self) -> usize
	{
		self.concentration
	}
	fn ports(&self, _router_index:usize) -> usize
	{
		self.concentration + self.cartesian_data.sides.len()*(self.k-1)
	}
	fn neighbour(&self, router_index:usize, port:usize) -> (Location,usize)
	{
		let m=self.cartesian_data.sides.len();
		if port<self.concentration
		{
			return (Location::NodePort(router_index*self.concentration+port),m);
		}
		let dimension=(port-self.concentration)/(self.k-1);
		let offset=(port-self.concentration)%(self.k-1);
		let mut coordinates=self.cartesian_data.unpack(router_index);
		let own=coordinates[dimension];
		coordinates[dimension]=if offset<own { offset } else { offset+1 };
		let n_index=self.cartesian_data.pack(&coordinates);
		(Location::RouterPort{router_index:n_index, router_port:self.dimension_port(dimension,own,coordinates[dimension])},dimension)
	}
	fn node_neighbour(&self, node:usize) -> (Location,usize)
	{
		(Location::RouterPort{
			router_index: node/self.concentration,
			router_port: node%self.concentration,
		},self.cartesian_data.sides.len())
	}
	fn outport(&self, router_index:usize, _source:usize, destination:usize) -> usize
	{
		let destination_router=destination/self.concentration;
		if destination_router==router_index
		{
			return destination%self.concentration;
		}
		let co=self.cartesian_data.unpack(router_index);
		let cd=self.cartesian_data.unpack(destination_router);
		match (0..co.len()).find(|&d|co[d]!=cd[d])
		{
			Some(dimension) => self.dimension_port(dimension,cd[dimension],co[dimension]),
			None => unreachable!(),
		}
	}
	fn router_hop_count(&self, origin:usize, destination:usize) -> usize
	{
		let co=self.cartesian_data.unpack(origin);
		let cd=self.cartesian_data.unpack(destination);
		(0..co.len()).filter(|&d|co[d]!=cd[d]).count()
	}
	fn channel_latency(&self, _router_index:usize, port:usize) -> usize
	{
		if port<self.concentration { 1 } else { self.channel_latency }
	}
	fn is_global_port(&self, _router_index:usize, _port:usize) -> bool
	{
		false
	}
	fn group(&self, router_index:usize) -> usize
	{
		router_index
	}
	fn group_routers(&self, group:usize) -> Range<usize>
	{
		group..group+1
	}
	fn random_intermediate(&self, source:usize, destination:usize, rng:&RefCell<StdRng>) -> usize
	{
		let mut rng=rng.borrow_mut();
		let co=self.cartesian_data.unpack(source/self.concentration);
		let cd=self.cartesian_data.unpack(destination/self.concentration);
		let differing:Vec<usize>=(0..co.len()).filter(|&d|co[d]!=cd[d]).collect();
		let coordinates:Vec<usize> = if differing.len()==1
		{
			//Only move along the dimension that the packet has to correct.
			let mut coordinates=co.clone();
			coordinates[differing[0]]=rng.gen_range(0..self.k);
			coordinates
		}
		else
		{
			(0..co.len()).map(|_|rng.gen_range(0..self.k)).collect()
		};
		self.cartesian_data.pack(&coordinates)*self.concentration + rng.gen_range(0..self.concentration)
	}
	fn forces_minimal(&self, router_index:usize, intermediate:usize, destination:usize) -> bool
	{
		let intermediate_router=intermediate/self.concentration;
		intermediate_router==router_index || intermediate_router==destination/self.concentration
	}
	fn channel_difference(&self, source:usize, intermediate:usize, destination:usize) -> usize
	{
		let minimal=self.hop_count(source,destination);
		let nonminimal=self.hop_count(source,intermediate)+self.hop_count(intermediate,destination);
		nonminimal.saturating_sub(minimal)*self.channel_latency
	}
	fn lookahead(&self, _router_index:usize, _target:usize) -> Option<(usize,usize)>
	{
		None
	}
	fn learnset_slots(&self) -> usize
	{
		self.cartesian_data.size/self.k
	}
	fn learnset_slot(&self, _source_router:usize, intermediate_router:usize) -> usize
	{
		intermediate_router/self.k
	}
	fn family(&self) -> TopologyFamily
	{
		TopologyFamily::FlattenedButterfly
	}
}

impl FlattenedButterfly
{
	pub fn new(k:usize, n:usize, concentration:usize, channel_latency:usize) -> Result<FlattenedButterfly,Error>
	{
		if k<2 || n==0 || concentration==0 || channel_latency==0
		{
			return Err(Error::invalid_topology(source_location!()).with_message(format!("FlattenedButterfly with k={} n={} concentration={} channel_latency={}",k,n,concentration,channel_latency)));
		}
		Ok(FlattenedButterfly{
			cartesian_data: CartesianData::new(&vec![k;n]),
			k,
			concentration,
			channel_latency,
		})
	}
	///The port along `dimension` going from the coordinate `own` to the coordinate `target`.
	fn dimension_port(&self, dimension:usize, target:usize, own:usize) -> usize
	{
		let offset= if target<own { target } else { target-1 };
		self.concentration + (self.k-1)*dimension + offset
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use ::rand::SeedableRng;

	#[test]
	fn hop_counts()
	{
		let topology=FlattenedButterfly::new(4,2,1,1).expect("valid topology");
		//node 0 is at (0,0), node 1 at (1,0), node 4 at (0,1) and node 5 at (1,1).
		assert_eq!(topology.hop_count(0,0),0);
		assert_eq!(topology.hop_count(0,1),1);
		assert_eq!(topology.hop_count(0,3),1);
		assert_eq!(topology.hop_count(0,4),1);
		assert_eq!(topology.hop_count(0,12),1);
		assert_eq!(topology.hop_count(0,5),2);
		assert_eq!(topology.hop_count(6,9),2);
		for source in 0..16
		{
			for destination in 0..16
			{
				let expected=if source==destination {0} else if source%4==destination%4 || source/4==destination/4 {1} else {2};
				assert_eq!(topology.hop_count(source,destination),expected);
			}
		}
	}

	#[test]
	fn outport_corrects_lowest_dimension()
	{
		let topology=FlattenedButterfly::new(4,2,2,1).expect("valid topology");
		//router 0 at (0,0) towards router 6 at (2,1): first correct dimension 0, coordinate 2 from 0 is the offset 1.
		assert_eq!(topology.outport(0,0,6*2+1),2+1);
		assert_eq!(topology.neighbour(0,3).0,Location::RouterPort{router_index:2,router_port:2});
		//At the destination router the ejection port is the position of the node.
		assert_eq!(topology.outport(6,0,6*2+1),1);
	}

	#[test]
	fn restricted_intermediates_stay_in_the_row()
	{
		let topology=FlattenedButterfly::new(4,2,1,1).expect("valid topology");
		let rng=RefCell::new(StdRng::seed_from_u64(11));
		for _ in 0..100
		{
			//from (0,1) to (3,1) only the first coordinate may change.
			let intermediate=topology.random_intermediate(4,7,&rng);
			assert_eq!(intermediate/4,1);
		}
		assert!(topology.forces_minimal(4,7,7));
		assert!(topology.forces_minimal(4,4,7));
		assert!(!topology.forces_minimal(4,5,7));
		assert_eq!(topology.channel_difference(0,5,15),2);
	}
}
