
use std::cell::RefCell;
use std::ops::Range;
use ::rand::rngs::StdRng;
use ::rand::Rng;
use super::{Topology,Location};
use quantifiable_derive::Quantifiable;//the derive macro
use crate::config::TopologyFamily;
use crate::error::Error;
use crate::quantify::Quantifiable;

///Relative lengths of the channels, used to weight the exploration. They do not depend on the configured latencies.
const LOCAL_CHANNEL_LENGTH:isize=10;
const GLOBAL_CHANNEL_LENGTH:isize=100;

///Builds a dragonfly topology with a complete graph inside each group and a single global link joining each pair of groups.
///With `p` nodes per router, `a` routers per group and `h` global ports per router there are `a*h+1` groups.
///The canonic dimensions are `a=2p` and `h=p`.
///
///Each router has the ports `0..p` to its nodes, then `a-1` local ports and then `h` global ports.
///The global port `j` of the router with local index `i` carries the link `l=i*h+j` of its group, which goes to the group `l` when `l` is lower than our group, else to the group `l+1`.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct Dragonfly
{
	/// Number of nodes per router. Dally called it `p`.
	servers_per_router: usize,
	/// Number of routers in a group. Dally called it `a`. a-1 local ports.
	group_size: usize,
	/// Number of ports per router that connect to routers in a different group. Dally called it `h`
	global_ports_per_router: usize,
	/// Number of groups = a*h+1. Dally called it `g`.
	number_of_groups: usize,
	local_latency: usize,
	global_latency: usize,
}

impl Topology for Dragonfly
{
	fn num_routers(&self) -> usize
	{
		self.group_size * self.number_of_groups
	}
	fn num_nodes(&self) -> usize
	{
		self.group_size * self.number_of_groups * self.servers_per_router
	}
	fn concentration(&self) -> usize
	{
		self.servers_per_router
	}
	fn ports(&self, _router_index:usize) -> usize
	{
		self.servers_per_router + self.group_size-1 + self.global_ports_per_router
	}
	fn neighbour(&self, router_index:usize, port:usize) -> (Location,usize)
	{
		let (router_local,router_global)=self.unpack(router_index);
		let p=self.servers_per_router;
		if port<p
		{
			(Location::NodePort(router_index*p + port),2)
		}
		else if port<p+self.group_size-1
		{
			let offset=port-p;
			let target_local = if offset<router_local { offset } else { offset+1 };
			let target=self.pack((target_local,router_global));
			(Location::RouterPort{router_index:target,router_port:self.local_port(target,router_index)},0)
		}
		else
		{
			let link=router_local*self.global_ports_per_router + port-p-(self.group_size-1);
			let target_global = if link<router_global { link } else { link+1 };
			let target=self.group_in_router(router_global,target_global);
			(Location::RouterPort{router_index:target,router_port:self.global_port(target_global,router_global)},1)
		}
	}
	fn node_neighbour(&self, node:usize) -> (Location,usize)
	{
		(Location::RouterPort{
			router_index: node/self.servers_per_router,
			router_port: node%self.servers_per_router,
		},2)
	}
	fn outport(&self, router_index:usize, _source:usize, destination:usize) -> usize
	{
		let destination_router=destination/self.servers_per_router;
		let group=self.group(router_index);
		let destination_group=self.group(destination_router);
		if group==destination_group
		{
			if router_index==destination_router
			{
				destination%self.servers_per_router
			}
			else
			{
				self.local_port(router_index,destination_router)
			}
		}
		else
		{
			let out_router=self.group_out_router(group,destination_group);
			if router_index==out_router
			{
				self.global_port(group,destination_group)
			}
			else
			{
				self.local_port(router_index,out_router)
			}
		}
	}
	fn router_hop_count(&self, origin:usize, destination:usize) -> usize
	{
		let group=self.group(origin);
		let destination_group=self.group(destination);
		if group==destination_group
		{
			if origin==destination { 0 } else { 1 }
		}
		else
		{
			let out_router=self.group_out_router(group,destination_group);
			let in_router=self.group_in_router(group,destination_group);
			let mut hops= if origin==out_router { 1 } else { 2 };
			if in_router!=destination
			{
				hops+=1;
			}
			hops
		}
	}
	fn channel_latency(&self, _router_index:usize, port:usize) -> usize
	{
		let p=self.servers_per_router;
		if port<p
		{
			1
		}
		else if port<p+self.group_size-1
		{
			self.local_latency
		}
		else
		{
			self.global_latency
		}
	}
	fn is_global_port(&self, _router_index:usize, port:usize) -> bool
	{
		port>=self.servers_per_router+self.group_size-1
	}
	fn group(&self, router_index:usize) -> usize
	{
		router_index/self.group_size
	}
	fn group_routers(&self, group:usize) -> Range<usize>
	{
		group*self.group_size..(group+1)*self.group_size
	}
	fn random_intermediate(&self, source:usize, destination:usize, rng:&RefCell<StdRng>) -> usize
	{
		let mut intermediate=self.uniform_intermediate(rng);
		let p=self.servers_per_router;
		let source_group=self.group(source/p);
		let intermediate_group=self.group(intermediate/p);
		let destination_router=destination/p;
		let destination_group=self.group(destination_router);
		if source_group!=intermediate_group
		{
			let in_router=self.group_in_router(source_group,intermediate_group);
			if intermediate_group==destination_group
			{
				//The route enters the destination group by the destination router itself.
				if in_router==destination_router
				{
					intermediate=destination;
				}
			}
			else if in_router==self.group_out_router(intermediate_group,destination_group)
			{
				//The entry router of the intermediate group is the one leaving towards the destination group.
				intermediate=in_router*p + rng.borrow_mut().gen_range(0..p);
			}
		}
		intermediate
	}
	fn forces_minimal(&self, router_index:usize, intermediate:usize, destination:usize) -> bool
	{
		let p=self.servers_per_router;
		let group=self.group(router_index);
		let intermediate_group=self.group(intermediate/p);
		let destination_group=self.group(destination/p);
		group==destination_group || intermediate_group==group || intermediate_group==destination_group
	}
	fn channel_difference(&self, source:usize, intermediate:usize, destination:usize) -> usize
	{
		let p=self.servers_per_router;
		let source_group=self.group(source/p);
		let intermediate_group=self.group(intermediate/p);
		let destination_group=self.group(destination/p);
		let min_global = if source_group!=destination_group { 1 } else { 0 };
		let mut non_global=0;
		if source_group!=intermediate_group
		{
			non_global+=1;
		}
		if intermediate_group!=destination_group
		{
			non_global+=1;
		}
		let min_local=self.hop_count(source,destination) as isize - min_global;
		let non_local=(self.hop_count(source,intermediate)+self.hop_count(intermediate,destination)) as isize - non_global;
		let difference=(non_local-min_local)*LOCAL_CHANNEL_LENGTH + (non_global-min_global)*GLOBAL_CHANNEL_LENGTH;
		difference.max(0) as usize
	}
	fn lookahead(&self, router_index:usize, target:usize) -> Option<(usize,usize)>
	{
		let group=self.group(router_index);
		let target_group=self.group(target/self.servers_per_router);
		if group==target_group
		{
			None
		}
		else
		{
			Some((self.group_out_router(group,target_group),self.global_port(group,target_group)))
		}
	}
	fn learnset_slots(&self) -> usize
	{
		self.global_ports_per_router
	}
	fn learnset_slot(&self, source_router:usize, intermediate_router:usize) -> usize
	{
		let group=self.group(source_router);
		let intermediate_group=self.group(intermediate_router);
		if group==intermediate_group
		{
			0
		}
		else
		{
			Self::relative_group(group,intermediate_group)%self.global_ports_per_router
		}
	}
	fn family(&self) -> TopologyFamily
	{
		TopologyFamily::Dragonfly
	}
}

impl Dragonfly
{
	pub fn new(p:usize, a:usize, h:usize, local_latency:usize, global_latency:usize) -> Result<Dragonfly,Error>
	{
		if p==0 || a==0 || h==0 || local_latency==0 || global_latency==0
		{
			return Err(Error::invalid_topology(source_location!()).with_message(format!("Dragonfly with p={} a={} h={} latencies {} and {}",p,a,h,local_latency,global_latency)));
		}
		Ok(Dragonfly{
			servers_per_router: p,
			group_size: a,
			global_ports_per_router: h,
			number_of_groups: a*h+1,
			local_latency,
			global_latency,
		})
	}
	fn unpack(&self, router_index: usize) -> (usize,usize)
	{
		(router_index%self.group_size,router_index/self.group_size)
	}
	fn pack(&self, coordinates:(usize,usize)) -> usize
	{
		coordinates.0+coordinates.1*self.group_size
	}
	///Index of the group `target` among the other groups seen from `group`.
	fn relative_group(group:usize, target:usize) -> usize
	{
		if target<group { target } else { target-1 }
	}
	///The local port of `router_index` towards another router of its group.
	fn local_port(&self, router_index:usize, target:usize) -> usize
	{
		let own=router_index%self.group_size;
		let target_local=target%self.group_size;
		let offset= if target_local<own { target_local } else { target_local-1 };
		self.servers_per_router + offset
	}
	///The global port used to go from `group` to `target_group`, at the router given by `group_out_router`.
	fn global_port(&self, group:usize, target_group:usize) -> usize
	{
		self.servers_per_router + self.group_size-1 + Self::relative_group(group,target_group)%self.global_ports_per_router
	}
	///The router of `group` with the global link to `target_group`.
	pub fn group_out_router(&self, group:usize, target_group:usize) -> usize
	{
		Self::relative_group(group,target_group)/self.global_ports_per_router + group*self.group_size
	}
	///The router of `target_group` reached by the global link from `group`.
	pub fn group_in_router(&self, group:usize, target_group:usize) -> usize
	{
		self.group_out_router(target_group,group)
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn canonic_sizes()
	{
		let topology=Dragonfly::new(2,4,2,10,100).expect("valid topology");
		assert_eq!(topology.num_routers(),36);
		assert_eq!(topology.num_nodes(),72);
		assert_eq!(topology.ports(0),2+3+2);
		assert!(topology.is_global_port(0,5));
		assert!(!topology.is_global_port(0,4));
		assert_eq!(topology.channel_latency(0,4),10);
		assert_eq!(topology.channel_latency(0,6),100);
	}

	#[test]
	fn global_links()
	{
		let topology=Dragonfly::new(2,4,2,10,100).expect("valid topology");
		//Router 0 is the local 0 of group 0, its links are 0 and 1, going to the groups 1 and 2.
		assert_eq!(topology.neighbour(0,5).0,Location::RouterPort{router_index:4,router_port:5});
		assert_eq!(topology.neighbour(0,6).0,Location::RouterPort{router_index:8,router_port:5});
		for group in 0..9
		{
			for target in 0..9
			{
				if group!=target
				{
					let out_router=topology.group_out_router(group,target);
					assert_eq!(topology.group(out_router),group);
					let port=topology.global_port(group,target);
					assert_eq!(topology.neighbour(out_router,port).0,Location::RouterPort{router_index:topology.group_in_router(group,target),router_port:topology.global_port(target,group)});
				}
			}
		}
	}

	#[test]
	fn hop_counts()
	{
		let topology=Dragonfly::new(2,4,2,10,100).expect("valid topology");
		assert_eq!(topology.hop_count(0,1),0);
		assert_eq!(topology.hop_count(0,2),1);
		//From router 0 to router 4 by the direct global link.
		assert_eq!(topology.hop_count(0,8),1);
		//From router 1 to router 4 there is a local hop first.
		assert_eq!(topology.hop_count(2,8),2);
		//From router 1 to router 5 there is a local hop at each side.
		assert_eq!(topology.hop_count(2,10),3);
	}

	#[test]
	fn forced_minimal_and_channel_difference()
	{
		let topology=Dragonfly::new(2,4,2,10,100).expect("valid topology");
		//Everything in the group 0.
		assert!(topology.forces_minimal(0,20,2));
		//Intermediate in the source group.
		assert!(topology.forces_minimal(0,3,20));
		//Intermediate in the destination group.
		assert!(topology.forces_minimal(0,21,20));
		assert!(!topology.forces_minimal(0,40,20));
		//From router 0 to router 4 through the router 8: the minimal has a global hop, the non-minimal two global hops.
		assert_eq!(topology.channel_difference(0,16,8),100);
		//Through the router 9 there are two local hops in the group 2, entering by the router 8 and leaving by it.
		assert_eq!(topology.channel_difference(0,18,8),2*10+100);
		assert_eq!(topology.lookahead(2,8),Some((0,5)));
		assert_eq!(topology.lookahead(2,4),None);
	}

	#[test]
	fn channel_difference_ignores_latencies()
	{
		let short=Dragonfly::new(2,4,2,1,2).expect("valid topology");
		let long=Dragonfly::new(2,4,2,7,30).expect("valid topology");
		for topology in [short,long].iter()
		{
			assert_eq!(topology.channel_difference(0,16,8),100);
			assert_eq!(topology.channel_difference(0,18,8),2*10+100);
		}
	}
}
