/*!

A Pattern defines the way nodes select the destinations of their synthetic packets.

see [`new_pattern`](fn.new_pattern.html) for documentation on the configuration syntax of predefined patterns.

*/

use std::cell::RefCell;
use ::rand::rngs::StdRng;
use ::rand::Rng;
use ::rand::seq::SliceRandom;
use quantifiable_derive::Quantifiable;//the derive macro
use crate::config::{as_f64,as_usize,object_name,object_pairs,unknown_field};
use crate::config_parser::ConfigurationValue;
use crate::error::Error;
use crate::quantify::Quantifiable;
use crate::topology::Topology;

///A `Pattern` describes how each node decides the destination of its packets.
pub trait Pattern : Quantifiable + std::fmt::Debug
{
	///Fix the sizes, before any destination is requested.
	fn initialize(&mut self, topology:&dyn Topology, rng:&RefCell<StdRng>) -> Result<(),Error>;
	///Obtain a destination of a source. This will be called repeteadly as the traffic requires destination for its packets.
	fn get_destination(&self, origin:usize, topology:&dyn Topology, rng:&RefCell<StdRng>) -> usize;
}

/**Build a new pattern over the nodes of the network.

### Uniform

All nodes have the same probability of being the destination, except the origin itself.
```ignore
Uniform{
	legend_name: "uniform",
}
```

### RandomPermutation
Each node sends all its packets to the same destination, which no other node uses. Build at initialization.
```ignore
RandomPermutation{
	legend_name: "random node permutation",
}
```

### GroupShift
Adversarial traffic. The destination is a random node in the group `shift` positions after the group of the origin.
In a dragonfly all the packets of a group compete for the few global channels towards the next group. In topologies without groups each router is a group.
```ignore
GroupShift{
	shift: 1,
	legend_name: "adversarial",
}
```

### Hotspots
The destinations are selected from a pool made of the given `destinations` plus `extra_random_destinations` chosen at initialization.
```ignore
Hotspots{
	destinations: [0],
	extra_random_destinations: 3,
	legend_name: "4 hotspots",
}
```

### RandomMix
Each packet chooses one of the `patterns` with probability proportional to its weight.
```ignore
RandomMix{
	patterns: [Hotspots{destinations:[0]}, Uniform],
	weights: [5,95],
	legend_name: "0.05 chance of sending to the hotspot",
}
```
*/
pub fn new_pattern(cv:&ConfigurationValue) -> Result<Box<dyn Pattern>,Error>
{
	match object_name(cv)?
	{
		"Uniform" => Ok(Box::new(UniformPattern::new(cv)?)),
		"RandomPermutation" => Ok(Box::new(RandomPermutation::new(cv)?)),
		"GroupShift" => Ok(Box::new(GroupShift::new(cv)?)),
		"Hotspots" => Ok(Box::new(Hotspots::new(cv)?)),
		"RandomMix" => Ok(Box::new(RandomMix::new(cv)?)),
		name => Err(Error::unknown_configuration_object(source_location!(),"pattern",name)),
	}
}

///Rejects any field but `legend_name`.
fn no_fields(cv:&ConfigurationValue, expected_name:&str) -> Result<(),Error>
{
	for &(ref name,ref _value) in object_pairs(cv,expected_name)?
	{
		match name.as_ref()
		{
			"legend_name" => (),
			_ => return Err(unknown_field(expected_name,name,cv)),
		}
	}
	Ok(())
}

///Each destination request will be uniform random among all the nodes minus the `origin`.
///Independently of past requests, decisions or origin.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct UniformPattern
{
	size: usize,
}

impl Pattern for UniformPattern
{
	fn initialize(&mut self, topology:&dyn Topology, _rng:&RefCell<StdRng>) -> Result<(),Error>
	{
		self.size=topology.num_nodes();
		if self.size<2
		{
			return Err(Error::invalid_topology(source_location!()).with_message(format!("the Uniform pattern requires at least two nodes")));
		}
		Ok(())
	}
	fn get_destination(&self, origin:usize, _topology:&dyn Topology, rng:&RefCell<StdRng>) -> usize
	{
		//Skip over the origin instead of retrying.
		let r=rng.borrow_mut().gen_range(0..self.size-1);
		if r>=origin { r+1 } else { r }
	}
}

impl UniformPattern
{
	fn new(cv:&ConfigurationValue) -> Result<UniformPattern,Error>
	{
		no_fields(cv,"Uniform")?;
		Ok(UniformPattern{
			size: 0,
		})
	}
}

///Build a random permutation on initialization, which is then kept constant.
///This allows self-messages; with a reasonable probability of having one.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct RandomPermutation
{
	permutation: Vec<usize>,
}

impl Pattern for RandomPermutation
{
	fn initialize(&mut self, topology:&dyn Topology, rng:&RefCell<StdRng>) -> Result<(),Error>
	{
		self.permutation=(0..topology.num_nodes()).collect();
		self.permutation.shuffle(&mut *rng.borrow_mut());
		Ok(())
	}
	fn get_destination(&self, origin:usize, _topology:&dyn Topology, _rng:&RefCell<StdRng>) -> usize
	{
		self.permutation[origin]
	}
}

impl RandomPermutation
{
	fn new(cv:&ConfigurationValue) -> Result<RandomPermutation,Error>
	{
		no_fields(cv,"RandomPermutation")?;
		Ok(RandomPermutation{
			permutation: vec![],
		})
	}
}

///Sends to a random node of the group at distance `shift`.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct GroupShift
{
	shift: usize,
	groups: usize,
}

impl Pattern for GroupShift
{
	fn initialize(&mut self, topology:&dyn Topology, _rng:&RefCell<StdRng>) -> Result<(),Error>
	{
		self.groups=topology.group(topology.num_routers()-1)+1;
		if self.shift%self.groups==0
		{
			return Err(Error::invalid_topology(source_location!()).with_message(format!("a GroupShift of {} sends every packet into its own group among {} groups",self.shift,self.groups)));
		}
		Ok(())
	}
	fn get_destination(&self, origin:usize, topology:&dyn Topology, rng:&RefCell<StdRng>) -> usize
	{
		let group=(topology.group(topology.node_router(origin))+self.shift)%self.groups;
		let mut rng=rng.borrow_mut();
		let router=rng.gen_range(topology.group_routers(group));
		router*topology.concentration()+rng.gen_range(0..topology.concentration())
	}
}

impl GroupShift
{
	fn new(cv:&ConfigurationValue) -> Result<GroupShift,Error>
	{
		let mut shift=1;
		for &(ref name,ref value) in object_pairs(cv,"GroupShift")?
		{
			match name.as_ref()
			{
				"shift" => shift=as_usize(value,"shift")?,
				"legend_name" => (),
				_ => return Err(unknown_field("GroupShift",name,cv)),
			}
		}
		Ok(GroupShift{
			shift,
			groups: 0,
		})
	}
}

/// The destinations are selected from a given pool of nodes.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct Hotspots
{
	///The allowed destinations
	destinations: Vec<usize>,
	///An amount of destinations to be added to the vector on pattern initialization.
	extra_random_destinations: usize
}

impl Pattern for Hotspots
{
	fn initialize(&mut self, topology:&dyn Topology, rng:&RefCell<StdRng>) -> Result<(),Error>
	{
		let size=topology.num_nodes();
		if let Some(&bad)=self.destinations.iter().find(|&&d|d>=size)
		{
			return Err(Error::node_out_of_range(source_location!(),bad,size));
		}
		for _ in 0..self.extra_random_destinations
		{
			let r=rng.borrow_mut().gen_range(0..size);
			self.destinations.push(r);
		}
		if self.destinations.is_empty()
		{
			return Err(Error::missing_configuration_field(source_location!(),"Hotspots","destinations").with_message(format!("The Hotspots pattern requires to have at least one destination.")));
		}
		Ok(())
	}
	fn get_destination(&self, _origin:usize, _topology:&dyn Topology, rng:&RefCell<StdRng>) -> usize
	{
		let r=rng.borrow_mut().gen_range(0..self.destinations.len());
		self.destinations[r]
	}
}

impl Hotspots
{
	fn new(cv:&ConfigurationValue) -> Result<Hotspots,Error>
	{
		let mut destinations=vec![];
		let mut extra_random_destinations=0;
		for &(ref name,ref value) in object_pairs(cv,"Hotspots")?
		{
			match name.as_ref()
			{
				"destinations" => match value
				{
					&ConfigurationValue::Array(ref a) => destinations=a.iter().map(|v|as_usize(v,"destinations")).collect::<Result<Vec<usize>,Error>>()?,
					_ => return Err(Error::ill_formed_configuration(source_location!(),value.clone()).with_message(format!("bad value for destinations"))),
				},
				"extra_random_destinations" => extra_random_destinations=as_usize(value,"extra_random_destinations")?,
				"legend_name" => (),
				_ => return Err(unknown_field("Hotspots",name,cv)),
			}
		}
		Ok(Hotspots{
			destinations,
			extra_random_destinations,
		})
	}
}

/// Use either of several patterns, with probability proportional to a weight.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct RandomMix
{
	///The patterns in the pool to be selected.
	patterns: Vec<Box<dyn Pattern>>,
	///The given weights, one per pattern.
	weights: Vec<f64>,
	total_weight: f64,
}

impl Pattern for RandomMix
{
	fn initialize(&mut self, topology:&dyn Topology, rng:&RefCell<StdRng>) -> Result<(),Error>
	{
		for pattern in self.patterns.iter_mut()
		{
			pattern.initialize(topology,rng)?;
		}
		Ok(())
	}
	fn get_destination(&self, origin:usize, topology:&dyn Topology, rng:&RefCell<StdRng>) -> usize
	{
		let mut w=rng.borrow_mut().gen_range(0.0..self.total_weight);
		let mut index=0;
		while index+1<self.weights.len() && w>=self.weights[index]
		{
			w-=self.weights[index];
			index+=1;
		}
		self.patterns[index].get_destination(origin,topology,rng)
	}
}

impl RandomMix
{
	fn new(cv:&ConfigurationValue) -> Result<RandomMix,Error>
	{
		let mut patterns=None;
		let mut weights=None;
		for &(ref name,ref value) in object_pairs(cv,"RandomMix")?
		{
			match name.as_ref()
			{
				"patterns" => match value
				{
					&ConfigurationValue::Array(ref a) => patterns=Some(a.iter().map(new_pattern).collect::<Result<Vec<Box<dyn Pattern>>,Error>>()?),
					_ => return Err(Error::ill_formed_configuration(source_location!(),value.clone()).with_message(format!("bad value for patterns"))),
				},
				"weights" => match value
				{
					&ConfigurationValue::Array(ref a) => weights=Some(a.iter().map(|v|as_f64(v,"weights")).collect::<Result<Vec<f64>,Error>>()?),
					_ => return Err(Error::ill_formed_configuration(source_location!(),value.clone()).with_message(format!("bad value for weights"))),
				},
				"legend_name" => (),
				_ => return Err(unknown_field("RandomMix",name,cv)),
			}
		}
		let patterns=patterns.ok_or_else(||Error::missing_configuration_field(source_location!(),"RandomMix","patterns"))?;
		let weights=weights.ok_or_else(||Error::missing_configuration_field(source_location!(),"RandomMix","weights"))?;
		let total_weight:f64=weights.iter().sum();
		if patterns.is_empty() || patterns.len()!=weights.len() || weights.iter().any(|&w|w<0.0) || total_weight<=0.0
		{
			return Err(Error::ill_formed_configuration(source_location!(),cv.clone()).with_message(format!("RandomMix needs one non-negative weight per pattern")));
		}
		Ok(RandomMix{
			patterns,
			weights,
			total_weight,
		})
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use ::rand::SeedableRng;
	use crate::config::{parse_configuration,TopologyConfig};
	use crate::topology::new_topology;

	fn dragonfly() -> std::rc::Rc<dyn Topology>
	{
		new_topology(&TopologyConfig::Dragonfly{p:2,a:4,h:2,channel_latency:1,global_channel_latency:1}).expect("valid topology")
	}

	fn build(text:&str, topology:&dyn Topology, rng:&RefCell<StdRng>) -> Box<dyn Pattern>
	{
		let mut pattern=new_pattern(&parse_configuration(text).expect("parses")).expect("valid pattern");
		pattern.initialize(topology,rng).expect("initializes");
		pattern
	}

	#[test]
	fn uniform_never_sends_to_itself()
	{
		let topology=dragonfly();
		let rng=RefCell::new(StdRng::seed_from_u64(1));
		let pattern=build("Uniform",topology.as_ref(),&rng);
		let mut reached=vec![false;topology.num_nodes()];
		for _ in 0..2000
		{
			let d=pattern.get_destination(5,topology.as_ref(),&rng);
			assert_ne!(d,5);
			reached[d]=true;
		}
		assert_eq!(reached.iter().filter(|&&r|r).count(),topology.num_nodes()-1);
	}

	#[test]
	fn permutations_are_bijective()
	{
		let topology=dragonfly();
		let rng=RefCell::new(StdRng::seed_from_u64(2));
		let pattern=build("RandomPermutation",topology.as_ref(),&rng);
		let mut images:Vec<usize>=(0..topology.num_nodes()).map(|origin|pattern.get_destination(origin,topology.as_ref(),&rng)).collect();
		images.sort();
		assert_eq!(images,(0..topology.num_nodes()).collect::<Vec<usize>>());
	}

	#[test]
	fn group_shift_targets_the_next_group()
	{
		let topology=dragonfly();
		let rng=RefCell::new(StdRng::seed_from_u64(3));
		let pattern=build("GroupShift{shift:1}",topology.as_ref(),&rng);
		for origin in 0..topology.num_nodes()
		{
			let d=pattern.get_destination(origin,topology.as_ref(),&rng);
			let origin_group=topology.group(topology.node_router(origin));
			assert_eq!(topology.group(topology.node_router(d)),(origin_group+1)%9);
		}
		let mut shift_nine=new_pattern(&parse_configuration("GroupShift{shift:9}").expect("parses")).expect("valid pattern");
		assert!(shift_nine.initialize(topology.as_ref(),&rng).is_err());
	}

	#[test]
	fn hotspots_and_mixes()
	{
		let topology=dragonfly();
		let rng=RefCell::new(StdRng::seed_from_u64(4));
		let pattern=build("Hotspots{destinations:[3,7]}",topology.as_ref(),&rng);
		for _ in 0..50
		{
			let d=pattern.get_destination(0,topology.as_ref(),&rng);
			assert!(d==3 || d==7);
		}
		let pattern=build("RandomMix{patterns:[Hotspots{destinations:[3]},Uniform],weights:[1,0]}",topology.as_ref(),&rng);
		for _ in 0..50
		{
			assert_eq!(pattern.get_destination(0,topology.as_ref(),&rng),3);
		}
		let mut empty=new_pattern(&parse_configuration("Hotspots").expect("parses")).expect("valid pattern");
		assert!(empty.initialize(topology.as_ref(),&rng).is_err());
		assert!(new_pattern(&parse_configuration("Tornado").expect("parses")).is_err());
	}
}
