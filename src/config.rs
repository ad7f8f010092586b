/*!

Reading of the configuration. The text is parsed by the `gramatica` grammar in `config_parser` into a `ConfigurationValue`.
A configuration may contain experiment lists, `![a,b,c]`, that `flatten_configuration_value` expands into a list of independent simulations.
Each simulation is then read into a `SimulationConfig`, which is never modified afterwards.

```ignore
Configuration
{
	random_seed: 42,
	warmup: 1000,
	measured: 5000,
	topology: FlattenedButterfly{ k:4, n:2, concentration:1, channel_latency:2 },
	router: InputQueued{ virtual_channels:4, buffer_size:8, speculative:true },
	routing: ![Minimal, UGAL{threshold:0}, DGB],
	traffic: Synthetic{ pattern:Uniform, load:0.2, packet_size:4 },
	flit_size: 16,
	max_packet_size: 4,
}
```
*/

use std::collections::{BTreeMap};
use std::path::PathBuf;

use crate::config_parser::{self,ConfigurationValue};
use crate::error::Error;

///Given a list of vectors, `[A1,A2,A3,A4,...]`, `Ai` beging a `Vec<T>` and second vector `b:&Vec<T>=[b1,b2,b3,b4,...]`, each `bi:T`.
///It creates a list of vectors with each combination Ai+bj.
fn vec_product<T:Clone>(a:&Vec<Vec<T>>,b:&Vec<T>) -> Vec<Vec<T>>
{
	let mut r=vec![];
	for ae in a.iter()
	{
		for be in b.iter()
		{
			let mut new=ae.clone();
			new.push(be.clone());
			r.push(new);
		}
	}
	r
}

///Parses a whole configuration text into a `ConfigurationValue`.
pub fn parse_configuration(text:&str) -> Result<ConfigurationValue,Error>
{
	match config_parser::parse(text)
	{
		Err(x) => Err(Error::undetermined(source_location!()).with_message(format!("error parsing configuration: {:?}",x))),
		Ok(config_parser::Token::Value(value)) => Ok(value),
		Ok(other) => Err(Error::undetermined(source_location!()).with_message(format!("the configuration is not a value but {:?}",other))),
	}
}

///Expands all the inner ConfigurationValue::Experiments given out a single ConfigurationValue::Experiments
///whose elements are free of them.
pub fn flatten_configuration_value(value:&ConfigurationValue) -> Result<ConfigurationValue,Error>
{
	let mut names = BTreeMap::new();//name -> range
	let experiments = flatten_configuration_value_gather_names(value, &mut names)?;
	Ok(expand_named_experiments_range(experiments,&names))
}

fn flatten_configuration_value_gather_names(value:&ConfigurationValue, names:&mut BTreeMap<String,usize>) -> Result<ConfigurationValue,Error>
{
	let flat = match value
	{
		&ConfigurationValue::Object(ref name, ref list) =>
		{
			let mut r=vec![ vec![] ];
			for &(ref name, ref v) in list
			{
				let fv=flatten_configuration_value_gather_names(v,names)?;
				if let ConfigurationValue::Experiments(vlist) = fv
				{
					let factor=vlist.iter().map(|x|(name.clone(),x.clone())).collect::<Vec<(String,ConfigurationValue)>>();
					r=vec_product(&r,&factor);
				}
				else
				{
					for x in r.iter_mut()
					{
						x.push((name.clone(),fv.clone()));
					}
				}
			}
			ConfigurationValue::Experiments(r.iter().map(|values|ConfigurationValue::Object(name.clone(),values.clone())).collect())
		},
		&ConfigurationValue::Array(ref list) =>
		{
			let mut r=vec![ vec![] ];
			for ref v in list
			{
				let fv=flatten_configuration_value_gather_names(v,names)?;
				if let ConfigurationValue::Experiments(vlist) = fv
				{
					r=vec_product(&r,&vlist);
				}
				else
				{
					for x in r.iter_mut()
					{
						x.push(fv.clone());
					}
				}
			}
			ConfigurationValue::Experiments(r.iter().map(|values|ConfigurationValue::Array(values.clone())).collect())
		},
		&ConfigurationValue::Experiments(ref experiments) =>
		{
			let mut r:Vec<ConfigurationValue>=vec![];
			for experiment in experiments
			{
				let flat=flatten_configuration_value_gather_names(experiment,names)?;
				if let ConfigurationValue::Experiments(ref flist) = flat
				{
					r.extend(flist.iter().map(|x|x.clone()));
				}
				else
				{
					r.push(flat);
				}
			}
			ConfigurationValue::Experiments(r)
		},
		&ConfigurationValue::NamedExperiments(ref name, ref experiments) =>
		{
			if let Some(&size) = names.get(name)
			{
				if size != experiments.len()
				{
					return Err(Error::ill_formed_configuration(source_location!(),value.clone()).with_message(format!("{}! has different lengths {} vs {}",name,size,experiments.len())));
				}
			}
			else
			{
				names.insert(name.to_string(),experiments.len());
			}
			value.clone()
		},
		&ConfigurationValue::Where(ref v, ref _expr) =>
		{
			//Filters are not supported; the whole set is kept.
			flatten_configuration_value_gather_names(v,names)?
		},
		_ => value.clone(),
	};
	Ok(flat)
}

fn expand_named_experiments_range(experiments:ConfigurationValue, names:&BTreeMap<String,usize>) -> ConfigurationValue
{
	let mut r = experiments;
	for (name,&size) in names.iter()
	{
		let collected : Vec<Vec<ConfigurationValue>>= (0..size).map(|index|{
			let mut context : BTreeMap<String,usize> = BTreeMap::new();
			context.insert(name.to_string(),index);
			match particularize_named_experiments_selected(&r,&context)
			{
				ConfigurationValue::Experiments(exps) => exps,
				x => vec![x],
			}
		}).collect();
		r=ConfigurationValue::Experiments(collected.into_iter().map(|t|t.into_iter()).flatten().collect());
	}
	r
}

fn particularize_named_experiments_selected(value:&ConfigurationValue, names:&BTreeMap<String,usize>) -> ConfigurationValue
{
	match value
	{
		&ConfigurationValue::Object(ref name, ref list) =>
		{
			let plist = list.iter().map(|(key,x)|(key.to_string(),particularize_named_experiments_selected(x,names))).collect();
			ConfigurationValue::Object(name.to_string(),plist)
		},
		&ConfigurationValue::Array(ref list) =>
		{
			let plist = list.iter().map(|x|particularize_named_experiments_selected(x,names)).collect();
			ConfigurationValue::Array(plist)
		},
		&ConfigurationValue::Experiments(ref list) =>
		{
			let plist = list.iter().map(|x|particularize_named_experiments_selected(x,names)).collect();
			ConfigurationValue::Experiments(plist)
		},
		&ConfigurationValue::NamedExperiments(ref name, ref list) =>
		{
			if let Some(&index) = names.get(name)
			{
				list[index].clone()
			}
			else
			{
				value.clone()
			}
		},
		_ => value.clone(),
	}
}

///Get the fields of an object, checking it has the expected name.
///Objects without fields may be written just as a name, giving an `Object` with no pairs.
pub fn object_pairs<'a>(cv:&'a ConfigurationValue, expected_name:&str) -> Result<&'a [(String,ConfigurationValue)],Error>
{
	match cv
	{
		&ConfigurationValue::Object(ref cv_name, ref cv_pairs) =>
		{
			if cv_name!=expected_name
			{
				return Err(Error::ill_formed_configuration(source_location!(),cv.clone()).with_message(format!("A {} must be created from a `{}` object not `{}`",expected_name,expected_name,cv_name)));
			}
			Ok(&cv_pairs[..])
		},
		_ => Err(Error::ill_formed_configuration(source_location!(),cv.clone()).with_message(format!("Trying to create a {} from a non-Object",expected_name))),
	}
}

///The name of an object, to select what to build.
pub fn object_name(cv:&ConfigurationValue) -> Result<&str,Error>
{
	match cv
	{
		&ConfigurationValue::Object(ref cv_name, ref _cv_pairs) => Ok(cv_name),
		_ => Err(Error::ill_formed_configuration(source_location!(),cv.clone()).with_message(format!("expected an object"))),
	}
}

///Error for a field that an object does not know about.
pub fn unknown_field(object:&str, field:&str, cv:&ConfigurationValue) -> Error
{
	Error::ill_formed_configuration(source_location!(),cv.clone()).with_message(format!("Nothing to do with field {} in {}",field,object))
}

pub fn as_f64(value:&ConfigurationValue, field:&str) -> Result<f64,Error>
{
	match value
	{
		&ConfigurationValue::Number(f) => Ok(f),
		_ => Err(Error::ill_formed_configuration(source_location!(),value.clone()).with_message(format!("bad value for {}",field))),
	}
}

///Reads a non-negative integer. Values such as `2.5` or `-1` are rejected instead of being rounded.
pub fn as_usize(value:&ConfigurationValue, field:&str) -> Result<usize,Error>
{
	let f=as_f64(value,field)?;
	if f<0.0 || f.fract()!=0.0
	{
		return Err(Error::ill_formed_configuration(source_location!(),value.clone()).with_message(format!("{} must be a non-negative integer, not {}",field,f)));
	}
	Ok(f as usize)
}

pub fn as_bool(value:&ConfigurationValue, field:&str) -> Result<bool,Error>
{
	match value
	{
		&ConfigurationValue::True => Ok(true),
		&ConfigurationValue::False => Ok(false),
		_ => Err(Error::ill_formed_configuration(source_location!(),value.clone()).with_message(format!("bad value for {}",field))),
	}
}

pub fn as_str<'a>(value:&'a ConfigurationValue, field:&str) -> Result<&'a str,Error>
{
	match value
	{
		&ConfigurationValue::Literal(ref s) => Ok(s),
		_ => Err(Error::ill_formed_configuration(source_location!(),value.clone()).with_message(format!("bad value for {}",field))),
	}
}

///Families of topologies that can be built.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum TopologyFamily
{
	FlattenedButterfly,
	Dragonfly,
}

///The parameters of the topology. Built once and shared by the topology, the routers and the routing.
#[derive(Clone,Debug,PartialEq)]
pub enum TopologyConfig
{
	///`k` routers per dimension, `n` dimensions and `concentration` nodes per router.
	FlattenedButterfly{
		k: usize,
		n: usize,
		concentration: usize,
		channel_latency: usize,
	},
	///`p` nodes per router, `a` routers per group, `h` global ports per router. There are `a*h+1` groups.
	Dragonfly{
		p: usize,
		a: usize,
		h: usize,
		channel_latency: usize,
		global_channel_latency: usize,
	},
}

impl TopologyConfig
{
	pub fn new(cv:&ConfigurationValue) -> Result<TopologyConfig,Error>
	{
		match object_name(cv)?
		{
			"FlattenedButterfly" | "Flatfly" =>
			{
				let mut k=None;
				let mut n=None;
				let mut concentration=None;
				let mut channel_latency=1;
				for &(ref name,ref value) in object_pairs(cv,object_name(cv)?)?
				{
					match name.as_ref()
					{
						"k" => k=Some(as_usize(value,"k")?),
						"n" => n=Some(as_usize(value,"n")?),
						"concentration" | "c" => concentration=Some(as_usize(value,"concentration")?),
						"channel_latency" => channel_latency=as_usize(value,"channel_latency")?,
						"legend_name" => (),
						_ => return Err(unknown_field("FlattenedButterfly",name,cv)),
					}
				}
				let k=k.ok_or_else(||Error::missing_configuration_field(source_location!(),"FlattenedButterfly","k"))?;
				let n=n.ok_or_else(||Error::missing_configuration_field(source_location!(),"FlattenedButterfly","n"))?;
				let concentration=concentration.ok_or_else(||Error::missing_configuration_field(source_location!(),"FlattenedButterfly","concentration"))?;
				Ok(TopologyConfig::FlattenedButterfly{k,n,concentration,channel_latency})
			},
			"Dragonfly" =>
			{
				let mut p=None;
				let mut a=None;
				let mut h=None;
				let mut channel_latency=10;
				let mut global_channel_latency=100;
				for &(ref name,ref value) in object_pairs(cv,"Dragonfly")?
				{
					match name.as_ref()
					{
						"p" | "servers_per_router" => p=Some(as_usize(value,"p")?),
						"a" | "group_size" => a=Some(as_usize(value,"a")?),
						"h" | "global_ports_per_router" => h=Some(as_usize(value,"h")?),
						"channel_latency" => channel_latency=as_usize(value,"channel_latency")?,
						"global_channel_latency" => global_channel_latency=as_usize(value,"global_channel_latency")?,
						"legend_name" => (),
						_ => return Err(unknown_field("Dragonfly",name,cv)),
					}
				}
				let p=p.ok_or_else(||Error::missing_configuration_field(source_location!(),"Dragonfly","p"))?;
				//The canonic dragonfly has a=2p and h=p.
				let a=a.unwrap_or(2*p);
				let h=h.unwrap_or(p);
				Ok(TopologyConfig::Dragonfly{p,a,h,channel_latency,global_channel_latency})
			},
			name => Err(Error::unknown_configuration_object(source_location!(),"topology",name)),
		}
	}
	pub fn family(&self) -> TopologyFamily
	{
		match self
		{
			&TopologyConfig::FlattenedButterfly{..} => TopologyFamily::FlattenedButterfly,
			&TopologyConfig::Dragonfly{..} => TopologyFamily::Dragonfly,
		}
	}
	///The latency of the longest channel. Events are never scheduled farther than this.
	pub fn maximum_channel_latency(&self) -> usize
	{
		match self
		{
			&TopologyConfig::FlattenedButterfly{channel_latency,..} => channel_latency,
			&TopologyConfig::Dragonfly{channel_latency,global_channel_latency,..} => channel_latency.max(global_channel_latency),
		}
	}
}

///Microarchitecture of the input queued routers.
#[derive(Clone,Debug,PartialEq)]
pub struct RouterConfig
{
	pub virtual_channels: usize,
	///Flits per virtual channel buffer.
	pub buffer_size: usize,
	///Whether switch allocation is attempted in the same cycle as virtual channel allocation.
	pub speculative: bool,
	///Iterations of the iSLIP allocators.
	pub allocator_iterations: usize,
}

impl RouterConfig
{
	pub fn new(cv:&ConfigurationValue) -> Result<RouterConfig,Error>
	{
		let mut virtual_channels=None;
		let mut buffer_size=None;
		let mut speculative=false;
		let mut allocator_iterations=1;
		for &(ref name,ref value) in object_pairs(cv,"InputQueued")?
		{
			match name.as_ref()
			{
				"virtual_channels" => virtual_channels=Some(as_usize(value,"virtual_channels")?),
				"buffer_size" => buffer_size=Some(as_usize(value,"buffer_size")?),
				"speculative" => speculative=as_bool(value,"speculative")?,
				"allocator" =>
				{
					for &(ref aname,ref avalue) in object_pairs(value,"Islip")?
					{
						match aname.as_ref()
						{
							"num_iter" => allocator_iterations=as_usize(avalue,"num_iter")?,
							_ => return Err(unknown_field("Islip",aname,value)),
						}
					}
				},
				"legend_name" => (),
				_ => return Err(unknown_field("InputQueued",name,cv)),
			}
		}
		let virtual_channels=virtual_channels.ok_or_else(||Error::missing_configuration_field(source_location!(),"InputQueued","virtual_channels"))?;
		let buffer_size=buffer_size.ok_or_else(||Error::missing_configuration_field(source_location!(),"InputQueued","buffer_size"))?;
		if virtual_channels==0 || buffer_size==0 || allocator_iterations==0
		{
			return Err(Error::ill_formed_configuration(source_location!(),cv.clone()).with_message(format!("virtual_channels, buffer_size and num_iter must be positive")));
		}
		Ok(RouterConfig{virtual_channels,buffer_size,speculative,allocator_iterations})
	}
}

///Sizes, in flits, of the packets in request/reply traffic.
#[derive(Clone,Debug,PartialEq)]
pub struct ReadWriteConfig
{
	pub read_request_size: usize,
	pub read_reply_size: usize,
	pub write_request_size: usize,
	pub write_reply_size: usize,
	///Probability of a generated request being a write.
	pub write_fraction: f64,
}

impl ReadWriteConfig
{
	pub fn new(cv:&ConfigurationValue) -> Result<ReadWriteConfig,Error>
	{
		let mut read_request_size=1;
		let mut read_reply_size=None;
		let mut write_request_size=None;
		let mut write_reply_size=1;
		let mut write_fraction=0.5;
		for &(ref name,ref value) in object_pairs(cv,"RequestReply")?
		{
			match name.as_ref()
			{
				"read_request_size" => read_request_size=as_usize(value,"read_request_size")?,
				"read_reply_size" => read_reply_size=Some(as_usize(value,"read_reply_size")?),
				"write_request_size" => write_request_size=Some(as_usize(value,"write_request_size")?),
				"write_reply_size" => write_reply_size=as_usize(value,"write_reply_size")?,
				"write_fraction" => write_fraction=as_f64(value,"write_fraction")?,
				_ => return Err(unknown_field("RequestReply",name,cv)),
			}
		}
		let read_reply_size=read_reply_size.ok_or_else(||Error::missing_configuration_field(source_location!(),"RequestReply","read_reply_size"))?;
		let write_request_size=write_request_size.ok_or_else(||Error::missing_configuration_field(source_location!(),"RequestReply","write_request_size"))?;
		if read_request_size==0 || read_reply_size==0 || write_request_size==0 || write_reply_size==0 || !(0.0..=1.0).contains(&write_fraction)
		{
			return Err(Error::ill_formed_configuration(source_location!(),cv.clone()).with_message(format!("packet sizes must be positive and write_fraction within [0,1]")));
		}
		Ok(ReadWriteConfig{read_request_size,read_reply_size,write_request_size,write_reply_size,write_fraction})
	}
}

///How the nodes get their packets.
#[derive(Clone,Debug,PartialEq)]
pub enum TrafficConfig
{
	///Nodes generate packets of `packet_size` flits with probability `load/packet_size` each cycle, to the destination given by `pattern`.
	///The class of each packet is drawn with probability proportional to `class_weights`.
	Synthetic{
		pattern: ConfigurationValue,
		load: f64,
		packet_size: usize,
		class_weights: Vec<f64>,
	},
	///The packets are given by the host through `Simulation::inject`.
	Host,
	///The packets are read from a file with lines `cycle source destination bytes [class]`.
	Trace{
		file: PathBuf,
	},
}

impl TrafficConfig
{
	pub fn new(cv:&ConfigurationValue) -> Result<TrafficConfig,Error>
	{
		match object_name(cv)?
		{
			"Synthetic" =>
			{
				let mut pattern=None;
				let mut load=None;
				let mut packet_size=1;
				let mut class_weights=vec![1.0];
				for &(ref name,ref value) in object_pairs(cv,"Synthetic")?
				{
					match name.as_ref()
					{
						"pattern" => pattern=Some(value.clone()),
						"load" => load=Some(as_f64(value,"load")?),
						"packet_size" => packet_size=as_usize(value,"packet_size")?,
						"classes" => class_weights=vec![1.0;as_usize(value,"classes")?],
						"class_weights" => match value
						{
							&ConfigurationValue::Array(ref list) => class_weights=list.iter().map(|w|as_f64(w,"class_weights")).collect::<Result<Vec<f64>,Error>>()?,
							_ => return Err(Error::ill_formed_configuration(source_location!(),value.clone()).with_message(format!("class_weights must be an array of numbers"))),
						},
						"legend_name" => (),
						_ => return Err(unknown_field("Synthetic",name,cv)),
					}
				}
				let pattern=pattern.ok_or_else(||Error::missing_configuration_field(source_location!(),"Synthetic","pattern"))?;
				let load=load.ok_or_else(||Error::missing_configuration_field(source_location!(),"Synthetic","load"))?;
				if packet_size==0 || load<0.0 || class_weights.is_empty() || class_weights.iter().any(|&w|w<0.0) || class_weights.iter().sum::<f64>()<=0.0
				{
					return Err(Error::ill_formed_configuration(source_location!(),cv.clone()));
				}
				Ok(TrafficConfig::Synthetic{pattern,load,packet_size,class_weights})
			},
			"Host" => Ok(TrafficConfig::Host),
			"Trace" =>
			{
				let mut file=None;
				for &(ref name,ref value) in object_pairs(cv,"Trace")?
				{
					match name.as_ref()
					{
						"file" => file=Some(PathBuf::from(as_str(value,"file")?)),
						_ => return Err(unknown_field("Trace",name,cv)),
					}
				}
				match file
				{
					Some(file) => Ok(TrafficConfig::Trace{file}),
					//A bare `Trace` means the trace is given by the host.
					None => Ok(TrafficConfig::Host),
				}
			},
			name => Err(Error::unknown_configuration_object(source_location!(),"traffic",name)),
		}
	}
	pub fn is_synthetic(&self) -> bool
	{
		match self
		{
			&TrafficConfig::Synthetic{..} => true,
			_ => false,
		}
	}
}

///Everything needed to build a simulation. Read from a `Configuration` object.
#[derive(Clone,Debug)]
pub struct SimulationConfig
{
	pub random_seed: u64,
	///Cycles before the measurement.
	pub warmup: usize,
	///Cycles measured.
	pub measured: usize,
	///A simulation not finished at this cycle is considered deadlocked.
	pub maximum_cycles: usize,
	///Cycles between logged snapshots. 0 disables them.
	pub statistics_period: usize,
	pub topology: TopologyConfig,
	pub router: RouterConfig,
	///Given to `routing::new_routing`.
	pub routing: ConfigurationValue,
	pub traffic: TrafficConfig,
	///Bytes per flit.
	pub flit_size: usize,
	///Maximum flits per packet. Longer messages are split into several packets.
	pub max_packet_size: usize,
	///Flits that a node may hold pending of injection, as seen by `query_credits`.
	pub injection_queue_size: usize,
	pub read_write: Option<ReadWriteConfig>,
}

impl SimulationConfig
{
	pub fn new(cv:&ConfigurationValue) -> Result<SimulationConfig,Error>
	{
		let mut random_seed=None;
		let mut warmup=0;
		let mut measured=None;
		let mut maximum_cycles=None;
		let mut statistics_period=0;
		let mut topology=None;
		let mut router=None;
		let mut routing=None;
		let mut traffic=None;
		let mut flit_size=1;
		let mut max_packet_size=None;
		let mut injection_queue_size=None;
		let mut read_write=None;
		for &(ref name,ref value) in object_pairs(cv,"Configuration")?
		{
			match name.as_ref()
			{
				"random_seed" => random_seed=Some(as_usize(value,"random_seed")? as u64),
				"warmup" => warmup=as_usize(value,"warmup")?,
				"measured" => measured=Some(as_usize(value,"measured")?),
				"maximum_cycles" => maximum_cycles=Some(as_usize(value,"maximum_cycles")?),
				"statistics_period" => statistics_period=as_usize(value,"statistics_period")?,
				"topology" => topology=Some(TopologyConfig::new(value)?),
				"router" => router=Some(RouterConfig::new(value)?),
				"routing" => routing=Some(value.clone()),
				"traffic" => traffic=Some(TrafficConfig::new(value)?),
				"flit_size" => flit_size=as_usize(value,"flit_size")?,
				"max_packet_size" | "maximum_packet_size" => max_packet_size=Some(as_usize(value,"max_packet_size")?),
				"injection_queue_size" => injection_queue_size=Some(as_usize(value,"injection_queue_size")?),
				"read_write" => read_write=Some(ReadWriteConfig::new(value)?),
				"legend_name" => (),
				_ => return Err(unknown_field("Configuration",name,cv)),
			}
		}
		let random_seed=random_seed.ok_or_else(||Error::missing_configuration_field(source_location!(),"Configuration","random_seed"))?;
		let topology=topology.ok_or_else(||Error::missing_configuration_field(source_location!(),"Configuration","topology"))?;
		let router=router.ok_or_else(||Error::missing_configuration_field(source_location!(),"Configuration","router"))?;
		let routing=routing.ok_or_else(||Error::missing_configuration_field(source_location!(),"Configuration","routing"))?;
		let traffic=traffic.ok_or_else(||Error::missing_configuration_field(source_location!(),"Configuration","traffic"))?;
		let max_packet_size=max_packet_size.ok_or_else(||Error::missing_configuration_field(source_location!(),"Configuration","max_packet_size"))?;
		let measured = match measured
		{
			Some(m) => m,
			None =>
			{
				if traffic.is_synthetic()
				{
					return Err(Error::missing_configuration_field(source_location!(),"Configuration","measured"));
				}
				0
			}
		};
		if flit_size==0 || max_packet_size==0
		{
			return Err(Error::ill_formed_configuration(source_location!(),cv.clone()).with_message(format!("flit_size and max_packet_size must be positive")));
		}
		let maximum_cycles=maximum_cycles.unwrap_or(10*(warmup+measured)+100_000);
		let injection_queue_size=injection_queue_size.unwrap_or(16*max_packet_size);
		Ok(SimulationConfig{
			random_seed,
			warmup,
			measured,
			maximum_cycles,
			statistics_period,
			topology,
			router,
			routing,
			traffic,
			flit_size,
			max_packet_size,
			injection_queue_size,
			read_write,
		})
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	#[test]
	fn experiments_are_expanded()
	{
		let cv=parse_configuration("Configuration{ a: ![1,2], b: ![3,4,5], c: x![6,7], d: x![8,9] }").expect("parses");
		match flatten_configuration_value(&cv).expect("flattens")
		{
			ConfigurationValue::Experiments(list) =>
			{
				//2*3 combinations times the 2 values of the named list.
				assert_eq!(list.len(),12);
				for experiment in list.iter()
				{
					let pairs=object_pairs(experiment,"Configuration").expect("object");
					let c=as_usize(&pairs[2].1,"c").unwrap();
					let d=as_usize(&pairs[3].1,"d").unwrap();
					//named experiments advance together.
					assert_eq!(c+2,d);
				}
			},
			_ => panic!("expected a list of experiments"),
		}
	}
	#[test]
	fn topology_is_read()
	{
		let cv=parse_configuration("FlattenedButterfly{k:4,n:2,concentration:1,channel_latency:3}").unwrap();
		assert_eq!(TopologyConfig::new(&cv).unwrap(),TopologyConfig::FlattenedButterfly{k:4,n:2,concentration:1,channel_latency:3});
		let cv=parse_configuration("Dragonfly{p:2}").unwrap();
		assert_eq!(TopologyConfig::new(&cv).unwrap(),TopologyConfig::Dragonfly{p:2,a:4,h:2,channel_latency:10,global_channel_latency:100});
	}
	#[test]
	fn bad_configurations_are_errors()
	{
		let cv=parse_configuration("FlattenedButterfly{k:4,n:2}").unwrap();
		assert!(TopologyConfig::new(&cv).is_err());
		let cv=parse_configuration("FlattenedButterfly{k:4.5,n:2,concentration:1}").unwrap();
		assert!(TopologyConfig::new(&cv).is_err());
		let cv=parse_configuration("Torus{sides:[4,4]}").unwrap();
		assert!(TopologyConfig::new(&cv).is_err());
		let cv=parse_configuration("InputQueued{virtual_channels:0,buffer_size:4}").unwrap();
		assert!(RouterConfig::new(&cv).is_err());
	}
}
