/*!
caminos-flit
=====

This crate provides a cycle-accurate, flit-level simulator of interconnection networks. It models input-queued routers with virtual channels and credit-based flow control, connected as a flattened butterfly or as a dragonfly, and routed by minimal, Valiant, UGAL, PAR or DGB routing.

# Usage

The binary `caminos-flit` receives a configuration file and writes a `Result` object per simulation to the standard output.

```text
$ RUST_LOG=info caminos-flit experiment.cfg --results=experiment.result
```

A program may instead drive a simulation through `Simulation`, giving it the messages as its host. See the `config` module for the syntax of the configuration.

```ignore
let config=SimulationConfig::new(&parse_configuration(text)?)?;
let mut simulation=Simulation::new(&config)?;
simulation.inject(0,9,64,0)?;
simulation.stop_injection();
simulation.run();
while let Some(info)=simulation.retire(9) { println!("{:?}",info); }
```

# Simulation cycle

Each cycle the network delivers the events of its channels, the nodes inject at most one flit each, and every router performs its pipeline of route computation, virtual channel allocation, switch allocation and switch traversal. The routers see the queues of other routers only through the occupancy snapshot taken at the begin of the cycle, so the result does not depend on the order in which the routers are processed.

# Results

The result of a simulation is written as a `ConfigurationValue`, with the measured cycles, the rates of sent and accepted flits, the latencies per class, the aggregated statistics of the routers and the identifier of the git commit of the build.

*/

#[macro_use]
pub mod error;
pub mod config_parser;
pub mod config;
pub mod quantify;
pub mod flit;
pub mod event;
pub mod topology;
pub mod allocator;
pub mod router;
pub mod learning;
pub mod routing;
pub mod network;
pub mod pattern;
pub mod stats;
pub mod traffic;

use std::fs::File;
use std::io::prelude::*;
use std::io::stdout;
use std::mem::size_of;
use std::path::Path;
use log::{error,info};

use config_parser::ConfigurationValue;
use config::{flatten_configuration_value,parse_configuration,SimulationConfig};
use error::Error;
use quantify::Quantifiable;
use stats::Statistics;
use traffic::{RetiredFlitInfo,TrafficManager};

///A simulation, as seen by its host. It owns a single `TrafficManager`.
pub struct Simulation
{
	///The configuration it has been built from.
	pub config: SimulationConfig,
	traffic: TrafficManager,
}

impl Simulation
{
	pub fn new(config:&SimulationConfig) -> Result<Simulation,Error>
	{
		let traffic=TrafficManager::new(config)?;
		let topology=traffic.network().topology();
		info!("simulation of {} routers and {} nodes with seed {}",topology.num_routers(),topology.num_nodes(),config.random_seed);
		Ok(Simulation{
			config: config.clone(),
			traffic,
		})
	}
	pub fn traffic(&self) -> &TrafficManager
	{
		&self.traffic
	}
	///Queue a message of `size` bytes. Returns the identifier that `retire` gives when it has been received.
	pub fn inject(&mut self, source:usize, destination:usize, size:usize, class:usize) -> Result<usize,Error>
	{
		self.traffic.inject(source,destination,size,class)
	}
	///Advances a cycle. Returns whether there remains work in flight or pending.
	pub fn step_cycle(&mut self) -> bool
	{
		self.traffic.step()
	}
	pub fn wants_wake(&self) -> bool
	{
		self.traffic.wants_wake()
	}
	pub fn wake(&mut self)
	{
		self.traffic.wake()
	}
	pub fn retire(&mut self, node:usize) -> Option<RetiredFlitInfo>
	{
		self.traffic.retire(node)
	}
	pub fn query_credits(&self, node:usize) -> Result<usize,Error>
	{
		self.traffic.query_credits(node)
	}
	pub fn space_to_send(&self, node:usize, size:usize) -> Result<bool,Error>
	{
		self.traffic.space_to_send(node,size)
	}
	pub fn stop_injection(&mut self)
	{
		self.traffic.stop_injection()
	}
	pub fn statistics(&self) -> &Statistics
	{
		self.traffic.statistics()
	}
	pub fn cycle(&self) -> usize
	{
		self.traffic.cycle()
	}
	///Runs while there is work. A sleeping engine is woken, since nobody else is going to give it work.
	///Host traffic is only done if `stop_injection` was called before. Otherwise this returns once the injected messages have been received.
	pub fn run(&mut self)
	{
		loop
		{
			if self.traffic.wants_wake()
			{
				self.traffic.wake();
			}
			if !self.traffic.step()
			{
				break;
			}
		}
		info!("simulation finished at cycle {} with {} flits retired",self.traffic.cycle(),self.traffic.retired_flits());
	}
	///The results as a `Result` object.
	pub fn result(&self) -> ConfigurationValue
	{
		let cycle=self.traffic.cycle();
		let mut result_content=vec![
			(String::from("cycle"),ConfigurationValue::Number(cycle as f64)),
		];
		result_content.extend(self.traffic.statistics().configuration_pairs(cycle));
		result_content.push((String::from("refused_packets"),ConfigurationValue::Number(self.traffic.statistics().refused_packets() as f64)));
		result_content.push((String::from("router_aggregated_statistics"),self.traffic.network().aggregate_statistics(cycle)));
		if self.traffic.network().routing().learnset_period().is_some()
		{
			result_content.push((String::from("explorations"),ConfigurationValue::Number(self.traffic.network().explorations() as f64)));
		}
		result_content.push((String::from("git_id"),ConfigurationValue::Literal(get_git_id().to_string())));
		ConfigurationValue::Object(String::from("Result"),result_content)
	}
	pub fn write_result(&self, output:&mut dyn Write) -> Result<(),Error>
	{
		writeln!(output,"{}",self.result()).map_err(|e|Error::undetermined(source_location!()).with_message(format!("could not write the result: {}",e)))
	}
}

impl Quantifiable for Simulation
{
	fn total_memory(&self) -> usize
	{
		size_of::<Self>()+self.traffic.network().total_memory()
	}
	fn print_memory_breakdown(&self)
	{
		println!("\nBegin memory report");
		println!("self : {}",size_of::<Self>());
		println!("flit : {}",size_of::<flit::Flit>());
		println!("packet : {}",size_of::<flit::Packet>());
		println!("event : {}",size_of::<event::Event>());
		println!("network total : {}",quantify::human_bytes(self.traffic.network().total_memory()));
		self.traffic.network().print_memory_breakdown();
		println!("End memory report\n");
	}
	fn forecast_total_memory(&self) -> usize
	{
		unimplemented!();
	}
}

/// Main when passed a configuration file as path.
/// Every experiment in the file is simulated and its result written to `results_file`, or to the standard output.
/// A configuration error is reported before any simulation starts.
pub fn file_main(path:&Path, mut results_file:Option<File>) -> Result<(),Error>
{
	let mut file=File::open(path).map_err(|e|Error::could_not_open_file(source_location!(),path.to_path_buf(),e))?;
	let mut contents=String::new();
	file.read_to_string(&mut contents).map_err(|e|Error::could_not_open_file(source_location!(),path.to_path_buf(),e))?;
	let parsed=parse_configuration(&contents).map_err(|e|{
		let message=e.message.clone().unwrap_or_default();
		Error::could_not_parse_file(source_location!(),path.to_path_buf()).with_message(message)
	})?;
	let experiments=match flatten_configuration_value(&parsed)?
	{
		ConfigurationValue::Experiments(experiments) => experiments,
		single => vec![single],
	};
	let configs=experiments.iter().map(SimulationConfig::new).collect::<Result<Vec<SimulationConfig>,Error>>()?;
	for (index,config) in configs.iter().enumerate()
	{
		info!("experiment {} of {}",index+1,configs.len());
		let mut simulation=match Simulation::new(config)
		{
			Ok(simulation) => simulation,
			Err(e) =>
			{
				error!("experiment {} could not be built: {}",index+1,e);
				return Err(e);
			},
		};
		simulation.run();
		match results_file
		{
			Some(ref mut f) => simulation.write_result(f)?,
			None => simulation.write_result(&mut stdout())?,
		};
	}
	Ok(())
}

/// Get a identifier of the git commit. It is of little use to someone using a frozen public version.
/// The value is fixed in the build script.
pub fn get_git_id() -> &'static str
{
	include_str!(concat!(env!("OUT_DIR"), "/generated_git_id"))
}


#[cfg(test)]
mod tests
{
	use super::*;

	fn simulation(text:&str) -> Simulation
	{
		let _ = env_logger::builder().is_test(true).try_init();
		let config=SimulationConfig::new(&parse_configuration(text).expect("parses")).expect("valid configuration");
		Simulation::new(&config).expect("builds")
	}

	#[test]
	fn results_are_written()
	{
		let mut simulation=simulation("Configuration{random_seed:2, warmup:100, measured:200, topology:Dragonfly{p:2,a:4,h:2,channel_latency:2,global_channel_latency:4}, router:InputQueued{virtual_channels:4,buffer_size:4,speculative:true}, routing:DGB{learnset_period:25}, traffic:Synthetic{pattern:GroupShift{shift:1},load:0.2,packet_size:2}, max_packet_size:4}");
		simulation.run();
		assert!(simulation.cycle()>=300);
		let mut output=vec![];
		simulation.write_result(&mut output).expect("writes to memory");
		let text=String::from_utf8(output).expect("utf8");
		assert!(text.starts_with("Result"));
		match simulation.result()
		{
			ConfigurationValue::Object(ref name,ref pairs) =>
			{
				assert_eq!(name,"Result");
				for field in ["cycle","router_aggregated_statistics","explorations","git_id"].iter()
				{
					assert!(pairs.iter().any(|(key,_)|key.as_str()==*field),"missing {}",field);
				}
			},
			ref other => panic!("result is {}",other),
		}
	}

	#[test]
	fn host_drives_the_simulation()
	{
		let mut simulation=simulation("Configuration{random_seed:4, topology:FlattenedButterfly{k:4,n:2,concentration:2,channel_latency:1}, router:InputQueued{virtual_channels:3,buffer_size:4}, routing:PAR, traffic:Trace, flit_size:8, max_packet_size:4}");
		let first=simulation.inject(0,31,40,0).expect("valid nodes");
		let second=simulation.inject(31,0,8,1).expect("valid nodes");
		assert!(simulation.inject(32,0,8,0).is_err());
		assert_eq!(simulation.query_credits(0).expect("valid node"),64-5);
		simulation.stop_injection();
		simulation.run();
		assert_eq!(simulation.retire(31).map(|info|info.message),Some(first));
		let info=simulation.retire(0).expect("received");
		assert_eq!(info.message,second);
		assert_eq!(info.class,1);
		assert!(!simulation.step_cycle());
		assert!(simulation.traffic().is_done());
	}

	#[test]
	fn idle_hosts_see_no_work()
	{
		let mut simulation=simulation("Configuration{random_seed:6, topology:Dragonfly{p:2,a:4,h:2,channel_latency:1,global_channel_latency:3}, router:InputQueued{virtual_channels:4,buffer_size:4}, routing:Minimal, traffic:Host, flit_size:8, max_packet_size:4}");
		assert!(!simulation.step_cycle());
		let message=simulation.inject(0,70,32,0).expect("valid nodes");
		simulation.run();
		assert!(!simulation.traffic().is_done());
		assert_eq!(simulation.retire(70).map(|info|info.message),Some(message));
		assert!(!simulation.step_cycle());
	}

	#[test]
	fn routings_check_their_virtual_channels()
	{
		let config=SimulationConfig::new(&parse_configuration("Configuration{random_seed:1, topology:FlattenedButterfly{k:4,n:2,concentration:2,channel_latency:1}, router:InputQueued{virtual_channels:2,buffer_size:4}, routing:PAR, traffic:Host}").expect("parses")).expect("valid configuration");
		match Simulation::new(&config)
		{
			Err(Error{kind:error::ErrorKind::InsufficientVirtualChannels{required:3,available:2,..},..}) => (),
			Err(other) => panic!("unexpected error {}",other),
			Ok(_) => panic!("PAR built with 2 virtual channels"),
		}
	}

	#[test]
	fn bad_files_are_errors()
	{
		assert!(file_main(Path::new("/nonexistent/caminos-flit.cfg"),None).is_err());
	}
}
