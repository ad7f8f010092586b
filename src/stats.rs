/*!

Statistics of a simulation, as reported to the host and written into the result.

Latencies are only accounted for the packets created during the measurement. Sent and accepted counters include every flit that enters or leaves the network during the measurement, whatever its creation cycle.

*/

use quantifiable_derive::Quantifiable;//the derive macro
use crate::config_parser::ConfigurationValue;
use crate::flit::{Flit,Packet};
use crate::quantify::Quantifiable;

///Minimum, average and maximum of a sequence of samples.
#[derive(Clone,Debug,Default,PartialEq,Quantifiable)]
pub struct LatencyStatistic
{
	count: usize,
	total: usize,
	minimum: Option<usize>,
	maximum: Option<usize>,
}

impl LatencyStatistic
{
	pub fn new() -> LatencyStatistic
	{
		LatencyStatistic::default()
	}
	pub fn add(&mut self, value:usize)
	{
		self.count+=1;
		self.total+=value;
		self.minimum=Some(self.minimum.map_or(value,|m|m.min(value)));
		self.maximum=Some(self.maximum.map_or(value,|m|m.max(value)));
	}
	pub fn count(&self) -> usize
	{
		self.count
	}
	pub fn minimum(&self) -> Option<usize>
	{
		self.minimum
	}
	pub fn maximum(&self) -> Option<usize>
	{
		self.maximum
	}
	///`None` without samples.
	pub fn average(&self) -> Option<f64>
	{
		if self.count==0
		{
			None
		}
		else
		{
			Some(self.total as f64/self.count as f64)
		}
	}
	fn configuration_value(&self) -> ConfigurationValue
	{
		let number=|x:Option<f64>|match x
		{
			Some(x) => ConfigurationValue::Number(x),
			None => ConfigurationValue::None,
		};
		ConfigurationValue::Object(String::from("Latency"),vec![
			(String::from("minimum"),number(self.minimum.map(|x|x as f64))),
			(String::from("average"),number(self.average())),
			(String::from("maximum"),number(self.maximum.map(|x|x as f64))),
			(String::from("count"),ConfigurationValue::Number(self.count as f64)),
		])
	}
}

///Everything measured for a class of traffic.
#[derive(Clone,Debug,Default,Quantifiable)]
pub struct ClassStatistics
{
	///From the creation of the packet to the arrival of its tail.
	pub packet_latency: LatencyStatistic,
	///From the departure of the head from the first router to its arrival to the last router.
	pub network_latency: LatencyStatistic,
	///From the creation of the packet to the arrival of each flit.
	pub flit_latency: LatencyStatistic,
	///Router to router hops of each packet.
	pub hops: LatencyStatistic,
	pub sent_flits: usize,
	pub accepted_flits: usize,
	pub sent_packets: usize,
	pub accepted_packets: usize,
}

impl ClassStatistics
{
	fn configuration_value(&self, class:usize, cycles:usize, num_nodes:usize) -> ConfigurationValue
	{
		let rate=|flits:usize|flits as f64/cycles.max(1) as f64/num_nodes.max(1) as f64;
		ConfigurationValue::Object(String::from("Class"),vec![
			(String::from("class"),ConfigurationValue::Number(class as f64)),
			(String::from("packet_latency"),self.packet_latency.configuration_value()),
			(String::from("network_latency"),self.network_latency.configuration_value()),
			(String::from("flit_latency"),self.flit_latency.configuration_value()),
			(String::from("hops"),self.hops.configuration_value()),
			(String::from("sent_flits"),ConfigurationValue::Number(self.sent_flits as f64)),
			(String::from("accepted_flits"),ConfigurationValue::Number(self.accepted_flits as f64)),
			(String::from("sent_packets"),ConfigurationValue::Number(self.sent_packets as f64)),
			(String::from("accepted_packets"),ConfigurationValue::Number(self.accepted_packets as f64)),
			(String::from("injected_load"),ConfigurationValue::Number(rate(self.sent_flits))),
			(String::from("accepted_load"),ConfigurationValue::Number(rate(self.accepted_flits))),
		])
	}
}

///A periodic record of the progress of the simulation.
#[derive(Clone,Debug,PartialEq,Quantifiable)]
pub struct Snapshot
{
	pub cycle: usize,
	///Flits sent in the period.
	pub sent_flits: usize,
	///Flits accepted in the period.
	pub accepted_flits: usize,
	///Flits in the network at the end of the period.
	pub in_flight: usize,
}

///All the statistics of a simulation.
#[derive(Clone,Debug,Quantifiable)]
pub struct Statistics
{
	///The first cycle of the measurement.
	begin_cycle: usize,
	classes: Vec<ClassStatistics>,
	sent_flits_per_node: Vec<usize>,
	accepted_flits_per_node: Vec<usize>,
	///Synthetic packets not generated because the injection queue was full.
	refused_packets: usize,
	snapshots: Vec<Snapshot>,
	///Counters of the current period.
	period_sent: usize,
	period_accepted: usize,
}

impl Statistics
{
	pub fn new(num_nodes:usize, classes:usize) -> Statistics
	{
		Statistics{
			begin_cycle: 0,
			classes: vec![ClassStatistics::default();classes.max(1)],
			sent_flits_per_node: vec![0;num_nodes],
			accepted_flits_per_node: vec![0;num_nodes],
			refused_packets: 0,
			snapshots: vec![],
			period_sent: 0,
			period_accepted: 0,
		}
	}
	///Forget everything measured. The next measurement begins at `cycle`.
	pub fn reset(&mut self, cycle:usize)
	{
		let num_nodes=self.sent_flits_per_node.len();
		let classes=self.classes.len();
		let snapshots=std::mem::take(&mut self.snapshots);
		*self=Statistics::new(num_nodes,classes);
		self.begin_cycle=cycle;
		self.snapshots=snapshots;
	}
	pub fn begin_cycle(&self) -> usize
	{
		self.begin_cycle
	}
	///The statistics of a class, if any flit of it has been seen.
	pub fn class(&self, class:usize) -> Option<&ClassStatistics>
	{
		self.classes.get(class)
	}
	pub fn num_classes(&self) -> usize
	{
		self.classes.len()
	}
	fn class_mut(&mut self, class:usize) -> &mut ClassStatistics
	{
		if class>=self.classes.len()
		{
			self.classes.resize(class+1,ClassStatistics::default());
		}
		&mut self.classes[class]
	}
	pub fn snapshots(&self) -> &[Snapshot]
	{
		&self.snapshots
	}
	pub fn refused_packets(&self) -> usize
	{
		self.refused_packets
	}
	///A flit of `packet` has entered the network from `node`.
	pub fn track_sent_flit(&mut self, node:usize, packet:&Packet, is_head:bool)
	{
		self.period_sent+=1;
		self.sent_flits_per_node[node]+=1;
		let class=self.class_mut(packet.class);
		class.sent_flits+=1;
		if is_head
		{
			class.sent_packets+=1;
		}
	}
	///A flit has arrived to its destination.
	pub fn track_accepted_flit(&mut self, flit:&Flit)
	{
		self.period_accepted+=1;
		let packet=flit.packet.as_ref();
		self.accepted_flits_per_node[packet.destination]+=1;
		let class=self.class_mut(packet.class);
		class.accepted_flits+=1;
		if flit.is_tail()
		{
			class.accepted_packets+=1;
		}
	}
	///Latencies of a flit of a packet created during the measurement.
	pub fn track_latency(&mut self, flit:&Flit, cycle:usize)
	{
		let packet=flit.packet.as_ref();
		let class=self.class_mut(packet.class);
		let latency=cycle.saturating_sub(packet.creation_cycle);
		class.flit_latency.add(latency);
		if flit.is_tail()
		{
			class.packet_latency.add(latency);
			if let Some(network_latency)=packet.network_latency()
			{
				class.network_latency.add(network_latency);
			}
			class.hops.add(packet.routing_info.borrow().hops);
		}
	}
	pub fn track_refused_packet(&mut self)
	{
		self.refused_packets+=1;
	}
	///Closes a period, returning its record.
	pub fn take_snapshot(&mut self, cycle:usize, in_flight:usize) -> Snapshot
	{
		let snapshot=Snapshot{
			cycle,
			sent_flits: std::mem::replace(&mut self.period_sent,0),
			accepted_flits: std::mem::replace(&mut self.period_accepted,0),
			in_flight,
		};
		self.snapshots.push(snapshot.clone());
		snapshot
	}
	///Total flits accepted by all the classes.
	pub fn accepted_flits(&self) -> usize
	{
		self.classes.iter().map(|class|class.accepted_flits).sum()
	}
	pub fn sent_flits(&self) -> usize
	{
		self.classes.iter().map(|class|class.sent_flits).sum()
	}
	///Minimum, average and maximum of the flits accepted per node and cycle, until `cycle`.
	pub fn accepted_rates(&self, cycle:usize) -> (f64,f64,f64)
	{
		rates(&self.accepted_flits_per_node,cycle.saturating_sub(self.begin_cycle))
	}
	pub fn sent_rates(&self, cycle:usize) -> (f64,f64,f64)
	{
		rates(&self.sent_flits_per_node,cycle.saturating_sub(self.begin_cycle))
	}
	///The fields of the result about the traffic.
	pub fn configuration_pairs(&self, cycle:usize) -> Vec<(String,ConfigurationValue)>
	{
		let cycles=cycle.saturating_sub(self.begin_cycle);
		let num_nodes=self.sent_flits_per_node.len();
		let rates_value=|(minimum,average,maximum):(f64,f64,f64)|ConfigurationValue::Object(String::from("Rates"),vec![
			(String::from("minimum"),ConfigurationValue::Number(minimum)),
			(String::from("average"),ConfigurationValue::Number(average)),
			(String::from("maximum"),ConfigurationValue::Number(maximum)),
		]);
		let mut pairs=vec![
			(String::from("measured_cycles"),ConfigurationValue::Number(cycles as f64)),
			(String::from("classes"),ConfigurationValue::Array(self.classes.iter().enumerate().map(|(index,class)|class.configuration_value(index,cycles,num_nodes)).collect())),
			(String::from("node_injected_load"),rates_value(self.sent_rates(cycle))),
			(String::from("node_accepted_load"),rates_value(self.accepted_rates(cycle))),
			(String::from("refused_packets"),ConfigurationValue::Number(self.refused_packets as f64)),
		];
		if !self.snapshots.is_empty()
		{
			pairs.push((String::from("temporal_statistics"),ConfigurationValue::Array(self.snapshots.iter().map(|snapshot|ConfigurationValue::Object(String::from("Snapshot"),vec![
				(String::from("cycle"),ConfigurationValue::Number(snapshot.cycle as f64)),
				(String::from("sent_flits"),ConfigurationValue::Number(snapshot.sent_flits as f64)),
				(String::from("accepted_flits"),ConfigurationValue::Number(snapshot.accepted_flits as f64)),
				(String::from("in_flight"),ConfigurationValue::Number(snapshot.in_flight as f64)),
			])).collect())));
		}
		pairs
	}
}

fn rates(flits_per_node:&[usize], cycles:usize) -> (f64,f64,f64)
{
	if flits_per_node.is_empty() || cycles==0
	{
		return (0.0,0.0,0.0);
	}
	let cycles=cycles as f64;
	let minimum=flits_per_node.iter().cloned().min().unwrap_or(0) as f64/cycles;
	let maximum=flits_per_node.iter().cloned().max().unwrap_or(0) as f64/cycles;
	let average=flits_per_node.iter().sum::<usize>() as f64/cycles/flits_per_node.len() as f64;
	(minimum,average,maximum)
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn latency_extremes()
	{
		let mut statistic=LatencyStatistic::new();
		assert_eq!(statistic.average(),None);
		for &x in [7,3,11].iter()
		{
			statistic.add(x);
		}
		assert_eq!(statistic.minimum(),Some(3));
		assert_eq!(statistic.maximum(),Some(11));
		assert_eq!(statistic.average(),Some(7.0));
		assert_eq!(statistic.count(),3);
	}

	#[test]
	fn node_rates()
	{
		assert_eq!(rates(&[10,20,30],10),(1.0,2.0,3.0));
		assert_eq!(rates(&[10,20,30],0),(0.0,0.0,0.0));
	}

	#[test]
	fn reset_keeps_snapshots()
	{
		let mut statistics=Statistics::new(4,2);
		statistics.track_refused_packet();
		statistics.take_snapshot(100,3);
		statistics.reset(100);
		assert_eq!(statistics.begin_cycle(),100);
		assert_eq!(statistics.refused_packets(),0);
		assert_eq!(statistics.snapshots().len(),1);
		assert_eq!(statistics.num_classes(),2);
	}
}
