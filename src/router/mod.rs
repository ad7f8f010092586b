/*!

The routers of the network and the state they keep about their neighbours.

A router only knows the credits of the buffers of its neighbours. Any other information about other routers, such as the queues of the look-ahead router used by the adaptive routings, is read from the `OccupancySnapshot` taken by the network at the beginning of each cycle.

*/

mod input_queued;

use quantifiable_derive::Quantifiable;//the derive macro
use crate::quantify::Quantifiable;
pub use self::input_queued::{CycleContext,Router,RouterStatistics};

///The credits that a router has for the buffers of the next router by one of its output ports. One counter per virtual channel.
///The ports towards nodes are unlimited, since the nodes always accept the flits.
#[derive(Clone,Debug,Quantifiable)]
pub struct CreditTracker
{
	///The known available space in the next router by the given index (virtual channel).
	credits: Vec<usize>,
	depth: usize,
	unlimited: bool,
}

impl CreditTracker
{
	pub fn new(virtual_channels:usize, depth:usize) -> CreditTracker
	{
		CreditTracker{
			credits: vec![depth;virtual_channels],
			depth,
			unlimited: false,
		}
	}
	pub fn unlimited(virtual_channels:usize) -> CreditTracker
	{
		CreditTracker{
			credits: vec![0;virtual_channels],
			depth: 0,
			unlimited: true,
		}
	}
	pub fn is_unlimited(&self) -> bool
	{
		self.unlimited
	}
	pub fn depth(&self) -> usize
	{
		self.depth
	}
	pub fn available(&self, virtual_channel:usize) -> usize
	{
		self.credits[virtual_channel]
	}
	pub fn has_credit(&self, virtual_channel:usize) -> bool
	{
		self.unlimited || self.credits[virtual_channel]>0
	}
	///Take a credit to send a flit.
	pub fn consume(&mut self, virtual_channel:usize)
	{
		if self.unlimited
		{
			return;
		}
		if self.credits[virtual_channel]==0
		{
			panic!("sending a flit by virtual channel {} without credits",virtual_channel);
		}
		self.credits[virtual_channel]-=1;
	}
	///Receive a credit of a flit that has left the next buffer.
	pub fn restore(&mut self, virtual_channel:usize)
	{
		if self.unlimited
		{
			return;
		}
		if self.credits[virtual_channel]>=self.depth
		{
			panic!("credit overflow at virtual channel {}, the buffer has only {} slots",virtual_channel,self.depth);
		}
		self.credits[virtual_channel]+=1;
	}
	///Slots of the next buffer known as occupied.
	pub fn used(&self, virtual_channel:usize) -> usize
	{
		if self.unlimited { 0 } else { self.depth-self.credits[virtual_channel] }
	}
	///Slots known as occupied in all the virtual channels.
	pub fn used_total(&self) -> usize
	{
		(0..self.credits.len()).map(|vc|self.used(vc)).sum()
	}
}

///The occupancy of every output port of every router, as seen at the beginning of the cycle.
#[derive(Clone,Debug,Default,Quantifiable)]
pub struct OccupancySnapshot
{
	///Used credits summed over the virtual channels, indexed by `[router][port]`.
	used: Vec<Vec<usize>>,
	///Flits sent by the port that have not yet arrived to the next router.
	in_flight: Vec<Vec<usize>>,
}

impl OccupancySnapshot
{
	pub fn new() -> OccupancySnapshot
	{
		OccupancySnapshot::default()
	}
	///Replace the values of a router.
	pub fn record(&mut self, router_index:usize, used:Vec<usize>, in_flight:Vec<usize>)
	{
		if self.used.len()<=router_index
		{
			self.used.resize(router_index+1,vec![]);
			self.in_flight.resize(router_index+1,vec![]);
		}
		self.used[router_index]=used;
		self.in_flight[router_index]=in_flight;
	}
	///Queue at the port, the flits already sent included.
	pub fn queue(&self, router_index:usize, port:usize) -> usize
	{
		self.used[router_index][port]
	}
	pub fn in_flight(&self, router_index:usize, port:usize) -> usize
	{
		self.in_flight[router_index][port]
	}
	///Queue at the port without the flits still travelling through the channel.
	pub fn net_queue(&self, router_index:usize, port:usize) -> usize
	{
		self.used[router_index][port].saturating_sub(self.in_flight[router_index][port])
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn credits_stay_in_range()
	{
		let mut tracker=CreditTracker::new(2,3);
		assert!(tracker.has_credit(0));
		tracker.consume(0);
		tracker.consume(0);
		tracker.consume(0);
		assert!(!tracker.has_credit(0));
		assert!(tracker.has_credit(1));
		assert_eq!(tracker.used(0),3);
		assert_eq!(tracker.used_total(),3);
		tracker.restore(0);
		assert_eq!(tracker.available(0),1);
	}

	#[test]
	#[should_panic]
	fn consuming_without_credit_panics()
	{
		let mut tracker=CreditTracker::new(1,1);
		tracker.consume(0);
		tracker.consume(0);
	}

	#[test]
	#[should_panic]
	fn credit_overflow_panics()
	{
		let mut tracker=CreditTracker::new(1,1);
		tracker.restore(0);
	}

	#[test]
	fn unlimited_ports_never_stall()
	{
		let mut tracker=CreditTracker::unlimited(2);
		for _ in 0..100
		{
			assert!(tracker.has_credit(1));
			tracker.consume(1);
		}
		assert_eq!(tracker.used_total(),0);
	}

	#[test]
	fn snapshot_discounts_in_flight()
	{
		let mut snapshot=OccupancySnapshot::new();
		snapshot.record(1,vec![0,4,2],vec![0,1,3]);
		assert_eq!(snapshot.queue(1,1),4);
		assert_eq!(snapshot.net_queue(1,1),3);
		assert_eq!(snapshot.net_queue(1,2),0);
	}
}
