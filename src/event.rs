/*!

The events travelling through the channels of the network. Flits go forward, credits go backwards, and the learnsets of the bias learning routing go between routers of different groups.

An event is inserted with a delay of at least one cycle and it is processed at the begin or at the end of its cycle. Flit arrivals and credits are processed at the begin, so all of them are visible before any router arbitrates. Learnsets are processed at the end.

*/

use std::mem::size_of;
use quantifiable_derive::Quantifiable;//the derive macro
use crate::flit::FlitHandle;
use crate::learning::Learnset;
use crate::topology::Location;
use crate::quantify::Quantifiable;

///The events stored in the event queue.
#[derive(Clone,Debug)]
pub enum Event
{
	FlitToLocation{
		flit: FlitHandle,
		///Location by which the flit was sent.
		previous: Location,
		new: Location,
	},
	///A buffer slot has been freed downstream.
	Credit{
		///Location by which the flit was sent, whose credit counter is to be increased.
		location: Location,
		virtual_channel: usize,
	},
	Learnset{
		///The router receiving the learnset.
		router: usize,
		learnset: Learnset,
	},
}

impl Quantifiable for Event
{
	fn total_memory(&self) -> usize
	{
		let mut total=size_of::<Self>();
		if let &Event::Learnset{ref learnset,..} = self
		{
			total+=learnset.total_memory();
		}
		total
	}
	fn print_memory_breakdown(&self)
	{
		unimplemented!();
	}
	fn forecast_total_memory(&self) -> usize
	{
		unimplemented!();
	}
}

///This is used to sort the processing of the events inside a cycle.
///If some event occurs at Begin then its result will be visible for events at End. Specifically, we ensure that all the flits have arrived before arbitring.
///Currently at Begin: flit movements and credits.
///Currently at End: learnsets.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum CyclePosition
{
	Begin,
	End,
}

///Encapsulates a request for insertion on the event queue.
#[derive(Debug)]
pub struct EventGeneration
{
	///To insert the event after `delay` cycles.
	pub delay: usize,
	///Whether the event should be processed at the begin or the end of its cycle.
	pub position: CyclePosition,
	///The actual event to be inserted.
	pub event: Event,
}

///The event queue structure managing the insertion and extraction of events.
#[derive(Quantifiable)]
pub struct EventQueue
{
	event_begin_circle: Vec<Vec<Event>>,//Events to be processed at the beginning of a cycle (arrivals of flits and credits)
	event_end_circle: Vec<Vec<Event>>,//Events to be processed at the end of a cycle (learnsets)
	current: usize,
}

impl EventQueue
{
	///Creates a new EventQueue. `size` should be greater than any possible delay.
	pub fn new(size:usize) -> EventQueue
	{
		EventQueue{
			event_begin_circle: vec![ vec![] ; size ],
			event_end_circle: vec![ vec![] ; size ],
			current:0,
		}
	}
	///Advances the queue by a cycle. The events of the finished cycle must have been taken.
	pub fn advance(&mut self)
	{
		assert!(self.event_begin_circle[self.current].is_empty() && self.event_end_circle[self.current].is_empty(),"advancing the event queue with unprocessed events");
		//Better to drop the old Vec; otherwise their capacity is covering a lot of memory.
		self.event_begin_circle[self.current]=Vec::new();
		self.event_end_circle[self.current]=Vec::new();
		self.current=(self.current+1)%self.event_begin_circle.len();
	}
	///Takes the events to be executed at the begin of the current cycle, in insertion order.
	pub fn take_begin(&mut self) -> Vec<Event>
	{
		std::mem::take(&mut self.event_begin_circle[self.current])
	}
	///Takes the events to be executed at the end of the current cycle, in insertion order.
	pub fn take_end(&mut self) -> Vec<Event>
	{
		std::mem::take(&mut self.event_end_circle[self.current])
	}
	///Adds an event to the list of events to be executed at the begin of the cycle `current_cycle + delay`.
	pub fn enqueue_begin(&mut self, event:Event, delay: usize)
	{
		if delay==0 || delay>=self.event_begin_circle.len()
		{
			panic!("Delay {} out of the range of the event queue",delay);
		}
		let position=(self.current+delay)%self.event_begin_circle.len();
		self.event_begin_circle[position].push(event);
	}
	///Adds an event to the list of events to be executed at the end of the cycle `current_cycle + delay`.
	pub fn enqueue_end(&mut self, event:Event, delay: usize)
	{
		if delay==0 || delay>=self.event_end_circle.len()
		{
			panic!("Delay {} out of the range of the event queue",delay);
		}
		let position=(self.current+delay)%self.event_end_circle.len();
		self.event_end_circle[position].push(event);
	}
	///Adds an event as it requests.
	pub fn enqueue(&mut self, event_generation:EventGeneration)
	{
		match event_generation.position
		{
			CyclePosition::Begin => self.enqueue_begin(event_generation.event,event_generation.delay),
			CyclePosition::End => self.enqueue_end(event_generation.event,event_generation.delay),
		};
	}
	///Number of events waiting in the queue.
	pub fn pending(&self) -> usize
	{
		self.event_begin_circle.iter().chain(self.event_end_circle.iter()).map(|v|v.len()).sum()
	}
	///All the events waiting in the queue, in no particular order.
	pub fn events(&self) -> impl Iterator<Item=&Event>
	{
		self.event_begin_circle.iter().chain(self.event_end_circle.iter()).flat_map(|v|v.iter())
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn credit(virtual_channel:usize) -> Event
	{
		Event::Credit{location:Location::NodePort(0),virtual_channel}
	}

	#[test]
	fn events_wait_their_delay()
	{
		let mut queue=EventQueue::new(4);
		queue.enqueue(EventGeneration{delay:2,position:CyclePosition::Begin,event:credit(0)});
		queue.enqueue_begin(credit(1),1);
		queue.enqueue_begin(credit(2),1);
		queue.enqueue_end(credit(3),3);
		assert_eq!(queue.pending(),4);
		assert_eq!(queue.events().count(),4);
		assert!(queue.take_begin().is_empty());
		queue.advance();
		let events=queue.take_begin();
		let vcs:Vec<usize>=events.iter().map(|e|match e { &Event::Credit{virtual_channel,..} => virtual_channel, _ => panic!() }).collect();
		assert_eq!(vcs,vec![1,2]);
		queue.advance();
		assert_eq!(queue.take_begin().len(),1);
		queue.advance();
		assert!(queue.take_begin().is_empty());
		assert_eq!(queue.take_end().len(),1);
		queue.advance();
		assert_eq!(queue.pending(),0);
	}

	#[test]
	#[should_panic]
	fn too_long_delays_panic()
	{
		let mut queue=EventQueue::new(4);
		queue.enqueue_begin(credit(0),4);
	}
}
