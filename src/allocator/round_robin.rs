
use quantifiable_derive::Quantifiable;//the derive macro
use crate::quantify::Quantifiable;

///Chooses among `size` candidates, starting after the last winner.
///The pointer only moves when the caller confirms the winner was actually used, so a candidate that loses later stages keeps its turn.
#[derive(Clone,Debug,Quantifiable)]
pub struct RoundRobinArbiter
{
	pointer: usize,
	size: usize,
}

impl RoundRobinArbiter
{
	pub fn new(size:usize) -> RoundRobinArbiter
	{
		RoundRobinArbiter{
			pointer: 0,
			size,
		}
	}
	///Distance from the pointer, lower is preferred.
	pub fn rank(&self, candidate:usize) -> usize
	{
		(candidate+self.size-self.pointer)%self.size
	}
	///The candidate with the greatest priority, ties broken by the round-robin order. The candidates are `(index,priority)` pairs.
	pub fn arbitrate<I:IntoIterator<Item=(usize,usize)>>(&self, candidates:I) -> Option<usize>
	{
		candidates.into_iter()
			.max_by_key(|&(candidate,priority)|(priority,self.size-self.rank(candidate)))
			.map(|(candidate,_)|candidate)
	}
	///Make `winner` the least preferred in the next arbitrations.
	pub fn update(&mut self, winner:usize)
	{
		self.pointer=(winner+1)%self.size;
	}
}
