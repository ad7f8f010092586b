
use quantifiable_derive::Quantifiable;//the derive macro
use crate::allocator::{Allocator,GrantedRequests,Request,RoundRobinArbiter};
use crate::quantify::Quantifiable;

/// An iSLIP allocator, more info 'https://doi.org/10.1109/90.769767'
/// Each resource grants to its preferred requesting client and each client accepts its preferred grant. Preference is by priority and then by the round-robin pointers.
/// The pointers only advance for the matches made in the first iteration.
#[derive(Debug,Quantifiable)]
pub struct IslipAllocator
{
	/// The number of inputs
	num_clients: usize,
	/// The number of outputs
	num_resources: usize,
	/// The number of iterations to perform
	num_iterations: usize,
	/// `(resource,priority)` requested by each client.
	in_requests: Vec<Vec<(usize,usize)>>,
	/// `(client,priority)` requesting each resource.
	out_requests: Vec<Vec<(usize,usize)>>,
	/// The accept pointer of each client.
	accept: Vec<RoundRobinArbiter>,
	/// The grant pointer of each resource.
	grant: Vec<RoundRobinArbiter>,
}

impl IslipAllocator
{
	pub fn new(num_clients:usize, num_resources:usize, num_iterations:usize) -> IslipAllocator
	{
		if num_clients==0 || num_resources==0 || num_iterations==0
		{
			panic!("Invalid arguments for IslipAllocator");
		}
		IslipAllocator{
			num_clients,
			num_resources,
			num_iterations,
			in_requests: vec![vec![];num_clients],
			out_requests: vec![vec![];num_resources],
			accept: vec![RoundRobinArbiter::new(num_resources);num_clients],
			grant: vec![RoundRobinArbiter::new(num_clients);num_resources],
		}
	}
}

impl Allocator for IslipAllocator
{
	fn num_clients(&self) -> usize
	{
		self.num_clients
	}
	fn num_resources(&self) -> usize
	{
		self.num_resources
	}
	/// # Panics
	/// If the client or the resource are out of range.
	fn add_request(&mut self, request: Request)
	{
		if request.client>=self.num_clients || request.resource>=self.num_resources
		{
			panic!("The request {:?} is not valid",request);
		}
		self.in_requests[request.client].push((request.resource,request.priority));
		self.out_requests[request.resource].push((request.client,request.priority));
	}
	fn perform_allocation(&mut self) -> GrantedRequests
	{
		let mut gr=GrantedRequests::default();
		let mut in_match:Vec<Option<usize>>=vec![None;self.num_clients];
		let mut out_match:Vec<Option<usize>>=vec![None;self.num_resources];
		for islip_iter in 0..self.num_iterations
		{
			//Grant phase: the client granted by each free resource, with the priority of its request.
			let mut grants:Vec<Option<(usize,usize)>>=vec![None;self.num_resources];
			for resource in 0..self.num_resources
			{
				if out_match[resource].is_some()
				{
					continue;
				}
				let candidates=self.out_requests[resource].iter().filter(|&&(client,_)|in_match[client].is_none()).cloned();
				if let Some(client)=self.grant[resource].arbitrate(candidates)
				{
					let priority=self.out_requests[resource].iter().filter(|&&(c,_)|c==client).map(|&(_,p)|p).max().unwrap_or(0);
					grants[resource]=Some((client,priority));
				}
			}
			//Accept phase
			let mut progress=false;
			for client in 0..self.num_clients
			{
				if in_match[client].is_some()
				{
					continue;
				}
				let candidates=(0..self.num_resources).filter_map(|resource|match grants[resource]
				{
					Some((c,priority)) if c==client => Some((resource,priority)),
					_ => None,
				});
				if let Some(resource)=self.accept[client].arbitrate(candidates)
				{
					progress=true;
					in_match[client]=Some(resource);
					out_match[resource]=Some(client);
					let priority=grants[resource].map(|(_,p)|p).unwrap_or(0);
					gr.add_granted_request(Request{client,resource,priority});
					//only update pointers if accepted during the 1st iteration, to avoid starvation.
					if islip_iter==0
					{
						self.accept[client].update(resource);
						self.grant[resource].update(client);
					}
				}
			}
			if !progress
			{
				break;
			}
		}
		for requests in self.in_requests.iter_mut().chain(self.out_requests.iter_mut())
		{
			requests.clear();
		}
		gr
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn matching_is_valid()
	{
		let mut allocator=IslipAllocator::new(3,3,3);
		for client in 0..3
		{
			for resource in 0..3
			{
				allocator.add_request(Request{client,resource,priority:0});
			}
		}
		let granted:Vec<Request>=allocator.perform_allocation().into_iter().collect();
		//With as many iterations as clients iSLIP finds a maximal matching, which here is perfect.
		assert_eq!(granted.len(),3);
		let mut clients:Vec<usize>=granted.iter().map(|r|r.client).collect();
		let mut resources:Vec<usize>=granted.iter().map(|r|r.resource).collect();
		clients.sort();
		resources.sort();
		assert_eq!(clients,vec![0,1,2]);
		assert_eq!(resources,vec![0,1,2]);
		//Requests are forgotten after the allocation.
		assert!(allocator.perform_allocation().granted_requests.is_empty());
	}

	#[test]
	fn contention_is_fair()
	{
		let mut allocator=IslipAllocator::new(4,1,1);
		let mut wins=vec![0;4];
		for _ in 0..100
		{
			for client in 0..4
			{
				allocator.add_request(Request{client,resource:0,priority:0});
			}
			for request in allocator.perform_allocation()
			{
				wins[request.client]+=1;
			}
		}
		assert_eq!(wins,vec![25;4]);
	}

	#[test]
	fn priority_is_respected()
	{
		let mut allocator=IslipAllocator::new(2,1,1);
		for _ in 0..10
		{
			allocator.add_request(Request{client:0,resource:0,priority:0});
			allocator.add_request(Request{client:1,resource:0,priority:1});
			let granted:Vec<Request>=allocator.perform_allocation().into_iter().collect();
			assert_eq!(granted,vec![Request{client:1,resource:0,priority:1}]);
		}
	}
}
