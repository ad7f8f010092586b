/*!
 * A Allocator defines the interface for an allocation strategy for a router crossbar.
 * The routers use an `IslipAllocator` to match input virtual channels with output virtual channels, and a `RoundRobinArbiter` per port for the stages of the separable switch allocation.
*/

pub mod islip;
pub mod round_robin;

use crate::quantify::Quantifiable;
pub use self::islip::IslipAllocator;
pub use self::round_robin::RoundRobinArbiter;

/// A client (input of crossbar) want a resource (output of crossbar) with a certain priority.
/// Requests of greater priority are considered before any request of lower priority.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Request
{
	/// The input of the crossbar
	pub client: usize,
	/// The output of the crossbar
	pub resource: usize,
	/// The priority of the request
	pub priority: usize,
}

/// A collection of granted requests (i.e. the requests that have been granted)
#[derive(Debug,Default)]
pub struct GrantedRequests
{
	pub granted_requests: Vec<Request>,
}

impl GrantedRequests
{
	pub fn add_granted_request(&mut self, request:Request)
	{
		self.granted_requests.push(request);
	}
}

impl IntoIterator for GrantedRequests
{
	type Item=Request;
	type IntoIter=std::vec::IntoIter<Request>;
	fn into_iter(self) -> Self::IntoIter
	{
		self.granted_requests.into_iter()
	}
}

pub trait Allocator : Quantifiable
{
	/// Get number of clients
	fn num_clients(&self) -> usize;
	/// Get number of resources
	fn num_resources(&self) -> usize;
	/// Add a request
	fn add_request(&mut self, request: Request);
	/// Returns the granted requests and clear the client's requests.
	/// Each client gets at most a resource and each resource is given to at most a client.
	fn perform_allocation(&mut self) -> GrantedRequests;
}
