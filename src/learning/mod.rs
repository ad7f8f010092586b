/*!

Learning of the bias used by the DGB routing.

Each router owns a `CongestionBiasLearner`. When the router takes an adaptive decision it registers an estimation of the latency of the path taken and trains the bias of the pair (destination router, non-minimal port) from the estimations of both kinds of paths.
The estimations are corrected with the differentials measured at the destination routers, which send them back to the deciding routers inside `Learnset`s.

*/

mod bias;

use quantifiable_derive::Quantifiable;//the derive macro
use crate::flit::DecisionSample;
use crate::quantify::Quantifiable;
pub use self::bias::CongestionBiasLearner;

///Hyperparameters of the `CongestionBiasLearner`.
#[derive(Clone,Debug,PartialEq,Quantifiable)]
pub struct LearnerParameters
{
	pub learning_rate: f64,
	///Scales the channel difference into the exploration step.
	pub explore_rate: f64,
	///Cycles after which a pair is trained even without enough samples.
	pub epoch: usize,
	///Number of minimal latency samples kept per destination.
	pub history: usize,
	///Flits that fit in the buffers of a local port of the neighbour.
	pub max_local_buffer: usize,
	///Flits that fit in the buffers of a global port of the neighbour. In topologies without global links, of any port.
	pub max_global_buffer: usize,
}

impl LearnerParameters
{
	///Parameters with the usual rates for buffers of the given capacities.
	pub fn new(max_local_buffer:usize, max_global_buffer:usize) -> LearnerParameters
	{
		LearnerParameters{
			learning_rate: 0.25,
			explore_rate: 0.25,
			epoch: 50,
			history: 5,
			max_local_buffer,
			max_global_buffer,
		}
	}
}

///The differentials measured at a router for the packets decided at another router.
#[derive(Clone,Debug,PartialEq,Quantifiable)]
pub struct Learnset
{
	///The router that measured the differentials, the destination of the packets.
	pub origin_router: usize,
	pub generation_cycle: usize,
	///Differential of the last minimally routed packet.
	pub minimal: Option<f64>,
	///Average differential of the non-minimally routed packets, for each non-minimal port of the deciding router.
	pub nonminimal: Vec<(usize,f64)>,
}

///Everything the learner needs from an adaptive decision to train its bias.
#[derive(Clone,Copy,Debug)]
pub struct TrainingInput<'a>
{
	pub sample: &'a DecisionSample,
	///The minimal port is a global channel.
	pub minimal_port_is_global: bool,
	///The extra channel length of the non-minimal route, as given by `Topology::channel_difference`.
	pub channel_difference: usize,
}
