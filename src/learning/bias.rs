
use std::cell::RefCell;
use std::collections::VecDeque;
use ::rand::rngs::StdRng;
use ::rand::Rng;
use quantifiable_derive::Quantifiable;//the derive macro
use super::{Learnset,LearnerParameters,TrainingInput};
use crate::flit::DecisionSample;
use crate::quantify::Quantifiable;

///The bias learner of a router.
///Entries are indexed by the destination router of the decisions and the non-minimal output port.
#[derive(Debug,Quantifiable)]
pub struct CongestionBiasLearner
{
	router_index: usize,
	parameters: LearnerParameters,
	///Whether the estimations include the queue at the global channel of the look-ahead router.
	with_global_queues: bool,
	bias: Vec<Vec<f64>>,
	explored: Vec<Vec<bool>>,
	last_training: Vec<Vec<usize>>,
	///Estimated latencies of the last minimal decisions, per destination router.
	minimal_samples: Vec<VecDeque<usize>>,
	nonminimal_sum: Vec<Vec<usize>>,
	nonminimal_count: Vec<Vec<usize>>,
	///Differentials measured here, to be sent to the router that decided. Indexed by that router.
	outgoing_minimal: Vec<Option<f64>>,
	///Indexed by the deciding router, its non-minimal port and the slot of the intermediate.
	outgoing_nonminimal: Vec<Vec<Vec<Option<f64>>>>,
	///Differentials received from the destination routers.
	received_minimal: Vec<Option<f64>>,
	received_nonminimal: Vec<Vec<Option<f64>>>,
	latest_learnset: Vec<Option<usize>>,
	///Number of training steps replaced by an exploration step.
	explorations: usize,
}

impl CongestionBiasLearner
{
	///A learner for the router `router_index`, with `ports` output ports, in a network of `num_routers`.
	pub fn new(router_index:usize, num_routers:usize, ports:usize, slots:usize, with_global_queues:bool, parameters:LearnerParameters) -> CongestionBiasLearner
	{
		CongestionBiasLearner{
			router_index,
			parameters,
			with_global_queues,
			bias: vec![vec![0.0;ports];num_routers],
			explored: vec![vec![false;ports];num_routers],
			last_training: vec![vec![0;ports];num_routers],
			minimal_samples: vec![VecDeque::new();num_routers],
			nonminimal_sum: vec![vec![0;ports];num_routers],
			nonminimal_count: vec![vec![0;ports];num_routers],
			outgoing_minimal: vec![None;num_routers],
			outgoing_nonminimal: vec![vec![vec![None;slots.max(1)];ports];num_routers],
			received_minimal: vec![None;num_routers],
			received_nonminimal: vec![vec![None;ports];num_routers],
			latest_learnset: vec![None;num_routers],
			explorations: 0,
		}
	}
	pub fn router_index(&self) -> usize
	{
		self.router_index
	}
	///The current bias towards `destination_router` by `port`, rounded. Untouched entries are 0.
	pub fn bias(&self, destination_router:usize, port:usize) -> i64
	{
		self.bias[destination_router][port].round() as i64
	}
	///Whether the last training of the entry was an exploration. Reading it clears the flag.
	pub fn take_explored(&mut self, destination_router:usize, port:usize) -> bool
	{
		std::mem::replace(&mut self.explored[destination_router][port],false)
	}
	pub fn explorations(&self) -> usize
	{
		self.explorations
	}
	pub fn reset_statistics(&mut self)
	{
		self.explorations=0;
	}
	pub fn reset_bias(&mut self, destination_router:usize)
	{
		for value in self.bias[destination_router].iter_mut()
		{
			*value=0.0;
		}
	}
	pub fn reset_all_bias(&mut self)
	{
		for destination_router in 0..self.bias.len()
		{
			self.reset_bias(destination_router);
		}
	}
	///Average of the minimal samples and number of them.
	fn minimal_average(&self, destination_router:usize) -> (f64,usize)
	{
		let samples=&self.minimal_samples[destination_router];
		if samples.is_empty()
		{
			return (0.0,0);
		}
		(samples.iter().sum::<usize>() as f64/samples.len() as f64,samples.len())
	}
	fn nonminimal_average(&self, destination_router:usize, port:usize) -> (f64,usize)
	{
		let count=self.nonminimal_count[destination_router][port];
		if count==0
		{
			return (0.0,0);
		}
		(self.nonminimal_sum[destination_router][port] as f64/count as f64,count)
	}
	///The differential received from `destination_router` for minimal routes. 0 when nothing has been received.
	pub fn received_minimal_difference(&self, destination_router:usize) -> f64
	{
		self.received_minimal[destination_router].unwrap_or(0.0)
	}
	///The differential received from `destination_router` for the routes through `port`. 0 when nothing has been received.
	pub fn received_nonminimal_difference(&self, destination_router:usize, port:usize) -> f64
	{
		self.received_nonminimal[destination_router][port].unwrap_or(0.0)
	}
	///Latency estimated from the state at a decision, corrected by the received differentials if any.
	fn estimate(&self, sample:&DecisionSample, minimal:bool) -> usize
	{
		let destination=sample.destination_router;
		let (queue,global_queue,hops,difference) = if minimal
		{
			(sample.minimal_queue,sample.minimal_global_queue,sample.minimal_hops,self.received_minimal[destination])
		}
		else
		{
			(sample.nonminimal_queue,sample.nonminimal_global_queue,sample.nonminimal_hops,self.received_nonminimal[destination][sample.nonminimal_port])
		};
		let estimate = match difference
		{
			Some(difference) => (queue+global_queue+hops) as f64 + difference,
			None => (hops*queue) as f64,
		};
		if estimate < hops as f64 { hops } else { estimate.round() as usize }
	}
	///Registers the estimated latency of the path taken in a decision made at this router.
	pub fn register_decision(&mut self, sample:&DecisionSample, minimal:bool)
	{
		let latency=self.estimate(sample,minimal);
		let destination=sample.destination_router;
		if minimal
		{
			let samples=&mut self.minimal_samples[destination];
			samples.push_back(latency);
			while samples.len()>self.parameters.history
			{
				samples.pop_front();
			}
		}
		else
		{
			self.nonminimal_sum[destination][sample.nonminimal_port]+=latency;
			self.nonminimal_count[destination][sample.nonminimal_port]+=1;
		}
	}
	///The estimated latency of the non-minimal route when no sample of it is available.
	fn emergency_nonminimal(&self, sample:&DecisionSample) -> f64
	{
		match self.received_nonminimal[sample.destination_router][sample.nonminimal_port]
		{
			Some(difference) => (sample.nonminimal_queue+sample.nonminimal_global_queue+sample.nonminimal_hops) as f64 + difference,
			None if self.with_global_queues => (sample.nonminimal_queue + sample.nonminimal_hops.saturating_sub(1)*sample.nonminimal_global_queue) as f64,
			None => (sample.nonminimal_hops*sample.nonminimal_queue) as f64,
		}
	}
	fn emergency_minimal(&self, sample:&DecisionSample) -> f64
	{
		match self.received_minimal[sample.destination_router]
		{
			Some(difference) => (sample.minimal_queue+sample.minimal_global_queue+sample.minimal_hops) as f64 + difference,
			None if self.with_global_queues => (sample.minimal_queue + sample.minimal_hops.saturating_sub(1)*sample.minimal_global_queue) as f64,
			None => (sample.minimal_hops*sample.minimal_queue) as f64,
		}
	}
	///Probability of exploring and the step of an exploration.
	fn exploration(&self, input:&TrainingInput) -> (f64,f64)
	{
		let sample=input.sample;
		let max_global=self.parameters.max_global_buffer as f64;
		let global_vacancy=max_global - sample.minimal_queue as f64;
		let (vacancy,probability) = if self.with_global_queues && !input.minimal_port_is_global
		{
			let max_local=self.parameters.max_local_buffer as f64;
			let local_vacancy=max_local - sample.minimal_queue as f64;
			let lookahead_vacancy=max_global - sample.minimal_global_queue as f64;
			(local_vacancy.min(lookahead_vacancy),(local_vacancy/max_local).min(lookahead_vacancy/max_global))
		}
		else
		{
			(global_vacancy,global_vacancy/max_global)
		};
		let step = if vacancy<=0.0 { 0.0 } else { probability*self.parameters.explore_rate*input.channel_difference as f64 };
		(probability,step.max(0.0))
	}
	///Trains the bias of the decision and returns the bias to use in it.
	pub fn train(&mut self, input:&TrainingInput, rng:&RefCell<StdRng>) -> i64
	{
		let sample=input.sample;
		let destination=sample.destination_router;
		let port=sample.nonminimal_port;
		let cycle=sample.decision_cycle;
		let (minimal_average,minimal_size)=self.minimal_average(destination);
		let (nonminimal_average,nonminimal_size)=self.nonminimal_average(destination,port);
		let epoch_elapsed = cycle.saturating_sub(self.last_training[destination][port]) >= self.parameters.epoch;
		let eligible = minimal_size>=1 && nonminimal_size>=1;
		let enough = minimal_size+nonminimal_size>=3;
		if epoch_elapsed || eligible || enough
		{
			self.last_training[destination][port]=cycle;
			let (explore_probability,explore_step)=self.exploration(input);
			if minimal_size>0 && nonminimal_size>0
			{
				let mut step=self.parameters.learning_rate*(nonminimal_average-minimal_average);
				if step<explore_step && rng.borrow_mut().gen::<f64>()<explore_probability
				{
					step=explore_step;
					self.explored[destination][port]=true;
					self.explorations+=1;
				}
				self.bias[destination][port]+=step;
				self.nonminimal_sum[destination][port]=0;
				self.nonminimal_count[destination][port]=0;
			}
			else if rng.borrow_mut().gen::<f64>()<explore_probability
			{
				if nonminimal_size>0 || self.bias[destination][port]<=0.0
				{
					self.bias[destination][port]+=explore_step;
					self.explored[destination][port]=true;
					self.explorations+=1;
				}
			}
			else
			{
				let mut step=0.0;
				if minimal_size>0
				{
					//Only minimal samples: move towards the non-minimal route if it is estimated to be faster.
					let nonminimal=self.emergency_nonminimal(sample);
					if minimal_average>nonminimal
					{
						step=self.parameters.learning_rate*(nonminimal-minimal_average);
					}
				}
				else if nonminimal_size>0
				{
					let minimal=self.emergency_minimal(sample);
					if nonminimal_average>minimal
					{
						step=self.parameters.learning_rate*(nonminimal_average-minimal);
					}
				}
				self.bias[destination][port]+=step;
			}
			let (low,high)=self.bounds(sample);
			let value=&mut self.bias[destination][port];
			if *value<low
			{
				*value=low;
			}
			if *value>high
			{
				*value=high;
			}
		}
		self.bias(destination,port)
	}
	///The range allowed to the bias of a decision.
	pub fn bounds(&self, sample:&DecisionSample) -> (f64,f64)
	{
		let max_global=self.parameters.max_global_buffer;
		let high=max_global*sample.minimal_hops/sample.nonminimal_hops.max(1);
		(-(max_global as f64),high as f64)
	}
	///Registers the differential of a packet routed minimally from `source_router`. The last one replaces any previous.
	pub fn register_minimal_difference(&mut self, source_router:usize, difference:f64)
	{
		self.outgoing_minimal[source_router]=Some(difference);
	}
	///Registers the differential of a packet routed from `source_router` through its `port`, in the given slot of intermediates.
	pub fn register_nonminimal_difference(&mut self, source_router:usize, port:usize, slot:usize, difference:f64)
	{
		self.outgoing_nonminimal[source_router][port][slot]=Some(difference);
	}
	///The learnset for `source_router` with the differentials gathered since the last one, or `None` if there are none.
	pub fn generate_learnset(&mut self, source_router:usize, cycle:usize) -> Option<Learnset>
	{
		let minimal=self.outgoing_minimal[source_router].take();
		let mut nonminimal=vec![];
		for (port,slots) in self.outgoing_nonminimal[source_router].iter_mut().enumerate()
		{
			let values:Vec<f64>=slots.iter_mut().filter_map(|slot|slot.take()).collect();
			if !values.is_empty()
			{
				nonminimal.push((port,values.iter().sum::<f64>()/values.len() as f64));
			}
		}
		if minimal.is_none() && nonminimal.is_empty()
		{
			return None;
		}
		Some(Learnset{
			origin_router: self.router_index,
			generation_cycle: cycle,
			minimal,
			nonminimal,
		})
	}
	///Stores the differentials of a learnset. Learnsets older than the latest received from the same router are ignored.
	pub fn receive_learnset(&mut self, learnset:&Learnset)
	{
		let origin=learnset.origin_router;
		if let Some(latest)=self.latest_learnset[origin]
		{
			if learnset.generation_cycle<latest
			{
				return;
			}
		}
		if let Some(minimal)=learnset.minimal
		{
			self.received_minimal[origin]=Some(minimal);
		}
		for &(port,difference) in learnset.nonminimal.iter()
		{
			self.received_nonminimal[origin][port]=Some(difference);
		}
		self.latest_learnset[origin]=Some(learnset.generation_cycle);
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use ::rand::SeedableRng;

	fn sample(cycle:usize, minimal_queue:usize, nonminimal_queue:usize) -> DecisionSample
	{
		DecisionSample{
			source_router: 0,
			destination_router: 3,
			minimal_port: 2,
			nonminimal_port: 4,
			minimal_hops: 1,
			nonminimal_hops: 2,
			minimal_queue,
			nonminimal_queue,
			minimal_global_queue: 0,
			nonminimal_global_queue: 0,
			decision_cycle: cycle,
		}
	}

	fn learner() -> CongestionBiasLearner
	{
		CongestionBiasLearner::new(0,4,6,2,false,LearnerParameters::new(16,16))
	}

	#[test]
	fn untouched_entries_are_zero()
	{
		let mut learner=learner();
		assert_eq!(learner.bias(3,4),0);
		assert_eq!(learner.received_minimal_difference(2),0.0);
		assert_eq!(learner.received_nonminimal_difference(2,5),0.0);
		assert!(!learner.take_explored(3,4));
		assert!(learner.generate_learnset(1,10).is_none());
	}

	#[test]
	fn training_follows_the_samples()
	{
		let mut learner=learner();
		let rng=RefCell::new(StdRng::seed_from_u64(3));
		//The minimal queue is full, so there is no vacancy and no exploration.
		learner.register_decision(&sample(1,16,0),true);
		learner.register_decision(&sample(2,16,10),false);
		let input_sample=sample(3,16,10);
		let input=TrainingInput{sample:&input_sample,minimal_port_is_global:false,channel_difference:1};
		//min estimate 1*16, non estimate 2*10. The step is 0.25*(20-16)=1.
		assert_eq!(learner.train(&input,&rng),1);
		assert!(!learner.take_explored(3,4));
		//The non-minimal samples were consumed, and only one minimal sample remains: no training.
		assert_eq!(learner.train(&input,&rng),1);
	}

	#[test]
	fn bias_stays_in_bounds()
	{
		let mut learner=learner();
		let rng=RefCell::new(StdRng::seed_from_u64(7));
		for cycle in 0..2000
		{
			let minimal=rng.borrow_mut().gen_range(0..17);
			let nonminimal=rng.borrow_mut().gen_range(0..17);
			let s=sample(cycle,minimal,nonminimal);
			learner.register_decision(&s,cycle%3==0);
			let input=TrainingInput{sample:&s,minimal_port_is_global:false,channel_difference:40};
			let bias=learner.train(&input,&rng);
			let (low,high)=learner.bounds(&s);
			assert!(bias as f64>=low && bias as f64<=high,"bias {} out of [{},{}]",bias,low,high);
		}
		//With large channel differences some steps are explorations.
		assert!(learner.explorations()>0);
		learner.reset_bias(3);
		assert_eq!(learner.bias(3,4),0);
	}

	#[test]
	fn learnsets_carry_the_latest_differentials()
	{
		let mut destination=CongestionBiasLearner::new(3,4,6,2,false,LearnerParameters::new(16,16));
		destination.register_minimal_difference(0,5.0);
		destination.register_minimal_difference(0,7.0);
		destination.register_nonminimal_difference(0,4,0,2.0);
		destination.register_nonminimal_difference(0,4,1,4.0);
		let learnset=destination.generate_learnset(0,100).expect("there are differentials");
		assert_eq!(learnset.origin_router,3);
		assert_eq!(learnset.minimal,Some(7.0));
		assert_eq!(learnset.nonminimal,vec![(4,3.0)]);
		assert!(destination.generate_learnset(0,101).is_none());

		let mut source=learner();
		source.receive_learnset(&learnset);
		assert_eq!(source.received_minimal_difference(3),7.0);
		assert_eq!(source.received_nonminimal_difference(3,4),3.0);
		//An older learnset does not replace the newer.
		let old=Learnset{origin_router:3,generation_cycle:50,minimal:Some(-1.0),nonminimal:vec![(4,-1.0)]};
		source.receive_learnset(&old);
		assert_eq!(source.received_minimal_difference(3),7.0);
		assert_eq!(source.received_nonminimal_difference(3,4),3.0);
		let new=Learnset{origin_router:3,generation_cycle:150,minimal:Some(1.0),nonminimal:vec![]};
		source.receive_learnset(&new);
		assert_eq!(source.received_minimal_difference(3),1.0);
		assert_eq!(source.received_nonminimal_difference(3,4),3.0);
		//The received differentials correct the estimations.
		source.register_decision(&sample(200,2,0),true);
		assert_eq!(source.minimal_average(3),(2.0+0.0+1.0+1.0,1));
	}

	#[test]
	fn all_bias_can_be_reset()
	{
		let mut learner=learner();
		let rng=RefCell::new(StdRng::seed_from_u64(1));
		for cycle in 0..200
		{
			let s=sample(cycle,0,0);
			learner.register_decision(&s,false);
			learner.train(&TrainingInput{sample:&s,minimal_port_is_global:false,channel_difference:8},&rng);
		}
		assert!(learner.bias(3,4)>0);
		learner.reset_all_bias();
		assert_eq!(learner.bias(3,4),0);
	}
}
