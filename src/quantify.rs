/*!

Accounting of the memory used by the simulation.

`#[derive(Quantifiable)]` from `quantifiable_derive` implements `Quantifiable` for a struct or enum by adding the value of each of its fields. The implementations for the standard types used by the simulator are here.

*/

use std::mem::{size_of,size_of_val};
use std::collections::{BTreeMap,VecDeque};
use std::rc::Rc;
use std::cell::{Cell,RefCell};

pub trait Quantifiable
{
	/// Get the total memory currently being employed by the implementing type. Both stack and heap.
	fn total_memory(&self) -> usize;
	/// Prints by stdout how much memory is used per component.
	fn print_memory_breakdown(&self)
	{
		println!("{}",human_bytes(self.total_memory()));
	}
	/// Get an estimation on how much memory the type could reach during the simulation.
	fn forecast_total_memory(&self) -> usize
	{
		self.total_memory()
	}
}

///Types without heap.
macro_rules! quantifiable_plain
{
	($($t:ty),*) =>
	{
		$(
		impl Quantifiable for $t
		{
			fn total_memory(&self) -> usize
			{
				size_of::<$t>()
			}
		}
		)*
	}
}

quantifiable_plain!(bool,i32,i64,usize,u64,f32,f64);

///Sequences with `iter`, `len` and `capacity`. The spare capacity counts.
macro_rules! quantifiable_sequence
{
	($($container:ident),*) =>
	{
		$(
		impl<T:Quantifiable> Quantifiable for $container<T>
		{
			fn total_memory(&self) -> usize
			{
				size_of::<Self>() + self.iter().map(|e|e.total_memory()).sum::<usize>() + (self.capacity()-self.len())*size_of::<T>()
			}
		}
		)*
	}
}

quantifiable_sequence!(Vec,VecDeque);

impl<A:Quantifiable, B:Quantifiable> Quantifiable for (A,B)
{
	fn total_memory(&self) -> usize
	{
		self.0.total_memory()+self.1.total_memory()
	}
}

impl Quantifiable for String
{
	fn total_memory(&self) -> usize
	{
		size_of::<String>() + self.capacity()
	}
}

impl<A:Quantifiable, B:Quantifiable> Quantifiable for BTreeMap<A,B>
{
	fn total_memory(&self) -> usize
	{
		size_of::<Self>() + self.iter().map(|(a,b)|a.total_memory()+b.total_memory()).sum::<usize>()
	}
}

impl<T:?Sized> Quantifiable for Rc<T>
{
	fn total_memory(&self) -> usize
	{
		//The pointee is shared. It is accounted by its creator.
		size_of::<Rc<T>>()
	}
}

impl<T:Quantifiable+?Sized> Quantifiable for Box<T>
{
	fn total_memory(&self) -> usize
	{
		size_of::<Box<T>>() + T::total_memory(self)
	}
}

impl<T:Quantifiable> Quantifiable for Option<T>
{
	fn total_memory(&self) -> usize
	{
		match self
		{
			&None => size_of::<Option<T>>(),
			&Some(ref thing) => thing.total_memory(),
		}
	}
}

impl<T:Quantifiable+?Sized> Quantifiable for RefCell<T>
{
	fn total_memory(&self) -> usize
	{
		self.borrow().total_memory() + size_of_val(self)
	}
}

impl<T:Copy> Quantifiable for Cell<T>
{
	fn total_memory(&self) -> usize
	{
		size_of::<Cell<T>>()
	}
}

///Writes an amount of bytes with a unit that keeps it below 3000.
pub fn human_bytes(byte_amount:usize) -> String
{
	if byte_amount<3000
	{
		return format!("{} bytes",byte_amount);
	}
	let mut amount=byte_amount as f64 / 1024.;
	for unit in ["KB","MB"].iter()
	{
		if amount<3000f64
		{
			return format!("{} {}",amount,unit);
		}
		amount/=1024.;
	}
	format!("{} GB",amount)
}
