/*!

This module is for managing errors in the code of caminos-flit. To avoid invoking `panic!` in favor of a more graceful exit. Cases that should never happen can be kept as `panic!`.

Errors of configuration are reported once, when building the simulation, and nothing is simulated afterwards.
Errors at the boundary with a host (for example an out of range node index) are returned to the caller, since the host is expected to poll and recover.
Inconsistencies in the state of the simulation (a credit underflow, a stale flit handle, a deadlock) are bugs and they remain as `panic!`.

Instead of `expect` or `unwrap_or_else` try
* `map_err` like in `.map_err(|e|Error::could_not_open_file(source_location!(),path.into(),e))?;`
* `ok_or_else` like in `.ok_or_else( ||Error::missing_configuration_field(source_location!(),"Dragonfly","p") )?;`

Instead of `panic!` try
* Return an error. E.g., by `return Err( Error::ill_formed_configuration(source_location!(),value.clone()) );`

*/

use std::fmt::{Display,Formatter};
use std::path::PathBuf;

use crate::config_parser::ConfigurationValue;

/// The main Error class to be used in each `Result(Whatever,Error)`.
/// It contains the code source of the error and its kind.
/// An arbitrary `String` message can be optionally attached.
#[derive(Debug)]
pub struct Error
{
	pub source_location: SourceLocation,
	pub kind: ErrorKind,
	pub message: Option<String>,
}

/// A source code location where an error occurred.
/// Contains the values of the macros `std::{file,line,column}`.
#[derive(Debug)]
pub struct SourceLocation
{
	pub file: &'static str,
	pub line: u32,
	pub column: u32,
}

#[derive(Debug)]
pub enum ErrorKind
{
	CouldNotOpenFile{
		filepath: PathBuf,
		error:std::io::Error,
	},
	CouldNotParseFile{
		filepath: PathBuf,
	},
	/// A configuration value does not have the expected shape.
	/// For example a literal where a number was expected.
	IllFormedConfiguration{
		value: ConfigurationValue,
	},
	/// A required field was not given to some object of the configuration.
	MissingConfigurationField{
		object: String,
		field: String,
	},
	/// The name of an object in the configuration does not correspond to anything we may build.
	UnknownConfigurationObject{
		kind: String,
		name: String,
	},
	/// The topology parameters give a degenerate network. Such as zero routers or no connection between them.
	InvalidTopology,
	/// The routing requires more virtual channels than the router has.
	InsufficientVirtualChannels{
		routing: String,
		required: usize,
		available: usize,
	},
	/// The host has given a node index that does not exist in the network.
	NodeOutOfRange{
		node: usize,
		num_nodes: usize,
	},
	/// Any other error. Better to add new types than to use this thing.
	Undetermined,
}

// source_location!()
#[macro_export]
macro_rules! source_location{
	() => {
		$crate::error::SourceLocation{
			file: file!(),
			line: line!(),
			column: column!(),
		}
	}
}

use ErrorKind::*;

impl Error
{
	pub fn new(source_location:SourceLocation, kind:ErrorKind) -> Error
	{
		Error{
			source_location,
			kind,
			message:None,
		}
	}
	pub fn with_message(mut self,message:String) -> Error
	{
		self.message=Some(message);
		self
	}
	pub fn could_not_open_file(source_location:SourceLocation,filepath:PathBuf,error:std::io::Error)->Error
	{
		Error::new(source_location,CouldNotOpenFile{filepath,error})
	}
	pub fn could_not_parse_file(source_location:SourceLocation,filepath:PathBuf)->Error
	{
		Error::new(source_location,CouldNotParseFile{filepath})
	}
	/// example call: `Error::ill_formed_configuration(source_location!(),value.clone())`.
	pub fn ill_formed_configuration(source_location:SourceLocation,value:ConfigurationValue)->Error
	{
		Error::new(source_location,IllFormedConfiguration{value})
	}
	pub fn missing_configuration_field(source_location:SourceLocation,object:&str,field:&str)->Error
	{
		Error::new(source_location,MissingConfigurationField{object:object.to_string(),field:field.to_string()})
	}
	pub fn unknown_configuration_object(source_location:SourceLocation,kind:&str,name:&str)->Error
	{
		Error::new(source_location,UnknownConfigurationObject{kind:kind.to_string(),name:name.to_string()})
	}
	pub fn invalid_topology(source_location:SourceLocation)->Error
	{
		Error::new(source_location,InvalidTopology)
	}
	pub fn insufficient_virtual_channels(source_location:SourceLocation,routing:&str,required:usize,available:usize)->Error
	{
		Error::new(source_location,InsufficientVirtualChannels{routing:routing.to_string(),required,available})
	}
	///The host asked for a node that does not exist.
	pub fn node_out_of_range(source_location:SourceLocation,node:usize,num_nodes:usize)->Error
	{
		Error::new(source_location,NodeOutOfRange{node,num_nodes})
	}
	pub fn undetermined(source_location:SourceLocation)->Error
	{
		Error::new(source_location,Undetermined)
	}
}


impl Display for Error
{
	fn fmt(&self, formatter: &mut Formatter<'_>) -> std::result::Result<(), std::fmt::Error>
	{
		let Error{source_location:location,kind,message} = self;
		writeln!(formatter,"Error at file {} at line {} column {}.",location.file,location.line,location.column)?;
		if let Some(text) = message
		{
			writeln!(formatter,"{}",text)?;
		}
		kind.fmt(formatter)?;
		Ok(())
	}
}

impl Display for ErrorKind
{
	fn fmt(&self, formatter: &mut Formatter<'_>) -> std::result::Result<(), std::fmt::Error>
	{
		match self
		{
			CouldNotOpenFile{filepath,error} =>
			{
				writeln!(formatter,"CouldNotOpenFile error: The file {:?} could not be opened.\nio_error: {}",filepath,error)?;
			},
			CouldNotParseFile{filepath} =>
			{
				writeln!(formatter,"CouldNotParseFile error: The file {:?} could not be parsed.",filepath)?;
			},
			IllFormedConfiguration{value} =>
			{
				writeln!(formatter,"IllFormedConfiguration error: The following value is not valid where it has been written.\n{}",value)?;
			},
			MissingConfigurationField{object,field} =>
			{
				writeln!(formatter,"MissingConfigurationField error: The object {} requires a field {}.",object,field)?;
			},
			UnknownConfigurationObject{kind,name} =>
			{
				writeln!(formatter,"UnknownConfigurationObject error: There is no {} named {}.",kind,name)?;
			},
			InvalidTopology =>
			{
				writeln!(formatter,"InvalidTopology error: The parameters of the topology do not build a valid network.")?;
			},
			InsufficientVirtualChannels{routing,required,available} =>
			{
				writeln!(formatter,"InsufficientVirtualChannels error: The routing {} requires {} virtual channels but the routers have {}.",routing,required,available)?;
			},
			NodeOutOfRange{node,num_nodes} =>
			{
				writeln!(formatter,"NodeOutOfRange error: The node {} is out of the range of the {} nodes in the network.",node,num_nodes)?;
			},
			Undetermined =>
			{
				writeln!(formatter,"Undetermined error: A generic error. The concrete error should be more specified.")?;
			},
		}
		Ok(())
	}
}
