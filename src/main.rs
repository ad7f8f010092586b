
use std::env;
use std::fs::File;
use std::path::Path;
use std::process::exit;
use getopts::Options;
use caminos_flit::{file_main,get_git_id};

fn print_usage(program:&str, opts:Options)
{
	let brief = format!("Usage: {} FILE [options]", program);
	print!("{}", opts.usage(&brief));
}

fn main()
{
	env_logger::init();
	let args: Vec<String> = env::args().collect();
	let program = args[0].clone();

	let mut opts = Options::new();
	opts.optflag("h", "help", "print this help menu");
	opts.optflag("", "version", "print the git identifier of this build");
	opts.optopt("r", "results", "file where to write the results instead of the standard output", "FILE");
	let matches = match opts.parse(&args[1..])
	{
		Ok(m) => m,
		Err(f) =>
		{
			eprintln!("{}",f);
			print_usage(&program, opts);
			exit(2);
		},
	};
	if matches.opt_present("h")
	{
		print_usage(&program, opts);
		return;
	}
	if matches.opt_present("version")
	{
		println!("{} {}",program,get_git_id());
		return;
	}
	let path = match matches.free.first()
	{
		Some(path) => Path::new(path),
		None =>
		{
			print_usage(&program, opts);
			exit(2);
		},
	};
	let results_file = match matches.opt_str("results")
	{
		Some(name) => match File::create(&name)
		{
			Ok(file) => Some(file),
			Err(e) =>
			{
				eprintln!("could not create the results file {}: {}",name,e);
				exit(1);
			},
		},
		None => None,
	};
	if let Err(e) = file_main(path, results_file)
	{
		eprintln!("{}",e);
		exit(1);
	}
}
