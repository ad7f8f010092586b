/// --- Build script ---
///Writes the git identifier of the sources, as given by `git describe` and `git rev-parse`, for `get_git_id`.

use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

fn git(args:&[&str]) -> Option<String>
{
	let output=Command::new("git").args(args).output().ok()?;
	Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main()
{
	let out_dir=env::var_os("OUT_DIR").expect("cargo always sets OUT_DIR");
	let id_str=[git(&["describe","--dirty","--always","--all"]),git(&["rev-parse","--verify","HEAD"])]
		.iter()
		.filter_map(|x|x.clone())
		.collect::<Vec<String>>()
		.join("-");
	let git_id_path=Path::new(&out_dir).join("generated_git_id");
	fs::write(&git_id_path,id_str).expect("failed to write git_id");
}
