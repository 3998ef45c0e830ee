use std::{env, fs, path::PathBuf};

/// Configuration for the CLI application
pub struct Config {
    pub file_path: String,
    pub output_path: PathBuf,
    pub verbose: bool,
}

impl Config {
    /// Parse command line arguments and environment variables
    pub fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let file_path = if args.len() > 1 {
            args[1].clone()
        } else {
            "demos/01_arith.ir".to_string()
        };

        let output_path = if args.len() > 2 {
            PathBuf::from(&args[2])
        } else {
            PathBuf::from(&file_path).with_extension("s")
        };

        let verbose = env::var("VERBOSE").is_ok();

        Config {
            file_path,
            output_path,
            verbose,
        }
    }
}

/// Read the source file from the given path
pub fn read_source_file(file_path: &str) -> Result<String, String> {
    fs::read_to_string(file_path).map_err(|e| {
        format!(
            "Error reading file '{}': {}\n\n\
            Usage: cargo run [input.ir] [output.s]\n\n\
            Available demos:\n\
            \x20 - demos/01_arith.ir\n\
            \x20 - demos/02_branches.ir\n\
            \x20 - demos/03_calls.ir\n\
            \x20 - demos/04_arrays.ir",
            file_path, e
        )
    })
}

/// Write the generated assembly next to the input
pub fn write_output_file(path: &PathBuf, asm: &str) -> Result<(), String> {
    fs::write(path, asm).map_err(|e| format!("Error writing '{}': {}", path.display(), e))
}
