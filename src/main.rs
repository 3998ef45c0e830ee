use mocha::cli::{read_source_file, write_output_file, Config};
use mocha::compile_and_report;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = Config::from_args();

    let src = match read_source_file(&config.file_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let asm = match compile_and_report(&config.file_path, &src) {
        Ok(asm) => asm,
        Err(()) => return ExitCode::FAILURE,
    };

    if config.verbose {
        println!("{}", asm);
    }

    if let Err(e) = write_output_file(&config.output_path, &asm) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    println!(
        "Compiled {} -> {}",
        config.file_path,
        config.output_path.display()
    );
    ExitCode::SUCCESS
}
