use std::process::ExitCode;

fn main() -> ExitCode {
    deadliner_cli::run()
}
