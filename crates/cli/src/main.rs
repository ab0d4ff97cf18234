use std::process::ExitCode;

fn main() -> ExitCode {
    yesfree_cli::run()
}
