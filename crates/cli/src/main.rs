use std::process::ExitCode;

fn main() -> ExitCode {
    retaily_cli::run()
}
