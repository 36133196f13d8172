use std::process::ExitCode;

fn main() -> ExitCode {
    // Local development keeps credentials in .env; its absence is fine.
    let _ = dotenvy::dotenv();
    sdr_assist_cli::run()
}
