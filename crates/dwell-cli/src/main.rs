use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = dwell_cli::cli().get_matches();
    dwell_cli::init_tracing(matches.get_flag("json-logs"));

    match dwell_cli::run(&matches).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "analysis failed");
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
