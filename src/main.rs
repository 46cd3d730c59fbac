use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match hkare_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hkare: {e}");
            ExitCode::FAILURE
        }
    }
}
