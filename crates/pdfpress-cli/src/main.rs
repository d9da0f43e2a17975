//! Thin entrypoint delegating to [`pdfpress_cli::run`].

#[tokio::main]
async fn main() {
    let exit_code = pdfpress_cli::run().await;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
