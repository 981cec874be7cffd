use std::process;

#[tokio::main]
async fn main() {
    let code = ferry_cli::run().await;
    process::exit(code);
}
