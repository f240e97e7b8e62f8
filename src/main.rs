#[tokio::main]
async fn main() {
    if let Err(e) = review_assigner_lib::run().await {
        log::error!("Fatal: {}", e);
        eprintln!("review-assigner: {}", e);
        std::process::exit(1);
    }
}
