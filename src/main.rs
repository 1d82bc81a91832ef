#[tokio::main]
async fn main() {
    gatehouse::start_server().await;
}
