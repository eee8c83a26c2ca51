//! Standalone mock of the direct-mail API, for poking at with curl or
//! pointing a client at during development. Binds to `PORT` (default 3000).

use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("mail API mock listening on {addr}");
    mock_server::run(listener).await
}
