//! In-process fake backend for HTTP tests.

use axum::Router;

use crate::client::ApiClient;
use crate::config::Config;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn client(base: &str) -> ApiClient {
    ApiClient::new(&Config::default().with_api_base_url(base)).unwrap()
}
