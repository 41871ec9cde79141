use axum::Router;
use tokio::net::TcpListener;
use url::Url;

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_upstream(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

/// Base URL on which nothing is listening.
pub async fn closed_upstream() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/")).unwrap()
}
