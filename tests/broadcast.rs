use {
  super::*,
  axum::{http::StatusCode, routing::post, Router},
  tokio::runtime::Runtime,
};

/// An Esplora stand-in that accepts anything starting with a version 2
/// prefix.
struct TestEsplora {
  _runtime: Runtime,
  url: String,
}

impl TestEsplora {
  fn spawn() -> Self {
    let runtime = Runtime::new().unwrap();

    let listener = runtime
      .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
      .unwrap();

    let port = listener.local_addr().unwrap().port();

    let router = Router::new().route(
      "/api/tx",
      post(|body: String| async move {
        if body.starts_with("02") {
          (StatusCode::OK, txid(1))
        } else {
          (StatusCode::BAD_REQUEST, "TX decode failed".to_string())
        }
      }),
    );

    runtime.spawn(async move {
      axum::serve(listener, router).await.unwrap();
    });

    Self {
      _runtime: runtime,
      url: format!("http://127.0.0.1:{port}/api"),
    }
  }
}

#[test]
fn broadcast_in_order() {
  let esplora = TestEsplora::spawn();

  let output = CommandBuilder::new([
    "--regtest",
    "--broadcast-url",
    &esplora.url,
    "broadcast",
    "0200",
    "0201",
  ])
  .run_and_deserialize_output::<Value>();

  pretty_assert_eq!(output, serde_json::json!({ "txids": [txid(1), txid(1)] }));
}

#[test]
fn broadcast_url_from_environment() {
  let esplora = TestEsplora::spawn();

  CommandBuilder::new("--regtest --format minify broadcast 0200")
    .env("ORDSWAP_BROADCAST_URL", &esplora.url)
    .stdout_regex(format!(r#"\{{"txids":\["{}"\]\}}\n"#, txid(1)))
    .run_and_extract_stdout();
}

#[test]
fn rejected_transaction() {
  let esplora = TestEsplora::spawn();

  CommandBuilder::new([
    "--regtest",
    "--broadcast-url",
    &esplora.url,
    "broadcast",
    "ff",
  ])
  .expected_exit_code(1)
  .expected_stderr("error: broadcast rejected with status 400: TX decode failed\n")
  .run_and_extract_stdout();
}

#[test]
fn regtest_requires_broadcast_url() {
  CommandBuilder::new("--regtest broadcast 0200")
    .expected_exit_code(1)
    .expected_stderr("error: no broadcast url for regtest, pass --broadcast-url\n")
    .run_and_extract_stdout();
}
