use super::*;

/// Posts raw transactions to an Esplora-style `/tx` endpoint.
#[derive(Debug, Clone)]
pub struct Broadcaster {
  client: reqwest::Client,
  url: String,
}

impl Broadcaster {
  pub fn new(url: &str) -> Self {
    Self {
      client: reqwest::Client::new(),
      url: url.trim_end_matches('/').into(),
    }
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// Submit `hex` and return the txid the endpoint reports. Nothing is
  /// retried.
  pub async fn broadcast(&self, hex: &str) -> SnafuResult<Txid> {
    let url = format!("{}/tx", self.url);

    log::info!("broadcasting transaction to {url}");

    let response = self
      .client
      .post(&url)
      .body(hex.to_owned())
      .send()
      .await
      .snafu_context(error::BroadcastRequest { url: url.clone() })?;

    let status = response.status();

    let body = response
      .text()
      .await
      .snafu_context(error::BroadcastRequest { url })?;

    if !status.is_success() {
      return error::BroadcastRejected {
        status: status.as_u16(),
        body,
      }
      .fail();
    }

    body
      .trim()
      .parse::<Txid>()
      .snafu_context(error::BroadcastResponse { body: body.clone() })
  }
}
