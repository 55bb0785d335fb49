use super::*;

#[derive(Deserialize, Default, PartialEq, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub(crate) struct Config {
  pub(crate) broadcast_url: Option<String>,
  pub(crate) chain: Option<Chain>,
  pub(crate) key: Option<String>,
}
