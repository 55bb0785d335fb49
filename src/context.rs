use super::*;

/// Shared, read-only state every builder needs: the secp256k1 context and
/// the network addresses are encoded for. Build one and pass it by
/// reference.
#[derive(Debug, Clone)]
pub struct Context {
  pub(crate) network: Network,
  pub(crate) secp: Secp256k1<All>,
}

impl Context {
  pub fn new(network: Network) -> Self {
    Self {
      network,
      secp: Secp256k1::new(),
    }
  }

  pub fn network(&self) -> Network {
    self.network
  }

  pub fn parse_address(&self, input: &str) -> SnafuResult<Address> {
    input
      .parse::<Address<NetworkUnchecked>>()
      .and_then(|address| address.require_network(self.network))
      .snafu_context(error::AddressParse { input })
  }

  /// The key-path output key an internal key commits to.
  pub(crate) fn output_key(&self, internal_key: XOnlyPublicKey) -> TweakedPublicKey {
    internal_key.tap_tweak(&self.secp, None).0
  }
}

impl From<Chain> for Context {
  fn from(chain: Chain) -> Self {
    Self::new(chain.network())
  }
}
