use super::*;

/// Where a UTXO stands relative to the chain, as far as the caller knows.
///
/// Outputs of transactions this crate builds start out `Unbroadcast`. Only
/// the caller can move them forward, by broadcasting and then observing the
/// transaction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UtxoStatus {
  #[default]
  Confirmed,
  BroadcastPending,
  Unbroadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
  pub tx_hash: Txid,
  pub output_index: u32,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub value: Amount,
  #[serde(default)]
  pub status: UtxoStatus,
}

impl Utxo {
  pub fn new(outpoint: OutPoint, value: Amount) -> Self {
    Self {
      tx_hash: outpoint.txid,
      output_index: outpoint.vout,
      value,
      status: UtxoStatus::Confirmed,
    }
  }

  pub(crate) fn unbroadcast(txid: Txid, vout: u32, value: Amount) -> Self {
    Self {
      tx_hash: txid,
      output_index: vout,
      value,
      status: UtxoStatus::Unbroadcast,
    }
  }

  pub fn outpoint(&self) -> OutPoint {
    OutPoint {
      txid: self.tx_hash,
      vout: self.output_index,
    }
  }

  /// Record that the transaction creating this output has been handed to the
  /// network.
  pub fn broadcast(self) -> Self {
    Self {
      status: match self.status {
        UtxoStatus::Unbroadcast => UtxoStatus::BroadcastPending,
        status => status,
      },
      ..self
    }
  }

  pub fn is_pending(&self) -> bool {
    self.status != UtxoStatus::Confirmed
  }
}

pub(crate) fn total(utxos: &[Utxo]) -> Amount {
  utxos.iter().map(|utxo| utxo.value).sum()
}
