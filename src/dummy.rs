use super::*;

/// The smallest normal UTXO, if it is small enough to serve as a dummy.
pub fn find_existing_dummy(utxos: &[Utxo], inscriptions: &InscriptionIndex) -> Option<Utxo> {
  CoinSelector::new(utxos, inscriptions)
    .select_smallest_normal_utxo()
    .filter(|utxo| utxo.value <= DUMMY_THRESHOLD)
}

/// A dummy anchor for a swap, either already owned or freshly synthesized.
///
/// A synthesized dummy references output 0 of `transaction`, which has been
/// signed but not broadcast. It can be spent right away, but broadcasting
/// `transaction` is up to the caller, and a spend of the dummy is only valid
/// once it is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DummyUtxo {
  Existing(Utxo),
  Synthesized {
    dummy: Utxo,
    change: Option<Utxo>,
    transaction: BuiltTransaction,
  },
}

impl DummyUtxo {
  pub fn utxo(&self) -> Utxo {
    match self {
      Self::Existing(dummy) | Self::Synthesized { dummy, .. } => *dummy,
    }
  }

  pub fn transaction(&self) -> Option<&BuiltTransaction> {
    match self {
      Self::Existing(_) => None,
      Self::Synthesized { transaction, .. } => Some(transaction),
    }
  }
}

pub struct DummyUtxoManager<'a, S> {
  context: &'a Context,
  fee_rate: FeeRate,
  signer: &'a S,
}

impl<'a, S: Signer> DummyUtxoManager<'a, S> {
  pub fn new(context: &'a Context, signer: &'a S, fee_rate: FeeRate) -> Self {
    Self {
      context,
      fee_rate,
      signer,
    }
  }

  pub fn find_existing_dummy(
    &self,
    utxos: &[Utxo],
    inscriptions: &InscriptionIndex,
  ) -> Option<Utxo> {
    find_existing_dummy(utxos, inscriptions)
  }

  /// Return an existing dummy, or build a self-send of `DUMMY_THRESHOLD`
  /// whose first output becomes one.
  pub fn ensure_dummy_utxo(
    &self,
    utxos: &[Utxo],
    inscriptions: &InscriptionIndex,
  ) -> SnafuResult<DummyUtxo> {
    if let Some(dummy) = self.find_existing_dummy(utxos, inscriptions) {
      log::debug!("using existing dummy utxo {}", dummy.outpoint());
      return Ok(DummyUtxo::Existing(dummy));
    }

    let transaction = TransactionBuilder::new(self.context, self.signer, self.fee_rate).build_send(
      utxos,
      inscriptions,
      self.signer.address(),
      None,
      DUMMY_THRESHOLD,
      false,
    )?;

    let dummy = Utxo::unbroadcast(transaction.txid, 0, DUMMY_THRESHOLD);

    let change = (transaction.change_amount > Amount::ZERO)
      .then(|| Utxo::unbroadcast(transaction.txid, 1, transaction.change_amount));

    log::info!(
      "synthesized dummy utxo {}, transaction {} must be broadcast before the dummy is spent",
      dummy.outpoint(),
      transaction.txid,
    );

    Ok(DummyUtxo::Synthesized {
      dummy,
      change,
      transaction,
    })
  }
}
