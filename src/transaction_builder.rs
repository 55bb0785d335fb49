//! Fully signed spends: plain sends, batch sends and inscription splits.
//!
//! Every input is a key-path spend from the signer's own address. Outputs
//! are always laid out in the same order: the inscription transfer first,
//! then payments, then change. Change below `DUST_FLOOR` is never emitted;
//! it is folded into the fee.

use super::*;

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInfo {
  pub address: Address,
  pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltTransaction {
  pub txid: Txid,
  pub hex: String,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub fee: Amount,
  pub selected_utxos: Vec<Utxo>,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub change_amount: Amount,
  #[serde(skip)]
  pub transaction: Transaction,
}

impl BuiltTransaction {
  pub(crate) fn new(
    transaction: Transaction,
    fee: Amount,
    selected_utxos: Vec<Utxo>,
    change_amount: Amount,
  ) -> Self {
    Self {
      txid: transaction.compute_txid(),
      hex: serialize_hex(&transaction),
      fee,
      selected_utxos,
      change_amount,
      transaction,
    }
  }

  pub fn vsize(&self) -> usize {
    self.transaction.vsize()
  }
}

pub(crate) fn check_dust(amount: Amount) -> SnafuResult {
  if amount < DUST_FLOOR {
    return error::Dust { value: amount }.fail();
  }
  Ok(())
}

/// Sign every input in `inputs` as a key-path spend by `signer`, then
/// finalize them. Each input must already carry its witness utxo.
pub(crate) fn sign_key_path_inputs<S: Signer>(
  context: &Context,
  signer: &S,
  psbt: &mut Psbt,
  inputs: &[usize],
) -> SnafuResult {
  let spend = TaprootSpend::KeyPath {
    internal_key: signer.internal_key(),
  };

  for &index in inputs {
    spend.prepare(&mut psbt.inputs[index]);
  }

  if signer.sign(context, psbt, inputs)? == Signing::Cancelled {
    return error::Cancelled.fail();
  }

  for &index in inputs {
    finalize_input(psbt, index, |index, input| spend.witness(index, input))?;
  }

  Ok(())
}

pub struct TransactionBuilder<'a, S> {
  context: &'a Context,
  fee_rate: FeeRate,
  signer: &'a S,
}

impl<'a, S: Signer> TransactionBuilder<'a, S> {
  pub fn new(context: &'a Context, signer: &'a S, fee_rate: FeeRate) -> Self {
    Self {
      context,
      fee_rate,
      signer,
    }
  }

  /// Send `inscription`, `amount`, or both to `recipient`.
  pub fn build_send(
    &self,
    utxos: &[Utxo],
    inscriptions: &InscriptionIndex,
    recipient: &Address,
    inscription: Option<InscriptionId>,
    amount: Amount,
    prefer_inscription_pays_fee: bool,
  ) -> SnafuResult<BuiltTransaction> {
    if amount > Amount::ZERO {
      check_dust(amount)?;
    } else if inscription.is_none() {
      return error::InvalidParameter {
        reason: "nothing to send",
      }
      .fail();
    }

    let selection = CoinSelector::new(utxos, inscriptions).select_utxos(
      inscription,
      amount,
      self.fee_rate,
      prefer_inscription_pays_fee,
    )?;

    let mut outputs = Vec::new();

    if inscription.is_some() {
      outputs.push(TxOut {
        value: selection.inscription_output_value,
        script_pubkey: recipient.script_pubkey(),
      });
    }

    if amount > Amount::ZERO {
      outputs.push(TxOut {
        value: amount,
        script_pubkey: recipient.script_pubkey(),
      });
    }

    self.finish(
      selection.selected_utxos,
      outputs,
      selection.change_amount,
      selection.fee,
    )
  }

  /// Pay every leg of `payments` in one transaction. With `keep_dummy` an
  /// existing dummy utxo is left out of the funding pool.
  pub fn build_batch_send(
    &self,
    utxos: &[Utxo],
    inscriptions: &InscriptionIndex,
    payments: &[PaymentInfo],
    keep_dummy: bool,
  ) -> SnafuResult<BuiltTransaction> {
    let total = Self::payment_total(payments)?;

    let mut selector = CoinSelector::new(utxos, inscriptions);

    if keep_dummy {
      if let Some(dummy) = dummy::find_existing_dummy(utxos, inscriptions) {
        log::debug!("keeping dummy utxo {} out of funding", dummy.outpoint());
        selector = selector.exclude(&[dummy.outpoint()]);
      }
    }

    let selection = selector.select(None, total, payments.len(), self.fee_rate, false)?;

    self.finish(
      selection.selected_utxos,
      Self::payment_outputs(payments),
      selection.change_amount,
      selection.fee,
    )
  }

  /// Like `build_batch_send`, but the fee is charged for a transaction of
  /// `vsize` vbytes instead of the linear estimate.
  pub fn build_batch_send_at_vsize(
    &self,
    utxos: &[Utxo],
    inscriptions: &InscriptionIndex,
    payments: &[PaymentInfo],
    vsize: usize,
  ) -> SnafuResult<BuiltTransaction> {
    let total = Self::payment_total(payments)?;
    let fee = self.fee_rate.fee(vsize);

    let funding = CoinSelector::new(utxos, inscriptions)
      .select_cardinal_utxos(total + fee, false)?
      .utxos;

    let change = utxo::total(&funding) - total - fee;

    self.finish(funding, Self::payment_outputs(payments), change, fee)
  }

  /// Carve `carve_amount` off an inscription output whose inscription sits
  /// on its first sat. Output 0 is always the reduced inscription output.
  pub fn build_inscription_split(
    &self,
    inscription_utxo: Utxo,
    record: InscriptionRecord,
    carve_amount: Amount,
  ) -> SnafuResult<BuiltTransaction> {
    if record.offset != 0 {
      return error::InvalidParameter {
        reason: format!(
          "inscription {} is at offset {}, only offset 0 can be split",
          record.id, record.offset
        ),
      }
      .fail();
    }

    check_dust(carve_amount)?;

    let fee = FeeModel::estimate_fee(1, 2, self.fee_rate);
    let headroom = coin_selector::headroom(&inscription_utxo, &record);

    if carve_amount + fee > headroom {
      return error::InsufficientBalance {
        needed: carve_amount + fee,
        available: headroom,
      }
      .fail();
    }

    let owner = self.signer.address().script_pubkey();

    let outputs = vec![
      TxOut {
        value: inscription_utxo.value - carve_amount - fee,
        script_pubkey: owner.clone(),
      },
      TxOut {
        value: carve_amount,
        script_pubkey: owner,
      },
    ];

    self.finish(vec![inscription_utxo], outputs, Amount::ZERO, fee)
  }

  fn payment_total(payments: &[PaymentInfo]) -> SnafuResult<Amount> {
    if payments.is_empty() {
      return error::InvalidParameter {
        reason: "no payments",
      }
      .fail();
    }

    for payment in payments {
      check_dust(payment.amount)?;
    }

    Ok(payments.iter().map(|payment| payment.amount).sum())
  }

  fn payment_outputs(payments: &[PaymentInfo]) -> Vec<TxOut> {
    payments
      .iter()
      .map(|payment| TxOut {
        value: payment.amount,
        script_pubkey: payment.address.script_pubkey(),
      })
      .collect()
  }

  fn finish(
    &self,
    inputs: Vec<Utxo>,
    mut outputs: Vec<TxOut>,
    change: Amount,
    mut fee: Amount,
  ) -> SnafuResult<BuiltTransaction> {
    let change_amount = if change >= DUST_FLOOR {
      outputs.push(TxOut {
        value: change,
        script_pubkey: self.signer.address().script_pubkey(),
      });
      change
    } else {
      fee += change;
      Amount::ZERO
    };

    for utxo in &inputs {
      if utxo.status == UtxoStatus::Unbroadcast {
        log::warn!(
          "spending {} from a transaction that has not been broadcast",
          utxo.outpoint()
        );
      }
    }

    let mut psbt = Psbt::from_unsigned_tx(Transaction {
      version: Version::TWO,
      lock_time: LockTime::ZERO,
      input: inputs
        .iter()
        .map(|utxo| unsigned_input(utxo.outpoint()))
        .collect(),
      output: outputs,
    })
    .snafu_context(error::Psbt)?;

    for (input, utxo) in psbt.inputs.iter_mut().zip(&inputs) {
      input.witness_utxo = Some(TxOut {
        value: utxo.value,
        script_pubkey: self.signer.address().script_pubkey(),
      });
    }

    let indices = (0..inputs.len()).collect::<Vec<usize>>();

    sign_key_path_inputs(self.context, self.signer, &mut psbt, &indices)?;

    let built = BuiltTransaction::new(
      psbt.extract_tx_unchecked_fee_rate(),
      fee,
      inputs,
      change_amount,
    );

    log::info!(
      "built transaction {} with {} inputs, {} outputs and fee {} sat",
      built.txid,
      built.transaction.input.len(),
      built.transaction.output.len(),
      built.fee.to_sat(),
    );

    Ok(built)
  }
}
