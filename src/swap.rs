//! Two-phase atomic swaps of an inscription for bitcoin.
//!
//! The seller signs each of their inputs with SIGHASH_SINGLE|ANYONECANPAY,
//! which commits to that input and to the output at the same index and to
//! nothing else. The buyer can then wrap the seller's pairs in a larger
//! transaction, as long as every pair keeps its inputs and outputs at equal
//! indices:
//!
//! ```text
//! inputs                  outputs
//! 0      buyer dummy      0      dummy + inscription -> buyer
//! 1..=n  seller inputs    1..=n  seller outputs
//! n+1..  buyer funding    n+1    new buyer dummy (optional)
//!                         n+2    buyer change (optional)
//! ```
//!
//! Output 0 absorbs the buyer's dummy and the inscription, so the
//! inscription, which sits on the first sat of input 1, lands in the buyer's
//! output.

use super::*;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceFee {
  pub amount: Amount,
  pub recipient: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
  pub inscription: InscriptionId,
  pub price: Amount,
  pub receive: Address,
  pub marketplace_fee: Option<MarketplaceFee>,
}

/// The seller's half of a swap, ready to hand to a buyer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerPartial {
  /// Base64 PSBT with every input finalized.
  pub psbt: String,
  pub inscription_utxo: Utxo,
  pub dummy: Option<Utxo>,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub seller_output_value: Amount,
}

pub struct SwapPsbtBuilder<'a, S> {
  context: &'a Context,
  fee_rate: FeeRate,
  signer: &'a S,
}

impl<'a, S: Signer> SwapPsbtBuilder<'a, S> {
  pub fn new(context: &'a Context, signer: &'a S, fee_rate: FeeRate) -> Self {
    Self {
      context,
      fee_rate,
      signer,
    }
  }

  fn witness_utxo(&self, utxo: &Utxo) -> TxOut {
    TxOut {
      value: utxo.value,
      script_pubkey: self.signer.address().script_pubkey(),
    }
  }

  pub fn build_seller_partial(
    &self,
    utxos: &[Utxo],
    inscriptions: &InscriptionIndex,
    listing: &Listing,
  ) -> SnafuResult<SellerPartial> {
    transaction_builder::check_dust(listing.price)?;

    let (inscription_utxo, _) =
      CoinSelector::new(utxos, inscriptions).select_inscription_utxo(listing.inscription)?;

    let fee_leg = listing
      .marketplace_fee
      .as_ref()
      .filter(|fee| fee.recipient != listing.receive);

    let mut inputs = vec![inscription_utxo];

    let (outputs, dummy) = match fee_leg {
      Some(fee) => {
        transaction_builder::check_dust(fee.amount)?;

        if fee.amount >= listing.price {
          return error::InvalidParameter {
            reason: format!(
              "marketplace fee of {} sat is not below price of {} sat",
              fee.amount.to_sat(),
              listing.price.to_sat()
            ),
          }
          .fail();
        }

        let dummy = dummy::find_existing_dummy(utxos, inscriptions)
          .snafu_context(error::DummyUtxoUnavailable)?;

        inputs.push(dummy);

        let outputs = vec![
          TxOut {
            value: listing.price - fee.amount + dummy.value,
            script_pubkey: listing.receive.script_pubkey(),
          },
          TxOut {
            value: fee.amount,
            script_pubkey: fee.recipient.script_pubkey(),
          },
        ];

        (outputs, Some(dummy))
      }
      None => (
        vec![TxOut {
          value: listing.price,
          script_pubkey: listing.receive.script_pubkey(),
        }],
        None,
      ),
    };

    let seller_output_value = outputs[0].value;

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
      input.witness_utxo = Some(self.witness_utxo(utxo));
      input.sighash_type = Some(TapSighashType::SinglePlusAnyoneCanPay.into());
    }

    let indices = (0..inputs.len()).collect::<Vec<usize>>();

    transaction_builder::sign_key_path_inputs(self.context, self.signer, &mut psbt, &indices)?;

    let output_key = self
      .context
      .output_key(self.signer.internal_key())
      .to_x_only_public_key();

    for index in indices {
      signer::verify_finalized_key_spend(self.context, &psbt, index, output_key)?;
    }

    log::info!(
      "listed inscription {} for {} sat",
      listing.inscription,
      listing.price.to_sat()
    );

    Ok(SellerPartial {
      psbt: base64_encode(&psbt.serialize()),
      inscription_utxo,
      dummy,
      seller_output_value,
    })
  }

  /// Complete `seller_psbt`, paying at most `max_price` and receiving the
  /// inscription at `receive`. Only the buyer's inputs are signed.
  pub fn build_buyer_partial(
    &self,
    seller_psbt: &str,
    utxos: &[Utxo],
    inscriptions: &InscriptionIndex,
    dummy: Utxo,
    max_price: Amount,
    receive: &Address,
  ) -> SnafuResult<BuiltTransaction> {
    let seller = Psbt::deserialize(&base64_decode(seller_psbt).snafu_context(error::PsbtBase64)?)
      .snafu_context(error::Psbt)?;

    let pairs = seller.unsigned_tx.input.len();

    if pairs != seller.unsigned_tx.output.len()
      || pairs != seller.inputs.len()
      || pairs != seller.outputs.len()
    {
      return error::MismatchedPartialStructure {
        inputs: pairs,
        outputs: seller.unsigned_tx.output.len(),
      }
      .fail();
    }

    if pairs == 0 {
      return error::InvalidParameter {
        reason: "seller partial has no inputs",
      }
      .fail();
    }

    let mut seller_values = Vec::with_capacity(pairs);

    for (index, input) in seller.inputs.iter().enumerate() {
      if input.final_script_witness.is_none() {
        return error::InvalidParameter {
          reason: format!("seller input {index} is not finalized"),
        }
        .fail();
      }

      let Some(witness_utxo) = &input.witness_utxo else {
        return error::InvalidParameter {
          reason: format!("seller input {index} has no witness utxo"),
        }
        .fail();
      };

      seller_values.push(witness_utxo.value);
    }

    let inscription_value = seller_values[0];

    let seller_output_total = seller
      .unsigned_tx
      .output
      .iter()
      .map(|output| output.value)
      .sum::<Amount>();

    let cost = seller_output_total
      .checked_sub(seller_values[1..].iter().copied().sum())
      .snafu_context(error::InvalidParameter {
        reason: "seller outputs are worth less than seller dummy inputs",
      })?;

    if cost > max_price {
      return error::InvalidParameter {
        reason: format!(
          "price of {} sat exceeds maximum of {} sat",
          cost.to_sat(),
          max_price.to_sat()
        ),
      }
      .fail();
    }

    if dummy.value > DUMMY_THRESHOLD {
      return error::InvalidParameter {
        reason: format!(
          "dummy utxo {} is worth more than {} sat",
          dummy.outpoint(),
          DUMMY_THRESHOLD.to_sat()
        ),
      }
      .fail();
    }

    if inscriptions.is_inscribed(&dummy.outpoint()) {
      return error::InvalidParameter {
        reason: format!("dummy utxo {} holds an inscription", dummy.outpoint()),
      }
      .fail();
    }

    if dummy.status == UtxoStatus::Unbroadcast {
      log::warn!(
        "spending dummy utxo {} whose transaction has not been broadcast",
        dummy.outpoint()
      );
    }

    let mut excluded = vec![dummy.outpoint()];
    excluded.extend(
      seller
        .unsigned_tx
        .input
        .iter()
        .map(|input| input.previous_output),
    );

    let selector = CoinSelector::new(utxos, inscriptions).exclude(&excluded);

    let outputs = 1 + pairs + 1;

    let mut funding_inputs = 1;
    let funding = loop {
      let fee = FeeModel::estimate_fee(1 + pairs + funding_inputs, outputs, self.fee_rate);
      let funding = selector.select_cardinal_utxos(cost + fee, false)?.utxos;
      if funding.len() <= funding_inputs {
        break funding;
      }
      funding_inputs = funding.len();
    };

    let funding_total = utxo::total(&funding);
    let mut fee = FeeModel::estimate_fee(1 + pairs + funding.len(), outputs, self.fee_rate);

    let mut change = funding_total
      .checked_sub(cost + fee)
      .snafu_context(error::InsufficientBalance {
        needed: cost + fee,
        available: funding_total,
      })?;

    let mut output = vec![TxOut {
      value: dummy.value + inscription_value,
      script_pubkey: receive.script_pubkey(),
    }];

    output.extend(seller.unsigned_tx.output.iter().cloned());

    if change >= DUMMY_THRESHOLD {
      output.push(TxOut {
        value: DUMMY_THRESHOLD,
        script_pubkey: self.signer.address().script_pubkey(),
      });
      change -= DUMMY_THRESHOLD;

      let marginal = FeeModel::estimate_fee(0, 1, self.fee_rate);
      if change >= marginal {
        fee += marginal;
        change -= marginal;
      }
    }

    let change_amount = if change >= DUST_FLOOR {
      output.push(TxOut {
        value: change,
        script_pubkey: self.signer.address().script_pubkey(),
      });
      change
    } else {
      fee += change;
      Amount::ZERO
    };

    let mut input = vec![unsigned_input(dummy.outpoint())];
    input.extend(seller.unsigned_tx.input.iter().cloned());
    input.extend(funding.iter().map(|utxo| unsigned_input(utxo.outpoint())));

    let mut psbt = Psbt::from_unsigned_tx(Transaction {
      version: seller.unsigned_tx.version,
      lock_time: seller.unsigned_tx.lock_time,
      input,
      output,
    })
    .snafu_context(error::Psbt)?;

    psbt.inputs[1..=pairs].clone_from_slice(&seller.inputs);
    psbt.outputs[1..=pairs].clone_from_slice(&seller.outputs);

    let mut buyer_utxos = vec![dummy];
    buyer_utxos.extend(funding);

    let buyer_inputs = iter::once(0)
      .chain(pairs + 1..pairs + buyer_utxos.len())
      .collect::<Vec<usize>>();

    for (&index, utxo) in buyer_inputs.iter().zip(&buyer_utxos) {
      psbt.inputs[index].witness_utxo = Some(self.witness_utxo(utxo));
    }

    transaction_builder::sign_key_path_inputs(self.context, self.signer, &mut psbt, &buyer_inputs)?;

    for index in 1..=pairs {
      let verified = psbt.inputs[index]
        .witness_utxo
        .as_ref()
        .and_then(|utxo| signer::p2tr_output_key(&utxo.script_pubkey))
        .map(|output_key| {
          signer::verify_finalized_key_spend(self.context, &psbt, index, output_key)
        });

      match verified {
        Some(Ok(())) => {}
        Some(Err(err)) => log::warn!("seller input {index} failed verification: {err}"),
        None => log::warn!("seller input {index} is not a taproot key-path spend"),
      }
    }

    let built = BuiltTransaction::new(
      psbt.extract_tx_unchecked_fee_rate(),
      fee,
      buyer_utxos,
      change_amount,
    );

    log::info!(
      "bought inscription in {} for {} sat with fee {} sat",
      built.txid,
      cost.to_sat(),
      built.fee.to_sat(),
    );

    Ok(built)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PRICE: u64 = 10_000;

  fn seller_pool() -> (Vec<Utxo>, InscriptionIndex) {
    (
      vec![utxo(1, 5_274), utxo(2, 600)],
      [(outpoint(1), record(0, 1))].into_iter().collect(),
    )
  }

  fn buyer_pool() -> Vec<Utxo> {
    vec![utxo(5, 600), utxo(6, 5_000), utxo(7, 4_500), utxo(8, 4_000)]
  }

  fn listing(marketplace_fee: Option<MarketplaceFee>) -> Listing {
    Listing {
      inscription: inscription_id(1),
      price: Amount::from_sat(PRICE),
      receive: signer(1).address().clone(),
      marketplace_fee,
    }
  }

  fn sell(listing: &Listing) -> SellerPartial {
    let context = context();
    let seller = signer(1);
    let (utxos, inscriptions) = seller_pool();

    SwapPsbtBuilder::new(&context, &seller, FeeRate::from(1))
      .build_seller_partial(&utxos, &inscriptions, listing)
      .unwrap()
  }

  fn decode(partial: &SellerPartial) -> Psbt {
    Psbt::deserialize(&base64_decode(&partial.psbt).unwrap()).unwrap()
  }

  fn encode(psbt: &Psbt) -> String {
    base64_encode(&psbt.serialize())
  }

  fn buy(seller_psbt: &str, max_price: u64) -> SnafuResult<BuiltTransaction> {
    let context = context();
    let buyer = signer(2);

    SwapPsbtBuilder::new(&context, &buyer, FeeRate::from(1)).build_buyer_partial(
      seller_psbt,
      &buyer_pool(),
      &InscriptionIndex::new(),
      utxo(5, 600),
      Amount::from_sat(max_price),
      &recipient(),
    )
  }

  #[test]
  fn seller_partial_without_fee_leg() {
    let partial = sell(&listing(None));

    assert_eq!(partial.inscription_utxo, utxo(1, 5_274));
    assert_eq!(partial.dummy, None);
    assert_eq!(partial.seller_output_value, Amount::from_sat(PRICE));

    let psbt = decode(&partial);
    assert_eq!(psbt.unsigned_tx.input.len(), 1);
    assert_eq!(psbt.unsigned_tx.input[0].previous_output, outpoint(1));
    assert_eq!(
      psbt.unsigned_tx.output,
      [tx_out(PRICE, signer(1).address().clone())]
    );

    let witness = psbt.inputs[0].final_script_witness.as_ref().unwrap();
    let signature = taproot::Signature::from_slice(witness.nth(0).unwrap()).unwrap();
    assert_eq!(
      signature.sighash_type,
      TapSighashType::SinglePlusAnyoneCanPay
    );
    assert!(psbt.inputs[0].witness_utxo.is_some());
  }

  #[test]
  fn seller_partial_with_fee_leg() {
    let partial = sell(&listing(Some(MarketplaceFee {
      amount: Amount::from_sat(1_000),
      recipient: change(),
    })));

    assert_eq!(partial.dummy, Some(utxo(2, 600)));
    assert_eq!(partial.seller_output_value, Amount::from_sat(9_600));

    let psbt = decode(&partial);
    assert_eq!(
      psbt
        .unsigned_tx
        .input
        .iter()
        .map(|input| input.previous_output)
        .collect::<Vec<OutPoint>>(),
      [outpoint(1), outpoint(2)]
    );
    pretty_assert_eq!(
      psbt.unsigned_tx.output,
      [
        tx_out(9_600, signer(1).address().clone()),
        tx_out(1_000, change()),
      ]
    );
    assert!(psbt
      .inputs
      .iter()
      .all(|input| input.final_script_witness.is_some()));
  }

  #[test]
  fn fee_to_seller_needs_no_fee_leg() {
    let partial = sell(&listing(Some(MarketplaceFee {
      amount: Amount::from_sat(1_000),
      recipient: signer(1).address().clone(),
    })));

    assert_eq!(partial.dummy, None);
    assert_eq!(decode(&partial).unsigned_tx.output.len(), 1);
  }

  #[test]
  fn fee_leg_needs_seller_dummy() {
    let context = context();
    let seller = signer(1);
    let (_, inscriptions) = seller_pool();

    assert_matches!(
      SwapPsbtBuilder::new(&context, &seller, FeeRate::from(1)).build_seller_partial(
        &[utxo(1, 5_274), utxo(2, 5_000)],
        &inscriptions,
        &listing(Some(MarketplaceFee {
          amount: Amount::from_sat(1_000),
          recipient: change(),
        })),
      ),
      Err(SnafuError::DummyUtxoUnavailable),
    );
  }

  #[test]
  fn seller_cannot_list_unknown_inscription() {
    let context = context();
    let seller = signer(1);

    assert_eq!(
      SwapPsbtBuilder::new(&context, &seller, FeeRate::from(1))
        .build_seller_partial(&[utxo(1, 5_274)], &InscriptionIndex::new(), &listing(None))
        .unwrap_err()
        .kind(),
      ErrorKind::InscriptionNotFound,
    );
  }

  #[test]
  fn buyer_completes_swap() {
    let context = context();
    let partial = sell(&listing(None));
    let seller_psbt = decode(&partial);

    let built = buy(&partial.psbt, PRICE).unwrap();
    let transaction = &built.transaction;

    assert_eq!(
      transaction
        .input
        .iter()
        .map(|input| input.previous_output)
        .collect::<Vec<OutPoint>>(),
      [outpoint(5), outpoint(1), outpoint(6), outpoint(7), outpoint(8)]
    );

    pretty_assert_eq!(
      transaction.output,
      [
        tx_out(5_874, recipient()),
        tx_out(PRICE, signer(1).address().clone()),
        tx_out(1_000, signer(2).address().clone()),
        tx_out(1_988, signer(2).address().clone()),
      ]
    );

    assert_eq!(built.fee, Amount::from_sat(512));
    assert_eq!(built.change_amount, Amount::from_sat(1_988));
    assert_eq!(
      built.selected_utxos,
      [utxo(5, 600), utxo(6, 5_000), utxo(7, 4_500), utxo(8, 4_000)]
    );
    assert_eq!(
      Amount::from_sat(600 + 5_274 + 13_500),
      output_total(transaction) + built.fee
    );

    assert_eq!(
      Some(&transaction.input[1].witness),
      seller_psbt.inputs[0].final_script_witness.as_ref()
    );

    let prevouts = [
      tx_out(600, signer(2).address().clone()),
      tx_out(5_274, signer(1).address().clone()),
      tx_out(5_000, signer(2).address().clone()),
      tx_out(4_500, signer(2).address().clone()),
      tx_out(4_000, signer(2).address().clone()),
    ];

    let mut cache = SighashCache::new(transaction);

    for (index, input) in transaction.input.iter().enumerate() {
      let signature = taproot::Signature::from_slice(input.witness.nth(0).unwrap()).unwrap();

      let sighash = cache
        .taproot_key_spend_signature_hash(index, &Prevouts::All(&prevouts), signature.sighash_type)
        .unwrap();

      let owner = if index == 1 { signer(1) } else { signer(2) };

      context
        .secp
        .verify_schnorr(
          &signature.signature,
          &Message::from_digest(sighash.to_byte_array()),
          &context.output_key(owner.internal_key()).to_x_only_public_key(),
        )
        .unwrap();
    }
  }

  fn buy_from(funding: u64) -> BuiltTransaction {
    let context = context();
    let buyer = signer(2);

    SwapPsbtBuilder::new(&context, &buyer, FeeRate::from(1))
      .build_buyer_partial(
        &sell(&listing(None)).psbt,
        &[utxo(5, 600), utxo(6, funding)],
        &InscriptionIndex::new(),
        utxo(5, 600),
        Amount::from_sat(PRICE),
        &recipient(),
      )
      .unwrap()
  }

  // three inputs and three outputs at 1 sat/vB
  const BUYER_FEE: u64 = 3 * 68 + 3 * 43;

  #[test]
  fn buyer_change_below_dust_floor_goes_to_fee() {
    for change in [0, 500, 999] {
      let built = buy_from(PRICE + BUYER_FEE + change);

      pretty_assert_eq!(
        built.transaction.output,
        [
          tx_out(5_874, recipient()),
          tx_out(PRICE, signer(1).address().clone()),
        ]
      );
      assert_eq!(built.fee, Amount::from_sat(BUYER_FEE + change));
      assert_eq!(built.change_amount, Amount::ZERO);
    }
  }

  #[test]
  fn buyer_dummy_without_room_for_its_output_fee() {
    let built = buy_from(PRICE + BUYER_FEE + 1_020);

    pretty_assert_eq!(
      built.transaction.output,
      [
        tx_out(5_874, recipient()),
        tx_out(PRICE, signer(1).address().clone()),
        tx_out(1_000, signer(2).address().clone()),
      ]
    );
    assert_eq!(built.fee, Amount::from_sat(BUYER_FEE + 20));
    assert_eq!(built.change_amount, Amount::ZERO);
  }

  #[test]
  fn buyer_dummy_pays_its_output_fee_and_folds_the_rest() {
    let built = buy_from(PRICE + BUYER_FEE + 1_500);

    assert_eq!(
      built.transaction.output[2],
      tx_out(1_000, signer(2).address().clone())
    );
    assert_eq!(built.transaction.output.len(), 3);
    assert_eq!(built.fee, Amount::from_sat(BUYER_FEE + 500));
  }

  #[test]
  fn buyer_rejects_inscribed_dummy() {
    let context = context();
    let buyer = signer(2);

    assert_eq!(
      SwapPsbtBuilder::new(&context, &buyer, FeeRate::from(1))
        .build_buyer_partial(
          &sell(&listing(None)).psbt,
          &buyer_pool(),
          &[(outpoint(5), record(0, 2))]
            .into_iter()
            .collect::<InscriptionIndex>(),
          utxo(5, 600),
          Amount::from_sat(PRICE),
          &recipient(),
        )
        .unwrap_err()
        .kind(),
      ErrorKind::InvalidParameter
    );
  }

  #[test]
  fn buyer_pays_seller_cost_with_fee_leg() {
    let partial = sell(&listing(Some(MarketplaceFee {
      amount: Amount::from_sat(1_000),
      recipient: change(),
    })));

    let built = buy(&partial.psbt, PRICE).unwrap();

    assert_eq!(built.transaction.input.len(), 1 + 2 + 3);
    assert_eq!(built.transaction.output[1], tx_out(9_600, signer(1).address().clone()));
    assert_eq!(built.transaction.output[2], tx_out(1_000, change()));

    let inputs = 600 + 5_274 + 600 + 13_500;
    assert_eq!(
      Amount::from_sat(inputs),
      output_total(&built.transaction) + built.fee
    );
  }

  #[test]
  fn buyer_rejects_price_above_maximum() {
    let partial = sell(&listing(None));

    assert_eq!(
      buy(&partial.psbt, PRICE - 1).unwrap_err().kind(),
      ErrorKind::InvalidParameter
    );
  }

  #[test]
  fn buyer_rejects_unpaired_partial() {
    let mut psbt = decode(&sell(&listing(None)));
    psbt
      .unsigned_tx
      .output
      .push(tx_out(1_000, signer(1).address().clone()));
    psbt.outputs.push(default());

    assert_matches!(
      buy(&encode(&psbt), PRICE),
      Err(SnafuError::MismatchedPartialStructure {
        inputs: 1,
        outputs: 2
      }),
    );
  }

  #[test]
  fn buyer_rejects_unfinalized_seller_input() {
    let mut psbt = decode(&sell(&listing(None)));
    psbt.inputs[0].final_script_witness = None;

    assert_eq!(
      buy(&encode(&psbt), PRICE).unwrap_err().kind(),
      ErrorKind::InvalidParameter
    );
  }

  #[test]
  fn buyer_rejects_garbage() {
    assert_eq!(buy("!!", PRICE).unwrap_err().kind(), ErrorKind::Primitives);
    assert_eq!(
      buy(&base64_encode(b"foo"), PRICE).unwrap_err().kind(),
      ErrorKind::Primitives
    );
  }

  #[test]
  fn bad_seller_signature_is_not_fatal_for_buyer() {
    let mut psbt = decode(&sell(&listing(None)));

    let mut signature = psbt.inputs[0]
      .final_script_witness
      .as_ref()
      .unwrap()
      .nth(0)
      .unwrap()
      .to_vec();
    signature[0] ^= 1;
    psbt.inputs[0].final_script_witness = Some(Witness::from_slice(&[signature]));

    assert!(buy(&encode(&psbt), PRICE).is_ok());
  }

  #[test]
  fn buyer_without_funds() {
    let partial = sell(&listing(None));
    let context = context();
    let buyer = signer(2);

    assert_eq!(
      SwapPsbtBuilder::new(&context, &buyer, FeeRate::from(1))
        .build_buyer_partial(
          &partial.psbt,
          &[utxo(5, 600), utxo(6, 5_000)],
          &InscriptionIndex::new(),
          utxo(5, 600),
          Amount::from_sat(PRICE),
          &recipient(),
        )
        .unwrap_err()
        .kind(),
      ErrorKind::InsufficientBalance
    );
  }
}
