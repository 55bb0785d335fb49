use super::*;

/// Result of asking a signer to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signing {
  Signed,
  /// The signer declined, for example because the user dismissed a wallet
  /// prompt. Builders stop and report `SnafuError::Cancelled`.
  Cancelled,
}

/// The capability to sign taproot key-path inputs for one address.
///
/// Implementations read each input's `sighash_type` (absent means
/// `SIGHASH_DEFAULT`) and `witness_utxo`, and write `tap_key_sig`.
pub trait Signer {
  fn address(&self) -> &Address;

  fn internal_key(&self) -> XOnlyPublicKey;

  fn sign(&self, context: &Context, psbt: &mut Psbt, inputs: &[usize]) -> SnafuResult<Signing>;
}

/// Signs with a secret key held in memory.
#[derive(Debug, Clone)]
pub struct KeySigner {
  address: Address,
  keypair: Keypair,
}

impl KeySigner {
  pub fn new(context: &Context, secret_key: SecretKey) -> Self {
    let keypair = Keypair::from_secret_key(&context.secp, &secret_key);
    let (internal_key, _parity) = keypair.x_only_public_key();

    Self {
      address: Address::p2tr(&context.secp, internal_key, None, context.network),
      keypair,
    }
  }

  pub fn from_wif(context: &Context, wif: &str) -> Result<Self> {
    let private_key = PrivateKey::from_wif(wif).context("invalid WIF private key")?;

    ensure!(
      private_key.network == context.network.into(),
      "private key is for {:?}, not {}",
      private_key.network,
      context.network,
    );

    Ok(Self::new(context, private_key.inner))
  }
}

impl Signer for KeySigner {
  fn address(&self) -> &Address {
    &self.address
  }

  fn internal_key(&self) -> XOnlyPublicKey {
    self.keypair.x_only_public_key().0
  }

  fn sign(&self, context: &Context, psbt: &mut Psbt, inputs: &[usize]) -> SnafuResult<Signing> {
    let tweaked: TweakedKeypair = self.keypair.tap_tweak(&context.secp, None);

    for &index in inputs {
      let sighash_type = psbt.inputs[index]
        .sighash_type
        .map(|sighash_type| sighash_type.taproot_hash_ty())
        .transpose()
        .snafu_context(error::SighashType { input: index })?
        .unwrap_or(TapSighashType::Default);

      let message = key_spend_message(psbt, index, sighash_type)?;

      let signature = context
        .secp
        .sign_schnorr_no_aux_rand(&message, &tweaked.to_keypair());

      tprintln!("signed input {index} with {sighash_type}");

      psbt.inputs[index].tap_key_sig = Some(taproot::Signature {
        signature,
        sighash_type,
      });
    }

    Ok(Signing::Signed)
  }
}

fn witness_utxo(psbt: &Psbt, index: usize) -> SnafuResult<&TxOut> {
  psbt.inputs[index]
    .witness_utxo
    .as_ref()
    .snafu_context(error::MissingWitnessUtxo { input: index })
}

fn anyone_can_pay(sighash_type: TapSighashType) -> bool {
  matches!(
    sighash_type,
    TapSighashType::AllPlusAnyoneCanPay
      | TapSighashType::NonePlusAnyoneCanPay
      | TapSighashType::SinglePlusAnyoneCanPay
  )
}

/// The message a key-path signature of input `index` commits to. With
/// ANYONECANPAY only that input's own witness utxo is needed; otherwise every
/// input must carry one.
pub(crate) fn key_spend_message(
  psbt: &Psbt,
  index: usize,
  sighash_type: TapSighashType,
) -> SnafuResult<Message> {
  let mut sighash_cache = SighashCache::new(&psbt.unsigned_tx);

  let sighash = if anyone_can_pay(sighash_type) {
    sighash_cache.taproot_key_spend_signature_hash(
      index,
      &Prevouts::One(index, witness_utxo(psbt, index)?),
      sighash_type,
    )
  } else {
    let prevouts = (0..psbt.inputs.len())
      .map(|input| witness_utxo(psbt, input))
      .collect::<SnafuResult<Vec<&TxOut>>>()?;

    sighash_cache.taproot_key_spend_signature_hash(
      index,
      &Prevouts::All(&prevouts),
      sighash_type,
    )
  }
  .snafu_context(error::Sighash { input: index })?;

  Ok(Message::from_digest(sighash.to_byte_array()))
}

/// Check a key-path signature on input `index` against `output_key`.
pub(crate) fn verify_key_spend(
  context: &Context,
  psbt: &Psbt,
  index: usize,
  signature: &taproot::Signature,
  output_key: XOnlyPublicKey,
) -> SnafuResult {
  let message = key_spend_message(psbt, index, signature.sighash_type)?;

  context
    .secp
    .verify_schnorr(&signature.signature, &message, &output_key)
    .snafu_context(error::InvalidSignature { input: index })
}

/// Check the key-path signature in the final witness of input `index`.
pub(crate) fn verify_finalized_key_spend(
  context: &Context,
  psbt: &Psbt,
  index: usize,
  output_key: XOnlyPublicKey,
) -> SnafuResult {
  let signature = psbt.inputs[index]
    .final_script_witness
    .as_ref()
    .and_then(|witness| witness.nth(0))
    .and_then(|signature| taproot::Signature::from_slice(signature).ok())
    .snafu_context(error::UnsignedInput { input: index })?;

  verify_key_spend(context, psbt, index, &signature, output_key)
}

/// Output key of a P2TR script pubkey.
pub(crate) fn p2tr_output_key(script_pubkey: &Script) -> Option<XOnlyPublicKey> {
  if !script_pubkey.is_p2tr() {
    return None;
  }

  XOnlyPublicKey::from_slice(&script_pubkey.as_bytes()[2..]).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn psbt_spending(signer: &KeySigner, values: &[u64]) -> Psbt {
    let mut psbt = Psbt::from_unsigned_tx(Transaction {
      version: Version::TWO,
      lock_time: LockTime::ZERO,
      input: (1..=values.len())
        .map(|n| unsigned_input(outpoint(n.try_into().unwrap())))
        .collect(),
      output: vec![tx_out(values.iter().sum::<u64>() - 500, recipient())],
    })
    .unwrap();

    for (input, value) in psbt.inputs.iter_mut().zip(values) {
      input.witness_utxo = Some(tx_out(*value, signer.address().clone()));
    }

    psbt
  }

  #[test]
  fn address_is_key_path_p2tr() {
    let signer = signer(1);
    let context = context();

    assert_eq!(
      signer.address().script_pubkey(),
      ScriptBuf::new_p2tr(&context.secp, signer.internal_key(), None)
    );
    assert_eq!(
      p2tr_output_key(&signer.address().script_pubkey()),
      Some(context.output_key(signer.internal_key()).to_x_only_public_key())
    );
    assert_eq!(p2tr_output_key(&ScriptBuf::new()), None);
  }

  #[test]
  fn from_wif() {
    let context = context();
    let wif = PrivateKey::new(secret_key(1), Network::Regtest).to_wif();

    assert_eq!(
      KeySigner::from_wif(&context, &wif).unwrap().address(),
      signer(1).address()
    );

    let mainnet = PrivateKey::new(secret_key(1), Network::Bitcoin).to_wif();
    assert!(KeySigner::from_wif(&context, &mainnet).is_err());
    assert!(KeySigner::from_wif(&context, "foo").is_err());
  }

  #[test]
  fn signatures_verify_against_output_key() {
    let context = context();
    let owner = signer(1);
    let mut psbt = psbt_spending(&owner, &[5_000, 7_000]);

    assert_eq!(
      owner.sign(&context, &mut psbt, &[0, 1]).unwrap(),
      Signing::Signed
    );

    let output_key = context.output_key(owner.internal_key()).to_x_only_public_key();

    for index in 0..2 {
      let signature = psbt.inputs[index].tap_key_sig.unwrap();
      assert_eq!(signature.sighash_type, TapSighashType::Default);
      verify_key_spend(&context, &psbt, index, &signature, output_key).unwrap();
    }

    let other = context.output_key(signer(2).internal_key()).to_x_only_public_key();
    let signature = psbt.inputs[0].tap_key_sig.unwrap();
    assert_eq!(
      verify_key_spend(&context, &psbt, 0, &signature, other)
        .unwrap_err()
        .kind(),
      ErrorKind::InvalidSignature
    );
  }

  #[test]
  fn default_sighash_needs_every_witness_utxo() {
    let context = context();
    let signer = signer(1);
    let mut psbt = psbt_spending(&signer, &[5_000, 7_000]);
    psbt.inputs[1].witness_utxo = None;

    assert_matches!(
      signer.sign(&context, &mut psbt, &[0]),
      Err(SnafuError::MissingWitnessUtxo { input: 1 }),
    );
  }

  #[test]
  fn anyone_can_pay_needs_only_own_witness_utxo() {
    let context = context();
    let signer = signer(1);
    let mut psbt = psbt_spending(&signer, &[5_000, 7_000]);
    psbt.inputs[1].witness_utxo = None;
    psbt.inputs[0].sighash_type = Some(TapSighashType::SinglePlusAnyoneCanPay.into());

    signer.sign(&context, &mut psbt, &[0]).unwrap();

    assert_eq!(
      psbt.inputs[0].tap_key_sig.unwrap().sighash_type,
      TapSighashType::SinglePlusAnyoneCanPay
    );
  }
}
