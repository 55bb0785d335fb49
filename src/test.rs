pub(crate) use {super::*, pretty_assertions::assert_eq as pretty_assert_eq};

macro_rules! assert_matches {
  ($expression:expr, $( $pattern:pat_param )|+ $( if $guard:expr )? $(,)?) => {
    match $expression {
      $( $pattern )|+ $( if $guard )? => {}
      left => panic!(
        "assertion failed: (left ~= right)\n  left: `{:?}`\n right: `{}`",
        left,
        stringify!($($pattern)|+ $(if $guard)?)
      ),
    }
  }
}

pub(crate) fn txid(n: u64) -> Txid {
  let hex = format!("{n:x}");

  if hex.is_empty() || hex.len() > 1 {
    panic!();
  }

  hex.repeat(64).parse().unwrap()
}

pub(crate) fn outpoint(n: u64) -> OutPoint {
  format!("{}:{}", txid(n), n).parse().unwrap()
}

pub(crate) fn inscription_id(n: u32) -> InscriptionId {
  let hex = format!("{n:x}");

  if hex.is_empty() || hex.len() > 1 {
    panic!();
  }

  format!("{}i{n}", hex.repeat(64)).parse().unwrap()
}

pub(crate) fn record(offset: u64, n: u32) -> InscriptionRecord {
  InscriptionRecord {
    offset,
    id: inscription_id(n),
  }
}

pub(crate) fn utxo(n: u64, value: u64) -> Utxo {
  Utxo::new(outpoint(n), Amount::from_sat(value))
}

pub(crate) fn context() -> Context {
  Context::new(Network::Regtest)
}

pub(crate) fn secret_key(n: u8) -> SecretKey {
  SecretKey::from_slice(&[n; 32]).unwrap()
}

pub(crate) fn signer(n: u8) -> KeySigner {
  KeySigner::new(&context(), secret_key(n))
}

pub(crate) fn recipient() -> Address {
  signer(200).address().clone()
}

pub(crate) fn change() -> Address {
  signer(201).address().clone()
}

pub(crate) fn tx_out(value: u64, address: Address) -> TxOut {
  TxOut {
    value: Amount::from_sat(value),
    script_pubkey: address.script_pubkey(),
  }
}

/// Sum of a transaction's output values.
pub(crate) fn output_total(transaction: &Transaction) -> Amount {
  transaction.output.iter().map(|output| output.value).sum()
}

/// A signer whose user always dismisses the prompt.
pub(crate) struct CancellingSigner(pub(crate) KeySigner);

impl Signer for CancellingSigner {
  fn address(&self) -> &Address {
    self.0.address()
  }

  fn internal_key(&self) -> XOnlyPublicKey {
    self.0.internal_key()
  }

  fn sign(&self, _: &Context, _: &mut Psbt, _: &[usize]) -> SnafuResult<Signing> {
    Ok(Signing::Cancelled)
  }
}

/// Check every input of `built` carries a valid key-path signature by
/// `signer` over its own outputs.
pub(crate) fn assert_key_path_signed<S: Signer>(
  context: &Context,
  built: &BuiltTransaction,
  signer: &S,
) {
  let prevouts = built
    .selected_utxos
    .iter()
    .map(|utxo| TxOut {
      value: utxo.value,
      script_pubkey: signer.address().script_pubkey(),
    })
    .collect::<Vec<TxOut>>();

  let output_key = context.output_key(signer.internal_key()).to_x_only_public_key();

  let mut cache = SighashCache::new(&built.transaction);

  for (index, input) in built.transaction.input.iter().enumerate() {
    assert_eq!(input.witness.len(), 1);

    let signature = taproot::Signature::from_slice(input.witness.nth(0).unwrap()).unwrap();

    let sighash = cache
      .taproot_key_spend_signature_hash(index, &Prevouts::All(&prevouts), signature.sighash_type)
      .unwrap();

    context
      .secp
      .verify_schnorr(
        &signature.signature,
        &Message::from_digest(sighash.to_byte_array()),
        &output_key,
      )
      .unwrap();
  }
}
