//! Inscription envelopes and the commit/reveal pair that writes them.
//!
//! The envelope content is the protocol tag, the reimbursement address as
//! text, then every data chunk prefixed with its length as a big-endian
//! `u32`. Content is cut into pushes of at most `MAX_PUSH_SIZE` bytes, each
//! with the smallest push encoding that fits, and wrapped in a branch that
//! never executes:
//!
//! ```text
//! <throwaway key> OP_CHECKSIG OP_FALSE OP_IF <push> <push> ... OP_ENDIF
//! ```

use {
  super::*,
  bitcoin::{
    opcodes::all::{
      OP_CHECKSIG, OP_ENDIF, OP_IF, OP_PUSHBYTES_0, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4,
      OP_PUSHNUM_1, OP_PUSHNUM_16, OP_PUSHNUM_NEG1,
    },
    script::Instruction,
  },
  std::collections::BTreeSet,
};

const LENGTH_PREFIX_SIZE: usize = 4;

/// Decoded envelope content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
  pub tag: Vec<u8>,
  pub reimbursement: String,
  pub chunks: Vec<Vec<u8>>,
}

fn push_minimal(script: &mut Vec<u8>, data: &[u8]) {
  match data {
    [] => script.push(OP_PUSHBYTES_0.to_u8()),
    [n @ 1..=16] => script.push(OP_PUSHNUM_1.to_u8() + n - 1),
    [0x81] => script.push(OP_PUSHNUM_NEG1.to_u8()),
    _ => {
      let len = data.len();
      if let Ok(len) = u8::try_from(len) {
        if len > 75 {
          script.push(OP_PUSHDATA1.to_u8());
        }
        script.push(len);
      } else if let Ok(len) = u16::try_from(len) {
        script.push(OP_PUSHDATA2.to_u8());
        script.extend(len.to_le_bytes());
      } else {
        script.push(OP_PUSHDATA4.to_u8());
        script.extend(
          u32::try_from(len)
            .expect("push larger than u32::MAX")
            .to_le_bytes(),
        );
      }
      script.extend(data);
    }
  }
}

/// Encode the envelope body: the pushes that go between `OP_IF` and
/// `OP_ENDIF`.
pub fn encode_envelope(
  tag: &[u8],
  reimbursement: &Address,
  chunks: &[Vec<u8>],
) -> SnafuResult<ScriptBuf> {
  let reimbursement = reimbursement.to_string();

  let mut content = Vec::with_capacity(
    tag.len()
      + reimbursement.len()
      + chunks
        .iter()
        .map(|chunk| LENGTH_PREFIX_SIZE + chunk.len())
        .sum::<usize>(),
  );

  content.extend(tag);
  content.extend(reimbursement.as_bytes());

  for chunk in chunks {
    let len = u32::try_from(chunk.len()).ok().snafu_context(error::InvalidParameter {
      reason: format!("data chunk of {} bytes is too large", chunk.len()),
    })?;
    content.extend(len.to_be_bytes());
    content.extend(chunk);
  }

  let mut script = Vec::new();

  for piece in content.chunks(MAX_PUSH_SIZE) {
    push_minimal(&mut script, piece);
  }

  Ok(ScriptBuf::from_bytes(script))
}

/// Decode the envelope in `script`, which may be either a full lock script
/// or a bare envelope body. Returns `None` if the content does not start
/// with `tag` or is malformed.
pub fn decode_envelope(script: &Script, tag: &[u8]) -> Option<Envelope> {
  let instructions = script
    .instructions()
    .collect::<Result<Vec<Instruction>, _>>()
    .ok()?;

  let start = instructions
    .windows(2)
    .position(|window| match window {
      [Instruction::PushBytes(push), Instruction::Op(op)] => push.is_empty() && *op == OP_IF,
      _ => false,
    })
    .map(|position| position + 2)
    .unwrap_or_default();

  let mut content = Vec::new();

  for instruction in &instructions[start..] {
    match instruction {
      Instruction::PushBytes(push) => content.extend(push.as_bytes()),
      Instruction::Op(op) if *op == OP_ENDIF => break,
      Instruction::Op(op) if *op == OP_PUSHNUM_NEG1 => content.push(0x81),
      Instruction::Op(op)
        if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&op.to_u8()) =>
      {
        content.push(op.to_u8() - OP_PUSHNUM_1.to_u8() + 1);
      }
      Instruction::Op(_) => return None,
    }
  }

  let rest = content.strip_prefix(tag)?;

  let address_len = rest
    .iter()
    .take_while(|byte| byte.is_ascii_alphanumeric())
    .count();

  let (address, mut rest) = rest.split_at(address_len);

  let mut chunks = Vec::new();

  while !rest.is_empty() {
    if rest.len() < LENGTH_PREFIX_SIZE {
      return None;
    }
    let (len, tail) = rest.split_at(LENGTH_PREFIX_SIZE);
    let len = usize::try_from(u32::from_be_bytes(len.try_into().ok()?)).ok()?;
    if tail.len() < len {
      return None;
    }
    let (chunk, tail) = tail.split_at(len);
    chunks.push(chunk.to_vec());
    rest = tail;
  }

  Some(Envelope {
    tag: tag.to_vec(),
    reimbursement: String::from_utf8(address.to_vec()).ok()?,
    chunks,
  })
}

/// A single-leaf taproot output whose leaf carries an envelope.
#[derive(Debug, Clone)]
pub struct LockScript {
  /// Single-use key the leaf script checks.
  pub keypair: Keypair,
  pub script: ScriptBuf,
  pub spend_info: TaprootSpendInfo,
  pub control_block: ControlBlock,
  pub address: Address,
}

impl LockScript {
  pub fn spend(&self) -> TaprootSpend {
    TaprootSpend::ScriptPath {
      script: self.script.clone(),
      control_block: self.control_block.clone(),
    }
  }
}

/// A funded commit and the reveal spending it. Neither is broadcast; the
/// commit must be broadcast first.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReveal {
  pub commit: BuiltTransaction,
  pub reveal: BuiltTransaction,
  pub script_address: Address,
  #[serde(skip)]
  pub lock_script: LockScript,
}

pub struct InscriptionEnvelopeBuilder<'a, S> {
  context: &'a Context,
  fee_rate: FeeRate,
  signer: &'a S,
  tag: Vec<u8>,
}

impl<'a, S: Signer> InscriptionEnvelopeBuilder<'a, S> {
  pub fn new(context: &'a Context, signer: &'a S, fee_rate: FeeRate, tag: &[u8]) -> Self {
    Self {
      context,
      fee_rate,
      signer,
      tag: tag.to_vec(),
    }
  }

  /// Build a lock script for a fresh throwaway key. The tree's internal key
  /// is `internal_key`, so its owner can also recover the output by key
  /// path.
  pub fn build_lock_script(
    &self,
    internal_key: XOnlyPublicKey,
    chunks: &[Vec<u8>],
    reimbursement: &Address,
  ) -> SnafuResult<LockScript> {
    let keypair = Keypair::new(&self.context.secp, &mut secp256k1::rand::thread_rng());
    self.build_lock_script_with_keypair(keypair, internal_key, chunks, reimbursement)
  }

  pub(crate) fn build_lock_script_with_keypair(
    &self,
    keypair: Keypair,
    internal_key: XOnlyPublicKey,
    chunks: &[Vec<u8>],
    reimbursement: &Address,
  ) -> SnafuResult<LockScript> {
    let (public_key, _parity) = keypair.x_only_public_key();

    let mut script = ScriptBuf::builder()
      .push_slice(public_key.serialize())
      .push_opcode(OP_CHECKSIG)
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(OP_IF)
      .into_script()
      .into_bytes();

    script.extend(encode_envelope(&self.tag, reimbursement, chunks)?.as_bytes());
    script.push(OP_ENDIF.to_u8());

    let script = ScriptBuf::from_bytes(script);

    let spend_info = TaprootBuilder::new()
      .add_leaf(0, script.clone())
      .expect("adding leaf should work")
      .finalize(&self.context.secp, internal_key)
      .expect("finalizing taproot builder should work");

    let control_block = spend_info
      .control_block(&(script.clone(), LeafVersion::TapScript))
      .expect("should compute control block");

    let address = Address::p2tr_tweaked(spend_info.output_key(), self.context.network);

    Ok(LockScript {
      keypair,
      script,
      spend_info,
      control_block,
      address,
    })
  }

  fn unsigned_reveal(&self, commit: OutPoint) -> Transaction {
    Transaction {
      version: Version::TWO,
      lock_time: LockTime::ZERO,
      input: vec![unsigned_input(commit)],
      output: vec![TxOut {
        value: DUST_FLOOR,
        script_pubkey: self.signer.address().script_pubkey(),
      }],
    }
  }

  /// Fee for the reveal, measured with a zeroed signature in place of the
  /// real one.
  fn reveal_fee(&self, lock_script: &LockScript) -> Amount {
    let mut reveal = self.unsigned_reveal(OutPoint::null());

    let mut witness = Witness::new();
    witness.push(
      taproot::Signature::from_slice(&[0; SCHNORR_SIGNATURE_SIZE])
        .expect("zeroed signature should parse")
        .to_vec(),
    );
    witness.push(lock_script.script.as_bytes());
    witness.push(lock_script.control_block.serialize());
    reveal.input[0].witness = witness;

    self.fee_rate.fee(reveal.vsize())
  }

  /// Build the commit funding `lock_script` and the reveal spending it.
  ///
  /// The commit is rebuilt at the vsize it was last observed at until the
  /// fee it pays matches its own size.
  pub fn create_commit_and_reveal(
    &self,
    utxos: &[Utxo],
    inscriptions: &InscriptionIndex,
    chunks: &[Vec<u8>],
    reimbursement: &Address,
  ) -> SnafuResult<CommitReveal> {
    let lock_script = self.build_lock_script(self.signer.internal_key(), chunks, reimbursement)?;
    self.commit_and_reveal(utxos, inscriptions, lock_script)
  }

  pub(crate) fn commit_and_reveal(
    &self,
    utxos: &[Utxo],
    inscriptions: &InscriptionIndex,
    lock_script: LockScript,
  ) -> SnafuResult<CommitReveal> {
    let reveal_fee = self.reveal_fee(&lock_script);
    let commit_value = reveal_fee + DUST_FLOOR;

    let payments = [PaymentInfo {
      address: lock_script.address.clone(),
      amount: commit_value,
    }];

    let builder = TransactionBuilder::new(self.context, self.signer, self.fee_rate);

    let (inputs, outputs) = FeeModel::counts(false, payments.len(), false);

    let commit = discover_vsize(FeeModel::estimate_vbytes(inputs, outputs), |vsize| {
      builder.build_batch_send_at_vsize(utxos, inscriptions, &payments, vsize)
    })?;

    let commit_output = commit.transaction.output[0].clone();

    let mut psbt = Psbt::from_unsigned_tx(self.unsigned_reveal(OutPoint {
      txid: commit.txid,
      vout: 0,
    }))
    .snafu_context(error::Psbt)?;

    psbt.inputs[0].witness_utxo = Some(commit_output.clone());

    let spend = lock_script.spend();
    spend.prepare(&mut psbt.inputs[0]);

    let leaf_hash = TapLeafHash::from_script(&lock_script.script, LeafVersion::TapScript);

    let sighash = SighashCache::new(&psbt.unsigned_tx)
      .taproot_script_spend_signature_hash(
        0,
        &Prevouts::All(&[commit_output]),
        leaf_hash,
        TapSighashType::Default,
      )
      .snafu_context(error::Sighash { input: 0usize })?;

    let signature = self.context.secp.sign_schnorr_no_aux_rand(
      &Message::from_digest(sighash.to_byte_array()),
      &lock_script.keypair,
    );

    psbt.inputs[0].tap_script_sigs.insert(
      (lock_script.keypair.x_only_public_key().0, leaf_hash),
      taproot::Signature {
        signature,
        sighash_type: TapSighashType::Default,
      },
    );

    finalize_input(&mut psbt, 0, |index, input| spend.witness(index, input))?;

    let reveal = BuiltTransaction::new(
      psbt.extract_tx_unchecked_fee_rate(),
      reveal_fee,
      vec![Utxo::unbroadcast(commit.txid, 0, commit_value)],
      Amount::ZERO,
    );

    log::info!(
      "built commit {} and reveal {} for {}",
      commit.txid,
      reveal.txid,
      lock_script.address,
    );

    Ok(CommitReveal {
      commit,
      reveal,
      script_address: lock_script.address.clone(),
      lock_script,
    })
  }
}

/// Build at `vsize` until the built transaction's vsize equals the vsize it
/// was built for.
///
/// Change near the dust floor can make the size alternate between a build
/// with a change output and one without. When a build comes out smaller
/// than a size already tried, it pays for more vbytes than it has and is
/// returned as is.
fn discover_vsize<F>(mut vsize: usize, mut build: F) -> SnafuResult<BuiltTransaction>
where
  F: FnMut(usize) -> SnafuResult<BuiltTransaction>,
{
  let mut tried = BTreeSet::new();

  for attempt in 0..SIZE_DISCOVERY_ATTEMPTS {
    let built = build(vsize)?;
    let observed = built.vsize();

    if observed == vsize || (observed < vsize && tried.contains(&observed)) {
      return Ok(built);
    }

    log::debug!("commit attempt {attempt} built at {vsize} vbytes measured {observed} vbytes");

    tried.insert(vsize);
    vsize = observed;
  }

  error::SizeDiscoveryExhausted { last_vsize: vsize }.fail()
}
