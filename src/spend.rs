use super::*;

/// How a taproot input is spent. Each variant carries exactly the data its
/// path needs, both to populate the PSBT input and to assemble the final
/// witness.
#[derive(Debug, Clone, PartialEq)]
pub enum TaprootSpend {
  KeyPath {
    internal_key: XOnlyPublicKey,
  },
  ScriptPath {
    script: ScriptBuf,
    control_block: ControlBlock,
  },
}

impl TaprootSpend {
  pub(crate) fn prepare(&self, input: &mut psbt::Input) {
    match self {
      Self::KeyPath { internal_key } => input.tap_internal_key = Some(*internal_key),
      Self::ScriptPath {
        script,
        control_block,
      } => {
        input.tap_internal_key = Some(control_block.internal_key);
        input.tap_scripts.insert(
          control_block.clone(),
          (script.clone(), LeafVersion::TapScript),
        );
      }
    }
  }

  /// Witness stack for this spend, built from the signatures collected in
  /// `input`. Pass it to `finalize_input`.
  pub fn witness(&self, index: usize, input: &psbt::Input) -> SnafuResult<Witness> {
    match self {
      Self::KeyPath { .. } => {
        let signature = input
          .tap_key_sig
          .as_ref()
          .snafu_context(error::UnsignedInput { input: index })?;

        Ok(Witness::from_slice(&[signature.to_vec()]))
      }
      Self::ScriptPath {
        script,
        control_block,
      } => {
        let leaf_hash = TapLeafHash::from_script(script, LeafVersion::TapScript);

        let signature = input
          .tap_script_sigs
          .iter()
          .find(|((_, hash), _)| *hash == leaf_hash)
          .map(|(_, signature)| signature)
          .snafu_context(error::UnsignedInput { input: index })?;

        let mut witness = Witness::new();
        witness.push(signature.to_vec());
        witness.push(script.as_bytes());
        witness.push(control_block.serialize());

        Ok(witness)
      }
    }
  }
}

/// Set the final witness of input `index` to whatever `finalize` produces
/// and drop the fields only needed while signing.
pub fn finalize_input<F>(psbt: &mut Psbt, index: usize, finalize: F) -> SnafuResult
where
  F: FnOnce(usize, &psbt::Input) -> SnafuResult<Witness>,
{
  let input = &mut psbt.inputs[index];

  let witness = finalize(index, input)?;

  input.final_script_witness = Some(witness);
  input.partial_sigs.clear();
  input.sighash_type = None;
  input.tap_key_sig = None;
  input.tap_script_sigs.clear();
  input.tap_scripts.clear();
  input.tap_key_origins.clear();
  input.tap_internal_key = None;
  input.tap_merkle_root = None;

  Ok(())
}
