use super::*;

/// Linear vbyte model for taproot key-path spends.
///
/// Not byte exact. Callers estimate once to pick inputs, then again with the
/// counts they actually ended up with.
pub struct FeeModel;

impl FeeModel {
  pub const INPUT_VBYTES: usize = 68;
  pub const OUTPUT_VBYTES: usize = 43;

  /// Predict `(inputs, outputs)` for a spend that transfers an inscription
  /// (`has_inscription`), pays `send_amount` and funds the fee from either
  /// the inscription or a cardinal input.
  pub fn estimate_input_output_counts(
    has_inscription: bool,
    send_amount: Amount,
    inscription_pays_fee: bool,
  ) -> (usize, usize) {
    Self::counts(
      has_inscription,
      usize::from(send_amount > Amount::ZERO),
      inscription_pays_fee,
    )
  }

  pub(crate) fn counts(
    has_inscription: bool,
    payment_outputs: usize,
    inscription_pays_fee: bool,
  ) -> (usize, usize) {
    let mut inputs = 0;
    let mut outputs = payment_outputs;

    if has_inscription {
      inputs += 1;
      outputs += 1;
    }

    if !inscription_pays_fee {
      outputs += 1;
    }

    if payment_outputs > 0 || !inscription_pays_fee {
      inputs += 1;
    }

    (inputs, outputs)
  }

  pub fn estimate_vbytes(inputs: usize, outputs: usize) -> usize {
    Self::INPUT_VBYTES * inputs + Self::OUTPUT_VBYTES * outputs
  }

  pub fn estimate_fee(inputs: usize, outputs: usize, fee_rate: FeeRate) -> Amount {
    fee_rate.fee(Self::estimate_vbytes(inputs, outputs))
  }
}
