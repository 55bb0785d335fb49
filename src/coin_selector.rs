//! Inscription-aware coin selection.
//!
//! A UTXO with an entry in the inscription index is never used as funding.
//! It is only ever spent as the single, explicitly targeted inscription, and
//! an output holding more than one inscription is never spent at all.
//!
//! Funding inputs are picked from the remaining, normal, UTXOs with a fixed
//! greedy policy:
//!
//! - if the smallest UTXO covers the target, take it
//! - if the largest UTXO does not cover the target, accumulate from the
//!   largest down until it is covered
//! - otherwise take the smallest single UTXO that covers the target

use super::*;

/// Outcome of `CoinSelector::select_utxos`.
///
/// The inscription UTXO, if any, is always first in `selected_utxos`, and
/// `inscription_output_value + send_amount + change_amount + fee` equals the
/// sum of `selected_utxos`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
  pub selected_utxos: Vec<Utxo>,
  pub uses_inscription_to_pay_fee: bool,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub inscription_output_value: Amount,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub change_amount: Amount,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub fee: Amount,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CardinalSelection {
  pub utxos: Vec<Utxo>,
  pub dummy: Option<Utxo>,
}

#[derive(Debug, Clone)]
pub struct CoinSelector<'a> {
  inscriptions: &'a InscriptionIndex,
  utxos: Vec<Utxo>,
}

/// Value that can be taken from an inscription output without moving the
/// inscription out of it or leaving it below the dust floor.
pub(crate) fn headroom(utxo: &Utxo, record: &InscriptionRecord) -> Amount {
  Amount::from_sat(
    utxo
      .value
      .to_sat()
      .saturating_sub(record.offset)
      .saturating_sub(1)
      .saturating_sub(DUST_FLOOR.to_sat()),
  )
}

impl<'a> CoinSelector<'a> {
  pub fn new(utxos: &[Utxo], inscriptions: &'a InscriptionIndex) -> Self {
    Self {
      inscriptions,
      utxos: utxos.to_vec(),
    }
  }

  /// A selector over the same UTXOs minus `outpoints`.
  pub fn exclude(&self, outpoints: &[OutPoint]) -> Self {
    Self {
      inscriptions: self.inscriptions,
      utxos: self
        .utxos
        .iter()
        .filter(|utxo| !outpoints.contains(&utxo.outpoint()))
        .copied()
        .collect(),
    }
  }

  /// Normal UTXOs, largest first.
  fn normal_utxos(&self) -> Vec<Utxo> {
    let mut normal = self
      .utxos
      .iter()
      .filter(|utxo| !self.inscriptions.is_inscribed(&utxo.outpoint()))
      .copied()
      .collect::<Vec<Utxo>>();

    normal.sort_by(|a, b| b.value.cmp(&a.value));

    normal
  }

  pub fn select_inscription_utxo(
    &self,
    id: InscriptionId,
  ) -> SnafuResult<(Utxo, InscriptionRecord)> {
    let (utxo, records) = self
      .inscriptions
      .locate(&self.utxos, id)
      .snafu_context(error::InscriptionNotFound { id })?;

    match records {
      [record] => Ok((utxo, *record)),
      _ => error::UnsupportedMultiInscriptionOutput {
        outpoint: utxo.outpoint(),
        count: records.len(),
      }
      .fail(),
    }
  }

  pub fn select_smallest_normal_utxo(&self) -> Option<Utxo> {
    self.normal_utxos().last().copied()
  }

  /// Cover `target` from normal UTXOs. With `reserve_dummy` the smallest
  /// normal UTXO is taken out of the pool first and returned as the dummy.
  pub fn select_cardinal_utxos(
    &self,
    target: Amount,
    reserve_dummy: bool,
  ) -> SnafuResult<CardinalSelection> {
    let mut normal = self.normal_utxos();

    let dummy = if reserve_dummy {
      match normal.pop() {
        Some(dummy) if dummy.value <= DUMMY_THRESHOLD => Some(dummy),
        _ => return error::DummyUtxoUnavailable.fail(),
      }
    } else {
      None
    };

    Ok(CardinalSelection {
      utxos: greedy(&normal, target)?,
      dummy,
    })
  }

  pub fn select_utxos(
    &self,
    target: Option<InscriptionId>,
    send_amount: Amount,
    fee_rate: FeeRate,
    prefer_inscription_pays_fee: bool,
  ) -> SnafuResult<Selection> {
    self.select(
      target,
      send_amount,
      usize::from(send_amount > Amount::ZERO),
      fee_rate,
      prefer_inscription_pays_fee,
    )
  }

  /// `select_utxos` for `payment_outputs` payments totalling `send_amount`.
  pub(crate) fn select(
    &self,
    target: Option<InscriptionId>,
    send_amount: Amount,
    payment_outputs: usize,
    fee_rate: FeeRate,
    prefer_inscription_pays_fee: bool,
  ) -> SnafuResult<Selection> {
    if target.is_none() && send_amount == Amount::ZERO {
      return Ok(Selection::default());
    }

    let inscription = target
      .map(|id| self.select_inscription_utxo(id))
      .transpose()?;

    let has_inscription = inscription.is_some();

    let estimate = |inscription_pays_fee| {
      let (inputs, outputs) =
        FeeModel::counts(has_inscription, payment_outputs, inscription_pays_fee);
      FeeModel::estimate_fee(inputs, outputs, fee_rate)
    };

    let headroom = inscription
      .as_ref()
      .map(|(utxo, record)| headroom(utxo, record))
      .unwrap_or(Amount::ZERO);

    let mut inscription_pays_fee =
      prefer_inscription_pays_fee && has_inscription && send_amount == Amount::ZERO;

    let mut provisional_fee = estimate(inscription_pays_fee);

    if inscription_pays_fee && headroom < provisional_fee {
      log::debug!(
        "inscription headroom of {} sat cannot cover fee of {} sat, funding from cardinal utxos",
        headroom.to_sat(),
        provisional_fee.to_sat(),
      );
      inscription_pays_fee = false;
      provisional_fee = estimate(false);
    }

    let total_target = if inscription_pays_fee {
      send_amount
    } else {
      send_amount + provisional_fee
    };

    let funding = greedy(&self.normal_utxos(), total_target)?;
    let funding_total = utxo::total(&funding);

    let (_, outputs) = FeeModel::counts(has_inscription, payment_outputs, inscription_pays_fee);
    let inputs = funding.len() + usize::from(has_inscription);
    let fee = FeeModel::estimate_fee(inputs, outputs, fee_rate);

    let mut selected_utxos = Vec::with_capacity(inputs);
    selected_utxos.extend(inscription.map(|(utxo, _)| utxo));
    selected_utxos.extend(funding);

    let inscription_value = inscription
      .map(|(utxo, _)| utxo.value)
      .unwrap_or(Amount::ZERO);

    let selection = if inscription_pays_fee {
      let fee = fee.min(headroom);
      Selection {
        selected_utxos,
        uses_inscription_to_pay_fee: true,
        inscription_output_value: inscription_value - fee,
        change_amount: funding_total - send_amount,
        fee,
      }
    } else {
      let available = funding_total - send_amount;
      let fee = fee.min(available);
      Selection {
        selected_utxos,
        uses_inscription_to_pay_fee: false,
        inscription_output_value: inscription_value,
        change_amount: available - fee,
        fee,
      }
    };

    log::debug!(
      "selected {} utxos with fee {} sat and change {} sat",
      selection.selected_utxos.len(),
      selection.fee.to_sat(),
      selection.change_amount.to_sat(),
    );

    Ok(selection)
  }
}

/// Greedy cover of `target` from `normal`, which must be sorted largest
/// first.
fn greedy(normal: &[Utxo], target: Amount) -> SnafuResult<Vec<Utxo>> {
  if target == Amount::ZERO {
    return Ok(Vec::new());
  }

  let (Some(largest), Some(smallest)) = (normal.first(), normal.last()) else {
    return error::InsufficientBalance {
      needed: target,
      available: Amount::ZERO,
    }
    .fail();
  };

  if smallest.value >= target {
    return Ok(vec![*smallest]);
  }

  if largest.value < target {
    let mut selected = Vec::new();
    let mut total = Amount::ZERO;

    for utxo in normal {
      selected.push(*utxo);
      total += utxo.value;
      if total >= target {
        return Ok(selected);
      }
    }

    return error::InsufficientBalance {
      needed: target,
      available: total,
    }
    .fail();
  }

  Ok(
    normal
      .iter()
      .rev()
      .find(|utxo| utxo.value >= target)
      .into_iter()
      .copied()
      .collect(),
  )
}
