use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Dummy {
  #[command(flatten)]
  snapshot: Snapshot,
  #[arg(long, help = "Use fee rate of <FEE_RATE> sats/vB.")]
  fee_rate: FeeRate,
}

impl Dummy {
  pub(crate) fn run(self, settings: Settings) -> SubcommandResult {
    let context = settings.context();
    let signer = settings.signer(&context)?;
    let (utxos, inscriptions) = self.snapshot.load()?;

    let dummy = DummyUtxoManager::new(&context, &signer, self.fee_rate)
      .ensure_dummy_utxo(&utxos, &inscriptions)?;

    Ok(Some(Box::new(dummy)))
  }
}
