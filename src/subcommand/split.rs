use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Split {
  #[command(flatten)]
  snapshot: Snapshot,
  #[arg(long, help = "Use fee rate of <FEE_RATE> sats/vB.")]
  fee_rate: FeeRate,
  #[arg(long, help = "Split the output holding <INSCRIPTION>.")]
  inscription: InscriptionId,
  #[arg(
    long,
    help = "Carve <AMOUNT> off into a separate output, e.g. `5000 sat`.",
    value_name = "AMOUNT"
  )]
  amount: Amount,
}

impl Split {
  pub(crate) fn run(self, settings: Settings) -> SubcommandResult {
    let context = settings.context();
    let signer = settings.signer(&context)?;
    let (utxos, inscriptions) = self.snapshot.load()?;

    let (utxo, record) =
      CoinSelector::new(&utxos, &inscriptions).select_inscription_utxo(self.inscription)?;

    let built = TransactionBuilder::new(&context, &signer, self.fee_rate)
      .build_inscription_split(utxo, record, self.amount)?;

    Ok(Some(Box::new(built)))
  }
}
