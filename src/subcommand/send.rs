use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Send {
  #[command(flatten)]
  snapshot: Snapshot,
  #[arg(long, help = "Use fee rate of <FEE_RATE> sats/vB.")]
  fee_rate: FeeRate,
  #[arg(
    long,
    help = "Send <AMOUNT> of cardinal bitcoin, e.g. `5000 sat`.",
    value_name = "AMOUNT"
  )]
  amount: Option<Amount>,
  #[arg(long, help = "Send <INSCRIPTION>.")]
  inscription: Option<InscriptionId>,
  #[arg(
    long,
    help = "Pay the fee out of the inscription output when it has room above the dust floor."
  )]
  inscription_pays_fee: bool,
  destination: Address<NetworkUnchecked>,
}

impl Send {
  pub(crate) fn run(self, settings: Settings) -> SubcommandResult {
    let context = settings.context();
    let signer = settings.signer(&context)?;
    let (utxos, inscriptions) = self.snapshot.load()?;

    let destination = self.destination.require_network(context.network())?;

    let built = TransactionBuilder::new(&context, &signer, self.fee_rate).build_send(
      &utxos,
      &inscriptions,
      &destination,
      self.inscription,
      self.amount.unwrap_or(Amount::ZERO),
      self.inscription_pays_fee,
    )?;

    Ok(Some(Box::new(built)))
  }
}
