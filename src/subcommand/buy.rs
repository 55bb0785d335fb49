use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Buy {
  #[command(flatten)]
  snapshot: Snapshot,
  #[arg(long, help = "Use fee rate of <FEE_RATE> sats/vB.")]
  fee_rate: FeeRate,
  #[arg(long, help = "Complete base64 partial transaction <PSBT>.")]
  psbt: String,
  #[arg(long, help = "Refuse to pay more than <MAX_PRICE> to the seller.")]
  max_price: Amount,
  #[arg(
    long,
    help = "Anchor the swap with dummy UTXO <DUMMY>. [default: smallest uninscribed UTXO of at most 1000 sat]"
  )]
  dummy: Option<OutPoint>,
  #[arg(long, help = "Receive the inscription at <RECEIVE>. [default: signing address]")]
  receive: Option<Address<NetworkUnchecked>>,
}

impl Buy {
  pub(crate) fn run(self, settings: Settings) -> SubcommandResult {
    let context = settings.context();
    let signer = settings.signer(&context)?;
    let (utxos, inscriptions) = self.snapshot.load()?;

    let dummy = match self.dummy {
      Some(outpoint) => *utxos
        .iter()
        .find(|utxo| utxo.outpoint() == outpoint)
        .ok_or_else(|| anyhow!("dummy utxo {outpoint} not in wallet utxos"))?,
      None => crate::dummy::find_existing_dummy(&utxos, &inscriptions)
        .ok_or(SnafuError::DummyUtxoUnavailable)?,
    };

    let receive = match self.receive {
      Some(address) => address.require_network(context.network())?,
      None => signer.address().clone(),
    };

    let built = SwapPsbtBuilder::new(&context, &signer, self.fee_rate).build_buyer_partial(
      &self.psbt,
      &utxos,
      &inscriptions,
      dummy,
      self.max_price,
      &receive,
    )?;

    Ok(Some(Box::new(built)))
  }
}
