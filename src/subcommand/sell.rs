use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Sell {
  #[command(flatten)]
  snapshot: Snapshot,
  #[arg(long, help = "Use fee rate of <FEE_RATE> sats/vB.")]
  fee_rate: FeeRate,
  #[arg(long, help = "Sell <INSCRIPTION>.")]
  inscription: InscriptionId,
  #[arg(long, help = "Ask <PRICE> for the inscription, e.g. `0.001 btc`.")]
  price: Amount,
  #[arg(long, help = "Receive payment at <RECEIVE>. [default: signing address]")]
  receive: Option<Address<NetworkUnchecked>>,
  #[arg(
    long,
    requires = "marketplace_address",
    help = "Pay a marketplace fee of <MARKETPLACE_FEE> out of the price."
  )]
  marketplace_fee: Option<Amount>,
  #[arg(
    long,
    requires = "marketplace_fee",
    help = "Pay the marketplace fee to <MARKETPLACE_ADDRESS>."
  )]
  marketplace_address: Option<Address<NetworkUnchecked>>,
}

impl Sell {
  pub(crate) fn run(self, settings: Settings) -> SubcommandResult {
    let context = settings.context();
    let signer = settings.signer(&context)?;
    let (utxos, inscriptions) = self.snapshot.load()?;

    let receive = match self.receive {
      Some(address) => address.require_network(context.network())?,
      None => signer.address().clone(),
    };

    let marketplace_fee = match (self.marketplace_fee, self.marketplace_address) {
      (Some(amount), Some(recipient)) => Some(MarketplaceFee {
        amount,
        recipient: recipient.require_network(context.network())?,
      }),
      _ => None,
    };

    let listing = Listing {
      inscription: self.inscription,
      price: self.price,
      receive,
      marketplace_fee,
    };

    let partial = SwapPsbtBuilder::new(&context, &signer, self.fee_rate).build_seller_partial(
      &utxos,
      &inscriptions,
      &listing,
    )?;

    Ok(Some(Box::new(partial)))
  }
}
