use super::*;

/// One `<ADDRESS>:<SATS>` leg of a batch.
#[derive(Debug, Clone, PartialEq)]
struct Payment {
  address: Address<NetworkUnchecked>,
  amount: Amount,
}

impl FromStr for Payment {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (address, sats) = s
      .split_once(':')
      .ok_or_else(|| anyhow!("payment `{s}` must be of the form <ADDRESS>:<SATS>"))?;

    Ok(Self {
      address: address.parse()?,
      amount: Amount::from_sat(
        sats
          .parse()
          .with_context(|| format!("invalid amount in payment `{s}`"))?,
      ),
    })
  }
}

#[derive(Debug, Parser)]
pub(crate) struct BatchSend {
  #[command(flatten)]
  snapshot: Snapshot,
  #[arg(long, help = "Use fee rate of <FEE_RATE> sats/vB.")]
  fee_rate: FeeRate,
  #[arg(long, help = "Leave an existing dummy UTXO out of funding.")]
  keep_dummy: bool,
  #[arg(required = true, value_name = "ADDRESS:SATS")]
  payments: Vec<Payment>,
}

impl BatchSend {
  pub(crate) fn run(self, settings: Settings) -> SubcommandResult {
    let context = settings.context();
    let signer = settings.signer(&context)?;
    let (utxos, inscriptions) = self.snapshot.load()?;

    let payments = self
      .payments
      .into_iter()
      .map(|payment| {
        Ok(PaymentInfo {
          address: payment.address.require_network(context.network())?,
          amount: payment.amount,
        })
      })
      .collect::<Result<Vec<PaymentInfo>>>()?;

    let built = TransactionBuilder::new(&context, &signer, self.fee_rate).build_batch_send(
      &utxos,
      &inscriptions,
      &payments,
      self.keep_dummy,
    )?;

    Ok(Some(Box::new(built)))
  }
}
