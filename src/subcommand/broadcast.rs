use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Broadcast {
  #[arg(
    required = true,
    help = "Broadcast hex-encoded <TRANSACTIONS> in order, stopping at the first failure."
  )]
  transactions: Vec<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Output {
  pub txids: Vec<Txid>,
}

impl Broadcast {
  pub(crate) fn run(self, settings: Settings) -> SubcommandResult {
    let broadcaster = Broadcaster::new(&settings.broadcast_url()?);

    let runtime = tokio::runtime::Runtime::new()?;

    let mut txids = Vec::new();

    for transaction in &self.transactions {
      txids.push(runtime.block_on(broadcaster.broadcast(transaction))?);
    }

    Ok(Some(Box::new(Output { txids })))
  }
}
