use {super::*, clap::ValueEnum};

mod batch_send;
mod broadcast;
mod buy;
mod dummy;
mod inscribe;
mod sell;
mod send;
mod split;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
  #[command(about = "Pay several recipients in one transaction")]
  BatchSend(batch_send::BatchSend),
  #[command(about = "Broadcast signed transactions")]
  Broadcast(broadcast::Broadcast),
  #[command(about = "Complete a seller's partial transaction")]
  Buy(buy::Buy),
  #[command(about = "Find or create a dummy UTXO for swaps")]
  Dummy(dummy::Dummy),
  #[command(about = "Build an envelope commit and reveal")]
  Inscribe(inscribe::Inscribe),
  #[command(about = "List an inscription for sale")]
  Sell(sell::Sell),
  #[command(about = "Send an inscription or bitcoin")]
  Send(send::Send),
  #[command(about = "Carve postage off an inscription output")]
  Split(split::Split),
}

impl Subcommand {
  pub(crate) fn run(self, settings: Settings) -> SubcommandResult {
    match self {
      Self::BatchSend(batch_send) => batch_send.run(settings),
      Self::Broadcast(broadcast) => broadcast.run(settings),
      Self::Buy(buy) => buy.run(settings),
      Self::Dummy(dummy) => dummy.run(settings),
      Self::Inscribe(inscribe) => inscribe.run(settings),
      Self::Sell(sell) => sell.run(settings),
      Self::Send(send) => send.run(settings),
      Self::Split(split) => split.run(settings),
    }
  }
}

/// The wallet state a builder works from: the spendable outputs and the
/// inscriptions known to sit in them.
#[derive(Debug, Parser)]
pub(crate) struct Snapshot {
  #[arg(long, help = "Load wallet UTXOs from JSON file <UTXOS>.")]
  pub(crate) utxos: PathBuf,
  #[arg(
    long,
    help = "Load inscription index from JSON file <INSCRIPTIONS>. [default: no inscriptions]"
  )]
  pub(crate) inscriptions: Option<PathBuf>,
}

impl Snapshot {
  pub(crate) fn load(&self) -> Result<(Vec<Utxo>, InscriptionIndex)> {
    let utxos = serde_json::from_reader(
      File::open(&self.utxos)
        .with_context(|| format!("failed to open `{}`", self.utxos.display()))?,
    )
    .with_context(|| format!("failed to parse utxos `{}`", self.utxos.display()))?;

    let inscriptions = match &self.inscriptions {
      Some(path) => InscriptionIndex::load(path)?,
      None => InscriptionIndex::new(),
    };

    Ok((utxos, inscriptions))
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Json,
  Yaml,
  Minify,
}

pub trait Output: Send {
  fn print(&self, format: OutputFormat);
}

impl<T> Output for T
where
  T: Serialize + Send,
{
  fn print(&self, format: OutputFormat) {
    match format {
      OutputFormat::Json => serde_json::to_writer_pretty(io::stdout(), self).ok(),
      OutputFormat::Yaml => serde_yaml::to_writer(io::stdout(), self).ok(),
      OutputFormat::Minify => serde_json::to_writer(io::stdout(), self).ok(),
    };
    println!();
  }
}

pub(crate) type SubcommandResult = Result<Option<Box<dyn Output>>>;
