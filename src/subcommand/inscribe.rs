use {super::*, clap::ArgGroup};

#[derive(Debug, Parser)]
#[command(group(
  ArgGroup::new("data")
    .required(true)
    .args(&["chunk", "file"]),
))]
pub(crate) struct Inscribe {
  #[command(flatten)]
  snapshot: Snapshot,
  #[arg(long, help = "Use fee rate of <FEE_RATE> sats/vB.")]
  fee_rate: FeeRate,
  #[arg(long, default_value = "ord", help = "Mark the envelope with protocol <TAG>.")]
  tag: String,
  #[arg(long, help = "Embed hex-encoded <CHUNK>. May be repeated.")]
  chunk: Vec<String>,
  #[arg(long, help = "Embed the contents of <FILE>, split into maximum-size pushes.")]
  file: Option<PathBuf>,
  #[arg(
    long,
    help = "Name <REIMBURSEMENT> in the envelope as the reimbursement address. [default: signing address]"
  )]
  reimbursement: Option<Address<NetworkUnchecked>>,
}

impl Inscribe {
  fn chunks(&self) -> Result<Vec<Vec<u8>>> {
    if let Some(path) = &self.file {
      let data =
        fs::read(path).with_context(|| format!("failed to read `{}`", path.display()))?;

      ensure!(!data.is_empty(), "`{}` is empty", path.display());

      return Ok(data.chunks(MAX_PUSH_SIZE).map(<[u8]>::to_vec).collect());
    }

    self
      .chunk
      .iter()
      .map(|chunk| hex::decode(chunk).with_context(|| format!("invalid hex chunk `{chunk}`")))
      .collect()
  }

  pub(crate) fn run(self, settings: Settings) -> SubcommandResult {
    let context = settings.context();
    let signer = settings.signer(&context)?;
    let (utxos, inscriptions) = self.snapshot.load()?;

    let chunks = self.chunks()?;

    let reimbursement = match self.reimbursement {
      Some(address) => address.require_network(context.network())?,
      None => signer.address().clone(),
    };

    let commit_reveal =
      InscriptionEnvelopeBuilder::new(&context, &signer, self.fee_rate, self.tag.as_bytes())
        .create_commit_and_reveal(&utxos, &inscriptions, &chunks, &reimbursement)?;

    Ok(Some(Box::new(commit_reveal)))
  }
}
