use super::*;

#[derive(Debug, Parser)]
#[command(
  version,
  about = "Build ordinals transfers, swaps and envelopes from a wallet snapshot"
)]
pub(crate) struct Arguments {
  #[command(flatten)]
  pub(crate) options: Options,
  #[command(subcommand)]
  pub(crate) subcommand: Subcommand,
}

impl Arguments {
  pub(crate) fn run(self) -> SubcommandResult {
    self.subcommand.run(Settings::new(self.options)?)
  }
}
