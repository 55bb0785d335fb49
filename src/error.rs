use {super::*, snafu::Backtrace};

pub type SnafuResult<T = (), E = SnafuError> = std::result::Result<T, E>;

/// The failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  BroadcastFailed,
  Cancelled,
  DummyUtxoUnavailable,
  InscriptionNotFound,
  InsufficientBalance,
  InvalidParameter,
  InvalidSignature,
  MismatchedPartialStructure,
  Primitives,
  SizeDiscoveryExhausted,
  UnsupportedMultiInscriptionOutput,
}

#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum SnafuError {
  #[snafu(display("invalid address `{input}`"))]
  AddressParse {
    backtrace: Backtrace,
    input: String,
    source: bitcoin::address::ParseError,
  },
  #[snafu(display("broadcast rejected with status {status}: {body}"))]
  BroadcastRejected { status: u16, body: String },
  #[snafu(display("broadcast request to `{url}` failed"))]
  BroadcastRequest {
    backtrace: Backtrace,
    url: String,
    source: reqwest::Error,
  },
  #[snafu(display("broadcast response `{body}` is not a transaction id"))]
  BroadcastResponse {
    body: String,
    source: bitcoin::hex::HexToArrayError,
  },
  #[snafu(display("signing cancelled"))]
  Cancelled,
  #[snafu(display("no dummy utxo worth {} sat or less available", DUMMY_THRESHOLD.to_sat()))]
  DummyUtxoUnavailable,
  #[snafu(display(
    "output value {} sat is below dust floor of {} sat",
    value.to_sat(),
    DUST_FLOOR.to_sat()
  ))]
  Dust { value: Amount },
  #[snafu(display("inscription {id} not found"))]
  InscriptionNotFound { id: InscriptionId },
  #[snafu(display(
    "insufficient balance: {} sat needed but only {} sat available",
    needed.to_sat(),
    available.to_sat()
  ))]
  InsufficientBalance { needed: Amount, available: Amount },
  #[snafu(display("invalid parameter: {reason}"))]
  InvalidParameter { reason: String },
  #[snafu(display("invalid signature on input {input}"))]
  InvalidSignature {
    input: usize,
    source: secp256k1::Error,
  },
  #[snafu(display(
    "partial transaction has {inputs} inputs but {outputs} outputs, seller inputs and outputs must be paired"
  ))]
  MismatchedPartialStructure { inputs: usize, outputs: usize },
  #[snafu(display("input {input} is missing its witness utxo"))]
  MissingWitnessUtxo { input: usize },
  #[snafu(display("partial transaction is not valid base64"))]
  PsbtBase64 {
    backtrace: Backtrace,
    source: base64::DecodeError,
  },
  #[snafu(display("invalid partial transaction"))]
  Psbt {
    backtrace: Backtrace,
    source: bitcoin::psbt::Error,
  },
  #[snafu(display("invalid sighash type on input {input}"))]
  SighashType {
    input: usize,
    source: bitcoin::sighash::InvalidSighashTypeError,
  },
  #[snafu(display("failed to compute signature hash for input {input}"))]
  Sighash {
    backtrace: Backtrace,
    input: usize,
    source: bitcoin::sighash::TaprootError,
  },
  #[snafu(display(
    "commit transaction size did not settle after {SIZE_DISCOVERY_ATTEMPTS} attempts"
  ))]
  SizeDiscoveryExhausted { last_vsize: usize },
  #[snafu(display(
    "output {outpoint} holds {count} inscriptions, mixed outputs cannot be transferred"
  ))]
  UnsupportedMultiInscriptionOutput { outpoint: OutPoint, count: usize },
  #[snafu(display("input {input} is not signed"))]
  UnsignedInput { input: usize },
}

impl SnafuError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::BroadcastRejected { .. }
      | Self::BroadcastRequest { .. }
      | Self::BroadcastResponse { .. } => ErrorKind::BroadcastFailed,
      Self::Cancelled => ErrorKind::Cancelled,
      Self::DummyUtxoUnavailable => ErrorKind::DummyUtxoUnavailable,
      Self::Dust { .. } | Self::InvalidParameter { .. } | Self::UnsignedInput { .. } => {
        ErrorKind::InvalidParameter
      }
      Self::InscriptionNotFound { .. } => ErrorKind::InscriptionNotFound,
      Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
      Self::InvalidSignature { .. } => ErrorKind::InvalidSignature,
      Self::MismatchedPartialStructure { .. } => ErrorKind::MismatchedPartialStructure,
      Self::AddressParse { .. }
      | Self::MissingWitnessUtxo { .. }
      | Self::Psbt { .. }
      | Self::PsbtBase64 { .. }
      | Self::Sighash { .. }
      | Self::SighashType { .. } => ErrorKind::Primitives,
      Self::SizeDiscoveryExhausted { .. } => ErrorKind::SizeDiscoveryExhausted,
      Self::UnsupportedMultiInscriptionOutput { .. } => {
        ErrorKind::UnsupportedMultiInscriptionOutput
      }
    }
  }
}

/// `anyhow::Context` is in scope crate-wide for the CLI, which shadows
/// `snafu::ResultExt::context`. This trait exposes the snafu version under a
/// different name.
pub(crate) trait ResultExt<T, E>: Sized {
  fn snafu_context<C, E2>(self, context: C) -> Result<T, E2>
  where
    C: snafu::IntoError<E2, Source = E>,
    E2: std::error::Error + snafu::ErrorCompat;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E> {
  fn snafu_context<C, E2>(self, context: C) -> Result<T, E2>
  where
    C: snafu::IntoError<E2, Source = E>,
    E2: std::error::Error + snafu::ErrorCompat,
  {
    use snafu::ResultExt;
    self.context(context)
  }
}
