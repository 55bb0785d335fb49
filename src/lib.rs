#![allow(
  clippy::large_enum_variant,
  clippy::result_large_err,
  clippy::too_many_arguments
)]
#![deny(
  clippy::cast_lossless,
  clippy::cast_possible_truncation,
  clippy::cast_possible_wrap,
  clippy::cast_sign_loss
)]

use {
  self::{
    arguments::Arguments,
    config::Config,
    error::{ResultExt, SnafuResult},
    option_ext::OptionExt,
    options::Options,
    settings::Settings,
    spend::{finalize_input, TaprootSpend},
    subcommand::{OutputFormat, Subcommand, SubcommandResult},
  },
  anyhow::{anyhow, bail, ensure, Context as _, Error},
  bitcoin::{
    absolute::LockTime,
    address::{Address, NetworkUnchecked},
    blockdata::constants::MAX_SCRIPT_ELEMENT_SIZE,
    consensus::encode::serialize_hex,
    hashes::Hash,
    key::{Keypair, TapTweak, TweakedKeypair, TweakedPublicKey},
    opcodes,
    psbt::{self, Psbt},
    secp256k1::{self, All, Message, Secp256k1, SecretKey, XOnlyPublicKey},
    sighash::{Prevouts, SighashCache, TapSighashType},
    taproot::{self, ControlBlock, LeafVersion, TapLeafHash, TaprootBuilder, TaprootSpendInfo},
    transaction::Version,
    Amount, Network, OutPoint, PrivateKey, Script, ScriptBuf, Sequence, Transaction, TxIn,
    TxOut, Txid, Witness,
  },
  clap::Parser,
  serde::{Deserialize, Serialize},
  serde_with::{DeserializeFromStr, SerializeDisplay},
  snafu::{ErrorCompat, Snafu},
  std::{
    backtrace::BacktraceStatus,
    collections::BTreeMap,
    env,
    fmt::{self, Display, Formatter},
    fs::{self, File},
    io, iter,
    path::{Path, PathBuf},
    process,
    str::FromStr,
  },
};

pub use self::{
  broadcast::Broadcaster,
  chain::Chain,
  coin_selector::{CardinalSelection, CoinSelector, Selection},
  context::Context,
  dummy::{DummyUtxo, DummyUtxoManager},
  envelope::{CommitReveal, Envelope, InscriptionEnvelopeBuilder, LockScript},
  error::{ErrorKind, SnafuError},
  fee_model::FeeModel,
  fee_rate::FeeRate,
  inscription_id::InscriptionId,
  inscription_index::{InscriptionIndex, InscriptionRecord},
  signer::{KeySigner, Signer, Signing},
  swap::{Listing, MarketplaceFee, SellerPartial, SwapPsbtBuilder},
  transaction_builder::{BuiltTransaction, PaymentInfo, TransactionBuilder},
  utxo::{Utxo, UtxoStatus},
};

#[cfg(test)]
#[macro_use]
mod test;

#[cfg(test)]
use self::test::*;

pub mod arguments;
pub mod broadcast;
pub mod chain;
pub mod coin_selector;
mod config;
pub mod context;
pub mod dummy;
pub mod envelope;
pub mod error;
pub mod fee_model;
mod fee_rate;
mod inscription_id;
pub mod inscription_index;
mod macros;
mod option_ext;
pub mod options;
pub mod settings;
pub mod signer;
pub mod spend;
pub mod subcommand;
pub mod swap;
pub mod transaction_builder;
pub mod utxo;

type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Outputs below this value are never created; change below it is folded
/// into the fee.
pub const DUST_FLOOR: Amount = Amount::from_sat(1_000);

/// A normal output at or below this value is a dummy anchor for swaps.
pub const DUMMY_THRESHOLD: Amount = Amount::from_sat(1_000);

pub const MAX_PUSH_SIZE: usize = MAX_SCRIPT_ELEMENT_SIZE;

pub const SIZE_DISCOVERY_ATTEMPTS: usize = 100;

const SCHNORR_SIGNATURE_SIZE: usize = 64;

pub fn base64_encode(data: &[u8]) -> String {
  use base64::Engine;
  base64::engine::general_purpose::STANDARD.encode(data)
}

pub fn base64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
  use base64::Engine;
  base64::engine::general_purpose::STANDARD.decode(s)
}

fn default<T: Default>() -> T {
  Default::default()
}

fn unsigned_input(previous_output: OutPoint) -> TxIn {
  TxIn {
    previous_output,
    script_sig: ScriptBuf::new(),
    sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
    witness: Witness::new(),
  }
}

pub fn main() {
  env_logger::init();

  let args = Arguments::parse();

  let format = args.options.format;

  match args.run() {
    Err(err) => {
      if let Some(SnafuError::Cancelled) = err.downcast_ref::<SnafuError>() {
        eprintln!("cancelled");
        return;
      }

      eprintln!("error: {err}");

      for (i, err) in err.chain().skip(1).enumerate() {
        if i == 0 {
          eprintln!();
          eprintln!("because:");
        }

        eprintln!("- {err}");
      }

      if let Some(err) = err.downcast_ref::<SnafuError>() {
        if let Some(backtrace) = ErrorCompat::backtrace(err) {
          if backtrace.status() == BacktraceStatus::Captured {
            eprintln!("backtrace:");
            eprintln!("{backtrace}");
          }
        }
      } else if env::var_os("RUST_BACKTRACE")
        .map(|val| val == "1")
        .unwrap_or_default()
      {
        eprintln!("{}", err.backtrace());
      }

      process::exit(1);
    }
    Ok(output) => {
      if let Some(output) = output {
        output.print(format.unwrap_or_default());
      }
    }
  }
}
