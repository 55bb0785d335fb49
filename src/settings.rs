use super::*;

/// Resolved configuration. Every value comes from the first source that sets
/// it: command line options, then `ORDSWAP_*` environment variables, then the
/// config file, then defaults.
#[derive(Default, Debug, Clone)]
pub struct Settings {
  pub(crate) chain: Chain,
  pub(crate) config: Config,
  pub(crate) options: Options,
}

impl Settings {
  pub(crate) fn new(options: Options) -> Result<Self> {
    let config: Config = match &options.config {
      Some(path) => serde_yaml::from_reader(
        File::open(path).with_context(|| format!("failed to open config `{}`", path.display()))?,
      )
      .with_context(|| format!("failed to parse config `{}`", path.display()))?,
      None => match &options.config_dir {
        Some(dir) if dir.join("ordswap.yaml").exists() => {
          serde_yaml::from_reader(File::open(dir.join("ordswap.yaml"))?)?
        }
        Some(_) | None => Default::default(),
      },
    };

    let chain = Self::setting_typed(
      options
        .signet
        .then_some(Chain::Signet)
        .or(options.regtest.then_some(Chain::Regtest))
        .or(options.testnet.then_some(Chain::Testnet))
        .or(options.chain_argument),
      Some("CHAIN"),
      config.chain,
      Chain::Mainnet,
    )?;

    Ok(Self {
      chain,
      config,
      options,
    })
  }

  pub(crate) fn chain(&self) -> Chain {
    self.chain
  }

  pub(crate) fn context(&self) -> Context {
    self.chain.into()
  }

  pub(crate) fn broadcast_url(&self) -> Result<String> {
    Self::setting(
      self.options.broadcast_url.as_deref(),
      Some("BROADCAST_URL"),
      self.config.broadcast_url.as_deref(),
      self.chain.default_broadcast_url(),
    )?
    .ok_or_else(|| anyhow!("no broadcast url for {}, pass --broadcast-url", self.chain))
  }

  pub(crate) fn signer(&self, context: &Context) -> Result<KeySigner> {
    let key = Self::setting(
      self.options.key.as_deref(),
      Some("KEY"),
      self.config.key.as_deref(),
      None,
    )?
    .ok_or_else(|| anyhow!("no signing key, pass --key or set ORDSWAP_KEY"))?;

    KeySigner::from_wif(context, &key)
  }

  fn setting_typed<T: FromStr<Err = Error>>(
    arg_value: Option<T>,
    env_key: Option<&str>,
    config_value: Option<T>,
    default_value: T,
  ) -> Result<T> {
    if let Some(arg_value) = arg_value {
      return Ok(arg_value);
    }

    if let Some(env_key) = env_key {
      match env::var(format!("ORDSWAP_{env_key}")) {
        Ok(env_value) => {
          return env_value
            .parse()
            .with_context(|| anyhow!("failed to parse {env_key}"))
        }
        Err(err @ env::VarError::NotUnicode(_)) => return Err(err.into()),
        Err(env::VarError::NotPresent) => {}
      }
    }

    if let Some(config_value) = config_value {
      return Ok(config_value);
    }

    Ok(default_value)
  }

  fn setting(
    arg_value: Option<&str>,
    env_key: Option<&str>,
    config_value: Option<&str>,
    default_value: Option<&str>,
  ) -> Result<Option<String>> {
    if let Some(arg_value) = arg_value {
      return Ok(Some(arg_value.into()));
    }

    if let Some(env_key) = env_key {
      match env::var(format!("ORDSWAP_{env_key}")) {
        Ok(env_value) => return Ok(Some(env_value)),
        Err(err @ env::VarError::NotUnicode(_)) => return Err(err.into()),
        Err(env::VarError::NotPresent) => {}
      }
    }

    Ok(config_value.or(default_value).map(str::to_string))
  }
}
