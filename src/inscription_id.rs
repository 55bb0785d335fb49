use super::*;

#[derive(
  Debug, PartialEq, Copy, Clone, Hash, Eq, PartialOrd, Ord, DeserializeFromStr, SerializeDisplay,
)]
pub struct InscriptionId {
  pub txid: Txid,
  pub index: u32,
}

impl Display for InscriptionId {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "{}i{}", self.txid, self.index)
  }
}

#[derive(Debug)]
pub enum ParseError {
  Character(char),
  Length(usize),
  Separator(char),
  Txid(bitcoin::hex::HexToArrayError),
  Index(std::num::ParseIntError),
}

impl Display for ParseError {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Character(c) => write!(f, "invalid character: '{c}'"),
      Self::Length(len) => write!(f, "invalid length: {len}"),
      Self::Separator(c) => write!(f, "invalid separator: `{c}`"),
      Self::Txid(err) => write!(f, "invalid txid: {err}"),
      Self::Index(err) => write!(f, "invalid index: {err}"),
    }
  }
}

impl std::error::Error for ParseError {}

impl FromStr for InscriptionId {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Some(char) = s.chars().find(|char| !char.is_ascii()) {
      return Err(ParseError::Character(char));
    }

    const TXID_LEN: usize = 64;
    const MIN_LEN: usize = TXID_LEN + 2;

    if s.len() < MIN_LEN {
      return Err(ParseError::Length(s.len()));
    }

    let (txid, rest) = s.split_at(TXID_LEN);

    let separator = rest.as_bytes()[0] as char;

    if separator != 'i' {
      return Err(ParseError::Separator(separator));
    }

    Ok(Self {
      txid: txid.parse().map_err(ParseError::Txid)?,
      index: rest[1..].parse().map_err(ParseError::Index)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display() {
    assert_eq!(
      inscription_id(1).to_string(),
      "1111111111111111111111111111111111111111111111111111111111111111i1",
    );
  }

  #[test]
  fn from_str() {
    assert_eq!(
      "1111111111111111111111111111111111111111111111111111111111111111i1"
        .parse::<InscriptionId>()
        .unwrap(),
      inscription_id(1),
    );
    assert_eq!(
      "1111111111111111111111111111111111111111111111111111111111111111i4294967295"
        .parse::<InscriptionId>()
        .unwrap()
        .index,
      u32::MAX,
    );
  }

  #[test]
  fn from_str_errors() {
    assert_matches!(
      "foo".parse::<InscriptionId>(),
      Err(ParseError::Length(3))
    );
    assert_matches!(
      "1111111111111111111111111111111111111111111111111111111111111111x1".parse::<InscriptionId>(),
      Err(ParseError::Separator('x')),
    );
    assert_matches!(
      "1111111111111111111111111111111111111111111111111111111111111111i".parse::<InscriptionId>(),
      Err(ParseError::Length(65)),
    );
    assert_matches!(
      "1111111111111111111111111111111111111111111111111111111111111111ifoo"
        .parse::<InscriptionId>(),
      Err(ParseError::Index(_)),
    );
    assert_matches!(
      "x111111111111111111111111111111111111111111111111111111111111111i1".parse::<InscriptionId>(),
      Err(ParseError::Txid(_)),
    );
    assert_matches!(
      "1111111111111111111111111111111111111111111111111111111111111111i•".parse::<InscriptionId>(),
      Err(ParseError::Character('•')),
    );
  }

  #[test]
  fn serde() {
    let id = inscription_id(2);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    assert_eq!(serde_json::from_str::<InscriptionId>(&json).unwrap(), id);
  }
}
