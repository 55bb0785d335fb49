use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InscriptionRecord {
  pub offset: u64,
  pub id: InscriptionId,
}

/// Inscriptions known to live in each output, keyed by `txid:vout`.
///
/// More than one record under a key marks a mixed output, which is never
/// treated as a transferable single inscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InscriptionIndex(BTreeMap<OutPoint, Vec<InscriptionRecord>>);

impl InscriptionIndex {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn load(path: &Path) -> Result<Self> {
    serde_json::from_reader(
      File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?,
    )
    .with_context(|| format!("failed to parse inscription index `{}`", path.display()))
  }

  pub fn insert(&mut self, outpoint: OutPoint, record: InscriptionRecord) {
    self.0.entry(outpoint).or_default().push(record);
  }

  pub fn get(&self, outpoint: &OutPoint) -> Option<&[InscriptionRecord]> {
    self
      .0
      .get(outpoint)
      .filter(|records| !records.is_empty())
      .map(Vec::as_slice)
  }

  pub fn is_inscribed(&self, outpoint: &OutPoint) -> bool {
    self.get(outpoint).is_some()
  }

  /// Find the output holding `id` among `utxos`.
  pub(crate) fn locate<'a>(
    &'a self,
    utxos: &[Utxo],
    id: InscriptionId,
  ) -> Option<(Utxo, &'a [InscriptionRecord])> {
    utxos.iter().find_map(|utxo| {
      let records = self.get(&utxo.outpoint())?;
      records
        .iter()
        .any(|record| record.id == id)
        .then_some((*utxo, records))
    })
  }
}

impl FromIterator<(OutPoint, InscriptionRecord)> for InscriptionIndex {
  fn from_iter<I: IntoIterator<Item = (OutPoint, InscriptionRecord)>>(iter: I) -> Self {
    let mut index = Self::new();
    for (outpoint, record) in iter {
      index.insert(outpoint, record);
    }
    index
  }
}
