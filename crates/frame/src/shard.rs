//! Shard presence states

/// One fixed-size shard of an encoded frame, tagged with how it is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shard {
    /// Bytes as received
    Present(Vec<u8>),
    /// Missing or deliberately discarded
    Erased,
    /// Bytes recovered by the erasure codec
    Reconstructed(Vec<u8>),
}

impl Shard {
    pub fn is_erased(&self) -> bool {
        matches!(self, Shard::Erased)
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Shard::Present(b) | Shard::Reconstructed(b) => Some(b),
            Shard::Erased => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Shard::Present(b) | Shard::Reconstructed(b) => Some(b),
            Shard::Erased => None,
        }
    }

    /// Wrap every buffer as [`Shard::Present`]
    pub fn all_present<I>(shards: I) -> Vec<Shard>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        shards.into_iter().map(Shard::Present).collect()
    }

    /// Count the erased shards in a set
    pub fn erased_count(shards: &[Shard]) -> usize {
        shards.iter().filter(|s| s.is_erased()).count()
    }
}

impl From<Option<Vec<u8>>> for Shard {
    fn from(value: Option<Vec<u8>>) -> Self {
        match value {
            Some(bytes) => Shard::Present(bytes),
            None => Shard::Erased,
        }
    }
}

impl From<Shard> for Option<Vec<u8>> {
    fn from(shard: Shard) -> Self {
        shard.into_bytes()
    }
}
