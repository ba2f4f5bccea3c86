use std::str::FromStr;

/// A fixed-size byte identifier, generic over length.
///
/// Used for the 20-byte peer id carried in [`crate::PeerId`]; torrent info
/// hashes and piece hashing are computed by the engine and never cross this
/// boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<const N: usize>(pub [u8; N]);

impl<const N: usize> Id<N> {
    pub const fn new(from: [u8; N]) -> Id<N> {
        Id(from)
    }

    pub fn as_string(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, crate::Error> {
        let mut v = [0u8; N];
        if b.len() != N {
            return Err(crate::Error::WrongIdLength {
                expected: N,
                actual: b.len(),
            });
        }
        v.copy_from_slice(b);
        Ok(Id(v))
    }
}

impl<const N: usize> Default for Id<N> {
    fn default() -> Self {
        Id([0; N])
    }
}

impl<const N: usize> std::fmt::Debug for Id<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl<const N: usize> std::fmt::Display for Id<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl<const N: usize> FromStr for Id<N> {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != N * 2 {
            return Err(crate::Error::WrongIdLength {
                expected: N * 2,
                actual: s.len(),
            });
        }
        let mut out = [0u8; N];
        hex::decode_to_slice(s, &mut out).map_err(|_| crate::Error::InvalidHex)?;
        Ok(Id(out))
    }
}

impl<const N: usize> serde::Serialize for Id<N> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de, const N: usize> serde::Deserialize<'de> for Id<N> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Id::<N>::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A 20-byte peer identifier, as carried by [`crate::PeerId`].
pub type Id20 = Id<20>;
