#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("expected id of length {expected}, got {actual}")]
    WrongIdLength { expected: usize, actual: usize },
    #[error("invalid hex string")]
    InvalidHex,
    #[error("torrent with 0 length is useless")]
    ZeroLength,
    #[error("piece length must be greater than 0")]
    ZeroPieceLength,
    #[error("invalid piece index {0}")]
    InvalidPieceIndex(u32),
}
