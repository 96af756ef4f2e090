use crate::fastx::Origin;

pub type Result<T> = std::result::Result<T, Error>;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error reading or writing \"{file}\": {source}")]
    FileIo { file: String, source: BoxedError },

    #[error("Error reading or writing bytes: {0}")]
    BytesIo(BoxedError),

    #[error("Error writing output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error parsing record {idx} in {origin}: {source}")]
    ParseRecord {
        origin: Origin,
        idx: usize,
        source: BoxedError,
    },

    #[error("Could not parse \"{string}\" in \"{context}\": {reason}")]
    Parse {
        string: String,
        context: String,
        reason: &'static str,
    },

    #[error("Error parsing primers:\n\"{primers}\"\n{source}")]
    ParsePrimers { primers: String, source: BoxedError },

    #[error("Invalid region \"{region}\": {reason}")]
    InvalidRegion { region: String, reason: &'static str },

    #[error("Invalid primer pair \"{name}\": {reason}")]
    InvalidPrimer { name: String, reason: String },

    #[error("No primer pairs or patterns given")]
    EmptyPrimers,

    #[error("Cannot search an empty sequence when {0}")]
    EmptySequence(&'static str),

    #[error("Invalid byte '{byte}' at position {pos} when building the sequence index")]
    InvalidSequence { byte: char, pos: usize },

    #[error("Error compiling regex for \"{primer}\": {source}")]
    Regex {
        primer: String,
        source: regex::Error,
    },

    #[error("A worker thread panicked when {0}")]
    WorkerPanic(&'static str),
}

pub fn utf8(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}
