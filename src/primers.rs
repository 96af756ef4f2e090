use serde::Deserialize;

use crate::errors::*;
use crate::parse_utils::*;
use crate::seq::*;

/// A named forward/reverse primer pair, upper-cased.
///
/// `reverse` is the reverse primer as ordered (5' to 3' on the opposite strand);
/// it may be empty, in which case only the forward primer is searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimerPair {
    pub name: String,
    pub forward: Vec<u8>,
    pub reverse: Vec<u8>,
}

impl PrimerPair {
    /// Create a primer pair.
    ///
    /// If only the reverse primer is given it becomes the forward primer.
    pub fn new(name: impl Into<String>, forward: &[u8], reverse: &[u8]) -> Result<Self> {
        let name = name.into();
        let mut forward = forward.to_ascii_uppercase();
        let mut reverse = reverse.to_ascii_uppercase();

        if forward.is_empty() {
            std::mem::swap(&mut forward, &mut reverse);
        }

        if forward.is_empty() {
            return Err(Error::InvalidPrimer {
                name,
                reason: "both primers are empty".to_owned(),
            });
        }

        for primer in [&forward, &reverse] {
            if !is_iupac(primer) {
                return Err(Error::InvalidPrimer {
                    name,
                    reason: format!("\"{}\" is not an IUPAC nucleotide sequence", utf8(primer)),
                });
            }
        }

        Ok(Self {
            name,
            forward,
            reverse,
        })
    }

    /// Reverse complement of the reverse primer, as it appears on the forward strand.
    pub fn reverse_rc(&self) -> Vec<u8> {
        revcomp(&self.reverse)
    }
}

/// A set of primer pairs, searched in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primers {
    pairs: Vec<PrimerPair>,
}

#[derive(Deserialize)]
struct PrimersYaml {
    primers: Vec<PrimerYaml>,
}

#[derive(Deserialize)]
struct PrimerYaml {
    name: String,
    #[serde(default)]
    forward: String,
    #[serde(default)]
    reverse: String,
}

impl Primers {
    pub fn new(pairs: Vec<PrimerPair>) -> Result<Self> {
        if pairs.is_empty() {
            return Err(Error::EmptyPrimers);
        }
        Ok(Self { pairs })
    }

    /// Parse tab-delimited primer pairs: `name<TAB>forward[<TAB>reverse]`.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_tsv(tsv: &[u8]) -> Result<Self> {
        let mut pairs = Vec::new();

        for line in tsv.split(|&c| c == b'\n') {
            let Some(line) = trim_ascii_whitespace(line) else {
                continue;
            };
            if line.starts_with(b"#") {
                continue;
            }

            let fields = line
                .split(|&c| c == b'\t')
                .map(|f| trim_ascii_whitespace(f).unwrap_or_default())
                .collect::<Vec<_>>();

            match fields.as_slice() {
                &[name, forward] => pairs.push(PrimerPair::new(utf8(name), forward, b"")?),
                &[name, forward, reverse, ..] => {
                    pairs.push(PrimerPair::new(utf8(name), forward, reverse)?)
                }
                _ => {
                    return Err(Error::Parse {
                        string: utf8(line),
                        context: "primer file".to_owned(),
                        reason: "expected name<TAB>forward[<TAB>reverse]",
                    })
                }
            }
        }

        Self::new(pairs)
    }

    /// Parse primer pairs from YAML.
    ///
    /// ```yaml
    /// primers:
    ///   - name: 16S_V4
    ///     forward: GTGYCAGCMGCCGCGGTAA
    ///     reverse: GGACTACNVGGGTWTCTAAT
    /// ```
    pub fn from_yaml(yaml: &[u8]) -> Result<Self> {
        let parsed: PrimersYaml =
            serde_yaml::from_slice(yaml).map_err(|e| Error::ParsePrimers {
                primers: utf8(yaml),
                source: Box::new(e),
            })?;

        let pairs = parsed
            .primers
            .into_iter()
            .map(|p| PrimerPair::new(p.name, p.forward.as_bytes(), p.reverse.as_bytes()))
            .collect::<Result<Vec<_>>>()?;

        Self::new(pairs)
    }

    pub fn pairs(&self) -> &[PrimerPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
