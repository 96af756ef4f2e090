//! Search for every occurrence of short patterns, allowing mismatches.

use log::{debug, info};

use std::io::Write;

use crate::amplicon::{Location, PrimerMatcher, Strand};
use crate::errors::*;
use crate::fastx::Record;
use crate::index::*;
use crate::ordered::*;
use crate::seq::*;

/// A named pattern, compiled for both strands.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: String,
    forward: PrimerMatcher,
    reverse: PrimerMatcher,
}

impl Pattern {
    pub fn new(name: impl Into<String>, seq: &[u8]) -> Result<Self> {
        let name = name.into();

        if seq.is_empty() {
            return Err(Error::InvalidPrimer {
                name,
                reason: "the pattern is empty".to_owned(),
            });
        }
        if !is_iupac(seq) {
            return Err(Error::InvalidPrimer {
                name,
                reason: format!("\"{}\" is not an IUPAC nucleotide sequence", utf8(seq)),
            });
        }

        let forward = PrimerMatcher::new(seq)?;
        let reverse = PrimerMatcher::new(&revcomp(forward.primer()))?;

        Ok(Self {
            name,
            forward,
            reverse,
        })
    }

    /// Upper-cased pattern.
    pub fn seq(&self) -> &[u8] {
        self.forward.primer()
    }

    /// Patterns from FASTA/FASTQ records, named by record id.
    pub fn from_records<I>(records: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        records
            .into_iter()
            .map(|r| r.and_then(|r| Self::new(utf8(&r.id), &r.seq)))
            .collect()
    }
}

/// One occurrence of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocateHit {
    /// Index of the pattern.
    pub pattern: usize,
    pub strand: Strand,
    /// Location on the positive strand.
    pub location: Location,
    pub mismatches: usize,
}

#[derive(Debug, Clone)]
pub struct LocateConfig {
    pub max_mismatch: usize,
    pub only_positive_strand: bool,
    pub output_mismatches: bool,
    pub immediate_output: bool,
    pub threads: usize,
    pub index_options: IndexOptions,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            max_mismatch: 0,
            only_positive_strand: false,
            output_mismatches: false,
            immediate_output: false,
            threads: 1,
            index_options: IndexOptions::default(),
        }
    }
}

pub struct LocateSearch {
    patterns: Vec<Pattern>,
    config: LocateConfig,
}

impl LocateSearch {
    pub fn new(patterns: Vec<Pattern>, config: LocateConfig) -> Result<Self> {
        if patterns.is_empty() {
            return Err(Error::EmptyPrimers);
        }
        Ok(Self { patterns, config })
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// All occurrences in `seq`, ordered by pattern, then strand, then start.
    ///
    /// Negative strand hits are occurrences of the reverse complemented pattern.
    pub fn search(&self, seq: &[u8]) -> Result<Vec<LocateHit>> {
        let mut hits = Vec::new();

        if seq.is_empty() {
            return Ok(hits);
        }

        let seq = seq.to_ascii_uppercase();
        let index = if self.config.max_mismatch > 0 {
            Some(ApproxIndex::new(&seq, &self.config.index_options)?)
        } else {
            None
        };

        let strands: &[Strand] = if self.config.only_positive_strand {
            &[Strand::Positive]
        } else {
            &[Strand::Positive, Strand::Negative]
        };

        for (i, pattern) in self.patterns.iter().enumerate() {
            for &strand in strands {
                let matcher = match strand {
                    Strand::Positive => &pattern.forward,
                    Strand::Negative => &pattern.reverse,
                };
                let len = matcher.len();

                let starts = match &index {
                    Some(index) => index.locate(matcher.primer(), self.config.max_mismatch),
                    None => matcher.find_all(&seq),
                };

                hits.extend(starts.into_iter().map(|start| {
                    let window = &seq[start..start + len];
                    let mismatches = if index.is_some() {
                        hamming(window, matcher.primer())
                    } else {
                        matcher.mismatches(window)
                    };

                    LocateHit {
                        pattern: i,
                        strand,
                        location: Location::new(start + 1, start + len),
                        mismatches,
                    }
                }));
            }
        }

        Ok(hits)
    }

    pub fn write_header(&self, writer: &mut dyn Write) -> Result<()> {
        writer.write_all(b"seqID\tpatternName\tpattern\tstrand\tstart\tend\tmatched")?;
        if self.config.output_mismatches {
            writer.write_all(b"\tmismatches")?;
        }
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Search all records with `config.threads` workers and write a table of hits in
    /// input order.
    pub fn run<I>(&self, records: I, writer: &mut (dyn Write + Send)) -> Result<RunStats>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        let mut stats = RunStats::default();
        self.write_header(&mut *writer)?;

        run_ordered(
            records,
            self.config.threads,
            |record: Record| {
                let hits = self.search(&record.seq)?;
                Ok((!hits.is_empty(), (record, hits)))
            },
            |envelope: Envelope<(Record, Vec<LocateHit>)>| {
                let (record, hits) = envelope.payload;
                stats.records += 1;

                if !envelope.ok {
                    debug!("No pattern found in record \"{}\"", utf8(&record.id));
                    return Ok(());
                }

                stats.matched += 1;
                stats.hits += hits.len() as u64;

                for hit in &hits {
                    self.write_hit(&mut *writer, &record, hit)?;
                }

                if self.config.immediate_output {
                    writer.flush()?;
                }
                Ok(())
            },
        )?;

        writer.flush()?;

        info!(
            "Found {} pattern occurrences in {} of {} records",
            stats.hits, stats.matched, stats.records
        );
        Ok(stats)
    }

    fn write_hit(&self, writer: &mut dyn Write, record: &Record, hit: &LocateHit) -> Result<()> {
        let pattern = &self.patterns[hit.pattern];
        let matched = record
            .subrecord(
                hit.location.start,
                hit.location.end,
                hit.strand == Strand::Negative,
            )
            .seq;

        writer.write_all(&record.id)?;
        write!(writer, "\t{}\t", pattern.name)?;
        writer.write_all(pattern.seq())?;
        write!(
            writer,
            "\t{}\t{}\t{}\t",
            hit.strand, hit.location.start, hit.location.end
        )?;
        writer.write_all(&matched)?;
        if self.config.output_mismatches {
            write!(writer, "\t{}", hit.mismatches)?;
        }
        writer.write_all(b"\n")?;
        Ok(())
    }
}
