//! Primer-pair amplicon search over FASTA/FASTQ records.

use log::{debug, info, warn};

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::errors::*;
use crate::fastx::*;
use crate::index::IndexOptions;
use crate::ordered::*;
use crate::primers::Primers;
use crate::seq::revcomp;

pub mod finder;
pub use finder::*;
pub mod pool;
pub use pool::*;
pub mod region;
pub use region::*;

const MIN_PRIMER_LEN: usize = 10;

/// 1-based inclusive interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl Location {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Map a location on the reverse complement of a sequence of `length` bases back to
    /// the positive strand.
    pub fn flip(&self, length: usize) -> Self {
        Self {
            start: length + 1 - self.end,
            end: length + 1 - self.start,
        }
    }
}

/// Mismatches in the forward (5') and reverse (3') primer hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mismatches {
    pub five: usize,
    pub three: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strand {
    Positive,
    Negative,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Strand::Positive => write!(f, "+"),
            Strand::Negative => write!(f, "-"),
        }
    }
}

/// One amplicon (or region) found in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmpliconHit {
    /// Index of the primer pair.
    pub pair: usize,
    pub strand: Strand,
    /// Location on the positive strand.
    pub location: Location,
    pub mismatches: Mismatches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmpliconOutput {
    /// FASTA/FASTQ records of the amplicons.
    Fastx,
    /// BED6 with the amplicon sequence as an extra column.
    Bed,
}

#[derive(Debug, Clone)]
pub struct AmpliconConfig {
    pub max_mismatch: usize,
    pub only_positive_strand: bool,
    pub region: Option<Region>,
    pub output: AmpliconOutput,
    pub output_mismatches: bool,
    pub save_unmatched: bool,
    pub immediate_output: bool,
    pub line_width: usize,
    pub threads: usize,
    pub index_options: IndexOptions,
}

impl Default for AmpliconConfig {
    fn default() -> Self {
        Self {
            max_mismatch: 0,
            only_positive_strand: false,
            region: None,
            output: AmpliconOutput::Fastx,
            output_mismatches: false,
            save_unmatched: false,
            immediate_output: false,
            line_width: 60,
            threads: 1,
            index_options: IndexOptions::default(),
        }
    }
}

/// Searches every primer pair on both strands of each record.
pub struct AmpliconSearch {
    primers: Primers,
    pool: FinderPool,
    config: AmpliconConfig,
}

impl AmpliconSearch {
    pub fn new(primers: Primers, config: AmpliconConfig) -> Result<Self> {
        let pairs = primers
            .pairs()
            .iter()
            .map(|p| CompiledPair::new(p).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        for pair in primers.pairs() {
            let short = [&pair.forward, &pair.reverse]
                .into_iter()
                .any(|p| !p.is_empty() && p.len() < MIN_PRIMER_LEN);
            if short && config.max_mismatch > 0 {
                warn!(
                    "Primer pair \"{}\" has a primer shorter than {} bases, {} mismatches may give spurious hits",
                    pair.name, MIN_PRIMER_LEN, config.max_mismatch
                );
            }
        }

        let pool = FinderPool::new(pairs, config.threads.max(1), config.index_options);

        Ok(Self {
            primers,
            pool,
            config,
        })
    }

    /// All amplicons in `seq`, by strand and then by primer pair.
    pub fn search(&self, seq: &[u8]) -> Result<Vec<AmpliconHit>> {
        let strands: &[Strand] = if self.config.only_positive_strand {
            &[Strand::Positive]
        } else {
            &[Strand::Positive, Strand::Negative]
        };

        let mut hits = Vec::new();
        let mut rc = None;

        for &strand in strands {
            let subject = match strand {
                Strand::Positive => seq,
                Strand::Negative => rc.get_or_insert_with(|| revcomp(seq)).as_slice(),
            };

            for pair in 0..self.pool.num_pairs() {
                let mut finder = self.pool.checkout(pair, subject, self.config.max_mismatch)?;
                let found = match &self.config.region {
                    Some(region) => finder.locate_range(region),
                    None => finder.locate(),
                };
                self.pool.checkin(pair, finder);

                if let Some((location, mismatches)) = found {
                    let location = match strand {
                        Strand::Positive => location,
                        Strand::Negative => location.flip(seq.len()),
                    };
                    hits.push(AmpliconHit {
                        pair,
                        strand,
                        location,
                        mismatches,
                    });
                }
            }
        }

        Ok(hits)
    }

    /// Search all records with `config.threads` workers and write the results in input order.
    pub fn run<I>(&self, records: I, writer: &mut (dyn Write + Send)) -> Result<RunStats>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        let mut stats = RunStats::default();

        run_ordered(
            records,
            self.config.threads,
            |record: Record| {
                let hits = self.search(&record.seq)?;
                Ok((!hits.is_empty(), (record, hits)))
            },
            |envelope: Envelope<(Record, Vec<AmpliconHit>)>| {
                let (record, hits) = envelope.payload;
                stats.records += 1;

                if envelope.ok {
                    stats.matched += 1;
                    stats.hits += hits.len() as u64;
                } else {
                    debug!("No amplicon found in record \"{}\"", utf8(&record.id));
                }

                self.write_hits(&mut *writer, &record, &hits)?;

                if self.config.immediate_output {
                    writer.flush()?;
                }
                Ok(())
            },
        )?;

        writer.flush()?;

        info!(
            "Found {} amplicons in {} of {} records",
            stats.hits, stats.matched, stats.records
        );
        Ok(stats)
    }

    fn write_hits(
        &self,
        writer: &mut dyn Write,
        record: &Record,
        hits: &[AmpliconHit],
    ) -> Result<()> {
        if hits.is_empty() {
            if self.config.save_unmatched && self.config.output == AmpliconOutput::Fastx {
                write_record(writer, record, self.config.line_width)?;
            }
            return Ok(());
        }

        for hit in hits {
            let sub = record.subrecord(
                hit.location.start,
                hit.location.end,
                hit.strand == Strand::Negative,
            );

            match self.config.output {
                AmpliconOutput::Fastx => write_record(writer, &sub, self.config.line_width)?,
                AmpliconOutput::Bed => {
                    writer.write_all(&record.id)?;
                    write!(
                        writer,
                        "\t{}\t{}\t{}\t0\t{}\t",
                        hit.location.start - 1,
                        hit.location.end,
                        self.primers.pairs()[hit.pair].name,
                        hit.strand
                    )?;
                    writer.write_all(&sub.seq)?;
                    if self.config.output_mismatches {
                        write!(
                            writer,
                            "\t{}\t{}",
                            hit.mismatches.five, hit.mismatches.three
                        )?;
                    }
                    writer.write_all(b"\n")?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primers::PrimerPair;

    fn search(config: AmpliconConfig) -> AmpliconSearch {
        let primers = Primers::new(vec![
            PrimerPair::new("p1", b"GGCC", b"TCAA").unwrap(),
            PrimerPair::new("p2", b"ACGTAC", b"").unwrap(),
        ])
        .unwrap();
        AmpliconSearch::new(primers, config).unwrap()
    }

    #[test]
    fn location_flip() {
        let l = Location::new(2, 4);
        assert_eq!(l.len(), 3);
        assert_eq!(l.flip(10), Location::new(7, 9));
        assert_eq!(l.flip(10).flip(10), l);
    }

    #[test]
    fn both_strands() -> Result<()> {
        let s = search(AmpliconConfig::default());

        // p1 on the positive strand, p1 again on the negative strand
        let seq = b"AAGGCCAATTGAATCAATTGGCCTT";
        let hits = s.search(seq)?;
        assert_eq!(
            hits,
            vec![
                AmpliconHit {
                    pair: 0,
                    strand: Strand::Positive,
                    location: Location::new(3, 12),
                    mismatches: Mismatches::default(),
                },
                AmpliconHit {
                    pair: 0,
                    strand: Strand::Negative,
                    location: Location::new(14, 23),
                    mismatches: Mismatches::default(),
                },
            ]
        );

        let s = search(AmpliconConfig {
            only_positive_strand: true,
            ..AmpliconConfig::default()
        });
        assert_eq!(s.search(seq)?.len(), 1);
        Ok(())
    }

    #[test]
    fn forward_only_pair() -> Result<()> {
        let s = search(AmpliconConfig::default());
        let hits = s.search(b"TTACGTACGTTT")?;
        let found = hits
            .iter()
            .map(|h| (h.pair, h.strand, h.location))
            .collect::<Vec<_>>();
        assert_eq!(
            found,
            vec![
                (1, Strand::Positive, Location::new(3, 8)),
                (1, Strand::Negative, Location::new(5, 10)),
            ]
        );
        assert!(s.search(b"TTTTTTTT")?.is_empty());
        Ok(())
    }

    #[test]
    fn region_hits() -> Result<()> {
        let s = search(AmpliconConfig {
            region: Some(Region::new(5, -5, false, false)?),
            only_positive_strand: true,
            ..AmpliconConfig::default()
        });
        let hits = s.search(b"AAGGCCAATTGAA")?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].location, Location::new(7, 8));
        Ok(())
    }

    #[test]
    fn gapped_sequence_with_mismatches() -> Result<()> {
        let seq = b"AAGGCCA-TTGAA";
        let exact = search(AmpliconConfig::default()).search(seq)?;
        assert_eq!(exact[0].location, Location::new(3, 12));

        let s = search(AmpliconConfig {
            max_mismatch: 1,
            ..AmpliconConfig::default()
        });
        assert!(!s.search(seq)?.is_empty());
        assert!(matches!(
            s.search(b"AAGGCCAXTTGAA"),
            Err(Error::InvalidSequence { pos: 7, .. })
        ));
        Ok(())
    }

    #[test]
    fn empty_sequence_is_fatal() {
        let s = search(AmpliconConfig::default());
        assert!(matches!(s.search(b""), Err(Error::EmptySequence(_))));
    }

    #[test]
    fn bed_output() -> Result<()> {
        let s = search(AmpliconConfig {
            output: AmpliconOutput::Bed,
            output_mismatches: true,
            ..AmpliconConfig::default()
        });
        let fasta = b">s1 desc\nAAGGCCAATTGAATCAATTGGCCTT\n>s2\nTTTTTTTT\n";
        let mut out = Vec::new();
        let stats = s.run(FastxRecords::from_bytes(fasta)?, &mut out)?;

        assert_eq!(
            stats,
            RunStats {
                records: 2,
                matched: 1,
                hits: 2
            }
        );
        assert_eq!(
            std::str::from_utf8(&out).unwrap(),
            "s1\t2\t12\tp1\t0\t+\tGGCCAATTGA\t0\t0\n\
             s1\t13\t23\tp1\t0\t-\tGGCCAATTGA\t0\t0\n"
        );
        Ok(())
    }
}
