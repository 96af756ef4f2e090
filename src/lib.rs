//! Rust library for locating primer-pair amplicons and short patterns in sequencing data.
//!
//! # Overview
//! amplocate finds the amplicon that a forward/reverse primer pair would produce from each
//! FASTA/FASTQ record, exactly or with mismatches, and reports it (or a region inside or
//! around it) in input order while searching records on many threads.
//!
//! This is useful for:
//! * Extracting marker gene regions (e.g. 16S V4) from genomes or long reads
//! * Checking primer specificity against a set of reference sequences
//! * Trimming primers off amplicon reads
//!
//! ## Amplicons
//! An amplicon spans from the leftmost hit of the forward primer to the end of the rightmost
//! hit of the reverse complement of the reverse primer:
//! ```text
//! seq:      ACGT|GTGCCAGCAGCCGCGGTAA|TGACTA...GGAC|ATTAGATACCCTGGTAGTCC|TTGC
//!               |--- forward -------|             |-- reverse (rc) ----|
//!               |------------------- amplicon ---------------------------|
//! ```
//! Both strands are searched: a hit on the negative strand is reported in positive strand
//! coordinates. With zero mismatches primers are found by literal search, or by a regex
//! when they contain degenerate bases. With mismatches every record is indexed with an
//! FM-index and primers are located by backtracking search.
//!
//! See [`AmpliconFinder`] for the search over one sequence and [`AmpliconSearch`] for
//! searching streams of records.
//!
//! ## Regions
//! A [`Region`] selects part of the amplicon with signed 1-based offsets: `1:-1` is the
//! whole amplicon and `20:-20` trims 19 bases off both ends. A flanking region selects
//! sequence outside the amplicon instead: `-50:-1` is the 50 bases upstream.
//!
//! ## Ordered output
//! [`run_ordered`] runs a per-record operation on a fixed pool of worker threads and hands
//! the results to a single writer in input order.

pub mod amplicon;
pub mod errors;
pub mod fastx;
pub mod index;
pub mod locate;
pub mod ordered;
pub mod primers;
pub mod seq;

mod parse_utils;

// commonly used functions and types

pub use crate::amplicon::*;
pub use crate::fastx::*;
pub use crate::index::*;
pub use crate::locate::*;
pub use crate::ordered::*;
pub use crate::primers::*;
