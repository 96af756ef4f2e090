use needletail::errors::ParseErrorKind;
use needletail::{parse_fastx_file, parse_fastx_reader, parse_fastx_stdin, FastxReader};

use flate2::{write::GzEncoder, Compression};

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::errors::*;

/// Where a record came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    File(String),
    Stdin,
    Bytes,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Origin::File(file) => write!(f, "file: \"{}\"", file),
            Origin::Stdin => write!(f, "stdin"),
            Origin::Bytes => write!(f, "bytes"),
        }
    }
}

/// An owned FASTA/FASTQ record.
///
/// The header is split at the first whitespace into `id` and `desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: Vec<u8>,
    pub desc: Vec<u8>,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

impl Record {
    pub fn new(header: &[u8], seq: &[u8], qual: Option<&[u8]>) -> Self {
        let (id, desc) = match header.iter().position(|c| c.is_ascii_whitespace()) {
            Some(i) => (&header[..i], &header[i + 1..]),
            None => (header, &b""[..]),
        };

        Self {
            id: id.to_owned(),
            desc: desc.to_owned(),
            seq: seq.to_owned(),
            qual: qual.map(|q| q.to_owned()),
        }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn write_header(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.id)?;
        if !self.desc.is_empty() {
            writer.write_all(b" ")?;
            writer.write_all(&self.desc)?;
        }
        Ok(())
    }

    /// Copy of the record holding only `seq[start - 1..end]` (1-based, inclusive).
    ///
    /// With `revcomp` the subsequence is reverse complemented and the quality reversed.
    pub fn subrecord(&self, start: usize, end: usize, revcomp: bool) -> Self {
        let mut seq = self.seq[start - 1..end].to_owned();
        let mut qual = self.qual.as_ref().map(|q| q[start - 1..end].to_owned());

        if revcomp {
            seq = crate::seq::revcomp(&seq);
            if let Some(q) = &mut qual {
                q.reverse();
            }
        }

        Self {
            id: self.id.clone(),
            desc: self.desc.clone(),
            seq,
            qual,
        }
    }
}

/// Stream of records parsed by needletail, in file order.
pub struct FastxRecords<'reader> {
    reader: Option<Box<dyn FastxReader + 'reader>>,
    origin: Origin,
    idx: usize,
}

impl<'reader> FastxRecords<'reader> {
    /// Stream records from an input file, or stdin if the file is `-`.
    pub fn from_file(file: impl AsRef<str>) -> Result<Self> {
        let file = file.as_ref();
        let (reader, origin) = if file == "-" {
            (parse_fastx_stdin(), Origin::Stdin)
        } else {
            (parse_fastx_file(file), Origin::File(file.to_owned()))
        };

        let reader = match reader {
            Ok(r) => Some(r),
            Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => None,
            Err(e) => Err(Error::FileIo {
                file: file.to_owned(),
                source: Box::new(e),
            })?,
        };

        Ok(Self {
            reader,
            origin,
            idx: 0,
        })
    }

    /// Stream records from a byte slice.
    pub fn from_bytes(bytes: &'reader [u8]) -> Result<Self> {
        let reader = match parse_fastx_reader(bytes) {
            Ok(r) => Some(r),
            Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => None,
            Err(e) => Err(Error::BytesIo(Box::new(e)))?,
        };

        Ok(Self {
            reader,
            origin: Origin::Bytes,
            idx: 0,
        })
    }
}

impl<'reader> Iterator for FastxRecords<'reader> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let record = reader.next()?;
        let idx = self.idx;
        self.idx += 1;

        Some(
            record
                .map(|r| Record::new(r.id(), &r.seq(), r.qual()))
                .map_err(|e| Error::ParseRecord {
                    origin: self.origin.clone(),
                    idx,
                    source: Box::new(e),
                }),
        )
    }
}

/// Open an output sink: stdout for `-`, gzip for files ending in `.gz`.
pub fn open_output(file: impl AsRef<str>) -> Result<Box<dyn Write + Send>> {
    let file = file.as_ref();

    if file == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }

    let to_err = |e: io::Error| Error::FileIo {
        file: file.to_owned(),
        source: Box::new(e),
    };

    if let Some(parent) = std::path::Path::new(file).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(to_err)?;
        }
    }

    let writer: Box<dyn Write + Send> = if file.ends_with(".gz") {
        Box::new(BufWriter::new(GzEncoder::new(
            File::create(file).map_err(to_err)?,
            Compression::default(),
        )))
    } else {
        Box::new(BufWriter::new(File::create(file).map_err(to_err)?))
    };

    Ok(writer)
}

pub fn write_fastq_record(writer: &mut dyn Write, record: &Record) -> io::Result<()> {
    writer.write_all(b"@")?;
    record.write_header(writer)?;
    writer.write_all(b"\n")?;
    writer.write_all(&record.seq)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(record.qual.as_deref().unwrap_or_default())?;
    writer.write_all(b"\n")
}

/// Write a FASTA record, wrapping the sequence every `line_width` bases (0 disables wrapping).
pub fn write_fasta_record(
    writer: &mut dyn Write,
    record: &Record,
    line_width: usize,
) -> io::Result<()> {
    writer.write_all(b">")?;
    record.write_header(writer)?;
    writer.write_all(b"\n")?;

    if line_width == 0 {
        writer.write_all(&record.seq)?;
        return writer.write_all(b"\n");
    }

    for line in record.seq.chunks(line_width) {
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
    }

    Ok(())
}

/// Write a record as FASTQ if it has qualities, otherwise as FASTA.
pub fn write_record(writer: &mut dyn Write, record: &Record, line_width: usize) -> io::Result<()> {
    if record.qual.is_some() {
        write_fastq_record(writer, record)
    } else {
        write_fasta_record(writer, record, line_width)
    }
}
