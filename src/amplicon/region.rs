use std::fmt;

use crate::amplicon::Location;
use crate::errors::*;
use crate::parse_utils::*;

/// A region relative to a located amplicon.
///
/// `begin` and `end` are 1-based and signed. For an inner region a positive offset
/// counts from the amplicon's 5' end and a negative one from its 3' end, so `1:-1`
/// is the whole amplicon. For a flanking region negative offsets count upstream of
/// the 5' end and positive offsets downstream of the 3' end, so `-20:-1` is the 20
/// bases before the amplicon.
///
/// With `strict` a region that would have to be clipped to the sequence bounds is
/// discarded instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub begin: i64,
    pub end: i64,
    pub flanking: bool,
    pub strict: bool,
}

impl Region {
    pub fn new(begin: i64, end: i64, flanking: bool, strict: bool) -> Result<Self> {
        let region = Self {
            begin,
            end,
            flanking,
            strict,
        };
        region.validate()?;
        Ok(region)
    }

    /// Parse `begin:end`.
    pub fn parse(s: &str, flanking: bool, strict: bool) -> Result<Self> {
        let split = s.as_bytes().split(|&c| c == b':').collect::<Vec<_>>();

        match split.as_slice() {
            &[begin, end] => {
                let begin = parse_signed(begin).ok_or_else(|| Error::InvalidRegion {
                    region: s.to_owned(),
                    reason: "begin is not an integer",
                })?;
                let end = parse_signed(end).ok_or_else(|| Error::InvalidRegion {
                    region: s.to_owned(),
                    reason: "end is not an integer",
                })?;
                Self::new(begin, end, flanking, strict)
            }
            _ => Err(Error::InvalidRegion {
                region: s.to_owned(),
                reason: "expected begin:end",
            }),
        }
    }

    fn validate(&self) -> Result<()> {
        let reason = if self.begin == 0 || self.end == 0 {
            Some("begin and end must not be zero")
        } else if !self.flanking && self.begin < 0 && self.end > 0 {
            Some("an inner region cannot begin relative to the 3' end and end relative to the 5' end")
        } else if self.flanking && self.begin > 0 && self.end < 0 {
            Some("a flanking region cannot span across the amplicon")
        } else if self.begin.signum() == self.end.signum() && self.begin > self.end {
            Some("begin is after end")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidRegion {
                region: self.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Locate this region in a sequence of `length` bases given the amplicon's 0-based
    /// inclusive bounds.
    pub fn locate(&self, length: usize, amp_begin: usize, amp_end: usize) -> Option<Location> {
        if self.flanking {
            sub_location_flanking(length, amp_begin, amp_end, self.begin, self.end, self.strict)
        } else {
            sub_location_inner(length, amp_begin, amp_end, self.begin, self.end, self.strict)
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.begin, self.end)
    }
}

fn clip(pos: i64, length: i64, strict: bool) -> Option<i64> {
    if (1..=length).contains(&pos) {
        Some(pos)
    } else if strict {
        None
    } else {
        Some(pos.clamp(1, length))
    }
}

/// 1-based inclusive location of a region inside (or overlapping) an amplicon at
/// `amp_begin..=amp_end` (0-based).
///
/// Positive offsets count from the 5' end, negative offsets from the 3' end.
pub fn sub_location_inner(
    length: usize,
    amp_begin: usize,
    amp_end: usize,
    begin: i64,
    end: i64,
    strict: bool,
) -> Option<Location> {
    if length == 0 || begin == 0 || end == 0 || (begin < 0 && end > 0) {
        return None;
    }

    let length = length as i64;
    let amp_begin = amp_begin as i64;
    let amp_end = (amp_end as i64).min(length - 1);

    let b = if begin > 0 {
        amp_begin + begin
    } else {
        amp_end + begin + 2
    };
    let e = if end > 0 {
        amp_begin + end
    } else {
        amp_end + end + 2
    };

    let b = clip(b, length, strict)?;
    let e = clip(e, length, strict)?;

    (b <= e).then(|| Location::new(b as usize, e as usize))
}

/// 1-based inclusive location of a region flanking an amplicon at `amp_begin..=amp_end`
/// (0-based).
///
/// Negative offsets count upstream of the 5' end, positive offsets downstream of the
/// 3' end. Clipping the 5' boundary to the sequence start is remembered: a region
/// whose end then also falls before the sequence start is dropped even when not
/// strict.
pub fn sub_location_flanking(
    length: usize,
    amp_begin: usize,
    amp_end: usize,
    begin: i64,
    end: i64,
    strict: bool,
) -> Option<Location> {
    if length == 0 || begin == 0 || end == 0 || (begin > 0 && end < 0) {
        return None;
    }

    let length = length as i64;
    let amp_begin = amp_begin as i64;
    let amp_end = (amp_end as i64).min(length - 1);
    let mut clipped_5 = false;

    let b = if begin < 0 {
        let b = amp_begin + begin + 1;
        if b < 1 {
            if strict {
                return None;
            }
            clipped_5 = true;
            1
        } else {
            b
        }
    } else {
        amp_end + begin + 1
    };

    let e = if end < 0 {
        let e = amp_begin + end + 1;
        if clipped_5 && e < 1 {
            return None;
        }
        e
    } else {
        let e = amp_end + end + 1;
        if e > length {
            if strict {
                return None;
            }
            length
        } else {
            e
        }
    };

    (b <= e).then(|| Location::new(b as usize, e as usize))
}
