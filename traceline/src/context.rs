//! Trace identity.
//!
//! A [`TraceContext`] is the immutable identity a span carries and the only
//! thing that crosses process boundaries (encoded as B3 headers by
//! [`crate::propagation::b3`]). Contexts are never mutated in place; child
//! identities are derived with [`TraceContext::child_of`].

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::errors::{TraceError, TraceErrorKind};

/// A 64- or 128-bit trace id.
///
/// `hi == 0` means the id is 64 bits wide and renders as 16 hex digits;
/// anything else renders as 32. The all-zero id is invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraceId {
    pub hi: u64,
    pub lo: u64,
}

impl TraceId {
    pub fn is_valid(&self) -> bool {
        self.hi != 0 || self.lo != 0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hi == 0 {
            write!(f, "{:016x}", self.lo)
        } else {
            write!(f, "{:016x}{:016x}", self.hi, self.lo)
        }
    }
}

impl FromStr for TraceId {
    type Err = TraceError;

    /// Parse a hex trace id. Short ids are accepted and zero-extended, the
    /// way collectors treat them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The length arms and split below count bytes, not characters.
        if !s.is_ascii() {
            return Err(TraceErrorKind::InvalidId(s.to_owned()).into());
        }
        let id = match s.len() {
            1..=16 => TraceId {
                hi: 0,
                lo: u64::from_str_radix(s, 16)?,
            },
            17..=32 => {
                let (hi, lo) = s.split_at(s.len() - 16);
                TraceId {
                    hi: u64::from_str_radix(hi, 16)?,
                    lo: u64::from_str_radix(lo, 16)?,
                }
            }
            _ => return Err(TraceErrorKind::InvalidId(s.to_owned()).into()),
        };
        if !id.is_valid() {
            return Err(TraceErrorKind::InvalidId(s.to_owned()).into());
        }
        Ok(id)
    }
}

impl Serialize for TraceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A 64-bit span id, rendered as 16 hex digits. Zero is invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpanId(pub u64);

impl SpanId {
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 16 {
            return Err(TraceErrorKind::InvalidId(s.to_owned()).into());
        }
        let id = SpanId(u64::from_str_radix(s, 16)?);
        if !id.is_valid() {
            return Err(TraceErrorKind::InvalidId(s.to_owned()).into());
        }
        Ok(id)
    }
}

impl Serialize for SpanId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// The identity a span carries: which trace it belongs to, which span it
/// is, who its parent is, and whether the trace is being recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub sampled: bool,
}

impl TraceContext {
    /// Derive the context of a child span: same trace, the given span id,
    /// this span as parent. The sampling decision is inherited.
    pub fn child_of(&self, span_id: SpanId) -> Self {
        TraceContext {
            trace_id: self.trace_id,
            span_id,
            parent_span_id: Some(self.span_id),
            sampled: self.sampled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_display_widths() {
        let short = TraceId { hi: 0, lo: 0x4d2 };
        assert_eq!(short.to_string(), "00000000000004d2");

        let wide = TraceId {
            hi: 0x1,
            lo: 0x4d2,
        };
        assert_eq!(wide.to_string(), "000000000000000100000000000004d2");
    }

    #[test]
    fn test_trace_id_parse_round_trip() {
        let short: TraceId = "00000000000004d2".parse().unwrap();
        assert_eq!(short, TraceId { hi: 0, lo: 0x4d2 });
        assert_eq!(short.to_string().parse::<TraceId>().unwrap(), short);

        let wide: TraceId = "463ac35c9f6413ad48485a3953bb6124".parse().unwrap();
        assert_eq!(
            wide,
            TraceId {
                hi: 0x463ac35c9f6413ad,
                lo: 0x48485a3953bb6124
            }
        );
        assert_eq!(wide.to_string().parse::<TraceId>().unwrap(), wide);

        // Short ids are zero extended
        let trimmed: TraceId = "4d2".parse().unwrap();
        assert_eq!(trimmed, short);
    }

    #[test]
    fn test_trace_id_rejects_garbage() {
        assert!("".parse::<TraceId>().is_err());
        assert!("xyz".parse::<TraceId>().is_err());
        assert!("0000000000000000".parse::<TraceId>().is_err());
        // 33 digits
        assert!("463ac35c9f6413ad48485a3953bb61241"
            .parse::<TraceId>()
            .is_err());
    }

    #[test]
    fn test_trace_id_rejects_multibyte_input() {
        // Six euro signs are 18 bytes, which lands in the wide-id arm
        // where the hi/lo split must not slice mid character.
        assert!("€€€€€€".parse::<TraceId>().is_err());
        assert!("€".parse::<TraceId>().is_err());
        // 18 bytes again, with the split offset inside the leading char
        assert!("€463ac35c9f6413a".parse::<TraceId>().is_err());
    }

    #[test]
    fn test_span_id_round_trip() {
        let id: SpanId = "0000000000000457".parse().unwrap();
        assert_eq!(id, SpanId(0x457));
        assert_eq!(id.to_string(), "0000000000000457");
        assert!("0".parse::<SpanId>().is_err());
        assert!("00000000000004571".parse::<SpanId>().is_err());
    }

    #[test]
    fn test_child_derivation() {
        let parent = TraceContext {
            trace_id: TraceId { hi: 0, lo: 0x4d2 },
            span_id: SpanId(0x457),
            parent_span_id: None,
            sampled: true,
        };
        let child = parent.child_of(SpanId(0x9c4));
        assert_eq!(child.trace_id, parent.trace_id);
        assert_eq!(child.span_id, SpanId(0x9c4));
        assert_eq!(child.parent_span_id, Some(parent.span_id));
        assert!(child.sampled);
    }
}
