//! Structural field paths and their token spelling.
//!
//! Each [`Segment`] has a compact token form `<prefix><body>@<rank>`:
//!
//! | segment           | prefix | body                 |
//! |-------------------|--------|----------------------|
//! | struct member     | `.`    | member name          |
//! | union member      | `?`    | member name          |
//! | zero-sized array  | `!`    | `index*elem_bitsize` |
//! | flexible array    | `*`    | `index*elem_bitsize` |
//! | regular array     | `[`    | `index*elem_bitsize` |
//!
//! The rank is the position of the step among its siblings. It never shows
//! up in the rendered display string (`z[0].x`) but keeps members that share
//! an offset apart.

use std::{fmt, str::FromStr};

use crate::errors::FormatError;

/// One traversal step from an aggregate into one of its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    StructField { name: String, rank: usize },
    UnionField { name: String, rank: usize },
    ZeroArrayElem { index: i64, elem_bitsize: u64, rank: usize },
    FlexArrayElem { index: i64, elem_bitsize: u64, rank: usize },
    ArrayElem { index: i64, elem_bitsize: u64, rank: usize },
}

impl Segment {
    pub fn rank(&self) -> usize {
        match self {
            Segment::StructField { rank, .. }
            | Segment::UnionField { rank, .. }
            | Segment::ZeroArrayElem { rank, .. }
            | Segment::FlexArrayElem { rank, .. }
            | Segment::ArrayElem { rank, .. } => *rank,
        }
    }

    fn prefix(&self) -> char {
        match self {
            Segment::StructField { .. } => '.',
            Segment::UnionField { .. } => '?',
            Segment::ZeroArrayElem { .. } => '!',
            Segment::FlexArrayElem { .. } => '*',
            Segment::ArrayElem { .. } => '[',
        }
    }

    /// False for steps that select data with no backing storage, or a union
    /// member other than the first declared one.
    pub fn has_payload(&self) -> bool {
        match self {
            Segment::ZeroArrayElem { .. } | Segment::FlexArrayElem { .. } => false,
            Segment::UnionField { rank, .. } => *rank == 0,
            Segment::StructField { .. } | Segment::ArrayElem { .. } => true,
        }
    }
}

/// Token form, e.g. `.name@3` or `[2*64@2`.
impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::StructField { name, rank } | Segment::UnionField { name, rank } => {
                write!(f, "{}{}@{}", self.prefix(), name, rank)
            }
            Segment::ZeroArrayElem {
                index,
                elem_bitsize,
                rank,
            }
            | Segment::FlexArrayElem {
                index,
                elem_bitsize,
                rank,
            }
            | Segment::ArrayElem {
                index,
                elem_bitsize,
                rank,
            } => write!(f, "{}{}*{}@{}", self.prefix(), index, elem_bitsize, rank),
        }
    }
}

impl FromStr for Segment {
    type Err = FormatError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let mut chars = token.chars();
        let prefix = chars
            .next()
            .ok_or_else(|| FormatError::new(token, "empty token"))?;
        let rest = chars.as_str();

        // The rank follows the last `@`, so member names may contain one.
        let (body, rank) = rest
            .rsplit_once('@')
            .ok_or_else(|| FormatError::new(token, "missing `@rank` suffix"))?;
        if rank.is_empty() || !rank.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FormatError::new(token, "rank is not a decimal number"));
        }
        let rank: usize = rank
            .parse()
            .map_err(|_| FormatError::new(token, "rank out of range"))?;

        match prefix {
            '.' => Ok(Segment::StructField {
                name: body.to_string(),
                rank,
            }),
            '?' => Ok(Segment::UnionField {
                name: body.to_string(),
                rank,
            }),
            '!' | '*' | '[' => {
                let (index, elem_bitsize) = parse_array_body(token, body)?;
                Ok(match prefix {
                    '!' => Segment::ZeroArrayElem {
                        index,
                        elem_bitsize,
                        rank,
                    },
                    '*' => Segment::FlexArrayElem {
                        index,
                        elem_bitsize,
                        rank,
                    },
                    _ => Segment::ArrayElem {
                        index,
                        elem_bitsize,
                        rank,
                    },
                })
            }
            _ => Err(FormatError::new(token, "unknown segment prefix")),
        }
    }
}

fn parse_array_body(token: &str, body: &str) -> Result<(i64, u64), FormatError> {
    let (index, bits) = body
        .split_once('*')
        .ok_or_else(|| FormatError::new(token, "array step is not `index*bitsize`"))?;
    let index = index
        .parse()
        .map_err(|_| FormatError::new(token, "array index is not an integer"))?;
    let bits = bits
        .parse()
        .map_err(|_| FormatError::new(token, "element bitsize is not an integer"))?;
    Ok((index, bits))
}

/// Structural address of a field: the root type's name (absent when
/// anonymous) followed by one segment per named or indexed step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    pub root: Option<String>,
    pub segments: Vec<Segment>,
}

impl Path {
    pub fn new(root: Option<String>, segments: Vec<Segment>) -> Self {
        Self { root, segments }
    }

    /// Builds a path from its root and segment tokens. Empty tokens are
    /// skipped.
    pub fn from_tokens<'a, I>(root: Option<String>, tokens: I) -> Result<Self, FormatError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let segments = tokens
            .into_iter()
            .filter(|token| !token.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Segment>, _>>()?;
        Ok(Self { root, segments })
    }

    /// Segment tokens, in order, without the root.
    pub fn tokens(&self) -> impl Iterator<Item = String> + '_ {
        self.segments.iter().map(Segment::to_string)
    }

    /// Whether the addressed field has backing data that the decoder reads.
    pub fn has_payload(&self) -> bool {
        self.segments.iter().all(Segment::has_payload)
    }

    /// Display form: `e`, `z[0].x`, `tail[]`. The root is dropped and ranks
    /// never appear.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::StructField { name, .. } | Segment::UnionField { name, .. } => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Segment::ZeroArrayElem { .. } | Segment::FlexArrayElem { .. } => {
                    out.push_str("[]");
                }
                Segment::ArrayElem { index, .. } => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

/// Renders a path given in token form without building a [`Path`] first.
pub fn render_tokens<'a, I>(tokens: I) -> Result<String, FormatError>
where
    I: IntoIterator<Item = &'a str>,
{
    Ok(Path::from_tokens(None, tokens)?.render())
}
