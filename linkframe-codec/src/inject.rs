//! Fault injection for detection experiments.
//!
//! [`corrupt`] flips bits of a copy of its input according to an
//! [`ErrorModel`] and reports exactly which positions changed. Given the same
//! seeded random source it always produces the same corruption.

use crate::bits::Bits;
use crate::error::CodecError;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Bits flipped by the default odd-count model.
pub const DEFAULT_ODD_FLIPS: usize = 3;
/// Default burst length range, inclusive.
pub const DEFAULT_BURST: (usize, usize) = (2, 6);

/// Fault models.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorModel {
    /// One uniformly chosen bit.
    Single,
    /// Two distinct bits.
    TwoIsolated,
    /// `k` distinct bits, `k` odd.
    Odd { k: usize },
    /// A contiguous run whose length is uniform in `min..=max`.
    Burst { min: usize, max: usize },
    /// Exactly these positions; the ones past the end are ignored.
    Custom(Vec<usize>),
}

impl ErrorModel {
    pub fn odd() -> Self {
        ErrorModel::Odd {
            k: DEFAULT_ODD_FLIPS,
        }
    }

    pub fn burst() -> Self {
        ErrorModel::Burst {
            min: DEFAULT_BURST.0,
            max: DEFAULT_BURST.1,
        }
    }

    /// The four random models with their default parameters.
    pub fn standard() -> Vec<ErrorModel> {
        vec![
            ErrorModel::Single,
            ErrorModel::TwoIsolated,
            ErrorModel::odd(),
            ErrorModel::burst(),
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorModel::Single => "single",
            ErrorModel::TwoIsolated => "two_isolated",
            ErrorModel::Odd { .. } => "odd",
            ErrorModel::Burst { .. } => "burst",
            ErrorModel::Custom(_) => "custom",
        }
    }

    /// Flips made by every corruption under this model.
    fn min_bits(&self) -> usize {
        match self {
            ErrorModel::Single => 1,
            ErrorModel::TwoIsolated => 2,
            ErrorModel::Odd { k } => *k,
            ErrorModel::Burst { min, .. } => *min,
            ErrorModel::Custom(_) => 0,
        }
    }

    /// Rejects ill-formed parameters.
    pub fn check(&self) -> Result<(), CodecError> {
        match *self {
            ErrorModel::Odd { k } if k % 2 == 0 => Err(CodecError::InvalidErrorModel(format!(
                "odd model needs an odd flip count, got {k}"
            ))),
            ErrorModel::Burst { min: 0, .. } => Err(CodecError::InvalidErrorModel(
                "burst length must be at least 1".to_string(),
            )),
            ErrorModel::Burst { min, max } if min > max => Err(CodecError::InvalidErrorModel(
                format!("burst range {min}..={max} is empty"),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ErrorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorModel::Odd { k } => write!(f, "odd:{k}"),
            ErrorModel::Burst { min, max } => write!(f, "burst:{min}-{max}"),
            ErrorModel::Custom(positions) => {
                let list: Vec<String> = positions.iter().map(|p| p.to_string()).collect();
                write!(f, "custom:{}", list.join(","))
            }
            other => f.write_str(other.name()),
        }
    }
}

fn parse_count(model: &str, s: &str) -> Result<usize, CodecError> {
    s.trim()
        .parse()
        .map_err(|_| CodecError::InvalidErrorModel(format!("{model}: not a count: {s:?}")))
}

/// Parses a comma or whitespace separated list of bit positions.
///
/// The result is sorted and deduplicated.
pub fn parse_positions(s: &str) -> Result<Vec<usize>, CodecError> {
    let mut positions = s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| parse_count("custom", part))
        .collect::<Result<Vec<_>, _>>()?;
    positions.sort_unstable();
    positions.dedup();
    Ok(positions)
}

impl FromStr for ErrorModel {
    type Err = CodecError;

    /// Accepts `single`, `two_isolated`, `odd[:k]`, `burst[:min-max]` and
    /// `custom:p1,p2,...`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (name, params) = match s.split_once(':') {
            Some((name, params)) => (name, Some(params)),
            None => (s.as_str(), None),
        };

        let model = match (name, params) {
            ("single", None) => ErrorModel::Single,
            ("two_isolated" | "two-isolated" | "double", None) => ErrorModel::TwoIsolated,
            ("odd", None) => ErrorModel::odd(),
            ("odd", Some(k)) => ErrorModel::Odd {
                k: parse_count("odd", k)?,
            },
            ("burst", None) => ErrorModel::burst(),
            ("burst", Some(range)) => {
                let (min, max) = range.split_once('-').ok_or_else(|| {
                    CodecError::InvalidErrorModel(format!("burst: expected min-max, got {range:?}"))
                })?;
                ErrorModel::Burst {
                    min: parse_count("burst", min)?,
                    max: parse_count("burst", max)?,
                }
            }
            ("custom", Some(list)) => ErrorModel::Custom(parse_positions(list)?),
            _ => return Err(CodecError::InvalidErrorModel(format!("unknown model {s:?}"))),
        };
        model.check()?;
        Ok(model)
    }
}

impl Serialize for ErrorModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A corrupted copy of a bit-string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corruption {
    pub bits: Bits,
    /// Positions that changed, ascending and distinct.
    pub flipped: Vec<usize>,
}

/// Flips bits of a copy of `bits` under `model`.
pub fn corrupt<R: Rng + ?Sized>(
    bits: &[bool],
    model: &ErrorModel,
    rng: &mut R,
) -> Result<Corruption, CodecError> {
    model.check()?;
    let len = bits.len();
    let needed = model.min_bits();
    if len < needed {
        return Err(CodecError::InsufficientBits {
            model: model.name(),
            needed,
            len,
        });
    }

    let mut positions: Vec<usize> = match model {
        ErrorModel::Single => vec![rng.gen_range(0..len)],
        ErrorModel::TwoIsolated => {
            let first = rng.gen_range(0..len);
            let mut second = rng.gen_range(0..len);
            while second == first {
                second = rng.gen_range(0..len);
            }
            vec![first, second]
        }
        ErrorModel::Odd { k } => index::sample(rng, len, *k).into_vec(),
        ErrorModel::Burst { min, max } => {
            let run = rng.gen_range(*min..=(*max).min(len));
            let start = rng.gen_range(0..=len - run);
            (start..start + run).collect()
        }
        ErrorModel::Custom(requested) => requested.iter().copied().filter(|&p| p < len).collect(),
    };
    positions.sort_unstable();
    positions.dedup();

    let mut corrupted = Bits::from(bits);
    for &position in &positions {
        corrupted.flip(position);
    }
    Ok(Corruption {
        bits: corrupted,
        flipped: positions,
    })
}

/// A seeded source of corruptions.
#[derive(Debug, Clone)]
pub struct ErrorInjector {
    rng: ChaCha8Rng,
}

impl ErrorInjector {
    /// Deterministic injector: the same seed yields the same corruptions.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn inject(&mut self, bits: &[bool], model: &ErrorModel) -> Result<Corruption, CodecError> {
        corrupt(bits, model, &mut self.rng)
    }
}
