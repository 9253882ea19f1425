//! Contiguous vector arena with optional scalar quantization.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::RagError;

/// Numeric precision used to store vector components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarKind {
    /// 64-bit floats.
    F64,
    /// 32-bit floats.
    #[default]
    F32,
    /// Signed bytes with one `f32` scale per vector.
    I8,
}

impl ScalarKind {
    /// Short name used in configuration files and the CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::I8 => "i8",
        }
    }

    /// Bytes used to store one vector of `dimension` components.
    #[must_use]
    pub const fn bytes_per_vector(self, dimension: usize) -> usize {
        match self {
            Self::F64 => dimension * 8,
            Self::F32 => dimension * 4,
            Self::I8 => dimension + 4,
        }
    }

    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::F64 => 0,
            Self::F32 => 1,
            Self::I8 => 2,
        }
    }

    pub(crate) const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::F64),
            1 => Some(Self::F32),
            2 => Some(Self::I8),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f64" | "double" => Ok(Self::F64),
            "f32" | "float" => Ok(Self::F32),
            "i8" | "int8" => Ok(Self::I8),
            other => Err(RagError::Config(format!("unknown scalar kind `{other}`"))),
        }
    }
}

/// Vectors of one index, stored back to back and addressed by slot.
#[derive(Debug, Clone, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub(crate) enum VectorStorage {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I8 { codes: Vec<i8>, scales: Vec<f32> },
}

impl VectorStorage {
    pub(crate) const fn new(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::F64 => Self::F64(Vec::new()),
            ScalarKind::F32 => Self::F32(Vec::new()),
            ScalarKind::I8 => Self::I8 {
                codes: Vec::new(),
                scales: Vec::new(),
            },
        }
    }

    pub(crate) const fn kind(&self) -> ScalarKind {
        match self {
            Self::F64(_) => ScalarKind::F64,
            Self::F32(_) => ScalarKind::F32,
            Self::I8 { .. } => ScalarKind::I8,
        }
    }

    /// Checks that the arena is consistent with `count` vectors of `dimension` components.
    pub(crate) fn is_consistent(&self, dimension: usize, count: usize) -> bool {
        let components = dimension * count;
        match self {
            Self::F64(values) => values.len() == components,
            Self::F32(values) => values.len() == components,
            Self::I8 { codes, scales } => codes.len() == components && scales.len() == count,
        }
    }

    pub(crate) fn push(&mut self, vector: &[f32]) {
        match self {
            Self::F64(values) => values.extend(vector.iter().map(|&x| f64::from(x))),
            Self::F32(values) => values.extend_from_slice(vector),
            Self::I8 { codes, scales } => {
                let max = vector.iter().fold(0.0f32, |acc, x| acc.max(x.abs()));
                let scale = max / 127.0;
                scales.push(scale);
                if scale == 0.0 {
                    codes.extend(std::iter::repeat_n(0, vector.len()));
                } else {
                    #[allow(clippy::cast_possible_truncation)]
                    codes.extend(
                        vector
                            .iter()
                            .map(|&x| (x / scale).round().clamp(-127.0, 127.0) as i8),
                    );
                }
            }
        }
    }

    /// Decoded vector stored at `slot`.
    pub(crate) fn get(&self, slot: usize, dimension: usize) -> Cow<'_, [f32]> {
        let range = slot * dimension..(slot + 1) * dimension;
        match self {
            Self::F32(values) => Cow::Borrowed(&values[range]),
            #[allow(clippy::cast_possible_truncation)]
            Self::F64(values) => Cow::Owned(values[range].iter().map(|&x| x as f32).collect()),
            Self::I8 { codes, scales } => {
                let scale = scales[slot];
                Cow::Owned(codes[range].iter().map(|&q| f32::from(q) * scale).collect())
            }
        }
    }

    pub(crate) fn memory_usage(&self) -> usize {
        match self {
            Self::F64(values) => values.capacity() * size_of::<f64>(),
            Self::F32(values) => values.capacity() * size_of::<f32>(),
            Self::I8 { codes, scales } => codes.capacity() + scales.capacity() * size_of::<f32>(),
        }
    }
}
