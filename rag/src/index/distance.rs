//! Distance metrics. Every metric returns a distance: lower means more similar.

use std::fmt;
use std::str::FromStr;

use crate::error::RagError;

/// Distance metric used to compare vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Metric {
    /// `1 - cos(a, b)`. Zero-norm vectors are at distance 1 from everything.
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// `1 - a·b`, intended for normalized vectors.
    InnerProduct,
}

impl Metric {
    /// Computes the distance between two vectors of equal length.
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Cosine => {
                let norms = magnitude(a) * magnitude(b);
                if norms == 0.0 {
                    return 1.0;
                }
                1.0 - dot(a, b) / norms
            }
            Self::Euclidean => euclidean_distance_squared(a, b).sqrt(),
            Self::InnerProduct => 1.0 - dot(a, b),
        }
    }

    /// Short name used in configuration files and the CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cosine => "cos",
            Self::Euclidean => "l2",
            Self::InnerProduct => "ip",
        }
    }

    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Cosine => 0,
            Self::Euclidean => 1,
            Self::InnerProduct => 2,
        }
    }

    pub(crate) const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Cosine),
            1 => Some(Self::Euclidean),
            2 => Some(Self::InnerProduct),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cos" | "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::Euclidean),
            "ip" | "dot" | "inner_product" => Ok(Self::InnerProduct),
            other => Err(RagError::Config(format!("unknown metric `{other}`"))),
        }
    }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0;
    let n = a.len().min(b.len());
    let mut i = 0;

    // Unrolling 4
    while i + 3 < n {
        sum += a[i] * b[i] + a[i + 1] * b[i + 1] + a[i + 2] * b[i + 2] + a[i + 3] * b[i + 3];
        i += 4;
    }

    while i < n {
        sum += a[i] * b[i];
        i += 1;
    }

    sum
}

pub(crate) fn magnitude(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0;
    let n = a.len().min(b.len());
    let mut i = 0;

    while i + 3 < n {
        let d0 = a[i] - b[i];
        let d1 = a[i + 1] - b[i + 1];
        let d2 = a[i + 2] - b[i + 2];
        let d3 = a[i + 3] - b[i + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
        i += 4;
    }

    while i < n {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }

    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_orders_by_angle() {
        let query = [1.0, 0.0, 0.0];
        let same = Metric::Cosine.distance(&query, &[2.0, 0.0, 0.0]);
        let close = Metric::Cosine.distance(&query, &[0.9, 0.1, 0.0]);
        let orthogonal = Metric::Cosine.distance(&query, &[0.0, 1.0, 0.0]);

        assert!(same.abs() < 1e-6);
        assert!(close < orthogonal);
        assert!((orthogonal - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector() {
        assert!((Metric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn euclidean_with_remainder() {
        let a = [0.0, 0.0, 0.0, 0.0, 3.0];
        let b = [0.0, 0.0, 0.0, 0.0, 0.0];
        assert!((Metric::Euclidean.distance(&a, &b) - 3.0).abs() < 1e-6);

        let c = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(Metric::Euclidean.distance(&c, &c).abs() < f32::EPSILON);
    }

    #[test]
    fn inner_product() {
        let d = Metric::InnerProduct.distance(&[0.6, 0.8], &[0.6, 0.8]);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn parse_names() {
        assert_eq!("cos".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("L2".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert_eq!("inner_product".parse::<Metric>().unwrap(), Metric::InnerProduct);
        assert!(matches!(
            "hamming".parse::<Metric>(),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn codes_round_trip() {
        for metric in [Metric::Cosine, Metric::Euclidean, Metric::InnerProduct] {
            assert_eq!(Metric::from_code(metric.code()), Some(metric));
        }
        assert_eq!(Metric::from_code(9), None);
    }
}
