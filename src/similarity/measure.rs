//! Correlation measures over co-rated items

use crate::types::{ItemId, Rating};

/// Variance below this fraction of the sum of squares is rounding noise
const RELATIVE_VARIANCE_EPS: f64 = 1e-9;

/// Sums accumulated over the items both users rated
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoRatedStats {
    pub count: usize,
    pub sum_a: f64,
    pub sum_b: f64,
    pub sum_aa: f64,
    pub sum_bb: f64,
    pub sum_ab: f64,
}

impl CoRatedStats {
    /// Merge two rating lists sorted by item ID in a single pass.
    pub fn collect(a: &[(ItemId, Rating)], b: &[(ItemId, Rating)]) -> Self {
        let mut stats = Self::default();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    stats.push(a[i].1 as f64, b[j].1 as f64);
                    i += 1;
                    j += 1;
                }
            }
        }
        stats
    }

    fn push(&mut self, x: f64, y: f64) {
        self.count += 1;
        self.sum_a += x;
        self.sum_b += y;
        self.sum_aa += x * x;
        self.sum_bb += y * y;
        self.sum_ab += x * y;
    }

    /// Sample Pearson correlation; 0.0 when either side has no variance
    pub fn pearson(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let cov = self.sum_ab - self.sum_a * self.sum_b / n;
        let var_a = self.sum_aa - self.sum_a * self.sum_a / n;
        let var_b = self.sum_bb - self.sum_b * self.sum_b / n;
        if var_a <= RELATIVE_VARIANCE_EPS * self.sum_aa
            || var_b <= RELATIVE_VARIANCE_EPS * self.sum_bb
        {
            return 0.0;
        }
        ratio(cov, var_a, var_b)
    }

    /// Cosine of the co-rated vectors; 0.0 when either is all zeros
    pub fn cosine(&self) -> f32 {
        ratio(self.sum_ab, self.sum_aa, self.sum_bb)
    }
}

/// `num / sqrt(den_a * den_b)` clamped to [-1, 1], or 0.0 for a degenerate denominator
fn ratio(num: f64, den_a: f64, den_b: f64) -> f32 {
    const EPS: f64 = 1e-12;
    if den_a <= EPS || den_b <= EPS {
        return 0.0;
    }
    let value = num / (den_a * den_b).sqrt();
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0) as f32
}

/// Size of the intersection of two item-sorted rating lists
pub fn common_item_count(a: &[(ItemId, Rating)], b: &[(ItemId, Rating)]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}
