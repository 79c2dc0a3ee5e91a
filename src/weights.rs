//! Symbol-keyed portfolio weights.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::Symbol;

/// Portfolio weights keyed by symbol, iterated in symbol order.
///
/// An empty vector means "no solution found". Long-only vectors produced by
/// the solver are non-negative and sum to 1.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct WeightVector(BTreeMap<Symbol, f64>);

impl WeightVector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build from (symbol, weight) pairs. Repeated symbols accumulate.
    pub fn from_pairs<I: IntoIterator<Item = (Symbol, f64)>>(pairs: I) -> Self {
        let mut map = BTreeMap::new();
        for (sym, w) in pairs {
            *map.entry(sym).or_insert(0.0) += w;
        }
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Weight of `symbol`, 0.0 if absent.
    pub fn get(&self, symbol: Symbol) -> f64 {
        self.0.get(&symbol).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.0.contains_key(&symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, f64)> + '_ {
        self.0.iter().map(|(s, w)| (*s, *w))
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.0.keys().copied().collect()
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    /// Largest single weight, 0.0 when empty.
    pub fn max_weight(&self) -> f64 {
        self.0.values().copied().fold(0.0, f64::max)
    }

    /// Rescale so the weights sum to 1.
    ///
    /// A vector whose sum is zero or not finite is returned unchanged.
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if !total.is_finite() || total.abs() <= f64::EPSILON {
            return self.clone();
        }
        self.scaled(1.0 / total)
    }

    /// Multiply every weight by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.iter().map(|(s, w)| (*s, w * factor)).collect())
    }

    /// Cap every weight at `cap`. Clipped mass is not redistributed.
    pub fn clipped(&self, cap: f64) -> Self {
        Self(self.0.iter().map(|(s, w)| (*s, w.min(cap))).collect())
    }

    /// Union-add two vectors; symbols missing from one side count as 0.
    pub fn add(&self, other: &WeightVector) -> Self {
        let mut map = self.0.clone();
        for (sym, w) in &other.0 {
            *map.entry(*sym).or_insert(0.0) += w;
        }
        Self(map)
    }

    /// Union-add a list of vectors.
    pub fn sum_all(vectors: &[WeightVector]) -> Self {
        vectors
            .iter()
            .fold(WeightVector::new(), |acc, v| acc.add(v))
    }
}

impl FromIterator<(Symbol, f64)> for WeightVector {
    fn from_iter<I: IntoIterator<Item = (Symbol, f64)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl fmt::Display for WeightVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (sym, w)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{sym}: {:.1}%", w * 100.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> Symbol {
        Symbol::new("A")
    }
    fn b() -> Symbol {
        Symbol::new("B")
    }
    fn c() -> Symbol {
        Symbol::new("C")
    }

    #[test]
    fn add_is_union_with_zero_fill() {
        let x = WeightVector::from_pairs([(a(), 0.2), (b(), 0.3)]);
        let y = WeightVector::from_pairs([(b(), 0.1), (c(), 0.4)]);
        let z = x.add(&y);
        assert_eq!(z.len(), 3);
        assert_eq!(z.get(a()), 0.2);
        assert!((z.get(b()) - 0.4).abs() < 1e-12);
        assert_eq!(z.get(c()), 0.4);
    }

    #[test]
    fn normalized_sums_to_one() {
        let w = WeightVector::from_pairs([(a(), 2.0), (b(), 6.0)]).normalized();
        assert!((w.sum() - 1.0).abs() < 1e-12);
        assert!((w.get(b()) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn normalized_leaves_zero_sum_alone() {
        let w = WeightVector::from_pairs([(a(), 0.0)]);
        assert_eq!(w.normalized(), w);
        assert!(WeightVector::new().normalized().is_empty());
    }

    #[test]
    fn clipped_does_not_redistribute() {
        let w = WeightVector::from_pairs([(a(), 0.9), (b(), 0.1)]).clipped(0.5);
        assert_eq!(w.get(a()), 0.5);
        assert_eq!(w.get(b()), 0.1);
        assert!((w.sum() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn sum_all_of_nothing_is_empty() {
        assert!(WeightVector::sum_all(&[]).is_empty());
    }

    #[test]
    fn display_percentages_in_symbol_order() {
        let w = WeightVector::from_pairs([(b(), 0.25), (a(), 0.75)]);
        assert_eq!(format!("{w}"), "A: 75.0%, B: 25.0%");
    }
}
