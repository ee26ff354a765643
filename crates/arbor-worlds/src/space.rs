use arbor_rrt::Space;

// ---------------------------------------------------------------------------
// EuclideanSpace — R^N with the L2 metric
// ---------------------------------------------------------------------------

/// `N`-dimensional real vector space with Euclidean distance and straight
/// line interpolation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EuclideanSpace<const N: usize>;

impl<const N: usize> Space for EuclideanSpace<N> {
    type State = [f64; N];

    fn dimensions(&self) -> usize {
        N
    }

    fn distance(&self, a: &[f64; N], b: &[f64; N]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }

    fn interpolate(&self, a: &[f64; N], b: &[f64; N], t: f64) -> [f64; N] {
        std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let space = EuclideanSpace::<2>;
        assert!((space.distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-12);
        assert_eq!(space.distance(&[0.5, 0.5], &[0.5, 0.5]), 0.0);
    }

    #[test]
    fn interpolate_endpoints_and_midpoint() {
        let space = EuclideanSpace::<3>;
        let a = [0.0, 1.0, 2.0];
        let b = [2.0, 3.0, 4.0];
        assert_eq!(space.interpolate(&a, &b, 0.0), a);
        assert_eq!(space.interpolate(&a, &b, 1.0), b);
        assert_eq!(space.interpolate(&a, &b, 0.5), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn dimensions_match_const() {
        assert_eq!(EuclideanSpace::<2>.dimensions(), 2);
        assert_eq!(EuclideanSpace::<7>.dimensions(), 7);
    }
}
