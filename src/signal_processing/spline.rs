use crate::constants::SPLINE_EPSILON;

/// Natural cubic spline through a set of strictly increasing knots
///
/// Segment `j` is `a[j] + b[j]·dx + c[j]·dx² + d[j]·dx³` with `dx = t - x[j]`.
/// Outside the knot range the spline continues linearly with the end slope
/// (the second derivative is zero at both ends).
///
/// Refitting reuses the coefficient and scratch buffers, so once the buffers
/// have grown to the largest knot count no further allocation happens.
#[derive(Debug, Clone, Default)]
pub struct CubicSpline {
    x: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
    // Tridiagonal solver scratch
    mu: Vec<f64>,
    z: Vec<f64>,
}

impl CubicSpline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the spline through `(xs[i], ys[i])`
    ///
    /// Returns `false` and leaves the spline empty when fewer than two
    /// knots are given or the abscissae are not strictly increasing.
    pub fn fit<X, Y>(&mut self, xs: X, ys: Y) -> bool
    where
        X: IntoIterator<Item = f64>,
        Y: IntoIterator<Item = f64>,
    {
        self.x.clear();
        self.a.clear();
        self.x.extend(xs);
        self.a.extend(ys);

        let n = self.x.len();
        if n < 2
            || self.a.len() != n
            || self.x.windows(2).any(|w| w[1] - w[0] < SPLINE_EPSILON)
        {
            self.clear();
            return false;
        }

        let k = n - 1;
        self.b.clear();
        self.b.resize(k, 0.0);
        self.c.clear();
        self.c.resize(n, 0.0);
        self.d.clear();
        self.d.resize(k, 0.0);
        self.mu.clear();
        self.mu.resize(n, 0.0);
        self.z.clear();
        self.z.resize(n, 0.0);

        let x = &self.x;
        let a = &self.a;
        let h = |i: usize| x[i + 1] - x[i];

        // Forward sweep of the tridiagonal system for the c coefficients
        for i in 1..k {
            let alpha = 3.0 / h(i) * (a[i + 1] - a[i]) - 3.0 / h(i - 1) * (a[i] - a[i - 1]);
            let l = 2.0 * (x[i + 1] - x[i - 1]) - h(i - 1) * self.mu[i - 1];
            self.mu[i] = h(i) / l;
            self.z[i] = (alpha - h(i - 1) * self.z[i - 1]) / l;
        }

        // Back substitution, natural boundary c[n-1] = 0
        for j in (0..k).rev() {
            self.c[j] = self.z[j] - self.mu[j] * self.c[j + 1];
            self.b[j] = (a[j + 1] - a[j]) / h(j) - h(j) * (self.c[j + 1] + 2.0 * self.c[j]) / 3.0;
            self.d[j] = (self.c[j + 1] - self.c[j]) / (3.0 * h(j));
        }

        true
    }

    pub fn clear(&mut self) {
        self.x.clear();
        self.a.clear();
        self.b.clear();
        self.c.clear();
        self.d.clear();
    }

    pub fn is_fitted(&self) -> bool {
        self.x.len() >= 2
    }

    pub fn lower_bound(&self) -> Option<f64> {
        self.x.first().copied()
    }

    pub fn upper_bound(&self) -> Option<f64> {
        self.x.last().copied()
    }

    /// Evaluate the spline at `t`, or `None` if nothing is fitted
    pub fn evaluate(&self, t: f64) -> Option<f64> {
        if !self.is_fitted() {
            return None;
        }
        let n = self.x.len();
        let first = self.x[0];
        let last = self.x[n - 1];

        if t <= first {
            return Some(self.a[0] + self.b[0] * (t - first));
        }
        if t >= last {
            let j = n - 2;
            let h = last - self.x[j];
            let slope = self.b[j] + 2.0 * self.c[j] * h + 3.0 * self.d[j] * h * h;
            return Some(self.a[n - 1] + slope * (t - last));
        }

        // Segment whose left knot is the last one not after t
        let j = (self.x.partition_point(|&xi| xi <= t) - 1).min(n - 2);
        let dx = t - self.x[j];
        Some(self.a[j] + dx * (self.b[j] + dx * (self.c[j] + dx * self.d[j])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitted(xs: &[f64], ys: &[f64]) -> CubicSpline {
        let mut spline = CubicSpline::new();
        assert!(spline.fit(xs.iter().copied(), ys.iter().copied()));
        spline
    }

    #[test]
    fn test_passes_through_knots() {
        let xs = [0.0, 0.8, 1.7, 2.5, 3.1, 4.0];
        let ys = [60.0, 62.0, 65.0, 61.0, 58.0, 63.0];
        let spline = fitted(&xs, &ys);

        for (&x, &y) in xs.iter().zip(ys.iter()) {
            let v = spline.evaluate(x).unwrap();
            assert!((v - y).abs() < 1e-9, "spline({}) = {}, expected {}", x, v, y);
        }
    }

    #[test]
    fn test_reproduces_straight_line() {
        // A natural spline reproduces linear data exactly, also outside the knots
        let xs = [0.0, 1.0, 2.5, 4.0];
        let ys: Vec<f64> = xs.iter().map(|x| 70.0 + 2.0 * x).collect();
        let spline = fitted(&xs, &ys);

        for t in [-1.0, 0.5, 1.75, 3.3, 6.0] {
            let v = spline.evaluate(t).unwrap();
            assert!((v - (70.0 + 2.0 * t)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_continuous_at_interior_knots() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 2.0, 5.0];
        let spline = fitted(&xs, &ys);

        for &x in &xs[1..3] {
            let left = spline.evaluate(x - 1e-7).unwrap();
            let right = spline.evaluate(x + 1e-7).unwrap();
            assert!((left - right).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rejects_non_increasing_knots() {
        let mut spline = CubicSpline::new();
        assert!(!spline.fit([0.0, 1.0, 1.0], [1.0, 2.0, 3.0]));
        assert!(!spline.is_fitted());
        assert!(!spline.fit([0.0, 2.0, 1.0], [1.0, 2.0, 3.0]));
        assert!(spline.evaluate(0.5).is_none());
    }

    #[test]
    fn test_rejects_single_knot() {
        let mut spline = CubicSpline::new();
        assert!(!spline.fit([1.0], [60.0]));
        assert_eq!(spline.lower_bound(), None);
    }

    #[test]
    fn test_refit_replaces_previous_curve() {
        let mut spline = fitted(&[0.0, 1.0, 2.0], &[60.0, 60.0, 60.0]);
        assert!(spline.fit([5.0, 6.0, 7.0], [80.0, 80.0, 80.0]));
        assert_eq!(spline.lower_bound(), Some(5.0));
        assert!((spline.evaluate(6.5).unwrap() - 80.0).abs() < 1e-9);
    }
}
