//! Closed-form VPSD component shapes and their sum.
//!
//! - Constant: `c0`
//! - Lorentz:  `c0·c1² / (c1² + (f − c2)²)`
//! - Harvey:   `c0 / (1 + (c1·f)^c2)`
//!
//! The fitter relies on two primitive operations per shape:
//! - evaluate the density at a frequency
//! - fill the partial derivatives with respect to the coefficients

use crate::domain::{ComponentKind, VpsdComponent};
use crate::error::{Result, RvError};
use crate::math::LeastSquaresModel;

/// Evaluate one component shape at frequency `f`.
///
/// Callers must pass `coef.len() == kind.coef_len()`.
pub fn evaluate(kind: ComponentKind, f: f64, coef: &[f64]) -> f64 {
    match kind {
        ComponentKind::Constant => coef[0],
        ComponentKind::Lorentz => {
            let c1sq = coef[1] * coef[1];
            let d = f - coef[2];
            coef[0] * c1sq / (c1sq + d * d)
        }
        ComponentKind::Harvey => coef[0] / (1.0 + (coef[1] * f).powf(coef[2])),
    }
}

/// Fill `∂density/∂coef_j` into `out`.
pub fn fill_gradient(kind: ComponentKind, f: f64, coef: &[f64], out: &mut [f64]) {
    match kind {
        ComponentKind::Constant => out[0] = 1.0,
        ComponentKind::Lorentz => {
            let (c0, c1, c2) = (coef[0], coef[1], coef[2]);
            let d = f - c2;
            let den = c1 * c1 + d * d;
            out[0] = c1 * c1 / den;
            out[1] = 2.0 * c0 * c1 * d * d / (den * den);
            out[2] = 2.0 * c0 * c1 * c1 * d / (den * den);
        }
        ComponentKind::Harvey => {
            let (c0, c1, c2) = (coef[0], coef[1], coef[2]);
            let x = c1 * f;
            let u = x.powf(c2);
            let den = (1.0 + u) * (1.0 + u);
            out[0] = 1.0 / (1.0 + u);
            // du/dc1 = c2·u/c1, du/dc2 = u·ln(c1·f); both vanish with u.
            out[1] = if c1 != 0.0 { -c0 * c2 * u / (c1 * den) } else { 0.0 };
            out[2] = if x > 0.0 { -c0 * u * x.ln() / den } else { 0.0 };
        }
    }
}

/// Check a component's coefficient vector against its shape.
pub fn validate_component(component: &VpsdComponent) -> Result<()> {
    let want = component.kind.coef_len();
    if component.coef.len() != want {
        return Err(RvError::validation(format!(
            "component '{}' ({}) needs {want} coefficients, got {}",
            component.name,
            component.kind.display_name(),
            component.coef.len()
        )));
    }
    if component.coef.iter().any(|c| !c.is_finite()) {
        return Err(RvError::validation(format!(
            "component '{}' has non-finite coefficients {:?}",
            component.name, component.coef
        )));
    }
    Ok(())
}

/// Ordered sum of components over one flat coefficient vector.
///
/// Order only affects how coefficients are laid out, never the value.
#[derive(Debug, Clone)]
pub struct Composite {
    kinds: Vec<ComponentKind>,
    offsets: Vec<usize>,
    n_params: usize,
}

impl Composite {
    pub fn new(kinds: Vec<ComponentKind>) -> Self {
        let mut offsets = Vec::with_capacity(kinds.len());
        let mut n_params = 0;
        for k in &kinds {
            offsets.push(n_params);
            n_params += k.coef_len();
        }
        Self {
            kinds,
            offsets,
            n_params,
        }
    }

    /// Build from component specs, validating each, and return the composite
    /// with the concatenated coefficient vector.
    pub fn from_components(components: &[VpsdComponent]) -> Result<(Self, Vec<f64>)> {
        if components.is_empty() {
            return Err(RvError::validation("component list is empty"));
        }
        for c in components {
            validate_component(c)?;
        }
        let composite = Self::new(components.iter().map(|c| c.kind).collect());
        let params = components.iter().flat_map(|c| c.coef.iter().copied()).collect();
        Ok((composite, params))
    }

    pub fn kinds(&self) -> &[ComponentKind] {
        &self.kinds
    }

    /// Coefficient slice of component `i` inside a flat parameter vector.
    pub fn coef<'a>(&self, i: usize, params: &'a [f64]) -> &'a [f64] {
        let start = self.offsets[i];
        &params[start..start + self.kinds[i].coef_len()]
    }

    /// Composite density at `f`.
    pub fn evaluate(&self, f: f64, params: &[f64]) -> f64 {
        (0..self.kinds.len())
            .map(|i| evaluate(self.kinds[i], f, self.coef(i, params)))
            .sum()
    }
}

impl LeastSquaresModel for Composite {
    fn n_params(&self) -> usize {
        self.n_params
    }

    fn value(&self, x: f64, p: &[f64]) -> f64 {
        self.evaluate(x, p)
    }

    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        for (i, &kind) in self.kinds.iter().enumerate() {
            let start = self.offsets[i];
            let end = start + kind.coef_len();
            fill_gradient(kind, x, &p[start..end], &mut out[start..end]);
        }
    }
}

/// Evaluate every component over a frequency grid, in input order.
///
/// Useful for plotting each component next to the total.
pub fn evaluate_components(components: &[VpsdComponent], frequency: &[f64]) -> Result<Vec<Vec<f64>>> {
    components
        .iter()
        .map(|c| {
            validate_component(c)?;
            Ok(frequency.iter().map(|&f| evaluate(c.kind, f, &c.coef)).collect())
        })
        .collect()
}

/// Evaluate the sum of all components over a frequency grid.
pub fn evaluate_total(components: &[VpsdComponent], frequency: &[f64]) -> Result<Vec<f64>> {
    let (composite, params) = Composite::from_components(components)?;
    Ok(frequency.iter().map(|&f| composite.evaluate(f, &params)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_plus_lorentz_at_zero() {
        let components = vec![
            VpsdComponent::new("white", ComponentKind::Constant, vec![2.0]),
            VpsdComponent::new("mode", ComponentKind::Lorentz, vec![1.0, 1.0, 0.0]),
        ];
        let total = evaluate_total(&components, &[0.0]).unwrap();
        assert!((total[0] - 3.0).abs() < 1e-15);
    }

    #[test]
    fn evaluation_is_order_independent() {
        let a = VpsdComponent::new("gran", ComponentKind::Harvey, vec![4.0, 10.0, 2.0]);
        let b = VpsdComponent::new("mode", ComponentKind::Lorentz, vec![0.5, 0.02, 0.3]);
        let c = VpsdComponent::new("white", ComponentKind::Constant, vec![0.1]);
        let f = [0.01, 0.1, 0.3, 1.0];
        let one = evaluate_total(&[a.clone(), b.clone(), c.clone()], &f).unwrap();
        let two = evaluate_total(&[c, a, b], &f).unwrap();
        for (x, y) in one.iter().zip(&two) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn harvey_is_half_power_at_knee() {
        let v = evaluate(ComponentKind::Harvey, 0.1, &[3.0, 10.0, 4.0]);
        assert!((v - 1.5).abs() < 1e-12);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let cases = [
            (ComponentKind::Constant, vec![0.7]),
            (ComponentKind::Lorentz, vec![1.3, 0.05, 0.2]),
            (ComponentKind::Harvey, vec![2.0, 5.0, 2.5]),
        ];
        for (kind, coef) in cases {
            let mut g = vec![0.0; coef.len()];
            for &f in &[0.05, 0.15, 0.4] {
                fill_gradient(kind, f, &coef, &mut g);
                for j in 0..coef.len() {
                    let h = 1e-6 * coef[j].abs().max(1e-3);
                    let mut hi = coef.clone();
                    let mut lo = coef.clone();
                    hi[j] += h;
                    lo[j] -= h;
                    let fd = (evaluate(kind, f, &hi) - evaluate(kind, f, &lo)) / (2.0 * h);
                    assert!(
                        (fd - g[j]).abs() < 1e-5 * (1.0 + fd.abs()),
                        "{kind:?} f={f} j={j}: fd={fd} analytic={}",
                        g[j]
                    );
                }
            }
        }
    }

    #[test]
    fn wrong_coefficient_count_names_component() {
        let bad = VpsdComponent::new("granulation", ComponentKind::Harvey, vec![1.0, 2.0]);
        let err = Composite::from_components(&[bad]).unwrap_err();
        assert!(matches!(err, RvError::Validation(_)));
        assert!(err.to_string().contains("granulation"));
    }
}
