// ABOUTME: Numeric evaluation of limits, series, and integrals

use crate::config::{
    INTEGRATION_CLAMP, INTEGRATION_INTERVALS, LIMIT_EPSILON, LIMIT_INFINITY_SAMPLES, LIMIT_STEPS,
    MAX_ITERATIONS,
};
use crate::error::TexprError;

/// A sampler evaluates the body with the bound variable set to a point.
/// Failures at individual points are caught locally by the approximation
/// loops.
pub type Sampler<'a> = dyn FnMut(f64) -> Result<f64, TexprError> + 'a;

/// Two-sided numeric limit.
///
/// Finite targets are approached from both sides at shrinking steps; the
/// last successful value on each side wins, and sides agreeing within
/// `LIMIT_EPSILON` are averaged. Infinite targets sample at growing
/// magnitudes and return the last success.
pub fn limit(target: f64, sample: &mut Sampler) -> Result<f64, TexprError> {
    if target.is_infinite() {
        let sign = target.signum();
        let mut last = None;
        for magnitude in LIMIT_INFINITY_SAMPLES {
            if let Ok(value) = sample(sign * magnitude) {
                if value.is_finite() {
                    last = Some(value);
                }
            }
        }
        return last.ok_or_else(|| {
            TexprError::evaluator("limit does not converge at infinity")
        });
    }

    fn approach(sample: &mut Sampler, target: f64, sign: f64) -> Option<f64> {
        let mut last = None;
        for step in LIMIT_STEPS {
            if let Ok(value) = sample(target + sign * step) {
                if value.is_finite() {
                    last = Some(value);
                }
            }
        }
        last
    }

    let right = approach(&mut *sample, target, 1.0);
    let left = approach(&mut *sample, target, -1.0);
    match (left, right) {
        (Some(l), Some(r)) => {
            if (l - r).abs() <= LIMIT_EPSILON.max(l.abs().max(r.abs()) * LIMIT_EPSILON) {
                Ok((l + r) / 2.0)
            } else {
                Err(TexprError::evaluator(format!(
                    "limit does not converge: left side {l}, right side {r}"
                )))
            }
        }
        (Some(l), None) => Ok(l),
        (None, Some(r)) => Ok(r),
        (None, None) => Err(TexprError::evaluator("limit does not converge")),
    }
}

/// Validate series bounds: integers, ascending, within the iteration cap.
fn series_bounds(start: f64, end: f64) -> Result<(i64, i64), TexprError> {
    if start.fract() != 0.0 || end.fract() != 0.0 || !start.is_finite() || !end.is_finite() {
        return Err(TexprError::evaluator(format!(
            "series bounds must be integers, got {start} and {end}"
        )));
    }
    let (start, end) = (start as i64, end as i64);
    if start > end {
        return Err(TexprError::evaluator(format!(
            "series start {start} exceeds end {end}"
        )));
    }
    let count = (end - start + 1) as usize;
    if count > MAX_ITERATIONS {
        return Err(TexprError::evaluator(format!(
            "series spans {count} terms, exceeding the {MAX_ITERATIONS} iteration cap"
        )));
    }
    Ok((start, end))
}

pub fn series_sum(start: f64, end: f64, sample: &mut Sampler) -> Result<f64, TexprError> {
    let (start, end) = series_bounds(start, end)?;
    let mut total = 0.0;
    for index in start..=end {
        total += sample(index as f64)?;
    }
    Ok(total)
}

pub fn series_product(start: f64, end: f64, sample: &mut Sampler) -> Result<f64, TexprError> {
    let (start, end) = series_bounds(start, end)?;
    let mut total = 1.0;
    for index in start..=end {
        total *= sample(index as f64)?;
    }
    Ok(total)
}

/// Composite Simpson's rule with `INTEGRATION_INTERVALS` sub-intervals.
/// Infinite bounds clamp to the integration window; failing endpoints
/// (improper integrals) are nudged inward.
pub fn integrate(lower: f64, upper: f64, sample: &mut Sampler) -> Result<f64, TexprError> {
    integrate_with_intervals(lower, upper, INTEGRATION_INTERVALS, sample)
}

pub fn integrate_with_intervals(
    lower: f64,
    upper: f64,
    intervals: usize,
    sample: &mut Sampler,
) -> Result<f64, TexprError> {
    let a = if lower.is_infinite() {
        INTEGRATION_CLAMP * lower.signum()
    } else {
        lower
    };
    let b = if upper.is_infinite() {
        INTEGRATION_CLAMP * upper.signum()
    } else {
        upper
    };

    if a == b {
        return Ok(0.0);
    }
    let n = if intervals % 2 == 0 { intervals } else { intervals + 1 };
    let h = (b - a) / n as f64;

    let mut endpoint = |x: f64, inward: f64| -> Result<f64, TexprError> {
        match sample(x) {
            Ok(v) if v.is_finite() => Ok(v),
            // Improper at the boundary: step slightly inside
            _ => sample(x + inward * (b - a) * 1e-9),
        }
    };

    let mut total = endpoint(a, 1.0)? + endpoint(b, -1.0)?;
    for index in 1..n {
        let x = a + h * index as f64;
        let weight = if index % 2 == 1 { 4.0 } else { 2.0 };
        let value = sample(x)?;
        if !value.is_finite() {
            return Err(TexprError::evaluator(format!(
                "integrand is not finite at {x}"
            )));
        }
        total += weight * value;
    }
    Ok(total * h / 3.0)
}

/// Nested Simpson over `order` dimensions sharing one bounds pair.
/// Interval counts shrink with the dimension to bound total cost.
pub fn integrate_multi(
    order: usize,
    lower: f64,
    upper: f64,
    sample: &mut dyn FnMut(&[f64]) -> Result<f64, TexprError>,
) -> Result<f64, TexprError> {
    let intervals = match order {
        0 | 1 => INTEGRATION_INTERVALS,
        2 => 100,
        _ => 40,
    };
    let mut point = vec![0.0; order];
    nested_simpson(order, 0, lower, upper, intervals, &mut point, sample)
}

fn nested_simpson(
    order: usize,
    dimension: usize,
    lower: f64,
    upper: f64,
    intervals: usize,
    point: &mut Vec<f64>,
    sample: &mut dyn FnMut(&[f64]) -> Result<f64, TexprError>,
) -> Result<f64, TexprError> {
    let a = if lower.is_infinite() {
        INTEGRATION_CLAMP * lower.signum()
    } else {
        lower
    };
    let b = if upper.is_infinite() {
        INTEGRATION_CLAMP * upper.signum()
    } else {
        upper
    };
    let h = (b - a) / intervals as f64;

    let mut total = 0.0;
    for index in 0..=intervals {
        let weight = if index == 0 || index == intervals {
            1.0
        } else if index % 2 == 1 {
            4.0
        } else {
            2.0
        };
        point[dimension] = a + h * index as f64;
        let value = if dimension + 1 == order {
            sample(point)?
        } else {
            nested_simpson(order, dimension + 1, lower, upper, intervals, point, sample)?
        };
        total += weight * value;
    }
    Ok(total * h / 3.0)
}
