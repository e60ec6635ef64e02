use ndarray::Array1;
use ndarray_stats::QuantileExt;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Direction of the optimisation over the choices of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MinMax {
    Min,
    Max,
}

impl MinMax {
    pub fn is_min(self) -> bool {
        self == MinMax::Min
    }

    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            MinMax::Min => a.min(b),
            MinMax::Max => a.max(b),
        }
    }

    /// Optimal element of `values`, `None` for an empty iterator.
    pub fn select<I: IntoIterator<Item = f64>>(self, values: I) -> Option<f64> {
        let it = values.into_iter().map(OrderedFloat);
        let best = match self {
            MinMax::Min => it.min(),
            MinMax::Max => it.max(),
        };
        best.map(|x| x.into_inner())
    }
}

impl std::str::FromStr for MinMax {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "min" | "minimise" | "minimize" => Ok(MinMax::Min),
            "max" | "maximise" | "maximize" => Ok(MinMax::Max),
            _ => Err(format!("unknown direction '{}'", s)),
        }
    }
}

/// How two successive iterates are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Termination {
    Absolute,
    Relative,
}

/// Per-component closeness of two value vectors.
pub fn converged(old: &Array1<f64>, new: &Array1<f64>, eps: f64, termination: Termination) -> bool {
    old.iter().zip(new.iter()).all(|(x, y)| close(*x, *y, eps, termination))
}

pub fn close(x: f64, y: f64, eps: f64, termination: Termination) -> bool {
    let diff = (y - x).abs();
    match termination {
        Termination::Absolute => diff <= eps,
        // a zero entry falls back to the absolute test
        Termination::Relative => {
            if y == 0.0 {
                diff <= eps
            } else {
                diff / y.abs() <= eps
            }
        }
    }
}

/// Largest absolute difference between two iterates, used for reporting only.
pub fn max_difference(old: &Array1<f64>, new: &Array1<f64>) -> f64 {
    let diff: Array1<f64> = (new - old).mapv(f64::abs);
    match diff.max() {
        Ok(x) => *x,
        Err(_) => f64::NAN,
    }
}
