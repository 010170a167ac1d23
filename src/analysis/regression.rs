// src/analysis/regression.rs
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

use crate::analysis::assemble::RegressionInputRow;
use crate::storage::Tabular;
use crate::utils::error::AnalysisError;

const MIN_OBSERVATIONS: usize = 3;
const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Simple OLS fit of `y = intercept + slope * x`.
#[derive(Debug, Clone, Serialize)]
pub struct OlsFit {
    pub n: usize,
    pub intercept: f64,
    pub slope: f64,
    pub se_intercept: f64,
    pub se_slope: f64,
    /// `None` when the standard error is zero (perfect fit).
    pub t_intercept: Option<f64>,
    pub t_slope: Option<f64>,
    /// Two-sided, Student's t with n - 2 degrees of freedom.
    pub p_intercept: Option<f64>,
    pub p_slope: Option<f64>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: Option<f64>,
    pub f_pvalue: Option<f64>,
    #[serde(skip)]
    pub fitted: Vec<f64>,
    #[serde(skip)]
    pub residuals: Vec<f64>,
    /// Sample standard deviation of the residuals (ddof = 1).
    pub residual_std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualDiagnostics {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub beyond_two_std: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionResultRow {
    pub ticker: String,
    pub year: i32,
    pub num_mention: u64,
    pub res_return: f64,
    pub predicted_return: f64,
    pub residuals: f64,
    pub std_residuals: f64,
}

impl Tabular for RegressionResultRow {
    const COLUMNS: &'static [&'static str] = &[
        "ticker",
        "year",
        "num_mention",
        "res_return",
        "predicted_return",
        "residuals",
        "std_residuals",
    ];
}

#[derive(Debug, Clone)]
pub struct RegressionOutput {
    pub fit: OlsFit,
    pub rows: Vec<RegressionResultRow>,
    pub diagnostics: ResidualDiagnostics,
}

impl RegressionOutput {
    pub fn summary(&self) -> Value {
        json!({
            "model": "res_return ~ 1 + num_mention",
            "method": "OLS",
            "observations": self.fit.n,
            "coefficients": {
                "intercept": {
                    "estimate": self.fit.intercept,
                    "std_error": self.fit.se_intercept,
                    "t_statistic": self.fit.t_intercept,
                    "p_value": self.fit.p_intercept,
                },
                "num_mention": {
                    "estimate": self.fit.slope,
                    "std_error": self.fit.se_slope,
                    "t_statistic": self.fit.t_slope,
                    "p_value": self.fit.p_slope,
                    "significance": significance_marker(self.fit.p_slope),
                },
            },
            "r_squared": self.fit.r_squared,
            "adj_r_squared": self.fit.adj_r_squared,
            "f_statistic": self.fit.f_statistic,
            "f_pvalue": self.fit.f_pvalue,
            "interpretation": self.interpretation(),
            "residuals": self.diagnostics,
        })
    }

    pub fn interpretation(&self) -> String {
        let explained = format!(
            "model explains {:.2}% of the variation in residual returns",
            self.fit.r_squared * 100.0
        );
        match self.fit.p_slope {
            Some(p) if p < SIGNIFICANCE_LEVEL => {
                let direction = if self.fit.slope > 0.0 { "positive" } else { "negative" };
                format!(
                    "statistically significant {} relationship: one additional mention is associated with a {:.4} \
                     percentage point change in residual return; {}",
                    direction, self.fit.slope, explained
                )
            }
            _ => format!("no statistically significant relationship found; {}", explained),
        }
    }
}

/// `***` below 1%, `**` below 5%, `*` below 10%.
pub fn significance_marker(p_value: Option<f64>) -> &'static str {
    match p_value {
        Some(p) if p < 0.01 => "***",
        Some(p) if p < 0.05 => "**",
        Some(p) if p < 0.1 => "*",
        _ => "not significant",
    }
}

fn t_pvalue(t: Option<f64>, df: f64) -> Option<f64> {
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(2.0 * dist.sf(t?.abs()))
}

fn f_pvalue(f: Option<f64>, df: f64) -> Option<f64> {
    let dist = FisherSnedecor::new(1.0, df).ok()?;
    Some(dist.sf(f?.max(0.0)))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    (den != 0.0).then(|| num / den)
}

pub fn fit_ols(x: &[f64], y: &[f64]) -> Result<OlsFit, AnalysisError> {
    let n = x.len().min(y.len());
    if n < MIN_OBSERVATIONS {
        return Err(AnalysisError::TooFewObservations {
            needed: MIN_OBSERVATIONS,
            got: n,
        });
    }
    let (x, y) = (&x[..n], &y[..n]);

    let (mx, my) = (mean(x), mean(y));
    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    if sxx == 0.0 {
        return Err(AnalysisError::ConstantRegressor(n));
    }
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let fitted: Vec<f64> = x.iter().map(|v| intercept + slope * v).collect();
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(obs, fit)| obs - fit).collect();

    let sse: f64 = residuals.iter().map(|r| r * r).sum();
    let sst: f64 = y.iter().map(|v| (v - my).powi(2)).sum();
    let df_resid = (n - 2) as f64;
    let sigma2 = sse / df_resid;

    let se_slope = (sigma2 / sxx).sqrt();
    let se_intercept = (sigma2 * (1.0 / n as f64 + mx * mx / sxx)).sqrt();
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 0.0 };
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / df_resid;
    let t_intercept = ratio(intercept, se_intercept);
    let t_slope = ratio(slope, se_slope);
    let f_statistic = ratio(sst - sse, sigma2);

    Ok(OlsFit {
        n,
        intercept,
        slope,
        se_intercept,
        se_slope,
        t_intercept,
        t_slope,
        p_intercept: t_pvalue(t_intercept, df_resid),
        p_slope: t_pvalue(t_slope, df_resid),
        r_squared,
        adj_r_squared,
        f_statistic,
        f_pvalue: f_pvalue(f_statistic, df_resid),
        residual_std: sample_std(&residuals),
        fitted,
        residuals,
    })
}

pub fn residual_diagnostics(residuals: &[f64]) -> ResidualDiagnostics {
    let std = sample_std(residuals);
    ResidualDiagnostics {
        mean: if residuals.is_empty() { 0.0 } else { mean(residuals) },
        std,
        min: residuals.iter().copied().fold(f64::INFINITY, f64::min),
        max: residuals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        beyond_two_std: residuals.iter().filter(|r| r.abs() > 2.0 * std).count(),
    }
}

/// Regresses `res_return` on `num_mention` and attaches per-row predictions
/// and residuals.
pub fn regression_results(inputs: &[RegressionInputRow]) -> Result<RegressionOutput, AnalysisError> {
    let x: Vec<f64> = inputs.iter().map(|r| r.num_mention as f64).collect();
    let y: Vec<f64> = inputs.iter().map(|r| r.res_return).collect();
    let fit = fit_ols(&x, &y)?;

    let rows = inputs
        .iter()
        .zip(fit.fitted.iter().zip(&fit.residuals))
        .map(|(input, (&predicted, &resid))| RegressionResultRow {
            ticker: input.ticker.clone(),
            year: input.year,
            num_mention: input.num_mention,
            res_return: input.res_return,
            predicted_return: predicted,
            residuals: resid,
            std_residuals: if fit.residual_std > 0.0 { resid / fit.residual_std } else { 0.0 },
        })
        .collect();
    let diagnostics = residual_diagnostics(&fit.residuals);

    tracing::info!("OLS res_return ~ 1 + num_mention, n = {}", fit.n);
    tracing::info!("  intercept   {:>10.4} (se {:.4})", fit.intercept, fit.se_intercept);
    tracing::info!("  intercept   p-value {:?}", fit.p_intercept);
    tracing::info!(
        "  num_mention {:>10.4} (se {:.4}, p-value {:?}) {}",
        fit.slope,
        fit.se_slope,
        fit.p_slope,
        significance_marker(fit.p_slope)
    );
    tracing::info!("  R^2 {:.4}, adj. R^2 {:.4}", fit.r_squared, fit.adj_r_squared);
    tracing::info!("  F {:?} (p-value {:?})", fit.f_statistic, fit.f_pvalue);
    tracing::info!(
        "  residuals: mean {:.4}, std {:.4}, {} beyond 2 std",
        diagnostics.mean,
        diagnostics.std,
        diagnostics.beyond_two_std
    );

    Ok(RegressionOutput { fit, rows, diagnostics })
}
