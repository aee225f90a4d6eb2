//! Trend arithmetic over yearly series: growth, smoothing, regression, forecast

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub year: i32,
    pub value: f64,
}

impl TrendPoint {
    pub fn new(year: i32, value: f64) -> Self {
        Self { year, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub year: i32,
    pub value: f64,
    /// None for the first year and when the previous value is zero
    pub growth_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl Regression {
    pub fn predict(&self, year: i32) -> f64 {
        self.intercept + self.slope * year as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Swing {
    pub year: i32,
    pub previous: f64,
    pub current: f64,
    pub change_pct: f64,
}

fn pct_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    Some((current - previous) / previous.abs() * 100.0)
}

/// Consecutive points one year apart; a gap in the series breaks the pair
fn adjacent_pairs(points: &[TrendPoint]) -> impl Iterator<Item = (&TrendPoint, &TrendPoint)> {
    points
        .windows(2)
        .map(|pair| (&pair[0], &pair[1]))
        .filter(|(prev, cur)| cur.year - prev.year == 1)
}

/// Year-over-year growth for each point of a series sorted by year. A point
/// whose previous year is absent has no growth.
pub fn yoy_growth(points: &[TrendPoint]) -> Vec<GrowthPoint> {
    points
        .iter()
        .enumerate()
        .map(|(idx, p)| GrowthPoint {
            year: p.year,
            value: p.value,
            growth_pct: idx
                .checked_sub(1)
                .map(|prev| points[prev])
                .filter(|prev| p.year - prev.year == 1)
                .and_then(|prev| pct_change(p.value, prev.value)),
        })
        .collect()
}

/// Arithmetic mean of the computable year-over-year growth rates
pub fn average_growth(points: &[TrendPoint]) -> Option<f64> {
    let rates: Vec<f64> = yoy_growth(points)
        .into_iter()
        .filter_map(|g| g.growth_pct)
        .collect();
    if rates.is_empty() {
        return None;
    }
    Some(rates.iter().sum::<f64>() / rates.len() as f64)
}

/// Compound annual growth rate in percent between the first and last point.
/// Undefined unless both ends are positive and at least one year apart.
pub fn cagr(points: &[TrendPoint]) -> Option<f64> {
    let first = points.first()?;
    let last = points.last()?;
    let years = last.year - first.year;
    if years <= 0 || first.value <= 0.0 || last.value <= 0.0 {
        return None;
    }
    Some(((last.value / first.value).powf(1.0 / years as f64) - 1.0) * 100.0)
}

/// Trailing moving average over `window` consecutive years; None until that
/// many contiguous years are available
pub fn moving_average(points: &[TrendPoint], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; points.len()];
    }
    (0..points.len())
        .map(|idx| {
            if idx + 1 < window {
                None
            } else {
                let slice = &points[idx + 1 - window..=idx];
                let contiguous = slice[window - 1].year - slice[0].year == window as i32 - 1;
                contiguous.then(|| slice.iter().map(|p| p.value).sum::<f64>() / window as f64)
            }
        })
        .collect()
}

/// Least-squares fit of value against year. Needs two distinct years.
pub fn linear_regression(points: &[TrendPoint]) -> Option<Regression> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.year as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.value).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for p in points {
        let dx = p.year as f64 - mean_x;
        let dy = p.value - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    // A flat series is fitted exactly
    let r_squared = if syy == 0.0 { 1.0 } else { (sxy * sxy) / (sxx * syy) };

    Some(Regression {
        slope,
        intercept,
        r_squared,
    })
}

/// Project the regression line `periods` years past the last point
pub fn forecast(points: &[TrendPoint], periods: u32) -> Vec<TrendPoint> {
    let (Some(regression), Some(last)) = (linear_regression(points), points.last()) else {
        return Vec::new();
    };
    (1..=periods as i32)
        .map(|step| {
            let year = last.year + step;
            TrendPoint::new(year, regression.predict(year))
        })
        .collect()
}

/// Year-over-year changes whose magnitude exceeds `threshold_pct`
pub fn detect_swings(points: &[TrendPoint], threshold_pct: f64) -> Vec<Swing> {
    adjacent_pairs(points)
        .filter_map(|(prev, cur)| {
            let change = pct_change(cur.value, prev.value)?;
            (change.abs() > threshold_pct).then_some(Swing {
                year: cur.year,
                previous: prev.value,
                current: cur.value,
                change_pct: change,
            })
        })
        .collect()
}
