//! Standard normal distribution helpers.

/// Standard normal CDF, Abramowitz & Stegun 26.2.17 (|error| < 7.5e-8).
#[must_use]
pub fn standard_normal_cdf(x: f64) -> f64 {
    const P: f64 = 0.231_641_9;
    const B: [f64; 5] = [
        0.319_381_530,
        -0.356_563_782,
        1.781_477_937,
        -1.821_255_978,
        1.330_274_429,
    ];

    if x.is_nan() {
        return f64::NAN;
    }
    let ax = x.abs();
    let t = 1.0 / P.mul_add(ax, 1.0);
    let poly = t * B[4]
        .mul_add(t, B[3])
        .mul_add(t, B[2])
        .mul_add(t, B[1])
        .mul_add(t, B[0]);
    let density = (-0.5 * ax * ax).exp() / (2.0 * std::f64::consts::PI).sqrt();
    let upper_tail = density * poly;
    if x >= 0.0 { 1.0 - upper_tail } else { upper_tail }
}

/// Two-sided p-value for a z statistic.
#[must_use]
pub fn two_sided_p_value(z: f64) -> f64 {
    (2.0 * (1.0 - standard_normal_cdf(z.abs()))).clamp(0.0, 1.0)
}
