//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Renders a 0-5 rating as five stars, rounded to the nearest whole star.
///
/// Anything that is not a number renders as five empty stars.
///
/// Usage in templates: `{{ product.rating.unwrap_or(0.0)|stars }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn stars(rating: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(star_string(&rating.to_string()))
}

fn star_string(raw: &str) -> String {
    let rating = raw.trim().parse::<f64>().unwrap_or(0.0).clamp(0.0, 5.0);
    // Clamped to 0..=5 above, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let full = rating.round() as usize;
    format!("{}{}", "★".repeat(full), "☆".repeat(5 - full))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stars_round_and_clamp() {
        assert_eq!(star_string("4.6"), "★★★★★");
        assert_eq!(star_string("3.2"), "★★★☆☆");
        assert_eq!(star_string("9"), "★★★★★");
        assert_eq!(star_string("-1"), "☆☆☆☆☆");
        assert_eq!(star_string("n/a"), "☆☆☆☆☆");
    }
}
