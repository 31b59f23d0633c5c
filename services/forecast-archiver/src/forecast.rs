//! Forecast-cycle time arithmetic and URL layout.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

/// The most recent forecast cycle (00Z or 12Z) at or before `now`.
pub fn latest_forecast_time(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), now.hour() / 12 * 12, 0, 0)
        .single()
        .context("could not derive cycle time")
}

/// Human- and path-friendly cycle label, e.g. `2026-08-07T12Z`.
pub fn cycle_label(fctime: DateTime<Utc>) -> String {
    fctime.format("%Y-%m-%dT%HZ").to_string()
}

/// Listing URL of a cycle's per-variable GRIB2 files.
pub fn cycle_listing_url(base_url: &str, fctime: DateTime<Utc>) -> String {
    format!(
        "{}/forecasts/{}/{}z/0p25/oper/",
        base_url.trim_end_matches('/'),
        fctime.format("%Y%m%d"),
        fctime.format("%H")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_to_twelve_hour_cycles() {
        let cases = [
            ("2026-08-07T00:00:00Z", 0),
            ("2026-08-07T11:59:00Z", 0),
            ("2026-08-07T12:00:00Z", 12),
            ("2026-08-07T23:30:00Z", 12),
        ];
        for (now, hour) in cases {
            let now: DateTime<Utc> = now.parse().unwrap();
            let cycle = latest_forecast_time(now).unwrap();
            assert_eq!(cycle.hour(), hour);
            assert_eq!(cycle.minute(), 0);
            assert_eq!(cycle.date_naive(), now.date_naive());
        }
    }

    #[test]
    fn listing_url_layout() {
        let fctime: DateTime<Utc> = "2026-08-07T12:00:00Z".parse().unwrap();
        assert_eq!(
            cycle_listing_url("https://data.example.int/", fctime),
            "https://data.example.int/forecasts/20260807/12z/0p25/oper/"
        );
        assert_eq!(cycle_label(fctime), "2026-08-07T12Z");
    }
}
