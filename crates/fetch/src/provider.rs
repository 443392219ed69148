//! The provider trait all data-source clients implement.

use async_trait::async_trait;
use glci_primitives::Date;

use crate::FetchError;

/// One observation as returned by a provider.
pub type SeriesPoint = (Date, f64);

/// Context a provider may need beyond the raw source id.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchWindow {
    /// Inclusive start of the requested window.
    pub start: Option<Date>,
    /// Inclusive end of the requested window.
    pub end: Option<Date>,
}

/// A client for one upstream data source.
///
/// Providers return plain observation points; the orchestrator turns them
/// into the standardized table with provenance columns. Every request must
/// respect the per-request deadline configured on the underlying HTTP client.
#[async_trait]
pub trait SeriesProvider: Send + Sync + std::fmt::Debug {
    /// Short source name matching the configuration (`fred`, `worldbank`, ...).
    fn name(&self) -> &'static str;

    /// Fetch observations for a source-native series id.
    ///
    /// `country` is only meaningful for sources whose ids are not
    /// country-specific (the World Bank); other providers ignore it.
    async fn fetch(
        &self,
        source_id: &str,
        country: &str,
        window: FetchWindow,
    ) -> Result<Vec<SeriesPoint>, FetchError>;
}

/// Keep only points inside the window, sorted by date.
pub(crate) fn clip_window(mut points: Vec<SeriesPoint>, window: FetchWindow) -> Vec<SeriesPoint> {
    points.retain(|(d, _)| {
        window.start.is_none_or(|s| *d >= s) && window.end.is_none_or(|e| *d <= e)
    });
    points.sort_by_key(|(d, _)| *d);
    points
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn clip_window_filters_and_sorts() {
        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let points = vec![(day(5), 5.0), (day(1), 1.0), (day(9), 9.0)];

        let window = FetchWindow { start: Some(day(2)), end: Some(day(8)) };
        let clipped = clip_window(points, window);
        assert_eq!(clipped, vec![(day(5), 5.0)]);
    }
}
