//! Notification text.

use crate::tracker::cycle::FilteredStock;
use crate::tracker::schedule::restock_in;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use gagstock_feed::Weather;
use std::fmt::Write as _;
use std::time::Duration;

/// Render a quantity as `xN`, `xN.NK` or `xN.NM`.
pub fn format_quantity(quantity: u64) -> String {
    if quantity >= 1_000_000 {
        format!("x{:.1}M", quantity as f64 / 1_000_000.0)
    } else if quantity >= 1_000 {
        format!("x{:.1}K", quantity as f64 / 1_000.0)
    } else {
        format!("x{quantity}")
    }
}

/// `1h 02m 03s`, or `02m 03s` under an hour.
pub fn format_countdown(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else {
        format!("{m:02}m {s:02}s")
    }
}

/// Inputs that shape the message beyond the stock itself.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub filters: &'a [String],
    pub now: DateTime<Utc>,
    pub utc_offset_hours: i32,
}

/// Full notification for one cycle.
pub fn render_message(stock: &FilteredStock, weather: &Weather, ctx: &RenderContext<'_>) -> String {
    let mut out = String::from("🌾 Grow A Garden Stock Tracker\n");
    if !ctx.filters.is_empty() {
        let _ = writeln!(out, "🔍 Tracking: {}", ctx.filters.join(", "));
    }

    for (category, items) in &stock.sections {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{} {}:", category.emoji(), category.label());
        for item in items {
            let _ = writeln!(out, "- {}: {}", item.name, format_quantity(item.quantity));
        }
        let _ = writeln!(
            out,
            "⏳ Restock in: {}",
            format_countdown(restock_in(*category, ctx.now, ctx.utc_offset_hours))
        );
    }

    let _ = writeln!(out, "\n🌤️ Weather: {} {}", weather.icon, weather.current);
    let _ = writeln!(out, "🪴 Bonus: {}", weather.crop_bonuses);
    let _ = write!(
        out,
        "🕒 Updated: {}",
        local_time(weather.updated_at, ctx.utc_offset_hours)
    );
    out
}

fn local_time(at: DateTime<Utc>, utc_offset_hours: i32) -> String {
    let offset = utc_offset_hours.clamp(-23, 23);
    let shifted = at + ChronoDuration::hours(i64::from(offset));
    let sign = if offset < 0 { '-' } else { '+' };
    format!(
        "{} (UTC{sign}{})",
        shifted.format("%Y-%m-%d %H:%M"),
        offset.unsigned_abs()
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use gagstock_feed::{StockCategory, StockItem};

    #[test]
    fn quantity_formatting_thresholds() {
        assert_eq!(format_quantity(500), "x500");
        assert_eq!(format_quantity(1500), "x1.5K");
        assert_eq!(format_quantity(2_300_000), "x2.3M");
        assert_eq!(format_quantity(999), "x999");
        assert_eq!(format_quantity(1000), "x1.0K");
    }

    #[test]
    fn countdown_formatting() {
        assert_eq!(format_countdown(Duration::from_secs(125)), "02m 05s");
        assert_eq!(format_countdown(Duration::from_secs(3723)), "1h 02m 03s");
    }

    #[test]
    fn message_lists_items_and_weather() {
        let stock = FilteredStock {
            sections: vec![
                (StockCategory::Gear, vec![StockItem::new("Trowel", 5)]),
                (StockCategory::Seed, vec![]),
            ],
            matched: true,
        };
        let weather = Weather {
            current: "Rain".into(),
            icon: "🌧️".into(),
            crop_bonuses: "Wet".into(),
            updated_at: DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let ctx = RenderContext {
            filters: &[],
            now: weather.updated_at,
            utc_offset_hours: 8,
        };

        let text = render_message(&stock, &weather, &ctx);
        assert!(text.contains("🛠️ Gear:"));
        assert!(text.contains("- Trowel: x5"));
        assert!(!text.contains("Seeds"));
        assert!(text.contains("🌧️ Rain"));
        assert!(text.contains("2025-06-01 18:00 (UTC+8)"));
        assert!(!text.contains("Tracking"));
    }

    #[test]
    fn message_shows_active_filters() {
        let stock = FilteredStock {
            sections: vec![(StockCategory::Seed, vec![StockItem::new("Carrot", 1)])],
            matched: true,
        };
        let filters = vec!["carrot".to_owned(), "trowel".to_owned()];
        let ctx = RenderContext {
            filters: &filters,
            now: Utc::now(),
            utc_offset_hours: 0,
        };
        let text = render_message(&stock, &Weather::default(), &ctx);
        assert!(text.contains("🔍 Tracking: carrot, trowel"));
    }

    #[test]
    fn out_of_range_offset_is_clamped_in_time_and_label() {
        let at = DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(local_time(at, 30), "2025-06-02 09:00 (UTC+23)");
        assert_eq!(local_time(at, -30), "2025-05-31 11:00 (UTC-23)");
        assert_eq!(local_time(at, -5), "2025-06-01 05:00 (UTC-5)");
    }
}
