//! Stock and weather types plus their JSON decoding.

use crate::error::FeedError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single shop item with its current quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockItem {
    /// Display name as reported by the feed.
    pub name: String,
    /// Units currently in stock.
    pub quantity: u64,
}

impl StockItem {
    pub fn new(name: impl Into<String>, quantity: u64) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// The five shop categories reported by the stock endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockCategory {
    Gear,
    Seed,
    Egg,
    Cosmetics,
    Honey,
}

impl StockCategory {
    /// All categories in display order.
    pub const ALL: [StockCategory; 5] = [
        StockCategory::Gear,
        StockCategory::Seed,
        StockCategory::Egg,
        StockCategory::Cosmetics,
        StockCategory::Honey,
    ];

    /// Categories that user filters apply to.
    pub const PRIMARY: [StockCategory; 2] = [StockCategory::Gear, StockCategory::Seed];

    /// Returns the stable lowercase identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Gear => "gear",
            Self::Seed => "seed",
            Self::Egg => "egg",
            Self::Cosmetics => "cosmetics",
            Self::Honey => "honey",
        }
    }

    /// Human-readable section label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gear => "Gear",
            Self::Seed => "Seeds",
            Self::Egg => "Eggs",
            Self::Cosmetics => "Cosmetics",
            Self::Honey => "Honey",
        }
    }

    /// Section emoji.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Gear => "🛠️",
            Self::Seed => "🌱",
            Self::Egg => "🥚",
            Self::Cosmetics => "🎨",
            Self::Honey => "🍯",
        }
    }

    /// Whether filters apply to this category.
    pub fn is_primary(&self) -> bool {
        Self::PRIMARY.contains(self)
    }

    /// JSON keys accepted for this category, most specific first.
    fn payload_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Gear => &["gearStock", "gear"],
            Self::Seed => &["seedsStock", "seedStock", "seeds", "seed"],
            Self::Egg => &["eggStock", "eggsStock", "eggs", "egg"],
            Self::Cosmetics => &["cosmeticsStock", "cosmetics"],
            Self::Honey => &["honeyStock", "honey"],
        }
    }
}

/// Snapshot of every shop category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub gear: Vec<StockItem>,
    pub seed: Vec<StockItem>,
    pub egg: Vec<StockItem>,
    pub cosmetics: Vec<StockItem>,
    pub honey: Vec<StockItem>,
}

impl StockSnapshot {
    /// Items for one category.
    pub fn items(&self, category: StockCategory) -> &[StockItem] {
        match category {
            StockCategory::Gear => &self.gear,
            StockCategory::Seed => &self.seed,
            StockCategory::Egg => &self.egg,
            StockCategory::Cosmetics => &self.cosmetics,
            StockCategory::Honey => &self.honey,
        }
    }

    fn items_mut(&mut self, category: StockCategory) -> &mut Vec<StockItem> {
        match category {
            StockCategory::Gear => &mut self.gear,
            StockCategory::Seed => &mut self.seed,
            StockCategory::Egg => &mut self.egg,
            StockCategory::Cosmetics => &mut self.cosmetics,
            StockCategory::Honey => &mut self.honey,
        }
    }

    /// Decode a stock payload.
    ///
    /// The payload may be wrapped in a top-level `data` object. Each category
    /// may be an array of items or an object with an `items` array. Items
    /// carry a `name` and a numeric `quantity` (or `value`/`count`).
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::MissingCategory`] when a category is absent and
    /// [`FeedError::Parse`] when a category or item has the wrong shape.
    /// No defaults are substituted for stock data.
    pub fn from_value(payload: &Value) -> Result<Self, FeedError> {
        let root = match payload.get("data") {
            Some(data) if data.is_object() => data,
            _ => payload,
        };
        if !root.is_object() {
            return Err(FeedError::Parse("stock payload is not a JSON object".into()));
        }

        let mut snapshot = Self::default();
        for category in StockCategory::ALL {
            let raw = category
                .payload_keys()
                .iter()
                .find_map(|key| root.get(*key))
                .ok_or(FeedError::MissingCategory(category.id()))?;

            let list = match raw {
                Value::Array(list) => list,
                Value::Object(obj) => obj
                    .get("items")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        FeedError::Parse(format!("`{}` has no items array", category.id()))
                    })?,
                _ => {
                    return Err(FeedError::Parse(format!(
                        "`{}` must be an array",
                        category.id()
                    )));
                }
            };

            let items = snapshot.items_mut(category);
            for entry in list {
                items.push(parse_item(category, entry)?);
            }
        }
        Ok(snapshot)
    }
}

fn parse_item(category: StockCategory, entry: &Value) -> Result<StockItem, FeedError> {
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| FeedError::Parse(format!("`{}` item without a name", category.id())))?;

    let raw_quantity = ["quantity", "value", "count"]
        .iter()
        .find_map(|key| entry.get(*key))
        .ok_or_else(|| FeedError::Parse(format!("`{name}` has no quantity")))?;

    let quantity = match raw_quantity {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| FeedError::Parse(format!("`{name}` has a non-numeric quantity")))?;

    Ok(StockItem::new(name, quantity))
}

/// Current in-game weather. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weather {
    pub current: String,
    pub icon: String,
    pub crop_bonuses: String,
    pub updated_at: DateTime<Utc>,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            current: "Unknown".to_owned(),
            icon: "🌦️".to_owned(),
            crop_bonuses: "None".to_owned(),
            updated_at: Utc::now(),
        }
    }
}

impl Weather {
    /// Decode a weather payload, tolerating missing or odd fields.
    ///
    /// `cropBonuses` may be a string or an array of strings. `updatedAt` may
    /// be an RFC 3339 string or epoch milliseconds.
    pub fn from_value(payload: &Value) -> Self {
        let mut weather = Self::default();

        if let Some(current) = payload
            .get("currentWeather")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            weather.current = current.to_owned();
        }
        if let Some(icon) = payload
            .get("icon")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            weather.icon = icon.to_owned();
        }

        match payload.get("cropBonuses") {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                weather.crop_bonuses = s.trim().to_owned();
            }
            Some(Value::Array(list)) => {
                let joined = list
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if !joined.is_empty() {
                    weather.crop_bonuses = joined;
                }
            }
            _ => {}
        }

        let updated = match payload.get("updatedAt") {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        };
        if let Some(updated) = updated {
            weather.updated_at = updated;
        }

        weather
    }
}

/// Combined result of one fetch of both endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub stock: StockSnapshot,
    pub weather: Weather,
}
