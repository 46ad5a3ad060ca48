use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::{CoreError, SearchError};
use crate::interval::TimeInterval;
use crate::timestamp::{format_timestamp, parse_timestamp};

/// One acquisition returned by the product search.
///
/// Only the path number and acquisition window drive pairing; the remaining
/// properties are carried along untouched so they end up in the sample's
/// metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProductRecord", into = "ProductRecord")]
pub struct Product {
    path_number: i64,
    acquisition: TimeInterval,
    scene_name: Option<String>,
    extra: Map<String, Value>,
}

/// Wire shape of a product, as the search service names its fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRecord {
    path_number: i64,
    #[serde(with = "time::serde::rfc3339")]
    start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    stop_time: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scene_name: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<ProductRecord> for Product {
    type Error = CoreError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        let mut product = Product::new(record.path_number, record.start_time, record.stop_time)?;
        product.scene_name = record.scene_name;
        product.extra = record.extra;
        Ok(product)
    }
}

impl From<Product> for ProductRecord {
    fn from(product: Product) -> Self {
        ProductRecord {
            path_number: product.path_number,
            start_time: product.acquisition.start(),
            stop_time: product.acquisition.end(),
            scene_name: product.scene_name,
            extra: product.extra,
        }
    }
}

impl Product {
    pub fn new(
        path_number: i64,
        start_time: OffsetDateTime,
        stop_time: OffsetDateTime,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            path_number,
            acquisition: TimeInterval::new(start_time, stop_time)?,
            scene_name: None,
            extra: Map::new(),
        })
    }

    pub fn with_scene_name(mut self, name: impl Into<String>) -> Self {
        self.scene_name = Some(name.into());
        self
    }

    /// Build a product from a search record's property map.
    ///
    /// `pathNumber` may arrive as a number or a numeric string. The scene
    /// name is taken from `sceneName`, falling back to `fileID`.
    pub fn from_properties(mut properties: Map<String, Value>) -> Result<Self, SearchError> {
        let path_number = match properties.remove("pathNumber") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| SearchError::MalformedRecord("missing or non-integer pathNumber".into()))?;

        let start = take_timestamp(&mut properties, "startTime")?;
        let stop = take_timestamp(&mut properties, "stopTime")?;

        let scene_name = properties
            .get("sceneName")
            .or_else(|| properties.get("fileID"))
            .and_then(Value::as_str)
            .map(str::to_string);
        properties.remove("sceneName");

        let mut product = Product::new(path_number, start, stop)
            .map_err(|e| SearchError::MalformedRecord(e.to_string()))?;
        product.scene_name = scene_name;
        product.extra = properties;
        Ok(product)
    }

    pub fn path_number(&self) -> i64 {
        self.path_number
    }

    pub fn start_time(&self) -> OffsetDateTime {
        self.acquisition.start()
    }

    pub fn stop_time(&self) -> OffsetDateTime {
        self.acquisition.end()
    }

    pub fn acquisition(&self) -> TimeInterval {
        self.acquisition
    }

    pub fn scene_name(&self) -> Option<&str> {
        self.scene_name.as_deref()
    }

    /// Extra properties reported by the search service.
    pub fn properties(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Stable key identifying the scene, used to share fetch work between
    /// pairs that reference the same product.
    pub fn scene_key(&self) -> String {
        match &self.scene_name {
            Some(name) => name.clone(),
            None => format!(
                "path{}-{}",
                self.path_number,
                format_timestamp(self.acquisition.start())
            ),
        }
    }
}

fn take_timestamp(
    properties: &mut Map<String, Value>,
    key: &str,
) -> Result<OffsetDateTime, SearchError> {
    match properties.remove(key) {
        Some(Value::String(s)) => {
            parse_timestamp(&s).map_err(|e| SearchError::MalformedRecord(format!("{key}: {e}")))
        }
        _ => Err(SearchError::MalformedRecord(format!("missing {key}"))),
    }
}

/// A maximal run of temporally adjacent products on one acquisition path:
/// one pass over the area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductGroup {
    products: Vec<Product>,
    #[serde(skip)]
    span: TimeInterval,
}

impl ProductGroup {
    /// Build a group. The products must be non-empty.
    pub fn new(products: Vec<Product>) -> Result<Self, CoreError> {
        let first = products
            .first()
            .ok_or_else(|| CoreError::invalid("a product group cannot be empty"))?;
        let mut start = first.start_time();
        let mut end = first.stop_time();
        for p in &products[1..] {
            start = start.min(p.start_time());
            end = end.max(p.stop_time());
        }
        Ok(Self {
            span: TimeInterval::new(start, end)?,
            products,
        })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Earliest start time among the members.
    pub fn start(&self) -> OffsetDateTime {
        self.span.start()
    }

    /// Latest stop time among the members.
    pub fn end(&self) -> OffsetDateTime {
        self.span.end()
    }

    pub fn span(&self) -> TimeInterval {
        self.span
    }

    pub fn path_number(&self) -> i64 {
        self.products[0].path_number()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
