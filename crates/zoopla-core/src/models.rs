use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// The kind of page being scraped, which selects the parsing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Property,
    Agent,
    HousePrice,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Property, RecordKind::Agent, RecordKind::HousePrice];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Property => "property",
            RecordKind::Agent => "agent",
            RecordKind::HousePrice => "house_price",
        }
    }

    /// File stem used when writing this kind's records to disk.
    ///
    /// JSON and CSV use different stems for properties.
    pub fn output_stem(&self, json: bool) -> &'static str {
        match (self, json) {
            (RecordKind::Property, true) => "sample_property",
            (RecordKind::Property, false) => "properties",
            (RecordKind::Agent, _) => "agents",
            (RecordKind::HousePrice, _) => "house_prices",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "property" => Ok(RecordKind::Property),
            "agent" => Ok(RecordKind::Agent),
            "house_price" | "house_prices" => Ok(RecordKind::HousePrice),
            _ => Err(format!("Unknown record kind: {}", s)),
        }
    }
}

/// A URL to scrape together with the strategy that should parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTarget {
    pub url: String,
    pub kind: RecordKind,
}

impl ExtractionTarget {
    pub fn new(url: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// Which parsing phase produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Mapped from an embedded JSON-LD block.
    JsonLd,
    /// Scraped with DOM selectors after no usable JSON-LD was found.
    Dom,
}

/// Latitude/longitude pair. Either half may be missing from the source page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A property listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRecord {
    #[serde(rename = "listingId")]
    pub listing_id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub price: Option<Number>,
    pub currency: Option<String>,
    pub address: Option<String>,
    pub property_type: Option<String>,
    pub category: Option<String>,
    pub num_bedrooms: Option<u32>,
    pub num_bathrooms: Option<u32>,
    pub num_reception_rooms: Option<u32>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub agent_name: Option<String>,
    pub agent_phone: Option<String>,
    pub agent_logo: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub tenure: Option<String>,
    pub council_tax_band: Option<String>,
    pub broadband: Option<String>,
    pub transport: Option<String>,
    pub images: Vec<String>,
    pub floorplans: Vec<String>,
    pub price_history: BTreeMap<String, Number>,
    pub publication_status: Option<String>,
    pub source: RecordSource,
}

impl PropertyRecord {
    /// A record with every field absent.
    pub fn new(source: RecordSource) -> Self {
        Self {
            listing_id: None,
            url: None,
            title: None,
            price: None,
            currency: None,
            address: None,
            property_type: None,
            category: None,
            num_bedrooms: None,
            num_bathrooms: None,
            num_reception_rooms: None,
            description: None,
            features: Vec::new(),
            agent_name: None,
            agent_phone: None,
            agent_logo: None,
            coordinates: None,
            tenure: None,
            council_tax_band: None,
            broadband: None,
            transport: None,
            images: Vec::new(),
            floorplans: Vec::new(),
            price_history: BTreeMap::new(),
            publication_status: None,
            source,
        }
    }
}

/// An estate agent or branch from the agent directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRecord {
    pub name: Option<String>,
    pub url: Option<String>,
    pub telephone: Option<String>,
    pub logo: Option<String>,
    pub address: Option<String>,
    /// Passed through verbatim from JSON-LD; never set by DOM parsing.
    pub aggregate_rating: Option<serde_json::Value>,
    pub source: RecordSource,
}

impl AgentRecord {
    pub fn new(source: RecordSource) -> Self {
        Self {
            name: None,
            url: None,
            telephone: None,
            logo: None,
            address: None,
            aggregate_rating: None,
            source,
        }
    }
}

/// A historical sale price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    pub address: Option<String>,
    pub price: Option<Number>,
    pub currency: Option<String>,
    pub date_sold: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub source: RecordSource,
}

impl PriceRecord {
    pub fn new(source: RecordSource) -> Self {
        Self {
            address: None,
            price: None,
            currency: None,
            date_sold: None,
            coordinates: None,
            source,
        }
    }
}

/// Any record produced by a parser.
///
/// Serializes as the inner record's flat object so output files look the
/// same whichever kind produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Property(PropertyRecord),
    Agent(AgentRecord),
    HousePrice(PriceRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Property(_) => RecordKind::Property,
            Record::Agent(_) => RecordKind::Agent,
            Record::HousePrice(_) => RecordKind::HousePrice,
        }
    }

    pub fn source(&self) -> RecordSource {
        match self {
            Record::Property(r) => r.source,
            Record::Agent(r) => r.source,
            Record::HousePrice(r) => r.source,
        }
    }
}

impl From<PropertyRecord> for Record {
    fn from(record: PropertyRecord) -> Self {
        Record::Property(record)
    }
}

impl From<AgentRecord> for Record {
    fn from(record: AgentRecord) -> Self {
        Record::Agent(record)
    }
}

impl From<PriceRecord> for Record {
    fn from(record: PriceRecord) -> Self {
        Record::HousePrice(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_round_trip() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
        assert_eq!("house_prices".parse::<RecordKind>().unwrap(), RecordKind::HousePrice);
        assert!("villa".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_output_stems() {
        assert_eq!(RecordKind::Property.output_stem(true), "sample_property");
        assert_eq!(RecordKind::Property.output_stem(false), "properties");
        assert_eq!(RecordKind::HousePrice.output_stem(false), "house_prices");
    }

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let record = Record::from(PriceRecord::new(RecordSource::Dom));
        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 6);
        assert!(obj["address"].is_null());
        assert!(obj["coordinates"].is_null());
        assert_eq!(obj["source"], "dom");
    }

    #[test]
    fn test_property_shape_is_fixed() {
        let empty = serde_json::to_value(PropertyRecord::new(RecordSource::Dom)).unwrap();
        let mut full = PropertyRecord::new(RecordSource::JsonLd);
        full.listing_id = Some("123".into());
        full.price = Some(705_000.into());
        full.coordinates = Some(Coordinates {
            latitude: Some(51.5),
            longitude: None,
        });
        let full = serde_json::to_value(full).unwrap();

        let keys = |v: &serde_json::Value| v.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys(&empty), keys(&full));
        assert_eq!(full["listingId"], "123");
        assert_eq!(full["price"], 705_000);
        assert!(full["coordinates"]["longitude"].is_null());
    }

    #[test]
    fn test_record_accessors() {
        let record = Record::from(AgentRecord::new(RecordSource::JsonLd));
        assert_eq!(record.kind(), RecordKind::Agent);
        assert_eq!(record.source(), RecordSource::JsonLd);
    }
}
