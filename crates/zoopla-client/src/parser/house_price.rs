use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Number;
use zoopla_core::error::AppError;
use zoopla_core::models::{PriceRecord, Record, RecordKind, RecordSource};
use zoopla_core::traits::RecordParser;

use super::rules::element_text;
use super::{coordinates, join_address, parse_price, parse_two_phase, price_value, selector, text_at};
use crate::structured::StructuredBlock;

const SALE_TYPES: &[&str] = &["Offer", "Product"];

static ROW: LazyLock<Selector> = LazyLock::new(|| selector("table tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));

/// Parses sold house price pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousePriceParser;

impl RecordParser for HousePriceParser {
    fn kind(&self) -> RecordKind {
        RecordKind::HousePrice
    }

    fn parse(&self, html: &str) -> Vec<Record> {
        parse_house_prices(html)
            .into_iter()
            .map(Record::from)
            .collect()
    }
}

pub fn parse_house_prices(html: &str) -> Vec<PriceRecord> {
    parse_two_phase(
        html,
        RecordKind::HousePrice,
        |block| block.has_type(SALE_TYPES) && block.contains_key("price"),
        map_sale,
        parse_price_table,
    )
}

fn map_sale(block: &StructuredBlock) -> Result<PriceRecord, AppError> {
    let mut record = PriceRecord::new(RecordSource::JsonLd);
    record.address = join_address(block.path(&["itemOffered", "address"]));
    record.price = price_value(block.get("price"))?;
    record.currency = text_at(block.get("priceCurrency"));
    record.date_sold = text_at(block.get("validFrom"));
    record.coordinates = coordinates(block.path(&["itemOffered", "geo"]));
    Ok(record)
}

/// One record per table row with at least three cells:
/// address, price text, date text.
fn parse_price_table(document: &Html) -> Vec<PriceRecord> {
    document
        .select(&ROW)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&CELL).map(element_text).collect();
            let [address, price, date_sold, ..] = cells.as_slice() else {
                return None;
            };

            let mut record = PriceRecord::new(RecordSource::Dom);
            record.address = non_empty(address);
            record.price = parse_price(price).map(Number::from);
            record.date_sold = non_empty(date_sold);
            Some(record)
        })
        .collect()
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
