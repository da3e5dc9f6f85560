use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Number;
use zoopla_core::error::AppError;
use zoopla_core::models::{PropertyRecord, Record, RecordKind, RecordSource};
use zoopla_core::traits::RecordParser;

use super::rules::{FieldRule, FieldRules};
use super::{
    coordinates, count_value, feature_names, image_urls, join_address, parse_price,
    parse_two_phase, price_value, selector, text_at,
};
use crate::structured::StructuredBlock;

/// JSON-LD types that describe a listing.
const LISTING_TYPES: &[&str] = &["Offer", "SingleFamilyResidence", "Apartment", "House"];

/// Parses for-sale / to-rent search result pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyParser;

impl RecordParser for PropertyParser {
    fn kind(&self) -> RecordKind {
        RecordKind::Property
    }

    fn parse(&self, html: &str) -> Vec<Record> {
        parse_property_listings(html)
            .into_iter()
            .map(Record::from)
            .collect()
    }
}

pub fn parse_property_listings(html: &str) -> Vec<PropertyRecord> {
    parse_two_phase(
        html,
        RecordKind::Property,
        |block| block.has_type(LISTING_TYPES),
        map_listing,
        parse_listing_cards,
    )
}

fn map_listing(offer: &StructuredBlock) -> Result<PropertyRecord, AppError> {
    let item = offer.get("itemOffered");
    let item_field = |key: &str| item.and_then(|i| i.get(key));
    let seller_field = |key: &str| offer.get("seller").and_then(|s| s.get(key));

    let (price, currency) = match offer.get("priceSpecification") {
        Some(offer_price) => (offer_price.get("price"), offer_price.get("priceCurrency")),
        None => (offer.get("price"), offer.get("priceCurrency")),
    };

    let mut record = PropertyRecord::new(RecordSource::JsonLd);
    record.listing_id = text_at(offer.get("sku"))
        .or_else(|| text_at(offer.get("productID")))
        .or_else(|| text_at(offer.path(&["identifier", "value"])))
        .or_else(|| text_at(offer.get("identifier")));
    record.url = text_at(offer.get("url"));
    record.title = text_at(offer.get("name"));
    record.price = price_value(price)?;
    record.currency = text_at(currency);
    record.address = join_address(item_field("address"));
    record.property_type = text_at(item_field("@type"));
    record.category = text_at(offer.get("category"));
    record.num_bedrooms = count_value(item_field("numberOfRooms"));
    record.num_bathrooms = count_value(item_field("numberOfBathroomsTotal"));
    record.description = text_at(offer.get("description"));
    record.features = feature_names(offer.get("amenityFeature"));
    record.agent_name = text_at(seller_field("name"));
    record.agent_phone = text_at(seller_field("telephone"));
    record.agent_logo = image_urls(seller_field("image")).into_iter().next();
    record.coordinates = coordinates(item_field("geo"));
    record.tenure = text_at(offer.get("leaseLength")).or_else(|| text_at(offer.get("tenure")));
    record.images = image_urls(offer.get("image"));
    record.publication_status = text_at(offer.get("availability"));

    Ok(record)
}

/// DOM rules for a listing card.
struct CardRules {
    card: Selector,
    title: FieldRules,
    price: FieldRules,
    address: FieldRules,
    url: FieldRules,
    property_type: FieldRules,
    agent_name: FieldRules,
}

static CARD_RULES: LazyLock<CardRules> = LazyLock::new(|| CardRules {
    card: selector("[data-listing-id]"),
    title: FieldRules::new(vec![FieldRule::text("h2"), FieldRule::text("h3")]),
    price: FieldRules::new(vec![
        FieldRule::text(".css-1e28vvi"),
        FieldRule::text(".css-1e4fdj9"),
        FieldRule::text(".price"),
    ]),
    address: FieldRules::new(vec![
        FieldRule::text("[data-testid='listing-card-address']"),
        FieldRule::text(".css-1f3n3r9"),
        FieldRule::text(".address"),
    ]),
    url: FieldRules::new(vec![
        FieldRule::attr("a[href*='/for-sale/']", "href"),
        FieldRule::attr("a[href*='/to-rent/']", "href"),
        FieldRule::attr("a[href*='/details/']", "href"),
    ]),
    property_type: FieldRules::new(vec![
        FieldRule::text("[data-testid='listing-card-subtitle']"),
        FieldRule::text(".property-type"),
    ]),
    agent_name: FieldRules::new(vec![
        FieldRule::text("[data-testid='listing-card-agent-name']"),
        FieldRule::text(".agent_name"),
    ]),
});

fn parse_listing_cards(document: &Html) -> Vec<PropertyRecord> {
    let rules = &*CARD_RULES;

    document
        .select(&rules.card)
        .filter_map(|card| {
            let listing_id = card
                .value()
                .attr("data-listing-id")
                .map(str::trim)
                .filter(|id| !id.is_empty())?;

            let mut record = PropertyRecord::new(RecordSource::Dom);
            record.listing_id = Some(listing_id.to_string());
            record.url = rules.url.first(card);
            record.title = rules.title.first(card);
            record.price = rules
                .price
                .first(card)
                .and_then(|text| parse_price(&text))
                .map(Number::from);
            record.address = rules.address.first(card);
            record.property_type = rules.property_type.first(card);
            record.agent_name = rules.agent_name.first(card);
            Some(record)
        })
        .collect()
}
