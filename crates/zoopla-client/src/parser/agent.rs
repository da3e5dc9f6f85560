use std::sync::LazyLock;

use scraper::{Html, Selector};
use zoopla_core::error::AppError;
use zoopla_core::models::{AgentRecord, Record, RecordKind, RecordSource};
use zoopla_core::traits::RecordParser;

use super::rules::{FieldRule, FieldRules};
use super::{image_urls, join_address, parse_two_phase, selector, text_at};
use crate::structured::StructuredBlock;

const AGENT_TYPES: &[&str] = &["RealEstateAgent", "Organization"];

/// Parses estate agent directory pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentParser;

impl RecordParser for AgentParser {
    fn kind(&self) -> RecordKind {
        RecordKind::Agent
    }

    fn parse(&self, html: &str) -> Vec<Record> {
        parse_agent_listings(html)
            .into_iter()
            .map(Record::from)
            .collect()
    }
}

pub fn parse_agent_listings(html: &str) -> Vec<AgentRecord> {
    parse_two_phase(
        html,
        RecordKind::Agent,
        |block| block.has_type(AGENT_TYPES),
        map_agent,
        parse_agent_cards,
    )
}

fn map_agent(block: &StructuredBlock) -> Result<AgentRecord, AppError> {
    let mut record = AgentRecord::new(RecordSource::JsonLd);
    record.name = text_at(block.get("name"));
    record.url = text_at(block.get("url"));
    record.telephone = text_at(block.get("telephone"));
    record.logo = image_urls(block.get("logo")).into_iter().next();
    record.address = join_address(block.get("address"));
    record.aggregate_rating = block
        .get("aggregateRating")
        .filter(|rating| !rating.is_null())
        .cloned();
    Ok(record)
}

struct CardRules {
    card: Selector,
    name: FieldRules,
    telephone: FieldRules,
    logo: FieldRules,
    address: FieldRules,
    url: FieldRules,
}

static CARD_RULES: LazyLock<CardRules> = LazyLock::new(|| CardRules {
    card: selector("[data-testid='agent-card'], .agent-card"),
    name: FieldRules::new(vec![
        FieldRule::text("h2"),
        FieldRule::text("h3"),
        FieldRule::text(".agent-name"),
    ]),
    telephone: FieldRules::new(vec![
        FieldRule::attr_without_prefix("a[href^='tel:']", "href", "tel:"),
        FieldRule::text(".agent-phone"),
    ]),
    logo: FieldRule::attr("img", "src").into(),
    address: FieldRules::new(vec![
        FieldRule::text(".agent-address"),
        FieldRule::text("address"),
    ]),
    url: FieldRule::attr("a[href]", "href").into(),
});

fn parse_agent_cards(document: &Html) -> Vec<AgentRecord> {
    let rules = &*CARD_RULES;

    document
        .select(&rules.card)
        .map(|card| {
            let mut record = AgentRecord::new(RecordSource::Dom);
            record.name = rules.name.first(card);
            record.telephone = rules.telephone.first(card);
            record.logo = rules.logo.first(card);
            record.address = rules.address.first(card);
            record.url = rules.url.first(card);
            record
        })
        .collect()
}
