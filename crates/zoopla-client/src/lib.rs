pub mod fetcher;
pub mod parser;
pub mod structured;

pub use fetcher::{ReqwestFetcher, USER_AGENT};
pub use parser::{
    AgentParser, HousePriceParser, PageParser, PropertyParser, parse_agent_listings,
    parse_house_prices, parse_price, parse_property_listings,
};
pub use structured::{StructuredBlock, scan};
