//! Tools the scenario agents can call.

mod manual_search;
mod order_id;
mod orders;

pub use manual_search::{
    APPLIANCE_FALLBACK, ManualSearchTool, SCOUTING_FALLBACK, search_sections,
};
pub use order_id::{OrderIdTool, format_order_id, generate_order_id};
pub use orders::{OrderLookupTool, lookup_orders, read_orders};
