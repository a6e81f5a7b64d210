pub mod audit;
pub mod facet;
pub mod identity;
pub mod present;
pub mod query;
