pub mod aggregation_service;
pub mod chart_service;
pub mod compatibility;
pub mod field_catalog;
pub mod grouping_service;
pub mod recompute_service;
pub mod time_range;
