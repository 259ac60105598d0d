pub mod chart;
pub mod chart_config;
pub mod field;
pub mod record;
pub mod settings;
