pub mod buckets;
pub mod cache;
pub mod metric_set;
pub mod service;
pub mod table;
pub mod window;
