pub mod pagination;
pub mod uploads;
