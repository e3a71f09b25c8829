pub mod aggregate;
pub mod cancel;
pub mod dispatch;
pub mod executor;
pub mod payload;
pub mod predict;
pub mod report;
