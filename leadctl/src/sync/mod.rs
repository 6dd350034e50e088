//! Spreadsheet synchronization.
//!
//! Profiles may bind a Google spreadsheet (`sheetUrl` + `sheetName`). Syncing a
//! profile reads every row of that sheet and upserts it as a lead keyed by the
//! row's external id column, so repeated runs refresh rather than duplicate.
//!
//! - [`sheets`]: the [`SheetsClient`](sheets::SheetsClient) seam and the Google
//!   Sheets implementation
//! - [`pool`]: the bounded worker pool with per-profile retry and backoff

pub mod pool;
pub mod sheets;

pub use pool::SyncPool;
pub use sheets::{GoogleSheetsClient, SheetsClient};
