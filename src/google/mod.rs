// Google Sheets / Drive adapters authenticated with a service account.

pub mod auth;
pub mod drive;
pub mod sheets;

pub use auth::{ServiceAccount, TokenSource, DRIVE_SCOPE, SHEETS_SCOPE};
pub use drive::DriveStore;
pub use sheets::GoogleSheets;
