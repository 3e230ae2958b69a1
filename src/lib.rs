//! # Backcast workspace
//!
//! Umbrella crate re-exporting the [`backcast`] backtesting library.
//!
//! ## Example
//!
//! ```
//! use backcast_workspace::window::plan;
//!
//! // 12 rows, 3-row test ranges after 6 rows of history, stepping by 3
//! let windows = plan(12, 3, Some(6), 3).unwrap();
//! assert_eq!(windows.len(), 2);
//! assert_eq!(windows[1].train, 3..9);
//! assert_eq!(windows[1].test, 9..12);
//! ```

pub use backcast::*;

/// Library name and version, e.g. `backcast 0.1.0`
pub fn library_version() -> String {
    format!("{} {}", backcast::NAME, backcast::VERSION)
}
