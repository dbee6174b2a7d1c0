//! # smartfile CLI
//!
//! Command-line interface for the SmartFile Flow sorter.
//!
//! ## Usage
//! ```bash
//! smartfile sort ~/Downloads ~/Sorted
//! smartfile sort ~/Downloads ~/Sorted --move --ml --output json
//! ```

mod cli;

use smartfile_flow::Result;

fn main() -> Result<()> {
    cli::run()
}
