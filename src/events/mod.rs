//! # Events Module
//!
//! Event-driven progress reporting for any presentation layer.
//!
//! ## Design
//! The sorting worker emits events through channels, so a CLI, GUI or
//! test can subscribe and display progress without polling the engine.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Run(RunEvent::Started { total }) => println!("{} files", total),
//!             Event::Run(RunEvent::Progress(p)) => println!("{}/{}", p.stats.processed(), p.stats.total),
//!             _ => {}
//!         }
//!     }
//! });
//!
//! sorter.run_with_events(&config, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
