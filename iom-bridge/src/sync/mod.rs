//! Vehicle lifecycle synchronization.
//!
//! One engine per feed reconciles the adapter-reported roster against the
//! remote session state: new vehicles are logged on, vanished vehicles are
//! logged off, and position reports flow out deduplicated and filtered.
//! Vehicles whose logon keeps failing sit on a blacklist that suppresses
//! their positions until a later pass registers them successfully.

mod engine;

pub use engine::{SyncEngine, SyncSettings};
