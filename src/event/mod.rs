//! # Session events
//!
//! Every [`crate::session::InterpreterSession`] owns one [`event_bus::EventBus`]. The
//! interpreter publishes lifecycle, REQUIRE and CHECKPOINT events on it; hosts subscribe to
//! observe a run without hooking into the evaluator.
//!
//! ```text
//! ┌───────────┐     ┌──────────┐     ┌──────────┐
//! │ Evaluator │────▶│ EventBus │────▶│Subscriber│
//! └───────────┘     └──────────┘     └──────────┘
//! ```
//!
//! Regular events and error events travel on separate broadcast channels, so a monitor that
//! only cares about failed runs can subscribe to the error side alone.
//!
//! ```rust,no_run
//! # use rexxkit::event::event_bus::{Event, EventBus};
//! # async fn example() {
//! let bus = EventBus::new(16);
//! let (mut events, _) = bus.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let Event::Checkpoint(record) = event {
//!             println!("{} #{}: {}", record.execution_id, record.sequence, record.key);
//!         }
//!     }
//! });
//! # }
//! ```

pub mod event_bus;
