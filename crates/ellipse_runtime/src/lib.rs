//! # Ellipse Runtime
//!
//! The application layer over `ellipse_core`:
//! - [`HandlerRegistry`]: one handler per [`ErrorCode`](ellipse_core::ErrorCode), print-and-exit fallback
//! - [`FilePoint`] and [`file_point!`]: where an error was raised
//! - [`Runtime`]: builds the ledger and handlers from one config
//!
//! ## Example
//!
//! ```rust,ignore
//! use ellipse_runtime::{file_point, Runtime};
//!
//! let runtime = Runtime::from_toml_str("oom_policy = \"propagate\"")?;
//! let mut stack = runtime.new_stack()?;
//! if let Err(err) = stack.pop() {
//!     runtime.report(&err, file_point!("main"));
//! }
//! runtime.exit(ellipse_core::ExitCode::Success);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod handlers;
pub mod point;
pub mod runtime;

pub use handlers::{Dispatched, Handler, HandlerRegistry, Report, REPORT_PREFIX};
pub use point::FilePoint;
pub use runtime::Runtime;
