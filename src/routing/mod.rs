//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (startup):
//!     (method, pattern, chain)
//!     → pattern.rs (split into literal / :param / *wildcard tokens)
//!     → tree.rs (walk + split radix nodes, attach chain to terminal)
//!
//! Request time:
//!     (method, path)
//!     → tree.rs find (static > param > wildcard)
//!     → Matched(route) + params.rs, or NoMatch { allowed, tsr }
//! ```
//!
//! # Design Decisions
//! - Tree built at startup, read-only while serving (no locks on lookup)
//! - No regex; lookup cost follows path length, not route count
//! - Explicit NoMatch carrying what the fallback policy needs

pub mod params;
pub(crate) mod pattern;
pub mod tree;

pub use params::{Param, Params};
pub use tree::{Lookup, NoMatch, Route, RouteTree};
