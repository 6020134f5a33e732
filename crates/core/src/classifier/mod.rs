//! Rule-based category assignment.
//!
//! A rule set is a JSON document:
//!
//! ```json
//! {
//!   "senders": ["ARD", "ZDF"],
//!   "categories": {
//!     "news": { "priority": 10, "rules": [{ "field": "title", "match": ["tagesschau"] }] }
//!   }
//! }
//! ```
//!
//! Categories are tried from highest to lowest priority (equal priorities in
//! name order). Within a category, rules are tried in declared order and the
//! first rule with a case-insensitive substring hit wins.

mod rules;
mod types;

pub use rules::Classifier;
pub use types::*;
