//! UI plans: the typed node tree, structural validation, and text parsing.

pub mod node;
pub mod parser;
pub mod validate;

pub use node::{UiNode, count_nodes};
pub use parser::{COMPONENTS_KEY, PlanParseError, parse_plan, parse_plan_value};
pub use validate::{MAX_DEPTH, ValidationError, ValidationFailure, validate_plan};
