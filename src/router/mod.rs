//! Model routing: token/cost estimation, cheapest-viable selection, and the
//! cached 5-slot portfolio recommendation.

pub mod portfolio;
pub mod route;
pub mod tokens;

pub use portfolio::{validate_portfolio_coverage, PortfolioCache};
pub use route::{OnBudgetFail, RouteDecision, RouteError, Router, RoutingOptions};
pub use tokens::{estimate_cost_usd, estimate_tokens_for_task};
