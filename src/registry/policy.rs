//! Eligibility policy.
//!
//! A model is eligible for a package only after passing every rule in this
//! precedence chain, in order: disabled status, kill switch, tier allow-list,
//! blocked provider, blocked task type, restricted use cases / safety
//! category, tenant procurement allow-list, governance cost/quality floors,
//! then the model's own eligibility rules. Deprecated status never excludes a
//! model; it only attaches a migration warning to an otherwise-eligible
//! verdict. The first failing rule short-circuits and names itself as the
//! reason.

use crate::domain::{ModelRegistryEntry, ModelStatus, SafetyCategory, TenantProcurementConfig, TierProfile};

#[derive(Debug, Clone)]
pub struct EligibilityContext<'a> {
    pub task_type: &'a str,
    pub tier: TierProfile,
    pub package_budget_usd: f64,
    pub importance: f64,
    pub tenant_config: Option<&'a TenantProcurementConfig>,
    pub use_case_tags: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub enum EligibilityVerdict {
    Eligible { detail: Option<String> },
    Ineligible { reason: String },
}

impl EligibilityVerdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, EligibilityVerdict::Eligible { .. })
    }

    pub fn eligible() -> Self {
        EligibilityVerdict::Eligible { detail: None }
    }
}

/// Evaluates the precedence chain in order, returning the first failure.
pub fn is_eligible(entry: &ModelRegistryEntry, ctx: &EligibilityContext) -> EligibilityVerdict {
    use EligibilityVerdict::{Eligible, Ineligible};

    if entry.identity.status == ModelStatus::Disabled {
        return Ineligible {
            reason: "disabled".to_string(),
        };
    }

    if entry.governance.kill_switch {
        return Ineligible {
            reason: "kill_switch".to_string(),
        };
    }

    let mut detail = None;
    if entry.identity.status == ModelStatus::Deprecated {
        detail = Some("deprecated; consider migrating".to_string());
    }

    if let Some(allowed) = &entry.governance.allowed_tiers {
        if !allowed.contains(&ctx.tier) {
            return Ineligible {
                reason: "tier_not_allowed".to_string(),
            };
        }
    }

    if entry
        .governance
        .blocked_providers
        .iter()
        .any(|p| p == &entry.identity.provider)
    {
        return Ineligible {
            reason: "blocked_provider".to_string(),
        };
    }

    if entry
        .governance
        .blocked_task_types
        .iter()
        .any(|t| t == ctx.task_type)
    {
        return Ineligible {
            reason: "blocked_task_type".to_string(),
        };
    }

    if entry
        .guardrails
        .restricted_use_cases
        .iter()
        .any(|rc| ctx.use_case_tags.iter().any(|tag| tag == rc))
    {
        return Ineligible {
            reason: "restricted_use_case".to_string(),
        };
    }

    if entry.guardrails.safety_category == Some(SafetyCategory::Restricted) && ctx.tier == TierProfile::Cheap {
        return Ineligible {
            reason: "restricted_use_case".to_string(),
        };
    }

    if let Some(tenant) = ctx.tenant_config {
        if !tenant.allows_provider(&entry.identity.provider) {
            return Ineligible {
                reason: "tenant_blocks_provider".to_string(),
            };
        }
        if !tenant.allows_model(&entry.id) {
            return Ineligible {
                reason: "tenant_blocks_model".to_string(),
            };
        }
    }

    if let Some(max_variance) = entry.governance.max_cost_variance_ratio {
        if let Some(prior) = entry.prior_for(ctx.task_type, "medium") {
            if prior.cost_multiplier > max_variance {
                return Ineligible {
                    reason: "cost_variance_exceeds_governance".to_string(),
                };
            }
        }
    }

    if let Some(min_quality) = entry.governance.min_quality_prior {
        if let Some(prior) = entry.prior_for(ctx.task_type, "medium") {
            if prior.calibration_confidence > 0.0 && prior.quality_prior < min_quality {
                return Ineligible {
                    reason: "quality_below_governance_floor".to_string(),
                };
            }
        }
    }

    if let Some(rules) = &entry.governance.eligibility_rules {
        if let Some(min_budget) = rules.when_budget_above_min_usd {
            if ctx.package_budget_usd < min_budget {
                return Ineligible {
                    reason: "budget_too_low".to_string(),
                };
            }
        }
        if let Some(max_importance) = rules.when_importance_below_max {
            if ctx.importance >= max_importance {
                return Ineligible {
                    reason: "importance_too_low".to_string(),
                };
            }
        }
    }

    Eligible { detail }
}
