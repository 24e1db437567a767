//! Token estimation for a work-package task, used to turn a predicted
//! token count into a predicted cost against a candidate model's pricing.

use crate::domain::ModelPricing;

/// Heuristic input/output token split from a task's prompt length and
/// difficulty, matching the `len/4` approximation used throughout the
/// router example this module is grounded on.
pub fn estimate_tokens_for_task(prompt_len_chars: usize, difficulty: &str) -> (u32, u32) {
    let input_tokens = ((prompt_len_chars as f64) / 4.0).ceil().max(1.0) as u32;
    let output_multiplier = match difficulty {
        "trivial" => 0.5,
        "easy" => 0.75,
        "medium" => 1.0,
        "hard" => 1.5,
        "complex" => 2.5,
        _ => 1.0,
    };
    let output_tokens = ((input_tokens as f64) * output_multiplier).ceil().max(1.0) as u32;
    (input_tokens, output_tokens)
}

/// Predicted USD cost of a call given its pricing and an estimated token split.
pub fn estimate_cost_usd(pricing: &ModelPricing, input_tokens: u32, output_tokens: u32) -> f64 {
    let cost = (input_tokens as f64 / 1000.0) * pricing.in_per_1k
        + (output_tokens as f64 / 1000.0) * pricing.out_per_1k;
    match pricing.min_charge_usd {
        Some(floor) => cost.max(floor),
        None => cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;

    #[test]
    fn harder_tasks_estimate_more_output_tokens() {
        let (_, easy_out) = estimate_tokens_for_task(400, "easy");
        let (_, hard_out) = estimate_tokens_for_task(400, "hard");
        assert!(hard_out > easy_out);
    }

    #[test]
    fn cost_respects_min_charge_floor() {
        let pricing = ModelPricing {
            in_per_1k: 0.0001,
            out_per_1k: 0.0001,
            currency: Currency::Usd,
            min_charge_usd: Some(0.01),
        };
        let cost = estimate_cost_usd(&pricing, 10, 10);
        assert_eq!(cost, 0.01);
    }

    #[test]
    fn cost_scales_with_tokens_above_floor() {
        let pricing = ModelPricing {
            in_per_1k: 0.005,
            out_per_1k: 0.015,
            currency: Currency::Usd,
            min_charge_usd: None,
        };
        let small = estimate_cost_usd(&pricing, 100, 100);
        let large = estimate_cost_usd(&pricing, 10_000, 10_000);
        assert!(large > small);
    }
}
