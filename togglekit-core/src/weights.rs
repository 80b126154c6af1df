// Copyright 2025 Togglekit Contributors (https://github.com/togglekit)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Weight redistribution.
//!
//! Fixed weights are authoritative; variable weights share whatever budget
//! remains, split with integer division. The division remainder goes to the
//! earliest variable entries in list order, one permille each, so the total
//! always lands exactly on the requested budget.

use crate::error::{Result, TogglekitError};
use crate::variant::{Variant, WeightType, TOTAL_VARIANT_WEIGHT};

/// Rewrites variable weights so the list sums to exactly `total_weight`.
///
/// Fixed weights pass through untouched, whatever they contain. Fails with
/// [`TogglekitError::ConstraintViolation`] when the fixed weights alone
/// overshoot the budget, or miss it with no variable entry left to absorb
/// the difference. An empty list passes through unchanged.
pub fn distribute(variants: &[Variant], total_weight: u16) -> Result<Vec<Variant>> {
    if variants.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = variants.to_vec();
    let fixed_sum: u32 = out
        .iter()
        .filter(|v| v.weight_type == WeightType::Fix)
        .map(|v| u32::from(v.weight))
        .sum();
    let variable_count = out
        .iter()
        .filter(|v| v.weight_type == WeightType::Variable)
        .count() as u32;

    let budget = u32::from(total_weight);
    let remaining = budget.checked_sub(fixed_sum).ok_or_else(|| {
        TogglekitError::ConstraintViolation(format!(
            "fixed weights sum to {fixed_sum}, exceeding the total of {budget}"
        ))
    })?;

    if variable_count == 0 {
        if remaining != 0 {
            return Err(TogglekitError::ConstraintViolation(format!(
                "fixed weights sum to {fixed_sum} and no variable variant can absorb the remaining {remaining}"
            )));
        }
        return Ok(out);
    }

    let share = remaining / variable_count;
    let extra = remaining % variable_count;

    let mut assigned = 0u32;
    for variant in out.iter_mut() {
        if variant.weight_type != WeightType::Variable {
            continue;
        }
        let weight = if assigned < extra { share + 1 } else { share };
        variant.weight = weight as u16;
        assigned += 1;
    }

    Ok(out)
}

/// [`distribute`] at the standard permille budget of
/// [`TOTAL_VARIANT_WEIGHT`].
pub fn normalize(variants: &[Variant]) -> Result<Vec<Variant>> {
    distribute(variants, TOTAL_VARIANT_WEIGHT)
}
