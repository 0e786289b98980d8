//! Evaluation context construction.

use chrono::{DateTime, Utc};

use permits_contracts::{context::EvaluationContext, permit::Permit};

/// Build the context an evaluator sees for `permit` at `timestamp`.
///
/// Pure: no I/O, no clock reads. The caller supplies the timestamp.
pub fn build_context(permit: &Permit, timestamp: DateTime<Utc>) -> EvaluationContext {
    EvaluationContext {
        timestamp,
        is_swap: permit.is_swap,
        input_token: permit.input_token,
        output_token: permit.output_token,
        input_amount: permit.input_amount.to_string(),
        owner: permit.owner,
        agent: permit.agent,
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn copies_permit_fields_and_timestamp() {
        let permit = Permit {
            active: true,
            uses_left: 1,
            time_left: 60,
            input_token: Address::repeat_byte(0x0a),
            output_token: Address::repeat_byte(0x0b),
            input_amount: U256::from(10u64).pow(U256::from(20u64)),
            is_swap: true,
            command_descriptor: "swap".to_string(),
            condition: Some("when the moon is full".to_string()),
            created_at: 1,
            last_used_at: 0,
            owner: Address::repeat_byte(0x01),
            agent: Address::repeat_byte(0x02),
        };
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        let ctx = build_context(&permit, at);

        assert_eq!(ctx.timestamp, at);
        assert!(ctx.is_swap);
        assert_eq!(ctx.input_token, permit.input_token);
        assert_eq!(ctx.output_token, permit.output_token);
        assert_eq!(ctx.input_amount, "100000000000000000000");
        assert_eq!(ctx.owner, permit.owner);
        assert_eq!(ctx.agent, permit.agent);

        // Deterministic given the same inputs.
        assert_eq!(ctx, build_context(&permit, at));
    }
}
