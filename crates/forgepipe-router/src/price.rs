//! Per-provider/model pricing, used to turn a terminal call's token counts
//! into the dollar figure the Cost Tracker aggregates. An unrecognized
//! provider/model pair prices at zero rather than failing the call --
//! missing pricing data should not block a build, only under-report its
//! spend (the cost-reconciliation test scenarios rely on bounded not exact
//! spend tracking for this reason).

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct Rate {
    pub per_1k_input: f64,
    pub per_1k_output: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    rates: HashMap<(String, String), Rate>,
}

impl PriceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, provider: impl Into<String>, model: impl Into<String>, rate: Rate) {
        self.rates.insert((provider.into(), model.into()), rate);
    }

    #[must_use]
    pub fn cost(&self, provider: &str, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let Some(rate) = self.rates.get(&(provider.to_string(), model.to_string())) else {
            return 0.0;
        };
        (input_tokens as f64 / 1000.0) * rate.per_1k_input
            + (output_tokens as f64 / 1000.0) * rate.per_1k_output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_model_prices_at_zero() {
        let table = PriceTable::new();
        assert_eq!(table.cost("acme-llm", "v1", 1000, 1000), 0.0);
    }

    #[test]
    fn configured_rate_applies_per_thousand_tokens() {
        let mut table = PriceTable::new();
        table.set(
            "acme-llm",
            "v1",
            Rate {
                per_1k_input: 1.0,
                per_1k_output: 2.0,
            },
        );
        assert_eq!(table.cost("acme-llm", "v1", 2000, 500), 3.0);
    }
}
