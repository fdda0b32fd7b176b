//! Per-token prices for cost estimates.
//!
//! Prices are nanodollars (1e-9 USD) per token. The estimate only feeds the
//! end-of-run summary; the provider bill is authoritative.

/// Input and output price of one model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPricing {
    pub input_nanos_per_token: i64,
    pub output_nanos_per_token: i64,
}

impl ModelPricing {
    const fn new(input: i64, output: i64) -> Self {
        Self {
            input_nanos_per_token: input,
            output_nanos_per_token: output,
        }
    }

    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> i64 {
        i64::from(input_tokens) * self.input_nanos_per_token
            + i64::from(output_tokens) * self.output_nanos_per_token
    }
}

/// Model families by id prefix. Dated snapshots such as
/// `gpt-4o-mini-2024-07-18` resolve to the longest matching prefix.
const PRICES: &[(&str, ModelPricing)] = &[
    // $0.15 / $0.60 per 1M
    ("gpt-4o-mini", ModelPricing::new(150, 600)),
    // $2.50 / $10.00 per 1M
    ("gpt-4o", ModelPricing::new(2_500, 10_000)),
    // $0.40 / $1.60 per 1M
    ("gpt-4.1-mini", ModelPricing::new(400, 1_600)),
    // $0.10 / $0.40 per 1M
    ("gpt-4.1-nano", ModelPricing::new(100, 400)),
    // $2.00 / $8.00 per 1M
    ("gpt-4.1", ModelPricing::new(2_000, 8_000)),
    // $0.50 / $1.50 per 1M
    ("gpt-3.5-turbo", ModelPricing::new(500, 1_500)),
];

/// Charged for models missing from the table.
const FALLBACK: ModelPricing = ModelPricing::new(1_000, 5_000);

pub fn get_pricing(model: &str) -> Option<ModelPricing> {
    PRICES
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|&(_, pricing)| pricing)
}

/// Estimated chat cost in nanodollars.
pub fn chat_cost(model: &str, input_tokens: u32, output_tokens: u32) -> i64 {
    get_pricing(model)
        .unwrap_or(FALLBACK)
        .cost(input_tokens, output_tokens)
}
