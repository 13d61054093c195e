use anyhow::Result;
use clap::{Args, ValueEnum};
use risk_agent_core::{normalize, MinSizePolicy, NormalizedSize, SizeRejection, SizingRules};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Reject,
    Bump,
}

#[derive(Args, Debug)]
pub struct SizeArgs {
    /// Quote-currency amount to spend.
    #[arg(long)]
    pub budget: Decimal,

    #[arg(long)]
    pub price: Decimal,

    #[arg(long, default_value_t = 5)]
    pub size_decimals: u32,

    #[arg(long, default_value = "10")]
    pub min_notional: Decimal,

    #[arg(long, default_value = "0")]
    pub min_position_size: Decimal,

    #[arg(long, value_enum, default_value_t = PolicyArg::Bump)]
    pub policy: PolicyArg,

    /// Largest overspend accepted when bumping to the venue minimum.
    #[arg(long, default_value = "1")]
    pub tolerance: Decimal,
}

impl SizeArgs {
    fn rules(&self) -> SizingRules {
        SizingRules {
            min_notional: self.min_notional,
            min_position_size: self.min_position_size,
            size_decimals: self.size_decimals,
        }
    }

    fn min_size_policy(&self) -> MinSizePolicy {
        match self.policy {
            PolicyArg::Reject => MinSizePolicy::Reject,
            PolicyArg::Bump => MinSizePolicy::BumpWithinTolerance {
                tolerance: self.tolerance,
            },
        }
    }

    fn evaluate(&self) -> Result<NormalizedSize, SizeRejection> {
        normalize(self.budget, self.price, &self.rules(), self.min_size_policy())
    }
}

/// Prints the exchange-legal quantity for a budget, or why there is none.
pub fn run_size(args: &SizeArgs) -> Result<()> {
    match args.evaluate() {
        Ok(size) => {
            println!("quantity: {}", size.quantity);
            println!("notional: {}", size.notional);
            if size.bumped {
                println!("raised to the venue minimum");
            }
            Ok(())
        }
        Err(rejection) => anyhow::bail!("rejected: {rejection}"),
    }
}
