//! Bar data validation.
//!
//! Validates bars from providers before they reach a caller:
//! - OHLC invariants (high >= low, open/close between high/low)
//! - Non-negative values
//! - Reasonable value ranges

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::OhlcvBar;

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject the bar.
    Hard,
    /// Soft warning - accept the bar but log warning.
    Soft,
}

#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    pub reject_negative_prices: bool,
    pub reject_invalid_ohlc: bool,
    /// Sanity ceiling; bars above it are rejected.
    pub max_price: Option<Decimal>,
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_negative_prices: true,
            reject_invalid_ohlc: true,
            max_price: Some(Decimal::from(10_000_000i64)),
            warn_on_zero_volume: false, // halted sessions report zero volume
        }
    }
}

/// Validates normalized bars.
pub struct BarValidator {
    config: ValidatorConfig,
}

impl BarValidator {
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate one bar. Warnings are logged but do not cause rejection.
    pub fn validate(&self, bar: &OhlcvBar) -> Result<(), MarketDataError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        self.validate_prices(bar, &mut issues);
        self.validate_ohlc_invariants(bar, &mut issues);
        self.validate_volume(bar, &mut issues);

        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(MarketDataError::ValidationFailed {
                message: format!("{}: {}", bar.date, errors.join("; ")),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!("Bar validation warning for {}: {}", bar.date, issue.message);
        }

        Ok(())
    }

    /// Splits a batch into (valid, invalid with reasons).
    pub fn validate_batch(
        &self,
        bars: Vec<OhlcvBar>,
    ) -> (Vec<OhlcvBar>, Vec<(OhlcvBar, MarketDataError)>) {
        let mut valid = Vec::with_capacity(bars.len());
        let mut invalid = Vec::new();

        for bar in bars {
            match self.validate(&bar) {
                Ok(()) => valid.push(bar),
                Err(e) => invalid.push((bar, e)),
            }
        }

        (valid, invalid)
    }

    fn validate_prices(&self, bar: &OhlcvBar, issues: &mut Vec<ValidationIssue>) {
        let prices = [bar.open, bar.high, bar.low, bar.close];

        if self.config.reject_negative_prices && prices.iter().any(|p| *p < Decimal::ZERO) {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: "Negative price".to_string(),
            });
        }

        if let Some(max) = self.config.max_price {
            if prices.iter().any(|p| *p > max) {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Hard,
                    message: format!("Price exceeds sanity limit {}", max),
                });
            }
        }
    }

    fn validate_ohlc_invariants(&self, bar: &OhlcvBar, issues: &mut Vec<ValidationIssue>) {
        if !self.config.reject_invalid_ohlc {
            return;
        }

        if bar.high < bar.low {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("High ({}) < Low ({})", bar.high, bar.low),
            });
            return;
        }

        if bar.open < bar.low || bar.open > bar.high {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!(
                    "Open ({}) outside range [{}, {}]",
                    bar.open, bar.low, bar.high
                ),
            });
        }

        if bar.close < bar.low || bar.close > bar.high {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!(
                    "Close ({}) outside range [{}, {}]",
                    bar.close, bar.low, bar.high
                ),
            });
        }
    }

    fn validate_volume(&self, bar: &OhlcvBar, issues: &mut Vec<ValidationIssue>) {
        if self.config.warn_on_zero_volume && bar.volume == 0 {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: "Zero volume".to_string(),
            });
        }
    }
}

impl Default for BarValidator {
    fn default() -> Self {
        Self::new()
    }
}
