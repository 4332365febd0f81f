//! Signal generation from an indicator set under a named rule set.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use super::error::TraderError;
use super::indicator::IndicatorSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    /// RSI extremes (30/70) confirmed by the MACD line crossing its signal.
    Conservative,
    /// Wider RSI bands (40/60), plus a momentum branch gated by the histogram.
    Aggressive,
}

impl RuleSet {
    fn buy_condition(&self, s: &IndicatorSet) -> bool {
        let bullish = s.macd > s.macd_signal;
        match self {
            RuleSet::Conservative => s.rsi < 30.0 && bullish,
            RuleSet::Aggressive => {
                (s.rsi < 40.0 && bullish) || (s.rsi < 55.0 && bullish && s.macd_histogram > 0.0)
            }
        }
    }

    fn sell_condition(&self, s: &IndicatorSet) -> bool {
        let bearish = s.macd < s.macd_signal;
        match self {
            RuleSet::Conservative => s.rsi > 70.0 && bearish,
            RuleSet::Aggressive => {
                (s.rsi > 60.0 && bearish) || (s.rsi > 45.0 && bearish && s.macd_histogram < 0.0)
            }
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSet::Conservative => write!(f, "conservative"),
            RuleSet::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for RuleSet {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(RuleSet::Conservative),
            "aggressive" => Ok(RuleSet::Aggressive),
            _ => Err(TraderError::UnknownRuleSet {
                name: s.trim().to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalDecision {
    pub signal: Signal,
    /// Both BUY and SELL conditions held; resolved to BUY.
    pub ambiguous: bool,
}

pub fn generate_signal(indicators: &IndicatorSet, rule_set: RuleSet) -> SignalDecision {
    let decision = resolve(
        rule_set.buy_condition(indicators),
        rule_set.sell_condition(indicators),
    );
    if decision.ambiguous {
        warn!(
            %rule_set,
            rsi = indicators.rsi,
            macd = indicators.macd,
            macd_signal = indicators.macd_signal,
            "buy and sell conditions both true; taking BUY"
        );
    }
    decision
}

pub(crate) fn resolve(buy: bool, sell: bool) -> SignalDecision {
    let signal = if buy {
        Signal::Buy
    } else if sell {
        Signal::Sell
    } else {
        Signal::Hold
    };
    SignalDecision {
        signal,
        ambiguous: buy && sell,
    }
}
