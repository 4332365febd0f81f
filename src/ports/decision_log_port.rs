//! Decision log port trait.

use crate::domain::decision::DecisionRecord;
use crate::domain::error::TraderError;

/// Append-only sink for decision records, one per cycle.
pub trait DecisionLogPort {
    fn append(&self, record: &DecisionRecord) -> Result<(), TraderError>;
}
