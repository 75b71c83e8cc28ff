//! Strategy selection
//!
//! Selection is a pure function of the profile's declared record types, the
//! request's scope flag and its explicit id type, checked in order:
//!
//! 1. default profile declaring HOLDINGS, or id type HOLDING -> holdings
//! 2. default profile declaring AUTHORITY, or id type AUTHORITY -> authority
//! 3. profile declaring LINKED_DATA -> linked data
//! 4. anything else -> instance

use super::{AuthorityStrategy, ExportStrategy, HoldingsStrategy, InstanceStrategy, LinkedDataStrategy};
use crate::domain::{IdType, RecordType};
use std::fmt;

/// Closed set of strategy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Instance,
    Holdings,
    Authority,
    LinkedData,
}

impl StrategyKind {
    /// Extension of the files this strategy produces
    pub fn extension(&self) -> &'static str {
        match self {
            StrategyKind::LinkedData => "json",
            _ => "mrc",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Instance => "instance",
            StrategyKind::Holdings => "holdings",
            StrategyKind::Authority => "authority",
            StrategyKind::LinkedData => "linked-data",
        };
        f.write_str(s)
    }
}

/// Whether the job exports an explicit id list or the entire collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportScope {
    ById,
    All,
}

/// Pick the strategy for a request
pub fn select_strategy(
    record_types: &[RecordType],
    is_default_profile: bool,
    all: bool,
    id_type: Option<IdType>,
) -> (StrategyKind, ExportScope) {
    let scope = if all {
        ExportScope::All
    } else {
        ExportScope::ById
    };
    let declares = |t: RecordType| record_types.contains(&t);

    let kind = if (is_default_profile && declares(RecordType::Holdings))
        || id_type == Some(IdType::Holding)
    {
        StrategyKind::Holdings
    } else if (is_default_profile && declares(RecordType::Authority))
        || id_type == Some(IdType::Authority)
    {
        StrategyKind::Authority
    } else if declares(RecordType::LinkedData) {
        StrategyKind::LinkedData
    } else {
        StrategyKind::Instance
    };

    (kind, scope)
}

/// Build the strategy for `kind`
pub fn create_strategy(kind: StrategyKind) -> Box<dyn ExportStrategy> {
    match kind {
        StrategyKind::Instance => Box::new(InstanceStrategy),
        StrategyKind::Holdings => Box::new(HoldingsStrategy),
        StrategyKind::Authority => Box::new(AuthorityStrategy),
        StrategyKind::LinkedData => Box::new(LinkedDataStrategy),
    }
}
