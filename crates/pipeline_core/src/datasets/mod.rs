//! Dataset-specific transforms. Each dataset has its own module; they share
//! coercion helpers but nothing about their shape.

pub mod flood_areas;
pub mod floods;
pub mod nhs_sitrep;
pub mod trade_barriers;

use crate::error::TransformError;
use crate::table::Table;

/// Result of transforming one raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    /// Records (or spreadsheet data rows) in the raw payload.
    pub records_read: usize,
    pub table: Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    DitTradeBarriers,
    EaFloods,
    EaFloodAreas,
    NhsUecSitrep,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [
        Self::DitTradeBarriers,
        Self::EaFloods,
        Self::EaFloodAreas,
        Self::NhsUecSitrep,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DitTradeBarriers => "dit-trade-barriers",
            Self::EaFloods => "ea-floods",
            Self::EaFloodAreas => "ea-flood-areas",
            Self::NhsUecSitrep => "nhs-uec-sitrep",
        }
    }

    pub fn transform(self, document: &[u8]) -> Result<TransformOutput, TransformError> {
        match self {
            Self::DitTradeBarriers => trade_barriers::transform_document(document),
            Self::EaFloods => floods::transform_document(document),
            Self::EaFloodAreas => flood_areas::transform_document(document),
            Self::NhsUecSitrep => nhs_sitrep::transform_document(document),
        }
    }
}
