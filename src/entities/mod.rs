//! Certificate entities: drafts, points and syringes

pub mod draft;
pub mod point;

pub use draft::{
    CertificateDraft, ChannelCount, DraftAction, DraftDetails, DraftError, DraftStatus,
    Equipment, EquipmentKind, Instrument, InstrumentKind, RangeValue, Ranges, Transition,
};
pub use point::{CalibrationPoint, Syringe, Unit};
