pub use crate::locator::PeakLocator;
pub use crate::peak::{Peak, PeakSet};
pub use crate::peak_finder::{PeakFinder, PeakFinderBuilder, PeakFinderError};
pub use crate::quantize::Sample;
