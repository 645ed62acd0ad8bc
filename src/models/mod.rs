pub mod enums;
pub mod observation;
pub mod patient;

pub use enums::*;
pub use observation::*;
pub use patient::*;
