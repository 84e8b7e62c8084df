pub mod constellation;
pub mod eligibility;
pub mod ephemeris;
pub mod horizon;
pub mod ids;
pub mod macros;
pub mod satellite;
pub mod station;

pub use constellation::*;
pub use eligibility::*;
pub use ephemeris::*;
pub use horizon::*;
pub use ids::*;
pub use satellite::*;
pub use station::*;
