/*!
 * Vendor protocol implementations.
 *
 * Each vendor implements [`crate::protocol::Protocol`]. Framing defaults
 * live next to each protocol as `default_options()`.
 */

pub mod extron;
pub mod shinybow;
pub mod sony;
pub mod tesla_elec;

pub use extron::ExtronSis;
pub use shinybow::{Shinybow, ShinybowVersion};
pub use sony::SonyRs485;
pub use tesla_elec::{TeslaElec, TeslaElecModel};
