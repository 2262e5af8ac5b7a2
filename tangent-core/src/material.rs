//! Uniaxial material models.
//!
//! Materials are the innermost stateful objects: an element or fiber drives
//! them with a scalar trial strain and reads back stress and tangent. The
//! [`Domain`](crate::domain::Domain) keeps material *prototypes*; elements own
//! independent copies obtained through [`UniaxialMaterial::copy`], so each
//! integration point evolves its own history.
//!
//! # Models
//!
//! - [`Elastic`] - linear elastic
//! - [`Hardening`] - rate-independent plasticity with isotropic and
//!   kinematic hardening (perfectly plastic as a special case)
//! - [`StrainLimit`] - wrapper that rejects trial strains outside a range

use crate::object::{DomainObject, StatefulObject};
use std::fmt::Debug;

pub mod elastic;
pub mod hardening;
pub mod strain_limit;

pub use elastic::Elastic;
pub use hardening::Hardening;
pub use strain_limit::StrainLimit;

/// Stress-strain relation in one dimension.
///
/// `stress`, `strain` and `tangent` report the TRIAL values; after a
/// commit they coincide with the committed ones.
pub trait UniaxialMaterial: DomainObject + StatefulObject<f64> + Debug + Send + Sync {
    /// Trial strain.
    fn strain(&self) -> f64;

    /// Trial stress.
    fn stress(&self) -> f64;

    /// Trial tangent modulus dσ/dε.
    fn tangent(&self) -> f64;

    /// Elastic modulus at zero strain.
    fn initial_tangent(&self) -> f64;

    /// Stress at the last commit.
    fn committed_stress(&self) -> f64;

    /// Strain at the last commit.
    fn committed_strain(&self) -> f64;

    /// Independent copy, including its committed history, sharing the tag.
    fn copy(&self) -> Box<dyn UniaxialMaterial>;
}
