use std::f64::consts::PI;

use particle_id::sm_elementary_particles::{bottom, charm};
use particle_id::ParticleID;

/// Hadron flavour of a jet as stored in the `hadronFlavour` column
///
/// Simulation assigns 5 to jets with a b hadron, 4 to jets with a c
/// hadron and no b hadron, and 0 otherwise.
pub fn hadron_flavour(value: f64) -> ParticleID {
    ParticleID::new(value as i32)
}

pub fn is_bottom(id: ParticleID) -> bool {
    id == bottom
}

pub fn is_charm(id: ParticleID) -> bool {
    id == charm
}

/// Azimuthal angle difference mapped into [-π, π)
///
/// Non-finite input gives NaN.
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    (phi1 - phi2 + PI).rem_euclid(2. * PI) - PI
}

pub fn delta_r2(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    let deta = eta1 - eta2;
    let dphi = delta_phi(phi1, phi2);
    deta * deta + dphi * dphi
}

pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    delta_r2(eta1, phi1, eta2, phi2).sqrt()
}
