/*
    Orbit Determinator, orbit estimation from ground tracking data
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/


use crate::cosmic::Orbit;
use rand::SeedableRng;
use rand_distr::Distribution;
pub use rand_pcg::Pcg64Mcg;

mod generator;
pub use generator::{DispersionError, GaussianGenerator, Generator, StateParameter};

/// Draws `count` states from the provided generator, seeded so that each run is reproducible.
pub fn disperse<G: Distribution<Orbit>>(generator: &G, count: usize, seed: u64) -> Vec<Orbit> {
    let rng = Pcg64Mcg::seed_from_u64(seed);
    generator.sample_iter(rng).take(count).collect()
}
