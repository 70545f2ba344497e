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


use super::msr::{PositionFix, Track};
use crate::cosmic::{Frame, Orbit};
use crate::io::{IodConfig, IodMethod};
use crate::tools::herrick_gibbs::{
    herrick_gibbs, IodError, SampleIndexSnafu, TrackLambertSnafu, TrackTooShortSnafu,
};
use crate::tools::lambert::{LambertSolver, TransferKind};
use snafu::prelude::*;

fn sample(track: &Track<PositionFix>, index: usize) -> Result<&PositionFix, IodError> {
    track.get(index).context(SampleIndexSnafu {
        index,
        len: track.len(),
    })
}

/// Solves Lambert's problem between two samples of a track, and returns the orbit at the epoch of the first one.
pub fn lambert_iod(
    track: &Track<PositionFix>,
    first: usize,
    second: usize,
    solver: &LambertSolver,
    kind: TransferKind,
    frame: Frame,
) -> Result<Orbit, IodError> {
    let init = sample(track, first)?;
    let fin = sample(track, second)?;
    let tof_s = (fin.epoch - init.epoch).to_seconds();

    let sol = solver
        .solve(
            init.position_km,
            fin.position_km,
            tof_s,
            frame.mu_km3_s2,
            kind,
        )
        .context(TrackLambertSnafu)?;

    debug!(
        "Lambert between samples {first} and {second} ({tof_s} s) converged in {} iterations",
        sol.iterations
    );

    Ok(Orbit::from_vectors(
        &init.position_km,
        &sol.v_init,
        init.epoch,
        frame,
    ))
}

/// Solves Lambert's problem between each pair of consecutive samples.
///
/// Each orbit is given at the epoch of the first sample of its pair.
pub fn lambert_chain(
    track: &Track<PositionFix>,
    solver: &LambertSolver,
    kind: TransferKind,
    frame: Frame,
) -> Result<Vec<Orbit>, IodError> {
    ensure!(
        track.len() >= 2,
        TrackTooShortSnafu {
            method: "Lambert",
            need: 2_usize,
            len: track.len(),
        }
    );
    (0..track.len() - 1)
        .map(|i| lambert_iod(track, i, i + 1, solver, kind, frame))
        .collect()
}

/// Herrick-Gibbs over the whole track, using the samples `i - window`, `i` and `i + window` for every valid `i`.
///
/// The returned orbits are at the epochs of the middle samples, so there are `len - 2 * window` of them.
pub fn herrick_gibbs_track(
    track: &Track<PositionFix>,
    window: usize,
    frame: Frame,
) -> Result<Vec<Orbit>, IodError> {
    let window = window.max(1);
    ensure!(
        track.len() > 2 * window,
        TrackTooShortSnafu {
            method: "Herrick-Gibbs",
            need: 2 * window + 1,
            len: track.len(),
        }
    );

    let fixes = track.observations();
    (window..track.len() - window)
        .map(|i| {
            let (before, mid, after) = (&fixes[i - window], &fixes[i], &fixes[i + window]);
            let v_km_s = herrick_gibbs(
                (before.epoch, before.position_km),
                (mid.epoch, mid.position_km),
                (after.epoch, after.position_km),
                frame.mu_km3_s2,
            )?;
            Ok(Orbit::from_vectors(
                &mid.position_km,
                &v_km_s,
                mid.epoch,
                frame,
            ))
        })
        .collect()
}

/// Initial orbit determination of a (typically smoothed) track with the configured method.
pub fn initial_orbit(
    track: &Track<PositionFix>,
    cfg: &IodConfig,
    frame: Frame,
) -> Result<Orbit, IodError> {
    match cfg.method {
        IodMethod::Lambert => {
            ensure!(
                track.len() >= 2,
                TrackTooShortSnafu {
                    method: "Lambert",
                    need: 2_usize,
                    len: track.len(),
                }
            );
            let second = cfg.second.unwrap_or(track.len() - 1);
            lambert_iod(track, cfg.first, second, &cfg.lambert, cfg.transfer, frame)
        }
        IodMethod::LambertChain => {
            let orbits = lambert_chain(track, &cfg.lambert, cfg.transfer, frame)?;
            // The chain holds at least one solution
            Ok(orbits[0])
        }
        IodMethod::HerrickGibbs => {
            let orbits = herrick_gibbs_track(track, cfg.herrick_gibbs_window, frame)?;
            Ok(orbits[0])
        }
    }
}
