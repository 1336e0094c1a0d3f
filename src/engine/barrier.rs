// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::RankId;
use crate::errors::{AggregatedError, RankFailure};

/// What one rank hands back when its queue reaches a sync marker.
#[derive(Debug, Clone, PartialEq)]
pub struct RankReport {
    pub rank: RankId,
    pub failure: Option<RankFailure>,
    /// Entries dropped after the failure.
    pub discarded: usize,
}

/// Collapse reports filed at barriers into one report per rank, in `ranks`
/// order. A rank may have filed several when an earlier sync stopped waiting;
/// its earliest failure is kept and discarded counts add up.
pub fn merge_reports(ranks: &[RankId], filed: Vec<RankReport>) -> Vec<RankReport> {
    let mut merged: Vec<RankReport> = ranks
        .iter()
        .map(|&rank| RankReport {
            rank,
            failure: None,
            discarded: 0,
        })
        .collect();

    for report in filed {
        if let Some(slot) = merged.iter_mut().find(|slot| slot.rank == report.rank) {
            slot.discarded += report.discarded;
            if slot.failure.is_none() {
                slot.failure = report.failure;
            }
        }
    }
    merged
}

/// Fold per-rank reports, given in set order, into one sync outcome.
///
/// The reported failure is the first one in set order, whichever rank failed
/// first in time.
pub fn aggregate(reports: &[RankReport]) -> Result<(), AggregatedError> {
    let failed_ranks: Vec<RankId> = reports
        .iter()
        .filter(|report| report.failure.is_some())
        .map(|report| report.rank)
        .collect();

    let first = reports
        .iter()
        .find_map(|report| report.failure.as_ref().map(|failure| (report.rank, failure.clone())));

    match first {
        None => Ok(()),
        Some((rank, failure)) => Err(AggregatedError {
            rank,
            failure,
            failed_ranks,
            total: reports.len(),
        }),
    }
}
