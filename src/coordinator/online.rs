// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Online/offline inference.

use std::time::Duration;

use parking_lot::Mutex;

use crate::transport::RawPoint;

/// Infers cloud reachability from a batch of shadow properties.
///
/// An empty batch means offline. Otherwise the device is online when the
/// newest point timestamp is at most `tolerance` old. A batch without any
/// timestamp counts as online.
#[must_use]
pub fn cloud_online(points: &[RawPoint], now_ms: i64, tolerance: Duration) -> bool {
    if points.is_empty() {
        return false;
    }
    let Some(newest) = points.iter().filter_map(|p| p.timestamp_ms).max() else {
        return true;
    };
    let tolerance_ms = i64::try_from(tolerance.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_sub(newest) <= tolerance_ms
}

/// Remembers the last inferred status and reports flips.
#[derive(Debug, Default)]
pub(crate) struct OnlineTracker {
    current: Mutex<Option<bool>>,
}

impl OnlineTracker {
    /// Records an observation. Returns true when it differs from the
    /// previous one, including the very first observation.
    pub(crate) fn observe(&self, online: bool) -> bool {
        let mut current = self.current.lock();
        let changed = *current != Some(online);
        *current = Some(online);
        changed
    }

    /// Returns the last observation, offline if none yet.
    pub(crate) fn is_online(&self) -> bool {
        self.current.lock().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PointId;
    use crate::value::PointValue;

    const TOLERANCE: Duration = Duration::from_secs(240);

    fn point(timestamp_ms: Option<i64>) -> RawPoint {
        RawPoint {
            id: PointId::Code("temp".to_string()),
            value: PointValue::Integer(1),
            timestamp_ms,
            type_tag: None,
        }
    }

    #[test]
    fn empty_batch_is_offline() {
        assert!(!cloud_online(&[], 1_000_000, TOLERANCE));
    }

    #[test]
    fn stale_batch_is_offline() {
        let now = 10_000_000;
        let points = [point(Some(now - 300_000)), point(Some(now - 500_000))];
        assert!(!cloud_online(&points, now, TOLERANCE));
    }

    #[test]
    fn one_fresh_point_is_enough() {
        let now = 10_000_000;
        let points = [point(Some(now - 900_000)), point(Some(now - 30_000))];
        assert!(cloud_online(&points, now, TOLERANCE));
    }

    #[test]
    fn boundary_is_inclusive() {
        let now = 10_000_000;
        assert!(cloud_online(&[point(Some(now - 240_000))], now, TOLERANCE));
        assert!(!cloud_online(&[point(Some(now - 240_001))], now, TOLERANCE));
    }

    #[test]
    fn untimestamped_batch_is_online() {
        assert!(cloud_online(&[point(None)], 0, TOLERANCE));
    }

    #[test]
    fn tracker_reports_edges_only() {
        let tracker = OnlineTracker::default();
        assert!(!tracker.is_online());
        assert!(tracker.observe(true));
        assert!(!tracker.observe(true));
        assert!(tracker.observe(false));
        assert!(!tracker.observe(false));
        assert!(!tracker.is_online());
    }
}
