//! Local race model, folded from decoded envelopes.
//!
//! Every update is last-write-wins except laps, which append in arrival order.
//! The fold is deterministic: replaying the same envelopes into a fresh model
//! always yields the same model, which is what makes resync after a reconnect
//! safe.

use std::sync::Arc;

use crate::codec::Envelope;
use crate::types::{LapRecord, LapRow, RaceState, StatusSnapshot};

/// Which part of the model an update touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelChange {
    Status,
    Laps,
    RaceState,
}

/// Client-side view of the timer.
///
/// Cloning is cheap: laps are shared until one side changes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaceModel {
    status: Option<StatusSnapshot>,
    laps: Arc<Vec<LapRecord>>,
    race: RaceState,
}

impl RaceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sequence of envelopes into a fresh model.
    pub fn replay<'a, I>(envelopes: I) -> Self
    where
        I: IntoIterator<Item = &'a Envelope>,
    {
        let mut model = Self::new();
        for envelope in envelopes {
            model.apply(envelope);
        }
        model
    }

    /// Apply one envelope.
    ///
    /// Returns what changed, or `None` when the envelope left the model as it
    /// was (unknown kinds, redelivered laps).
    pub fn apply(&mut self, envelope: &Envelope) -> Option<ModelChange> {
        match envelope {
            Envelope::Status(status) => {
                self.status = Some(*status);
                Some(ModelChange::Status)
            }
            Envelope::Lap { lap, lap_number } => self.apply_lap(*lap, *lap_number),
            Envelope::Laps(laps) => {
                if self.laps.as_slice() == laps.as_slice() {
                    return None;
                }
                self.laps = Arc::new(laps.clone());
                Some(ModelChange::Laps)
            }
            Envelope::RaceState(race) => {
                self.race = *race;
                Some(ModelChange::RaceState)
            }
            Envelope::Unknown { .. } => None,
        }
    }

    fn apply_lap(&mut self, lap: LapRecord, lap_number: Option<u32>) -> Option<ModelChange> {
        match lap_number.map(|n| n as usize) {
            // Redelivery of a lap we already hold
            Some(number) if (1..=self.laps.len()).contains(&number) => {
                if self.laps[number - 1] == lap {
                    return None;
                }
                Arc::make_mut(&mut self.laps)[number - 1] = lap;
            }
            _ => Arc::make_mut(&mut self.laps).push(lap),
        }
        Some(ModelChange::Laps)
    }

    /// Clear the lap list without waiting for the server.
    pub fn reset_laps(&mut self) -> Option<ModelChange> {
        if self.laps.is_empty() {
            return None;
        }
        self.laps = Arc::default();
        Some(ModelChange::Laps)
    }

    /// Latest status, if any has arrived.
    pub fn status(&self) -> Option<&StatusSnapshot> {
        self.status.as_ref()
    }

    /// Laps in arrival order; index 0 is lap 1.
    pub fn laps(&self) -> &[LapRecord] {
        self.laps.as_slice()
    }

    pub fn race_active(&self) -> bool {
        self.race.active
    }

    pub fn race_state(&self) -> RaceState {
        self.race
    }

    /// Fastest lap with a real time, as `(index, lap)`.
    ///
    /// Zero-time placeholders never qualify. On a tie the earliest lap wins.
    pub fn best_lap(&self) -> Option<(usize, &LapRecord)> {
        self.laps
            .iter()
            .enumerate()
            .filter(|(_, lap)| lap.lap_time_ms > 0)
            .min_by_key(|(_, lap)| lap.lap_time_ms)
    }

    /// Time of the most recent lap that has one.
    pub fn last_lap_time(&self) -> Option<u32> {
        self.laps.iter().rev().find_map(LapRecord::lap_time_ms)
    }

    /// Laps newest first, numbered from 1, with the best lap flagged.
    pub fn rows_newest_first(&self) -> impl Iterator<Item = LapRow<'_>> + '_ {
        let best = self.best_lap().map(|(index, _)| index);
        self.laps.iter().enumerate().rev().map(move |(index, lap)| LapRow {
            number: index + 1,
            lap,
            is_best: best == Some(index),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lap(ms: u32) -> Envelope {
        Envelope::Lap { lap: LapRecord::new(ms, 150), lap_number: None }
    }

    fn numbered(ms: u32, number: u32) -> Envelope {
        Envelope::Lap { lap: LapRecord::new(ms, 150), lap_number: Some(number) }
    }

    fn status(current_rssi: u32) -> Envelope {
        Envelope::Status(StatusSnapshot { current_rssi, ..Default::default() })
    }

    #[test]
    fn best_lap_skips_placeholders() {
        let model = RaceModel::replay(&[lap(0), lap(45230), lap(44980), lap(0)]);

        let (index, best) = model.best_lap().unwrap();
        assert_eq!(index, 2);
        assert_eq!(best.lap_time_ms, 44980);
        assert_eq!(model.last_lap_time(), Some(44980));
    }

    #[test]
    fn best_lap_absent_without_timed_laps() {
        assert!(RaceModel::new().best_lap().is_none());
        assert!(RaceModel::replay(&[lap(0), lap(0)]).best_lap().is_none());
        assert_eq!(RaceModel::replay(&[lap(0)]).last_lap_time(), None);
    }

    #[test]
    fn best_lap_tie_goes_to_earliest() {
        let model = RaceModel::replay(&[lap(50000), lap(41000), lap(41000)]);
        assert_eq!(model.best_lap().map(|(i, _)| i), Some(1));

        let flagged: Vec<usize> =
            model.rows_newest_first().filter(|row| row.is_best).map(|row| row.number).collect();
        assert_eq!(flagged, vec![2]);
    }

    #[test]
    fn rows_are_newest_first_and_numbered() {
        let model = RaceModel::replay(&[lap(0), lap(63412), lap(62000)]);
        let numbers: Vec<usize> = model.rows_newest_first().map(|row| row.number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
        assert_eq!(model.rows_newest_first().next().unwrap().lap.lap_time_ms, 62000);
    }

    #[test]
    fn lap_envelope_formats_downstream() {
        let envelope =
            crate::codec::decode(r#"{"type":"lap","lap_time_ms":63412,"rssi_peak":187}"#).unwrap();
        let mut model = RaceModel::new();

        assert_eq!(model.apply(&envelope), Some(ModelChange::Laps));
        assert_eq!(model.laps(), &[LapRecord::new(63412, 187)]);
        assert_eq!(model.laps()[0].display_time().as_deref(), Some("1:03.41"));
    }

    #[test]
    fn reset_clears_laps_only() {
        let mut model = RaceModel::replay(&[
            status(90),
            lap(41000),
            lap(42000),
            Envelope::RaceState(RaceState { active: true }),
        ]);

        assert_eq!(model.reset_laps(), Some(ModelChange::Laps));
        assert!(model.laps().is_empty());
        assert_eq!(model.status().map(|s| s.current_rssi), Some(90));
        assert!(model.race_active());
        assert_eq!(model.reset_laps(), None);
    }

    #[test]
    fn numbered_redelivery_does_not_grow() {
        let mut model = RaceModel::replay(&[numbered(0, 1), numbered(45000, 2)]);

        assert_eq!(model.apply(&numbered(45000, 2)), None);
        assert_eq!(model.laps().len(), 2);

        assert_eq!(model.apply(&numbered(45100, 2)), Some(ModelChange::Laps));
        assert_eq!(model.laps()[1].lap_time_ms, 45100);

        // A number past the end is a new lap
        assert_eq!(model.apply(&numbered(44000, 7)), Some(ModelChange::Laps));
        assert_eq!(model.laps().len(), 3);
    }

    #[test]
    fn lap_snapshot_replaces_sequence() {
        let mut model = RaceModel::replay(&[lap(1000), lap(2000), lap(3000)]);
        let snapshot = Envelope::Laps(vec![LapRecord::new(0, 100), LapRecord::new(5000, 120)]);

        assert_eq!(model.apply(&snapshot), Some(ModelChange::Laps));
        assert_eq!(model.laps().len(), 2);
        assert_eq!(model.apply(&snapshot), None);
    }

    #[test]
    fn unknown_envelopes_are_ignored() {
        let mut model = RaceModel::replay(&[status(10)]);
        let before = model.clone();
        assert_eq!(model.apply(&Envelope::Unknown { kind: "ping".to_string() }), None);
        assert_eq!(model, before);
    }

    #[test]
    fn status_updates_share_laps_with_earlier_clones() {
        let mut model = RaceModel::replay(&[lap(41000), lap(42000)]);
        let published = model.clone();

        model.apply(&status(70));
        assert!(Arc::ptr_eq(&published.laps, &model.laps));

        model.apply(&lap(43000));
        assert!(!Arc::ptr_eq(&published.laps, &model.laps));
        assert_eq!(published.laps().len(), 2);
        assert_eq!(model.laps().len(), 3);

        model.reset_laps();
        assert_eq!(published.laps().len(), 2);
    }

    fn arb_status() -> impl Strategy<Value = StatusSnapshot> {
        (0u32..300, 0u32..300, 0u32..100, any::<bool>()).prop_map(
            |(current_rssi, peak_rssi, lap_count, crossing)| StatusSnapshot {
                current_rssi,
                peak_rssi,
                lap_count,
                crossing,
            },
        )
    }

    fn arb_envelope() -> impl Strategy<Value = Envelope> {
        prop_oneof![
            arb_status().prop_map(Envelope::Status),
            (0u32..200_000, 0u32..255).prop_map(|(ms, peak)| Envelope::Lap {
                lap: LapRecord::new(ms, peak),
                lap_number: None
            }),
            (0u32..200_000, 1u32..10).prop_map(|(ms, n)| Envelope::Lap {
                lap: LapRecord::new(ms, 100),
                lap_number: Some(n)
            }),
            any::<bool>().prop_map(|active| Envelope::RaceState(RaceState { active })),
            "[a-z]{1,8}".prop_map(|kind| Envelope::Unknown { kind }),
        ]
    }

    proptest! {
        #[test]
        fn status_is_last_write_wins(statuses in prop::collection::vec(arb_status(), 1..50)) {
            let envelopes: Vec<Envelope> = statuses.iter().copied().map(Envelope::Status).collect();
            let model = RaceModel::replay(&envelopes);
            prop_assert_eq!(model.status(), statuses.last());
        }

        #[test]
        fn laps_keep_arrival_order(times in prop::collection::vec(0u32..200_000, 0..60)) {
            let envelopes: Vec<Envelope> = times.iter().map(|ms| lap(*ms)).collect();
            let model = RaceModel::replay(&envelopes);

            prop_assert_eq!(model.laps().len(), times.len());
            let replayed: Vec<u32> = model.laps().iter().map(|l| l.lap_time_ms).collect();
            prop_assert_eq!(replayed, times.clone());

            let expected_best = times.iter().copied().filter(|ms| *ms > 0).min();
            prop_assert_eq!(model.best_lap().map(|(_, l)| l.lap_time_ms), expected_best);
        }

        #[test]
        fn replay_is_deterministic(envelopes in prop::collection::vec(arb_envelope(), 0..80)) {
            prop_assert_eq!(RaceModel::replay(&envelopes), RaceModel::replay(&envelopes));
        }

        #[test]
        fn applying_a_snapshot_twice_is_idempotent(
            envelopes in prop::collection::vec(arb_envelope(), 0..40),
            laps in prop::collection::vec((0u32..200_000, 0u32..255), 0..20),
        ) {
            let snapshot = Envelope::Laps(
                laps.iter().map(|(ms, peak)| LapRecord::new(*ms, *peak)).collect(),
            );
            let mut model = RaceModel::replay(&envelopes);
            model.apply(&snapshot);
            let once = model.clone();
            prop_assert_eq!(model.apply(&snapshot), None);
            prop_assert_eq!(model, once);
        }
    }
}
