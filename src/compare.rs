//! Comparison view state: the ordered parameter sets and the per-series
//! threshold controls drawn over the comparison charts.

use std::collections::BTreeMap;

use tracing::debug;

use crate::analysis::{ChartKind, ThresholdControl};
use crate::error::CollectionError;
use crate::i18n::Lang;
use crate::model::{ModelKind, StudyPreset};
use crate::params::ParameterSet;
use crate::result::Comparison;

pub const PALETTE: [&str; 6] = [
    "rgb(31, 119, 180)",
    "rgb(255, 127, 14)",
    "rgb(44, 160, 44)",
    "rgb(214, 39, 40)",
    "rgb(148, 103, 189)",
    "rgb(140, 86, 75)",
];

pub fn series_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Ordered, never-empty list of parameter sets for one model.
#[derive(Debug, Clone)]
pub struct ComparisonCollection {
    model: ModelKind,
    sets: Vec<ParameterSet>,
}

impl ComparisonCollection {
    pub fn new(model: ModelKind, lang: Lang) -> Self {
        let mut collection = ComparisonCollection {
            model,
            sets: Vec::new(),
        };
        collection.reseed(model, lang);
        collection
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn sets(&self) -> &[ParameterSet] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&ParameterSet> {
        self.sets.iter().find(|set| set.id == id)
    }

    pub fn position(&self, id: u32) -> Option<usize> {
        self.sets.iter().position(|set| set.id == id)
    }

    fn index_of(&self, id: u32) -> Result<usize, CollectionError> {
        self.position(id).ok_or(CollectionError::UnknownSet(id))
    }

    fn next_id(&self) -> u32 {
        self.sets.iter().map(|set| set.id).max().unwrap_or(0) + 1
    }

    /// Drops every set and seeds the model's two presets.
    pub fn reseed(&mut self, model: ModelKind, lang: Lang) {
        self.model = model;
        self.sets = model
            .presets()
            .iter()
            .enumerate()
            .map(|(i, preset)| ParameterSet::from_preset(i as u32 + 1, model, preset, lang))
            .collect();
        debug!(model = model.as_str(), "reseeded comparison sets");
    }

    /// Studies are Dill configurations; the collection switches to Dill.
    pub fn apply_study(&mut self, study: StudyPreset, lang: Lang) {
        self.model = ModelKind::Dill;
        self.sets = study
            .sets()
            .iter()
            .enumerate()
            .map(|(i, preset)| ParameterSet::from_preset(i as u32 + 1, ModelKind::Dill, preset, lang))
            .collect();
    }

    /// Appends a set holding the model defaults and returns its id.
    pub fn add(&mut self) -> u32 {
        let id = self.next_id();
        self.sets.push(ParameterSet::new(id, self.model));
        id
    }

    /// Appends a copy of `id`'s values under a fresh id.
    pub fn duplicate(&mut self, id: u32) -> Result<u32, CollectionError> {
        let source = &self.sets[self.index_of(id)?];
        let mut copy = ParameterSet::new(self.next_id(), self.model);
        copy.fields = source.fields.clone();
        let new_id = copy.id;
        self.sets.push(copy);
        Ok(new_id)
    }

    /// Removes a set and returns the index it occupied.
    pub fn remove(&mut self, id: u32) -> Result<usize, CollectionError> {
        let index = self.index_of(id)?;
        if self.sets.len() == 1 {
            return Err(CollectionError::LastSet);
        }
        self.sets.remove(index);
        Ok(index)
    }

    /// Moves the set at `from` to `to`; ids stay attached to their sets.
    pub fn move_set(&mut self, from: usize, to: usize) -> Result<(), CollectionError> {
        let len = self.sets.len();
        if from >= len {
            return Err(CollectionError::OutOfRange(from));
        }
        if to >= len {
            return Err(CollectionError::OutOfRange(to));
        }
        let set = self.sets.remove(from);
        self.sets.insert(to, set);
        Ok(())
    }

    pub fn rename(&mut self, id: u32, name: &str) -> Result<(), CollectionError> {
        let index = self.index_of(id)?;
        let name = name.trim();
        self.sets[index].custom_name = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };
        Ok(())
    }

    pub fn set_field(&mut self, id: u32, key: &str, raw: &str) -> Result<f64, CollectionError> {
        let index = self.index_of(id)?;
        self.sets[index]
            .set_number(key, raw)
            .ok_or_else(|| CollectionError::UnknownField(key.to_string()))
    }
}

/// Threshold controls per chart, indexed by series position.
#[derive(Debug, Clone, Default)]
pub struct ThresholdBoard {
    controls: BTreeMap<ChartKind, Vec<ThresholdControl>>,
}

impl ThresholdBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derives every range from `data`. Visibility, expansion and the
    /// chosen value survive for series that still exist, clamped into the
    /// new range.
    pub fn rebuild(&mut self, data: &Comparison) {
        for kind in ChartKind::ALL {
            let series = match kind {
                ChartKind::Exposure => &data.exposure,
                ChartKind::Thickness => &data.thickness,
            };
            let previous = self.controls.remove(&kind).unwrap_or_default();
            let fresh = series
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let mut ctl = ThresholdControl::derive(&s.data, kind, i)
                        .unwrap_or_else(|| ThresholdControl::fallback(kind, i));
                    if let Some(old) = previous.get(i) {
                        ctl.visible = old.visible;
                        ctl.expanded = old.expanded;
                        if old.visible {
                            ctl.set_value(old.value);
                        }
                    }
                    ctl
                })
                .collect();
            self.controls.insert(kind, fresh);
        }
    }

    pub fn controls(&self, kind: ChartKind) -> &[ThresholdControl] {
        self.controls.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, kind: ChartKind, index: usize) -> Option<&ThresholdControl> {
        self.controls.get(&kind)?.get(index)
    }

    fn get_mut(&mut self, kind: ChartKind, index: usize) -> Option<&mut ThresholdControl> {
        self.controls.get_mut(&kind)?.get_mut(index)
    }

    pub fn set_value(&mut self, kind: ChartKind, index: usize, value: f64) -> Option<f64> {
        Some(self.get_mut(kind, index)?.set_value(value))
    }

    pub fn toggle(&mut self, kind: ChartKind, index: usize) -> Option<bool> {
        let ctl = self.get_mut(kind, index)?;
        ctl.visible = !ctl.visible;
        Some(ctl.visible)
    }

    pub fn toggle_details(&mut self, kind: ChartKind, index: usize) -> Option<bool> {
        let ctl = self.get_mut(kind, index)?;
        ctl.expanded = !ctl.expanded;
        Some(ctl.expanded)
    }

    /// Drops the controls of a removed series and shifts later ones down.
    pub fn remove_series(&mut self, index: usize) {
        for controls in self.controls.values_mut() {
            if index < controls.len() {
                controls.remove(index);
            }
            reindex(controls);
        }
    }

    pub fn move_series(&mut self, from: usize, to: usize) {
        for controls in self.controls.values_mut() {
            if from < controls.len() && to < controls.len() {
                let ctl = controls.remove(from);
                controls.insert(to, ctl);
            }
            reindex(controls);
        }
    }

    /// Drops controls at or beyond `len`.
    pub fn truncate(&mut self, len: usize) {
        for controls in self.controls.values_mut() {
            controls.truncate(len);
        }
    }

    pub fn clear(&mut self) {
        self.controls.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.controls.values().all(Vec::is_empty)
    }
}

fn reindex(controls: &mut [ThresholdControl]) {
    for (i, ctl) in controls.iter_mut().enumerate() {
        ctl.index = i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::CompareSeries;

    fn comparison(n: usize) -> Comparison {
        let x = vec![0.0, 1.0, 2.0];
        let series = |scale: f64| {
            (0..n)
                .map(|i| CompareSeries {
                    set_id: i as u32 + 1,
                    data: vec![0.0, scale * (i + 1) as f64, 0.0],
                })
                .collect()
        };
        Comparison {
            x,
            exposure: series(100.0),
            thickness: series(0.1),
        }
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(series_color(0), "rgb(31, 119, 180)");
        assert_eq!(series_color(6), series_color(0));
        assert_eq!(series_color(11), "rgb(140, 86, 75)");
    }

    #[test]
    fn test_reseed_replaces_all_sets() {
        let mut sets = ComparisonCollection::new(ModelKind::Dill, Lang::En);
        sets.add();
        sets.add();
        sets.reseed(ModelKind::Car, Lang::En);
        assert_eq!(sets.len(), 2);
        assert!(sets.sets().iter().all(|set| set.model == ModelKind::Car));
        assert_eq!(sets.sets()[1].number("amplification"), Some(15.0));
        assert_eq!(sets.sets()[0].number("I_avg"), Some(10.0));
        assert_eq!(sets.sets()[0].id, 1);
    }

    #[test]
    fn test_add_uses_next_id_after_max() {
        let mut sets = ComparisonCollection::new(ModelKind::Dill, Lang::En);
        let id = sets.add();
        assert_eq!(id, 3);
        sets.remove(2).unwrap();
        assert_eq!(sets.add(), 4);
        let copy = sets.duplicate(1).unwrap();
        assert_eq!(copy, 5);
        assert_eq!(sets.get(5).unwrap().fields, sets.get(1).unwrap().fields);
        assert_eq!(sets.get(5).unwrap().custom_name, None);
    }

    #[test]
    fn test_last_set_cannot_be_removed() {
        let mut sets = ComparisonCollection::new(ModelKind::EnhancedDill, Lang::Zh);
        assert_eq!(sets.remove(1), Ok(0));
        assert_eq!(sets.remove(2), Err(CollectionError::LastSet));
        assert_eq!(sets.remove(9), Err(CollectionError::UnknownSet(9)));
        assert_eq!(sets.len(), 1);
    }

    #[test]
    fn test_move_and_rename() {
        let mut sets = ComparisonCollection::new(ModelKind::Dill, Lang::En);
        sets.add();
        sets.move_set(2, 0).unwrap();
        let ids: Vec<u32> = sets.sets().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(sets.move_set(3, 0), Err(CollectionError::OutOfRange(3)));

        sets.rename(3, "  Wide  ").unwrap();
        assert_eq!(sets.get(3).unwrap().display_name(Lang::En), "Wide");
        sets.rename(3, "").unwrap();
        assert_eq!(sets.get(3).unwrap().display_name(Lang::En), "Parameter Set 3");
    }

    #[test]
    fn test_set_field_clamps() {
        let mut sets = ComparisonCollection::new(ModelKind::Dill, Lang::En);
        assert_eq!(sets.set_field(1, "I_avg", "150"), Ok(100.0));
        assert_eq!(sets.set_field(2, "V", "-5"), Ok(0.0));
        assert_eq!(
            sets.set_field(1, "acid_gen_efficiency", "1"),
            Err(CollectionError::UnknownField("acid_gen_efficiency".into()))
        );
    }

    #[test]
    fn test_study_switches_to_dill() {
        let mut sets = ComparisonCollection::new(ModelKind::Car, Lang::Zh);
        sets.apply_study(StudyPreset::Contrast, Lang::Zh);
        assert_eq!(sets.model(), ModelKind::Dill);
        assert_eq!(sets.sets()[0].display_name(Lang::Zh), "高对比度");
        assert_eq!(sets.sets()[1].number("V"), Some(0.6));
        assert_eq!(sets.sets()[1].id, 2);
    }

    #[test]
    fn test_board_rebuild_rederives_ranges() {
        let mut board = ThresholdBoard::new();
        board.rebuild(&comparison(2));
        assert_eq!(board.controls(ChartKind::Exposure).len(), 2);
        assert_eq!(board.get(ChartKind::Exposure, 1).unwrap().max, 220.0);

        assert_eq!(board.toggle(ChartKind::Exposure, 1), Some(true));
        assert_eq!(board.set_value(ChartKind::Exposure, 1, 150.0), Some(150.0));

        let mut lower = comparison(2);
        lower.exposure[1].data = vec![0.0, 100.0, 0.0];
        board.rebuild(&lower);
        let ctl = board.get(ChartKind::Exposure, 1).unwrap();
        assert_eq!(ctl.max, 110.0);
        assert!(ctl.visible);
        assert_eq!(ctl.value, 110.0);
    }

    #[test]
    fn test_board_reindexes_after_remove() {
        let mut board = ThresholdBoard::new();
        board.rebuild(&comparison(3));
        board.toggle(ChartKind::Thickness, 2);
        board.remove_series(1);
        let controls = board.controls(ChartKind::Thickness);
        assert_eq!(controls.len(), 2);
        assert_eq!(controls[1].index, 1);
        assert!(controls[1].visible);
        assert!(board.get(ChartKind::Thickness, 2).is_none());

        board.move_series(1, 0);
        assert!(board.get(ChartKind::Thickness, 0).unwrap().visible);
        assert_eq!(board.get(ChartKind::Thickness, 0).unwrap().index, 0);

        board.truncate(1);
        assert_eq!(board.controls(ChartKind::Exposure).len(), 1);
        board.clear();
        assert!(board.is_empty());
    }
}
