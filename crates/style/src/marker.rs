//! Assignment of features to style rules.
//!
//! Every plugin independently walks its rules in declared order; the first
//! rule whose filter matches a feature the plugin has not claimed yet claims
//! it. Claims live in a side table owned by one build, never on the features.

use formats::feature::TileFeature;

use crate::config::PluginConfig;

/// Per-build claim table: `plugin -> feature ordinal -> style index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleMarks {
    claims: Vec<Vec<Option<usize>>>,
    all_claimed: Vec<bool>,
}

impl StyleMarks {
    pub fn plugin_count(&self) -> usize {
        self.claims.len()
    }

    pub fn style_index(&self, plugin: usize, feature: usize) -> Option<usize> {
        self.claims.get(plugin)?.get(feature).copied().flatten()
    }

    /// `(feature ordinal, style index)` for every feature claimed by `plugin`,
    /// in feature order.
    pub fn claimed(&self, plugin: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.claims
            .get(plugin)
            .into_iter()
            .flat_map(|c| c.iter().enumerate())
            .filter_map(|(i, &s)| s.map(|s| (i, s)))
    }

    pub fn claimed_count(&self, plugin: usize) -> usize {
        self.claimed(plugin).count()
    }

    /// Whether every feature was claimed by `plugin`.
    pub fn all_claimed(&self, plugin: usize) -> bool {
        self.all_claimed.get(plugin).copied().unwrap_or(false)
    }

    /// Whether any plugin claimed `feature`.
    pub fn is_claimed(&self, feature: usize) -> bool {
        self.claims
            .iter()
            .any(|c| c.get(feature).is_some_and(Option::is_some))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StyleMarker<'a> {
    plugins: &'a [PluginConfig],
    short_circuit: bool,
}

impl<'a> StyleMarker<'a> {
    pub fn new(plugins: &'a [PluginConfig]) -> Self {
        Self {
            plugins,
            short_circuit: true,
        }
    }

    /// Evaluates every rule even after a plugin has claimed all features.
    pub fn without_short_circuit(mut self) -> Self {
        self.short_circuit = false;
        self
    }

    pub fn mark(&self, features: &[TileFeature]) -> StyleMarks {
        let mut claims = Vec::with_capacity(self.plugins.len());
        let mut all_claimed = Vec::with_capacity(self.plugins.len());

        for plugin in self.plugins {
            let mut slots: Vec<Option<usize>> = vec![None; features.len()];
            let mut remaining = features.len();

            for (style_index, rule) in plugin.style.iter().enumerate() {
                if self.short_circuit && remaining == 0 {
                    break;
                }
                for (slot, feature) in slots.iter_mut().zip(features) {
                    if slot.is_none() && rule.filter.matches(feature) {
                        *slot = Some(style_index);
                        remaining -= 1;
                    }
                }
            }

            claims.push(slots);
            all_claimed.push(remaining == 0);
        }

        StyleMarks {
            claims,
            all_claimed,
        }
    }
}

pub fn mark_features(plugins: &[PluginConfig], features: &[TileFeature]) -> StyleMarks {
    StyleMarker::new(plugins).mark(features)
}
