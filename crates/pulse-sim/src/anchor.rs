//! Where each option's particles gather.
//!
//! The presenter UI reports the rectangle of every option card through
//! [`RegionAnchors`]; headless hosts can compute the same card grid with
//! [`GridLayout`]. A particle targets the card center lifted by
//! [`ANCHOR_LIFT`] so clusters sit above the card's label.

use std::collections::BTreeMap;

use glam::DVec2;

use crate::geometry::{Region, Viewport};

/// Upward offset applied to card centers.
pub const ANCHOR_LIFT: f64 = 20.0;

/// Resolves an option index to the point its particles are pulled towards.
///
/// Returning `None` means the option has no card on screen yet; the
/// simulation then falls back to the viewport center.
pub trait AnchorResolver {
    /// Anchor for `option_index`, if known.
    fn resolve(&self, option_index: usize) -> Option<DVec2>;
}

impl<F> AnchorResolver for F
where
    F: Fn(usize) -> Option<DVec2>,
{
    fn resolve(&self, option_index: usize) -> Option<DVec2> {
        self(option_index)
    }
}

/// Card rectangles reported by the UI, keyed by option index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionAnchors {
    regions: BTreeMap<usize, Region>,
}

impl RegionAnchors {
    /// No regions known.
    pub const fn new() -> Self {
        Self {
            regions: BTreeMap::new(),
        }
    }

    /// Record or replace the rectangle of one card. Invalid rectangles are
    /// ignored and leave any previous value in place.
    pub fn set_region(&mut self, option_index: usize, region: Region) -> bool {
        if !region.is_valid() {
            tracing::debug!(option_index, ?region, "ignoring invalid card region");
            return false;
        }
        self.regions.insert(option_index, region);
        true
    }

    /// Forget one card, e.g. when it unmounts.
    pub fn remove(&mut self, option_index: usize) -> Option<Region> {
        self.regions.remove(&option_index)
    }

    /// Forget every card.
    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Number of known cards.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no cards are known.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Rectangle recorded for `option_index`.
    pub fn region(&self, option_index: usize) -> Option<Region> {
        self.regions.get(&option_index).copied()
    }
}

impl AnchorResolver for RegionAnchors {
    fn resolve(&self, option_index: usize) -> Option<DVec2> {
        self.regions
            .get(&option_index)
            .map(|region| region.center() - DVec2::new(0.0, ANCHOR_LIFT))
    }
}

impl FromIterator<(usize, Region)> for RegionAnchors {
    fn from_iter<I: IntoIterator<Item = (usize, Region)>>(iter: I) -> Self {
        let mut anchors = Self::new();
        for (index, region) in iter {
            anchors.set_region(index, region);
        }
        anchors
    }
}

/// Card grid used by the presenter view: two columns for a two-option poll,
/// three otherwise, below a header band holding the prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    /// Space around the grid.
    pub margin: f64,
    /// Space between cards.
    pub gap: f64,
    /// Fraction of the viewport height reserved for the prompt.
    pub header_fraction: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            margin: 48.0,
            gap: 24.0,
            header_fraction: 0.25,
        }
    }
}

impl GridLayout {
    /// Column count for a poll with `option_count` options.
    pub const fn columns(option_count: usize) -> usize {
        if option_count == 2 { 2 } else { 3 }
    }

    /// Card rectangles, row-major, for `option_count` options.
    pub fn regions(&self, option_count: usize, viewport: Viewport) -> Vec<Region> {
        if option_count == 0 {
            return Vec::new();
        }
        let columns = Self::columns(option_count).min(option_count);
        let rows = option_count.div_ceil(columns);
        let cols_f = count_as_f64(columns);
        let rows_f = count_as_f64(rows);

        let top = viewport.height * self.header_fraction;
        let usable_w = (viewport.width - self.margin * 2.0).max(0.0);
        let usable_h = (viewport.height - top - self.margin).max(0.0);
        let card_w = ((usable_w - self.gap * (cols_f - 1.0)) / cols_f).max(0.0);
        let card_h = ((usable_h - self.gap * (rows_f - 1.0)) / rows_f).max(0.0);

        (0..option_count)
            .map(|index| {
                let col = count_as_f64(index % columns);
                let row = count_as_f64(index / columns);
                Region::new(
                    self.margin + col * (card_w + self.gap),
                    top + row * (card_h + self.gap),
                    card_w,
                    card_h,
                )
            })
            .collect()
    }

    /// Anchors for a full grid of `option_count` cards.
    pub fn anchors(&self, option_count: usize, viewport: Viewport) -> RegionAnchors {
        self.regions(option_count, viewport)
            .into_iter()
            .enumerate()
            .collect()
    }
}

/// Small layout counts convert exactly.
#[allow(clippy::cast_precision_loss)]
const fn count_as_f64(n: usize) -> f64 {
    n as f64
}
