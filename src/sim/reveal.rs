/// RevealGate: staggered item visibility and exit unlocking.
///
/// ## Batches
///
/// A group's items (one group per zone, or a single global group when the
/// level has no zones) are ordered by placement. The first
/// `initial_visible` start shown; the rest are cut into batches of
/// `batch_size`:
///
/// ```text
///   items:     [ 0 ][ 1  2 ][ 3  4 ] ...          initial = 1, batch = 2
///   batch j:          0       1
///   reveal at: collected >= initial + batch * j
///   complete:  collected >= initial + batch * j + batch
/// ```
///
/// ## On collection
///   1. count it (duplicates are rejected by the collected registry)
///   2. if the active batch just completed and auto-hide is on, hide its
///      uncollected members
///   3. reveal every batch whose threshold is met (a loop: one pickup may
///      cascade several batches)
///   4. open the exit once every item of the group is collected
///
/// ## Hiding
/// `hide_completed_batches` and `hide_previous_batches` only touch items
/// that are still uncollected. Batches are cut from the group's own items
/// and a batch's quota counts every item before it, so when only shown
/// items can be picked up (as in `step`) everything they would hide is
/// already collected and they hide nothing. They act only when the gate
/// is told about an item that was never shown.
///
/// ## Reset on enter
/// Re-entering a zone configured with `reset_on_enter` restarts its
/// sequence over the zone's still-pending items: counters go back to
/// zero, the first `initial_visible` pending items are shown and the
/// other pending items are hidden. Collected items stay collected. The
/// collected registry is cleared as well (globally unless configured
/// to clear only that zone's members).

use std::collections::HashSet;

use log::{debug, info};

use crate::domain::entity::{CollectibleItem, ExitPoint, ItemId, Visual, ZoneId};
use super::event::GameEvent;
use super::zone::ZoneMap;

/// Per-zone reveal behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealRules {
    pub initial_visible: usize,
    pub batch_size: usize,
    /// Hide a batch's uncollected members once its quota is reached.
    /// See "Hiding" above for when that can happen.
    pub hide_completed_batches: bool,
    /// Hide everything revealed earlier when a new batch appears.
    pub hide_previous_batches: bool,
    pub reset_on_enter: bool,
}

impl Default for RevealRules {
    fn default() -> Self {
        RevealRules {
            initial_visible: 1,
            batch_size: 2,
            hide_completed_batches: false,
            hide_previous_batches: false,
            reset_on_enter: false,
        }
    }
}

/// Gate-wide settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevealSettings {
    /// Rules for the global group when there are no zones.
    pub defaults: RevealRules,
    pub clear_registry_globally: bool,
    pub item_fade: f32,
    pub exit_fade: f32,
}

impl Default for RevealSettings {
    fn default() -> Self {
        RevealSettings {
            defaults: RevealRules::default(),
            clear_registry_globally: true,
            item_fade: 0.6,
            exit_fade: 0.8,
        }
    }
}

/// Counters for one group, as shown on the HUD.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealProgress {
    pub collected: usize,
    /// Index of the first item never revealed in this pass.
    pub next_hidden: usize,
    pub total: usize,
}

#[derive(Clone, Debug)]
struct RevealGroup {
    zone: Option<ZoneId>,
    rules: RevealRules,
    /// All members in reveal order (fixed for the session).
    members: Vec<ItemId>,
    /// Items this pass runs over: every member, or the pending ones after a reset.
    items: Vec<ItemId>,
    collected: usize,
    next_batch: usize,
    hidden_batches: HashSet<usize>,
    exit_open: bool,
    touched: bool,
}

impl RevealGroup {
    fn new(zone: Option<ZoneId>, rules: RevealRules, members: Vec<ItemId>) -> Self {
        let rules = RevealRules { batch_size: rules.batch_size.max(1), ..rules };
        RevealGroup {
            zone,
            rules,
            items: members.clone(),
            members,
            collected: 0,
            next_batch: 0,
            hidden_batches: HashSet::new(),
            exit_open: false,
            touched: false,
        }
    }

    fn initial(&self) -> usize {
        self.rules.initial_visible.min(self.items.len())
    }

    fn batch_count(&self) -> usize {
        let rest = self.items.len() - self.initial();
        rest.div_ceil(self.rules.batch_size)
    }

    fn batch(&self, j: usize) -> &[ItemId] {
        let start = (self.initial() + j * self.rules.batch_size).min(self.items.len());
        let end = (start + self.rules.batch_size).min(self.items.len());
        &self.items[start..end]
    }

    fn activation_threshold(&self, j: usize) -> usize {
        self.rules.initial_visible + self.rules.batch_size * j
    }

    fn next_hidden(&self) -> usize {
        (self.initial() + self.next_batch * self.rules.batch_size).min(self.items.len())
    }
}

pub struct RevealGate {
    groups: Vec<RevealGroup>,
    global: bool,
    registry: HashSet<ItemId>,
    settings: RevealSettings,
}

impl RevealGate {
    pub fn new(zones: &ZoneMap, items: &[CollectibleItem], settings: RevealSettings) -> Self {
        let global = zones.is_empty();
        let groups = if global {
            vec![RevealGroup::new(None, settings.defaults, items.iter().map(|i| i.id).collect())]
        } else {
            zones
                .iter()
                .map(|z| RevealGroup::new(Some(z.id), z.reveal, z.items.clone()))
                .collect()
        };
        RevealGate { groups, global, registry: HashSet::new(), settings }
    }

    /// Apply the initial visibility. Items past the initial set are hidden
    /// at once; groups with no items open their exit straight away.
    pub fn start(&mut self, items: &mut [CollectibleItem], exits: &mut [ExitPoint], events: &mut Vec<GameEvent>) {
        for g in 0..self.groups.len() {
            let group = &self.groups[g];
            let initial = group.initial();
            for id in &group.items[initial..] {
                if let Some(item) = items.get_mut(id.0) {
                    item.interactable = false;
                    item.visual = Visual::hidden();
                }
            }
            // A zero initial set still has its first batch due at count 0.
            self.cascade(g, items, events);
            self.check_exit(g, exits, events);
        }
    }

    pub fn progress(&self, zone: Option<ZoneId>) -> Option<RevealProgress> {
        let g = self.group_index(zone)?;
        let group = &self.groups[g];
        Some(RevealProgress {
            collected: group.collected,
            next_hidden: group.next_hidden(),
            total: group.items.len(),
        })
    }

    pub fn is_exit_open(&self, zone: Option<ZoneId>) -> bool {
        self.group_index(zone).is_some_and(|g| self.groups[g].exit_open)
    }

    pub fn was_collected(&self, item: ItemId) -> bool {
        self.registry.contains(&item)
    }

    /// React to a pickup. Returns false for a duplicate notification.
    pub fn on_item_collected(
        &mut self,
        item: &CollectibleItem,
        items: &mut [CollectibleItem],
        exits: &mut [ExitPoint],
        events: &mut Vec<GameEvent>,
    ) -> bool {
        if !self.registry.insert(item.id) {
            debug!("[Reveal] {} already counted", item.id);
            return false;
        }
        let Some(g) = self.group_index(item.zone) else {
            return true;
        };
        if !self.groups[g].items.contains(&item.id) {
            return true;
        }

        let group = &mut self.groups[g];
        group.collected += 1;
        group.touched = true;
        debug!("[Reveal] {:?}: {}/{}", group.zone, group.collected, group.items.len());

        // Auto-hide the active batch once its quota is met.
        if group.rules.hide_completed_batches && group.next_batch > 0 {
            let active = group.next_batch - 1;
            let complete_at = group.activation_threshold(active) + group.rules.batch_size;
            if group.collected >= complete_at && group.hidden_batches.insert(active) {
                let members = group.batch(active).to_vec();
                hide_items(&members, items, self.settings.item_fade, events);
            }
        }

        self.cascade(g, items, events);
        self.check_exit(g, exits, events);
        true
    }

    /// Restart a zone's sequence when the actor enters it, if configured.
    pub fn on_zone_entered(
        &mut self,
        zone: Option<ZoneId>,
        items: &mut [CollectibleItem],
        exits: &mut [ExitPoint],
        events: &mut Vec<GameEvent>,
    ) {
        if self.global {
            return;
        }
        let Some(g) = self.group_index(zone) else {
            return;
        };
        let group = &self.groups[g];
        if !group.rules.reset_on_enter || !group.touched {
            return;
        }
        self.reset_group(g, items, exits, events);
    }

    // ── Internal ──

    fn group_index(&self, zone: Option<ZoneId>) -> Option<usize> {
        if self.global {
            return Some(0);
        }
        zone.map(|z| z.0).filter(|&g| g < self.groups.len())
    }

    fn cascade(&mut self, g: usize, items: &mut [CollectibleItem], events: &mut Vec<GameEvent>) {
        let fade = self.settings.item_fade;
        let group = &mut self.groups[g];
        while group.next_batch < group.batch_count()
            && group.collected >= group.activation_threshold(group.next_batch)
        {
            let j = group.next_batch;
            if group.rules.hide_previous_batches {
                let earlier = group.items[..group.next_hidden()].to_vec();
                hide_items(&earlier, items, fade, events);
            }
            let mut shown = Vec::new();
            for &id in group.batch(j) {
                if let Some(item) = items.get_mut(id.0).filter(|i| !i.collected) {
                    item.reveal(fade);
                    shown.push(id);
                }
            }
            group.next_batch += 1;
            debug!("[Reveal] {:?}: batch {} revealed {:?}", group.zone, j, shown);
            if !shown.is_empty() {
                events.push(GameEvent::BatchRevealed { zone: group.zone, items: shown });
            }
        }
    }

    fn check_exit(&mut self, g: usize, exits: &mut [ExitPoint], events: &mut Vec<GameEvent>) {
        let group = &mut self.groups[g];
        if group.exit_open || group.collected < group.items.len() {
            return;
        }
        group.exit_open = true;
        for exit in exits.iter_mut().filter(|e| self.global || e.zone == group.zone) {
            exit.open(self.settings.exit_fade);
        }
        info!("[Reveal] {:?}: all items collected, exit open", group.zone);
        events.push(GameEvent::ZoneExitOpened { zone: group.zone });
    }

    fn reset_group(
        &mut self,
        g: usize,
        items: &mut [CollectibleItem],
        exits: &mut [ExitPoint],
        events: &mut Vec<GameEvent>,
    ) {
        let fade = self.settings.item_fade;
        {
            let group = &mut self.groups[g];
            group.items = group
                .members
                .iter()
                .copied()
                .filter(|id| items.get(id.0).is_some_and(|i| !i.collected))
                .collect();
            group.collected = 0;
            group.next_batch = 0;
            group.hidden_batches.clear();
            group.touched = false;

            let initial = group.initial();
            let mut shown = Vec::new();
            for &id in &group.items[..initial] {
                if let Some(item) = items.get_mut(id.0) {
                    item.reveal(fade);
                    shown.push(id);
                }
            }
            hide_items(&group.items[initial..], items, fade, events);
            if !shown.is_empty() {
                events.push(GameEvent::BatchRevealed { zone: group.zone, items: shown });
            }
            info!("[Reveal] {:?}: reset, {} pending", group.zone, group.items.len());
        }

        if self.settings.clear_registry_globally {
            self.registry.clear();
        } else {
            let members = &self.groups[g].members;
            self.registry.retain(|id| !members.contains(id));
        }

        self.cascade(g, items, events);
        self.check_exit(g, exits, events);
    }
}

/// Hide the still-visible, uncollected items among `ids`.
fn hide_items(ids: &[ItemId], items: &mut [CollectibleItem], fade: f32, events: &mut Vec<GameEvent>) {
    for &id in ids {
        if let Some(item) = items.get_mut(id.0).filter(|i| !i.collected && i.interactable) {
            item.hide(fade);
            events.push(GameEvent::ItemHidden { item: id });
        }
    }
}
