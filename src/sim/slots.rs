/// Item slot rules: what collecting a particular item grants.
///
/// ## Matching
/// ┌──────┬──────────────────────────────────────────────┐
/// │ Pass │ Rule                                          │
/// ├──────┼──────────────────────────────────────────────┤
/// │ 1    │ slot references this exact item               │
/// │ 2    │ tags equal (slot tag non-empty, not default)  │
/// │ 3    │ item name contains slot name (or vice versa)  │
/// └──────┴──────────────────────────────────────────────┘
/// Each pass scans every live slot before the next pass starts; the
/// first hit wins. Slots marked `consume_on_collect` are cleared after
/// firing and can never match again.

use log::debug;

use crate::domain::entity::{CollectibleItem, ItemId};

/// Tag value meaning "no tag".
pub const DEFAULT_TAG: &str = "Untagged";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SlotEffect {
    ExtraTurns(u32),
    /// Collecting the item counts as a key.
    UnlockObstacle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlotRule {
    pub name: String,
    pub tag: String,
    pub item: Option<ItemId>,
    pub effect: SlotEffect,
    pub consume_on_collect: bool,
    /// Optional line shown when the slot fires.
    pub message: Option<String>,
}

impl SlotRule {
    pub fn new(effect: SlotEffect) -> Self {
        SlotRule {
            name: String::new(),
            tag: String::new(),
            item: None,
            effect,
            consume_on_collect: false,
            message: None,
        }
    }

    fn matches_identity(&self, item: &CollectibleItem) -> bool {
        self.item == Some(item.id)
    }

    fn matches_tag(&self, item: &CollectibleItem) -> bool {
        !self.tag.is_empty() && self.tag != DEFAULT_TAG && self.tag == item.tag
    }

    fn matches_name(&self, item: &CollectibleItem) -> bool {
        if self.name.is_empty() || item.name.is_empty() {
            return false;
        }
        item.name.contains(&self.name) || self.name.contains(&item.name)
    }
}

/// A slot that fired.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotHit {
    pub effect: SlotEffect,
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SlotTable {
    slots: Vec<Option<SlotRule>>,
}

impl SlotTable {
    pub fn new(rules: Vec<SlotRule>) -> Self {
        SlotTable { slots: rules.into_iter().map(Some).collect() }
    }

    pub fn live(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Index of the first live slot matching `item`.
    pub fn find(&self, item: &CollectibleItem) -> Option<usize> {
        let passes: [fn(&SlotRule, &CollectibleItem) -> bool; 3] =
            [SlotRule::matches_identity, SlotRule::matches_tag, SlotRule::matches_name];
        passes.iter().find_map(|pass| {
            self.slots
                .iter()
                .position(|s| s.as_ref().is_some_and(|rule| pass(rule, item)))
        })
    }

    /// Fire the slot matching `item`, clearing it if consumable.
    pub fn fire(&mut self, item: &CollectibleItem) -> Option<SlotHit> {
        let idx = self.find(item)?;
        let slot = &mut self.slots[idx];
        let rule = slot.as_ref()?;
        let hit = SlotHit { effect: rule.effect, message: rule.message.clone() };
        debug!("[Slots] {} '{}' matched slot {} -> {:?}", item.id, item.name, idx, hit.effect);
        if rule.consume_on_collect {
            *slot = None;
        }
        Some(hit)
    }
}

/// Key classification, first match wins: key slot, explicit marker,
/// then a case-insensitive "key" in the item name.
pub fn is_key(item: &CollectibleItem, hit: Option<&SlotHit>) -> bool {
    if hit.is_some_and(|h| h.effect == SlotEffect::UnlockObstacle) {
        return true;
    }
    item.key_marker || item.name.to_ascii_lowercase().contains("key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geom::Cell;

    fn item(id: usize, name: &str, tag: &str) -> CollectibleItem {
        CollectibleItem::new(ItemId(id), name, tag, Cell::new(0, 0))
    }

    fn named(name: &str, turns: u32) -> SlotRule {
        SlotRule { name: name.into(), ..SlotRule::new(SlotEffect::ExtraTurns(turns)) }
    }

    #[test]
    fn identity_beats_tag_beats_name() {
        let by_name = named("hourglass", 1);
        let by_tag = SlotRule { tag: "bonus".into(), ..SlotRule::new(SlotEffect::ExtraTurns(2)) };
        let by_id = SlotRule { item: Some(ItemId(7)), ..SlotRule::new(SlotEffect::ExtraTurns(3)) };
        let table = SlotTable::new(vec![by_name, by_tag, by_id]);

        assert_eq!(table.find(&item(7, "hourglass", "bonus")), Some(2));
        assert_eq!(table.find(&item(1, "hourglass", "bonus")), Some(1));
        assert_eq!(table.find(&item(1, "big hourglass", "star")), Some(0));
        assert_eq!(table.find(&item(1, "star", "star")), None);
    }

    #[test]
    fn default_and_empty_tags_never_match() {
        let table = SlotTable::new(vec![
            SlotRule { tag: DEFAULT_TAG.into(), ..SlotRule::new(SlotEffect::ExtraTurns(1)) },
            SlotRule::new(SlotEffect::ExtraTurns(1)),
        ]);
        assert_eq!(table.find(&item(0, "star", DEFAULT_TAG)), None);
        assert_eq!(table.find(&item(0, "star", "")), None);
    }

    #[test]
    fn name_containment_either_way() {
        let table = SlotTable::new(vec![named("glass", 1)]);
        assert!(table.find(&item(0, "hourglass", "x")).is_some());
        let table = SlotTable::new(vec![named("hourglass", 1)]);
        assert!(table.find(&item(0, "glass", "x")).is_some());
    }

    #[test]
    fn consume_on_collect_fires_once() {
        let mut table = SlotTable::new(vec![SlotRule {
            consume_on_collect: true,
            ..named("hourglass", 2)
        }]);
        let a = item(0, "hourglass", "bonus");
        let b = item(1, "hourglass", "bonus");
        assert_eq!(table.fire(&a).map(|h| h.effect), Some(SlotEffect::ExtraTurns(2)));
        assert_eq!(table.fire(&b), None);
        assert_eq!(table.live(), 0);
    }

    #[test]
    fn reusable_slot_keeps_firing() {
        let mut table = SlotTable::new(vec![named("hourglass", 1)]);
        for id in 0..3 {
            assert!(table.fire(&item(id, "hourglass", "")).is_some());
        }
        assert_eq!(table.live(), 1);
    }

    #[test]
    fn key_classification_order() {
        let hit = SlotHit { effect: SlotEffect::UnlockObstacle, message: None };
        assert!(is_key(&item(0, "star", ""), Some(&hit)));

        let mut marked = item(0, "star", "");
        marked.key_marker = true;
        assert!(is_key(&marked, None));

        assert!(is_key(&item(0, "Rusty KEY", ""), None));
        let turns = SlotHit { effect: SlotEffect::ExtraTurns(1), message: None };
        assert!(!is_key(&item(0, "star", ""), Some(&turns)));
    }
}
