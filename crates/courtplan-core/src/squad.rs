// Squad representation: members, sunk prices, captaincy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, PlayerId, Position};
use crate::config::LeagueRules;
use crate::error::{OptimizeError, Stage};

/// One entry of the upstream `picks` array for the manager's current squad.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPick {
    pub element: PlayerId,
    /// Slot number (1-based) in the upstream squad ordering.
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub selling_price: Option<u32>,
    #[serde(default)]
    pub purchase_price: Option<u32>,
    #[serde(default)]
    pub multiplier: u32,
    #[serde(default)]
    pub is_captain: bool,
    #[serde(default)]
    pub is_vice_captain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquadMember {
    pub id: PlayerId,
    /// What the game pays out if this player is sold.
    pub selling_price: i64,
    /// What the manager originally paid.
    pub purchase_price: i64,
    pub is_captain: bool,
    pub is_vice_captain: bool,
}

impl SquadMember {
    /// A member bought at `price` with no captaincy.
    pub fn bought(id: PlayerId, price: i64) -> Self {
        SquadMember {
            id,
            selling_price: price,
            purchase_price: price,
            is_captain: false,
            is_vice_captain: false,
        }
    }
}

/// An ordered set of squad slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Squad {
    members: Vec<SquadMember>,
}

impl Squad {
    pub fn new(members: Vec<SquadMember>) -> Self {
        Squad { members }
    }

    /// Build a freshly bought squad from selected player ids at current prices.
    /// Ids missing from the catalog are skipped.
    pub fn from_selection(ids: &[PlayerId], catalog: &Catalog) -> Self {
        let members = ids
            .iter()
            .filter_map(|&id| catalog.player(id))
            .map(|p| SquadMember::bought(p.id, p.cost))
            .collect();
        Squad { members }
    }

    /// Build the manager's current squad from upstream picks.
    ///
    /// An empty pick list is a valid empty squad. Otherwise the picks must
    /// fill the squad exactly, reference catalog players, not repeat, and
    /// match the position quotas.
    /// Missing selling/purchase prices default to the current price.
    pub fn from_picks(picks: &[RawPick], catalog: &Catalog, rules: &LeagueRules) -> Result<Self, OptimizeError> {
        if picks.is_empty() {
            return Ok(Squad::default());
        }
        if picks.len() != rules.squad_size {
            return Err(OptimizeError::validation(
                Stage::Request,
                format!(
                    "picks must be empty or contain exactly {} players, got {}",
                    rules.squad_size,
                    picks.len()
                ),
            ));
        }

        let mut ordered: Vec<&RawPick> = picks.iter().collect();
        ordered.sort_by_key(|p| p.position);

        let mut seen = BTreeSet::new();
        let mut per_position = [0usize; 2];
        let mut members = Vec::with_capacity(ordered.len());
        for pick in ordered {
            let player = catalog.player(pick.element).ok_or_else(|| {
                OptimizeError::validation(
                    Stage::Request,
                    format!("pick references unknown player {}", pick.element),
                )
            })?;
            if !seen.insert(pick.element) {
                return Err(OptimizeError::validation(
                    Stage::Request,
                    format!("player {} is picked more than once", pick.element),
                ));
            }
            let selling_price = pick.selling_price.map_or(player.cost, i64::from);
            members.push(SquadMember {
                id: pick.element,
                selling_price,
                purchase_price: pick.purchase_price.map_or(selling_price, i64::from),
                is_captain: pick.is_captain,
                is_vice_captain: pick.is_vice_captain,
            });
            per_position[player.position.index()] += 1;
        }

        for position in Position::ALL {
            let count = per_position[position.index()];
            let quota = rules.squad_quota.get(position);
            if count < quota.min || count > quota.max {
                return Err(OptimizeError::validation(
                    Stage::Request,
                    format!(
                        "picks hold {count} {position} players, the quota is {} to {}",
                        quota.min, quota.max
                    ),
                ));
            }
        }

        Ok(Squad { members })
    }

    pub fn members(&self) -> &[SquadMember] {
        &self.members
    }

    pub fn ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.members.iter().map(|m| m.id)
    }

    pub fn member(&self, id: PlayerId) -> Option<&SquadMember> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.member(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn captain(&self) -> Option<PlayerId> {
        self.members.iter().find(|m| m.is_captain).map(|m| m.id)
    }

    pub fn vice_captain(&self) -> Option<PlayerId> {
        self.members.iter().find(|m| m.is_vice_captain).map(|m| m.id)
    }

    /// Sum of current catalog prices.
    pub fn total_cost(&self, catalog: &Catalog) -> i64 {
        self.ids()
            .filter_map(|id| catalog.player(id))
            .map(|p| p.cost)
            .sum()
    }

    /// Replace `out` with `incoming` in the same slot. Captaincy held by the
    /// outgoing player is dropped; call `repair_captaincy` afterwards.
    /// Returns `false` when `out` is not in the squad.
    pub fn swap(&mut self, out: PlayerId, incoming: SquadMember) -> bool {
        match self.members.iter_mut().find(|m| m.id == out) {
            Some(slot) => {
                *slot = SquadMember {
                    is_captain: false,
                    is_vice_captain: false,
                    ..incoming
                };
                true
            }
            None => false,
        }
    }

    /// Make sure there is exactly one captain and one distinct vice-captain.
    ///
    /// A missing captain goes to the highest `value` player; a missing or
    /// clashing vice-captain goes to the highest `value` player who is not
    /// captain. Ties go to the lower id.
    pub fn repair_captaincy<F>(&mut self, value: F)
    where
        F: Fn(PlayerId) -> i64,
    {
        if self.members.is_empty() {
            return;
        }

        let captains = self.members.iter().filter(|m| m.is_captain).count();
        if captains != 1 {
            let best = self.best_member(&value, None);
            for m in &mut self.members {
                m.is_captain = Some(m.id) == best;
            }
        }

        let captain = self.captain();
        let vices = self.members.iter().filter(|m| m.is_vice_captain).count();
        if vices != 1 || self.vice_captain() == captain {
            let best = self.best_member(&value, captain);
            for m in &mut self.members {
                m.is_vice_captain = Some(m.id) == best;
            }
        }
    }

    fn best_member<F>(&self, value: &F, skip: Option<PlayerId>) -> Option<PlayerId>
    where
        F: Fn(PlayerId) -> i64,
    {
        self.members
            .iter()
            .filter(|m| Some(m.id) != skip)
            .max_by(|a, b| value(a.id).cmp(&value(b.id)).then(b.id.cmp(&a.id)))
            .map(|m| m.id)
    }
}
