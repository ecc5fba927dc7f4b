use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{SpaceId, UserId};
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceType {
    Standard,
    Compact,
    Accessible,
    Electric,
}

impl SpaceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Compact => "compact",
            Self::Accessible => "accessible",
            Self::Electric => "electric",
        }
    }

    /// Whether a user with the given requirement may park here.
    /// Users without a requirement are kept out of accessible spaces.
    pub fn suits(self, required: Option<SpaceType>) -> bool {
        match required {
            Some(required) => self == required,
            None => self != Self::Accessible,
        }
    }
}

impl fmt::Display for SpaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpaceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "" => Ok(Self::Standard),
            "compact" => Ok(Self::Compact),
            "accessible" => Ok(Self::Accessible),
            "electric" | "ev" => Ok(Self::Electric),
            other => Err(format!("unknown space type: {other}")),
        }
    }
}

/// A single parking space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingSpace {
    pub id: SpaceId,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub space_type: SpaceType,
    #[serde(default)]
    pub reserved: bool,
    /// Permanent owner of a reserved space. Ignored for unreserved spaces.
    #[serde(default)]
    pub owner: Option<UserId>,
}

impl ParkingSpace {
    pub fn new(id: impl Into<String>, location: impl Into<String>, space_type: SpaceType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id: SpaceId::new(id),
            location: location.into(),
            space_type,
            reserved: false,
            owner: None,
        }
    }

    #[must_use]
    pub fn reserved_for(mut self, owner: Option<UserId>) -> Self {
        self.reserved = true;
        self.owner = owner;
        self
    }

    pub fn reserved_owner(&self) -> Option<&UserId> {
        if self.reserved {
            self.owner.as_ref()
        } else {
            None
        }
    }
}

/// All parking spaces, keyed and iterated by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ParkingSpace>", into = "Vec<ParkingSpace>")]
pub struct ParkingInventory {
    spaces: BTreeMap<SpaceId, ParkingSpace>,
}

impl ParkingInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, space: ParkingSpace) -> Result<(), ModelError> {
        if space.id.as_str().trim().is_empty() {
            return Err(ModelError::EmptyId);
        }
        if self.spaces.contains_key(&space.id) {
            return Err(ModelError::DuplicateSpace(space.id));
        }
        self.spaces.insert(space.id.clone(), space);
        Ok(())
    }

    /// Replaces an existing space, returning the previous version.
    pub fn update(&mut self, space: ParkingSpace) -> Result<ParkingSpace, ModelError> {
        match self.spaces.get_mut(&space.id) {
            Some(existing) => Ok(std::mem::replace(existing, space)),
            None => Err(ModelError::UnknownSpace(space.id)),
        }
    }

    pub fn remove(&mut self, id: &SpaceId) -> Result<ParkingSpace, ModelError> {
        self.spaces
            .remove(id)
            .ok_or_else(|| ModelError::UnknownSpace(id.clone()))
    }

    pub fn get(&self, id: &SpaceId) -> Option<&ParkingSpace> {
        self.spaces.get(id)
    }

    /// Spaces in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ParkingSpace> {
        self.spaces.values()
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn reserved_count(&self) -> usize {
        self.spaces.values().filter(|s| s.reserved).count()
    }

    pub fn count_by_type(&self) -> BTreeMap<SpaceType, usize> {
        let mut counts = BTreeMap::new();
        for space in self.spaces.values() {
            *counts.entry(space.space_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn group_by_location(&self) -> BTreeMap<&str, Vec<&ParkingSpace>> {
        let mut groups: BTreeMap<&str, Vec<&ParkingSpace>> = BTreeMap::new();
        for space in self.spaces.values() {
            groups.entry(space.location.as_str()).or_default().push(space);
        }
        groups
    }
}

impl TryFrom<Vec<ParkingSpace>> for ParkingInventory {
    type Error = ModelError;

    fn try_from(spaces: Vec<ParkingSpace>) -> Result<Self, Self::Error> {
        let mut inventory = Self::new();
        for space in spaces {
            inventory.add(space)?;
        }
        Ok(inventory)
    }
}

impl From<ParkingInventory> for Vec<ParkingSpace> {
    fn from(inventory: ParkingInventory) -> Self {
        inventory.spaces.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inventory() -> ParkingInventory {
        ParkingInventory::try_from(vec![
            ParkingSpace::new("B01", "Level 1", SpaceType::Compact),
            ParkingSpace::new("A01", "Level 1", SpaceType::Standard),
            ParkingSpace::new("C01", "Level 2", SpaceType::Standard)
                .reserved_for(Some(UserId::new("john"))),
            ParkingSpace::new("D01", "Level 2", SpaceType::Accessible),
        ])
        .unwrap()
    }

    #[test]
    fn test_iteration_is_ordered_by_id() {
        let inventory = sample_inventory();
        let ids: Vec<&str> = inventory.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A01", "B01", "C01", "D01"]);
    }

    #[test]
    fn test_duplicate_space_rejected() {
        let mut inventory = sample_inventory();
        let result = inventory.add(ParkingSpace::new("A01", "Level 3", SpaceType::Electric));
        assert_eq!(result, Err(ModelError::DuplicateSpace(SpaceId::new("A01"))));
        assert_eq!(inventory.len(), 4);
    }

    #[test]
    fn test_update_and_remove_unknown_space() {
        let mut inventory = sample_inventory();
        let missing = ParkingSpace::new("Z99", "Level 9", SpaceType::Standard);
        assert!(matches!(inventory.update(missing), Err(ModelError::UnknownSpace(_))));
        assert!(inventory.remove(&SpaceId::new("Z99")).is_err());

        let moved = ParkingSpace::new("A01", "Level 3", SpaceType::Standard);
        let previous = inventory.update(moved).unwrap();
        assert_eq!(previous.location, "Level 1");
        assert_eq!(inventory.get(&SpaceId::new("A01")).unwrap().location, "Level 3");
    }

    #[test]
    fn test_summaries() {
        let inventory = sample_inventory();
        let by_type = inventory.count_by_type();
        assert_eq!(by_type.get(&SpaceType::Standard), Some(&2));
        assert_eq!(by_type.get(&SpaceType::Electric), None);
        assert_eq!(inventory.reserved_count(), 1);

        let groups = inventory.group_by_location();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["Level 2"].len(), 2);
    }

    #[test]
    fn test_owner_only_counts_when_reserved() {
        let mut space = ParkingSpace::new("A02", "Level 1", SpaceType::Standard);
        space.owner = Some(UserId::new("jane"));
        assert_eq!(space.reserved_owner(), None);

        let reserved = space.reserved_for(Some(UserId::new("jane")));
        assert_eq!(reserved.reserved_owner(), Some(&UserId::new("jane")));
    }

    #[test]
    fn test_space_type_suitability() {
        assert!(SpaceType::Standard.suits(None));
        assert!(!SpaceType::Accessible.suits(None));
        assert!(SpaceType::Accessible.suits(Some(SpaceType::Accessible)));
        assert!(!SpaceType::Compact.suits(Some(SpaceType::Electric)));
    }
}
