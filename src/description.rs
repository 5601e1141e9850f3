//! Requirement and capability sets.
//!
//! A [`Description`] holds at most one [`Property`] per [`PropertyKind`].
//! Adding a property of a kind that is already present fuses both instead of
//! appending; setting one replaces the existing property outright.
//!
//! Descriptions cross layer boundaries during connection setup. A layer that
//! keeps a description handed in by a caller stores a `clone()` of it, so a
//! later mutation on the caller side cannot corrupt an in-flight negotiation.
//!
//! # Negotiation
//!
//! ```text
//!  requirements ──► derive_requirements(capabilities of layer N) ──► layer N-1
//!  requirements ──► remove_capabilities(offer of hop)          ──► rest of path
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PropertyError;
use crate::property::{
    CommunicationType, Datarate, Delay, LossRate, Priority, Property, PropertyKind,
};

/// Ordered, kind-deduplicated collection of properties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Property>", into = "Vec<Property>")]
pub struct Description {
    properties: Vec<Property>,
}

impl Description {
    /// Create an empty (best effort) description
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a description by adding each property in turn
    pub fn from_properties<I>(properties: I) -> Result<Self, PropertyError>
    where
        I: IntoIterator,
        I::Item: Into<Property>,
    {
        let mut description = Self::new();
        for property in properties {
            description.add(property)?;
        }
        Ok(description)
    }

    /// Add a property, fusing it into an existing one of the same kind.
    ///
    /// A failed fuse leaves the description unchanged.
    pub fn add(&mut self, property: impl Into<Property>) -> Result<(), PropertyError> {
        let property = property.into();

        match self.get_mut(property.kind()) {
            Some(existing) => existing.fuse(&property),
            None => {
                self.properties.push(property);
                Ok(())
            },
        }
    }

    /// Add every property of `other`; all or nothing.
    pub fn append(&mut self, other: &Description) -> Result<(), PropertyError> {
        let mut merged = self.clone();
        for property in other {
            merged.add(property.clone())?;
        }

        *self = merged;
        Ok(())
    }

    /// Insert a property, replacing any existing one of the same kind.
    ///
    /// Returns the replaced property.
    pub fn set(&mut self, property: impl Into<Property>) -> Option<Property> {
        let property = property.into();

        match self.get_mut(property.kind()) {
            Some(existing) => Some(std::mem::replace(existing, property)),
            None => {
                self.properties.push(property);
                None
            },
        }
    }

    /// Remove the property of the given kind
    pub fn remove(&mut self, kind: PropertyKind) -> Option<Property> {
        let index = self.properties.iter().position(|p| p.kind() == kind)?;
        Some(self.properties.remove(index))
    }

    /// Get the property of the given kind
    pub fn get(&self, kind: PropertyKind) -> Option<&Property> {
        self.properties.iter().find(|p| p.kind() == kind)
    }

    fn get_mut(&mut self, kind: PropertyKind) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.kind() == kind)
    }

    /// Get a property by its kind name, ignoring case
    pub fn get_by_name(&self, name: &str) -> Option<&Property> {
        PropertyKind::from_name(name).and_then(|kind| self.get(kind))
    }

    /// Data rate property, if present
    pub fn datarate(&self) -> Option<&Datarate> {
        match self.get(PropertyKind::Datarate) {
            Some(Property::Datarate(p)) => Some(p),
            _ => None,
        }
    }

    /// Delay property, if present
    pub fn delay(&self) -> Option<&Delay> {
        match self.get(PropertyKind::Delay) {
            Some(Property::Delay(p)) => Some(p),
            _ => None,
        }
    }

    /// Loss rate property, if present
    pub fn loss_rate(&self) -> Option<&LossRate> {
        match self.get(PropertyKind::LossRate) {
            Some(Property::LossRate(p)) => Some(p),
            _ => None,
        }
    }

    /// Priority property, if present
    pub fn priority(&self) -> Option<&Priority> {
        match self.get(PropertyKind::Priority) {
            Some(Property::Priority(p)) => Some(p),
            _ => None,
        }
    }

    /// Communication type, if present
    pub fn communication_type(&self) -> Option<CommunicationType> {
        match self.get(PropertyKind::CommunicationType) {
            Some(Property::CommunicationType(p)) => Some(*p),
            _ => None,
        }
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if there are no properties
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Property> {
        self.properties.iter()
    }

    /// Copy of all properties that take part in requirement algebra
    pub fn non_functional(&self) -> Description {
        self.filtered(Property::is_non_functional)
    }

    /// Copy of all functional properties
    pub fn functional(&self) -> Description {
        self.filtered(|p| !p.is_non_functional())
    }

    fn filtered(&self, keep: impl Fn(&Property) -> bool) -> Description {
        Description {
            properties: self.properties.iter().filter(|p| keep(p)).cloned().collect(),
        }
    }

    /// Check that no property imposes a binding restriction
    pub fn is_best_effort(&self) -> bool {
        self.properties.iter().all(Property::is_best_effort)
    }

    /// Compare with an optional description; a missing one equals any best
    /// effort description.
    pub fn eq_or_best_effort(&self, other: Option<&Description>) -> bool {
        match other {
            Some(other) => self == other,
            None => self.is_best_effort(),
        }
    }

    /// Residual requirements for the layers beneath a layer with
    /// capabilities `self`.
    ///
    /// Every non-functional requirement with a matching capability is derived
    /// through it; all other requirements pass through unchanged.
    pub fn derive_requirements(
        &self,
        requirements: &Description,
    ) -> Result<Description, PropertyError> {
        self.apply(requirements, |capability, requirement| {
            capability.derive_requirements(requirement)
        })
    }

    /// Requirements `self` left for the rest of the path after `offered`.
    pub fn remove_capabilities(&self, offered: &Description) -> Result<Description, PropertyError> {
        offered.apply(self, |offer, requirement| requirement.remove_capabilities(offer))
    }

    /// Map each non-functional requirement through `op(own property, requirement)`
    fn apply<F>(&self, requirements: &Description, op: F) -> Result<Description, PropertyError>
    where
        F: Fn(&Property, &Property) -> Result<Property, PropertyError>,
    {
        let properties = requirements
            .properties
            .iter()
            .map(|requirement| match self.get(requirement.kind()) {
                Some(own) if requirement.is_non_functional() => op(own, requirement),
                _ => Ok(requirement.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Description { properties })
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Equality ignores insertion order: two descriptions are equal if they hold
/// the same property for every kind.
impl PartialEq for Description {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .properties
                .iter()
                .all(|p| other.get(p.kind()) == Some(p))
    }
}

impl TryFrom<Vec<Property>> for Description {
    type Error = PropertyError;

    fn try_from(properties: Vec<Property>) -> Result<Self, Self::Error> {
        Self::from_properties(properties)
    }
}

impl From<Description> for Vec<Property> {
    fn from(description: Description) -> Self {
        description.properties
    }
}

impl<'a> IntoIterator for &'a Description {
    type Item = &'a Property;
    type IntoIter = std::slice::Iter<'a, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.properties.iter()
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("best effort");
        }

        for (i, property) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{property}")?;
        }
        Ok(())
    }
}
