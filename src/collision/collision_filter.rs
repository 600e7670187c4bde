use bitflags::bitflags;
use crate::bodies::Fixture;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

bitflags! {
    /// A bit mask of collision categories
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct CollisionCategory: u16 {
        /// Default category
        const DEFAULT = 0x0001;

        /// Category 2
        const CATEGORY2 = 0x0002;

        /// Category 3
        const CATEGORY3 = 0x0004;

        /// Category 4
        const CATEGORY4 = 0x0008;

        /// Category 5
        const CATEGORY5 = 0x0010;

        /// Category 6
        const CATEGORY6 = 0x0020;

        /// Category 7
        const CATEGORY7 = 0x0040;

        /// Category 8
        const CATEGORY8 = 0x0080;

        /// All categories
        const ALL = 0xFFFF;
    }
}

impl Default for CollisionCategory {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Contact filtering data attached to a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Filter {
    /// The categories this fixture belongs to
    pub category_bits: CollisionCategory,

    /// The categories this fixture accepts collisions with
    pub mask_bits: CollisionCategory,

    /// Fixtures sharing a non-zero group always collide (positive) or never
    /// collide (negative). Zero defers to the category and mask bits.
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: CollisionCategory::DEFAULT,
            mask_bits: CollisionCategory::ALL,
            group_index: 0,
        }
    }
}

impl Filter {
    /// The default group/category/mask rule
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }

        self.mask_bits.intersects(other.category_bits) && self.category_bits.intersects(other.mask_bits)
    }
}

/// Decides whether two fixtures should be tested for collision. The world
/// consults the installed filter after the body and joint rules.
pub trait ContactFilter {
    /// Returns whether the two fixtures should collide
    fn should_collide(&self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        fixture_a.filter().should_collide(&fixture_b.filter())
    }
}

/// The filter used when none is installed
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultContactFilter;

impl ContactFilter for DefaultContactFilter {}
