//! Neighbor-pattern classification for grid tiles.
//!
//! A tile's same-kind cardinal neighbors form a set; the set (in its
//! canonical, order-free form) selects a variant from [`AUTOTILE_MAP`].

/// Cardinal unit offsets, in the order their bits are assigned.
pub const CARDINAL_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

const RIGHT: u8 = 0b0001;
const LEFT: u8 = 0b0010;
const DOWN: u8 = 0b0100;
const UP: u8 = 0b1000;

/// A subset of the four cardinal directions. Two sets built from the same
/// offsets in any order compare equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NeighborSet(u8);

impl NeighborSet {
    pub const EMPTY: Self = Self(0);

    pub fn from_offsets(offsets: &[(i32, i32)]) -> Self {
        let mut set = Self::EMPTY;
        for &offset in offsets {
            set.insert(offset);
        }
        set
    }

    /// Non-cardinal offsets are ignored.
    pub fn insert(&mut self, offset: (i32, i32)) {
        self.0 |= match offset {
            (1, 0) => RIGHT,
            (-1, 0) => LEFT,
            (0, 1) => DOWN,
            (0, -1) => UP,
            _ => 0,
        };
    }

    pub fn contains(&self, offset: (i32, i32)) -> bool {
        let bit = match offset {
            (1, 0) => RIGHT,
            (-1, 0) => LEFT,
            (0, 1) => DOWN,
            (0, -1) => UP,
            _ => return false,
        };
        self.0 & bit != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Offsets sorted ascending, the textual canonical form.
    pub fn sorted_offsets(&self) -> Vec<(i32, i32)> {
        let mut offsets: Vec<(i32, i32)> = CARDINAL_OFFSETS
            .iter()
            .copied()
            .filter(|&offset| self.contains(offset))
            .collect();
        offsets.sort_unstable();
        offsets
    }
}

/// Pattern table. Variants 0..=8 walk the edge pieces of a filled block
/// clockwise from the top-left corner, 8 being the interior. The last two
/// rows cap the ends of a one-tile-high horizontal run.
pub const AUTOTILE_MAP: [(NeighborSet, usize); 11] = [
    (NeighborSet(RIGHT | DOWN), 0),
    (NeighborSet(RIGHT | DOWN | LEFT), 1),
    (NeighborSet(LEFT | DOWN), 2),
    (NeighborSet(LEFT | UP | DOWN), 3),
    (NeighborSet(LEFT | UP), 4),
    (NeighborSet(LEFT | UP | RIGHT), 5),
    (NeighborSet(RIGHT | UP), 6),
    (NeighborSet(RIGHT | UP | DOWN), 7),
    (NeighborSet(RIGHT | LEFT | DOWN | UP), 8),
    (NeighborSet(RIGHT), 6),
    (NeighborSet(LEFT), 4),
];

/// `None` for configurations the table has no entry for.
pub fn variant_for(neighbors: NeighborSet) -> Option<usize> {
    AUTOTILE_MAP
        .iter()
        .find(|(pattern, _)| *pattern == neighbors)
        .map(|&(_, variant)| variant)
}
