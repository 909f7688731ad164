/// Breaks the board-level group of rotational symmetries by forbidding
/// three of the four rotations at a designated anchor cell.
///
/// The restriction applies only to searched candidates while the trail is
/// still empty; forced placements (singletons, checkpoint replay) are never
/// filtered.
#[derive(Clone, Debug)]
pub struct SymmetryBreaker {
    anchor: (usize, usize),
    allowed: [bool; 4],
    enabled: bool,
}

impl SymmetryBreaker {
    /// The standard discipline: anchor at `(0, 0)`, rotation 0 only.
    pub fn standard() -> Self {
        Self {
            anchor: (0, 0),
            allowed: [true, false, false, false],
            enabled: true,
        }
    }

    /// A breaker that admits everything.
    pub fn disabled() -> Self {
        Self {
            anchor: (0, 0),
            allowed: [true; 4],
            enabled: false,
        }
    }

    /// A breaker with a custom anchor and allowed rotation set.
    pub fn new(anchor: (usize, usize), allowed: [bool; 4]) -> Self {
        debug_assert!(allowed.iter().any(|&a| a), "No rotation admitted");
        Self {
            anchor,
            allowed,
            enabled: true,
        }
    }

    /// The cell the engine opens the search at when the board is empty.
    pub fn anchor(&self) -> (usize, usize) {
        self.anchor
    }

    /// Is the breaker active?
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// May a searched candidate with `rotation` be tried at `(r, c)` when
    /// `first_placement` says the trail is still empty?
    pub fn admits(&self, first_placement: bool, r: usize, c: usize, rotation: u8) -> bool {
        if !self.enabled || !first_placement || (r, c) != self.anchor {
            return true;
        }
        self.allowed[usize::from(rotation)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_pins_rotation_zero_at_the_anchor() {
        let breaker = SymmetryBreaker::standard();
        assert!(breaker.admits(true, 0, 0, 0));
        for rotation in 1..4 {
            assert!(!breaker.admits(true, 0, 0, rotation));
        }
    }

    #[test]
    fn only_the_first_placement_is_restricted() {
        let breaker = SymmetryBreaker::standard();
        for rotation in 0..4 {
            assert!(breaker.admits(false, 0, 0, rotation));
            assert!(breaker.admits(true, 1, 2, rotation));
        }
    }

    #[test]
    fn disabled_admits_everything() {
        let breaker = SymmetryBreaker::disabled();
        for rotation in 0..4 {
            assert!(breaker.admits(true, 0, 0, rotation));
        }
    }
}
