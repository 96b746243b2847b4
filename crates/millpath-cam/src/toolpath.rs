//! Moves emitted by the generators.

use millpath_math::Point3;
use serde::{Deserialize, Serialize};

/// A single toolpath step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Move {
    /// Cut in a straight line to the position.
    Straight(Point3),
    /// Retract to the safety height before the next cut.
    Safety,
    /// Arc to the position. Never produced by the generators here; kept so
    /// consumers can splice arc moves into the same stream.
    Arc(Point3),
}

impl Move {
    /// Target position, `None` for a safety move.
    pub fn position(&self) -> Option<Point3> {
        match self {
            Move::Straight(p) | Move::Arc(p) => Some(*p),
            Move::Safety => None,
        }
    }
}

/// Output of a generator run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolpathResult {
    /// Moves in machining order.
    pub moves: Vec<Move>,
    /// The progress callback asked to stop; `moves` holds what was finished.
    pub cancelled: bool,
}

impl ToolpathResult {
    /// Number of straight cutting moves.
    pub fn straight_count(&self) -> usize {
        self.moves
            .iter()
            .filter(|m| matches!(m, Move::Straight(_)))
            .count()
    }

    /// Number of safety moves.
    pub fn safety_count(&self) -> usize {
        self.moves.iter().filter(|m| matches!(m, Move::Safety)).count()
    }

    /// Positions of all non-safety moves in order.
    pub fn positions(&self) -> Vec<Point3> {
        self.moves.iter().filter_map(Move::position).collect()
    }

    /// `true` if no move was produced.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_positions() {
        let result = ToolpathResult {
            moves: vec![
                Move::Straight(Point3::new(0.0, 0.0, 1.0)),
                Move::Straight(Point3::new(1.0, 0.0, 1.0)),
                Move::Safety,
                Move::Arc(Point3::new(2.0, 0.0, 1.0)),
            ],
            cancelled: false,
        };
        assert_eq!(result.straight_count(), 2);
        assert_eq!(result.safety_count(), 1);
        assert_eq!(result.positions().len(), 3);
        assert_eq!(result.positions()[2], Point3::new(2.0, 0.0, 1.0));
    }

    #[test]
    fn test_move_serde_roundtrip() {
        let moves = vec![Move::Straight(Point3::new(1.0, 2.0, 3.0)), Move::Safety];
        let json = serde_json::to_string(&moves).unwrap();
        let back: Vec<Move> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, moves);
    }
}
