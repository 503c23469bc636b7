//! Cross-infoset reductions.
//!
//! Aggregation is the only way a step reads another infoset's signals. It
//! is pull-based and side-effect-free: the result depends only on current
//! storage and immutable tree structure, so a step may aggregate the same
//! signal any number of times per pass.
//!
//! Relations follow sequences, not tree adjacency: the children of
//! `(I, a)` are every infoset whose last owner-of-`I` sequence is `(I, a)`,
//! which skips transparently through infosets of non-matching players.

use crate::*;

/// How matched entries are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Max,
}

/// Which infosets contribute, relative to the aggregating one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Per action: infosets hanging below that sequence. Result is
    /// action-wide.
    Children,
    /// The entries of parent sequences above this infoset. Result is
    /// scalar.
    Parent,
    /// This infoset's own vector, reduced to a scalar.
    Itself,
}

/// Ownership filter on contributing infosets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerFilter {
    Own,
    Opponents,
    All,
}

impl PlayerFilter {
    fn admits(self, own: Player, other: Player) -> bool {
        match self {
            PlayerFilter::Own => other == own,
            PlayerFilter::Opponents => other != own,
            PlayerFilter::All => true,
        }
    }
}

impl Reducer {
    fn fold(self, acc: Option<Utility>, value: Utility) -> Option<Utility> {
        Some(match (self, acc) {
            (_, None) => value,
            (Reducer::Sum, Some(acc)) => acc + value,
            (Reducer::Max, Some(acc)) => acc.max(value),
        })
    }
}

/// Reduce `signal` over the related infosets of `at`. Empty relations
/// yield `padding`.
#[allow(clippy::too_many_arguments)]
pub fn aggregate(
    tree: &GameTree,
    storage: &Storage,
    at: InfosetId,
    signal: Signal,
    reducer: Reducer,
    relation: Relation,
    players: PlayerFilter,
    padding: Utility,
) -> Vector {
    let infoset = tree.infoset(at);
    match relation {
        Relation::Children => {
            let mut out = Vector::fill(infoset.actions, padding);
            for (action, related) in infoset.children.iter().enumerate() {
                let mut acc = None;
                for &child in related {
                    if players.admits(infoset.player, tree.infoset(child).player) {
                        for value in storage.get(child, signal).iter() {
                            acc = reducer.fold(acc, value);
                        }
                    }
                }
                if let Some(acc) = acc {
                    out.set(action, acc);
                }
            }
            out
        }
        Relation::Parent => {
            let mut acc = None;
            for q in 1..=tree.players() {
                if !players.admits(infoset.player, q) {
                    continue;
                }
                for &(parent, action) in &infoset.parents[q - 1] {
                    let value = storage.get(parent, signal);
                    let entry = if value.width() == 1 {
                        value.get(0)
                    } else {
                        value.get(action)
                    };
                    acc = reducer.fold(acc, entry);
                }
            }
            Vector::scalar(acc.unwrap_or(padding))
        }
        Relation::Itself => {
            let mut acc = None;
            for value in storage.get(at, signal).iter() {
                acc = reducer.fold(acc, value);
            }
            Vector::scalar(acc.unwrap_or(padding))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENNIES: &str = "
        node r player 1 actions rh rt
        node rh player 2 actions rhh rht
        node rt player 2 actions rth rtt
        node rhh leaf payoffs 1=1 2=-1
        node rht leaf payoffs 1=-1 2=1
        node rth leaf payoffs 1=-1 2=1
        node rtt leaf payoffs 1=1 2=-1
        infoset rh nodes rt
    ";

    fn setup() -> (GameTree, Storage, InfosetId, InfosetId) {
        let tree = GameTree::from_text(PENNIES).unwrap();
        let storage = Storage::new(&tree, &[Width::Actions]);
        let flip = tree.membership(tree.lookup("r").unwrap()).unwrap();
        let guess = tree.membership(tree.lookup("rh").unwrap()).unwrap();
        (tree, storage, flip, guess)
    }

    #[test]
    fn leaf_infosets_return_padding() {
        let (tree, storage, _, guess) = setup();
        let s = Signal(0);
        let out = aggregate(
            &tree,
            &storage,
            guess,
            s,
            Reducer::Sum,
            Relation::Children,
            PlayerFilter::Own,
            0.0,
        );
        assert_eq!(out.as_slice(), &[0.0, 0.0]);
        let padded = aggregate(
            &tree,
            &storage,
            guess,
            s,
            Reducer::Max,
            Relation::Children,
            PlayerFilter::Own,
            -3.5,
        );
        assert_eq!(padded.as_slice(), &[-3.5, -3.5]);
    }

    #[test]
    fn children_cross_player_boundaries() {
        let (tree, mut storage, flip, guess) = setup();
        let s = Signal(0);
        storage.put(guess, s, Vector::from(vec![2.0, 3.0]));
        // player 2's infoset hangs below both of player 1's sequences
        let out = aggregate(
            &tree,
            &storage,
            flip,
            s,
            Reducer::Sum,
            Relation::Children,
            PlayerFilter::Opponents,
            0.0,
        );
        assert_eq!(out.as_slice(), &[5.0, 5.0]);
        let own = aggregate(
            &tree,
            &storage,
            flip,
            s,
            Reducer::Sum,
            Relation::Children,
            PlayerFilter::Own,
            0.0,
        );
        assert_eq!(own.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn parent_entries_select_the_incoming_action() {
        let (tree, mut storage, flip, guess) = setup();
        let s = Signal(0);
        storage.put(flip, s, Vector::from(vec![0.25, 0.75]));
        // both of the flipper's sequences sit above the guessing infoset
        let out = aggregate(
            &tree,
            &storage,
            guess,
            s,
            Reducer::Sum,
            Relation::Parent,
            PlayerFilter::Opponents,
            1.0,
        );
        assert_eq!(out.as_slice(), &[1.0]);
        let own = aggregate(
            &tree,
            &storage,
            flip,
            s,
            Reducer::Sum,
            Relation::Parent,
            PlayerFilter::Own,
            1.0,
        );
        // the synthetic root holds zeros after allocation
        assert_eq!(own.as_slice(), &[0.0]);
    }

    #[test]
    fn self_relation_reduces_the_own_vector() {
        let (tree, mut storage, flip, _) = setup();
        let s = Signal(0);
        storage.put(flip, s, Vector::from(vec![4.0, -1.0]));
        let sum = aggregate(
            &tree,
            &storage,
            flip,
            s,
            Reducer::Sum,
            Relation::Itself,
            PlayerFilter::Own,
            0.0,
        );
        assert_eq!(sum.as_slice(), &[3.0]);
    }
}
