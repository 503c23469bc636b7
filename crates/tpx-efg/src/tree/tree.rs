use crate::*;
use anyhow::{bail, ensure, Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// An extensive-form game tree, immutable after load.
///
/// Vertices carry [`Spot`] payloads; edge weights are action indices, so
/// child order is positional. Construction precomputes everything traversal
/// and aggregation need: a BFS order (parents before children), the infoset
/// arena with parent/child sequence relations, and a per-node ancestry table
/// mapping each player to their last sequence above that node.
#[derive(Debug)]
pub struct GameTree {
    graph: DiGraph<Spot, usize>,
    ids: HashMap<String, NodeIndex>,
    root: NodeIndex,
    players: usize,
    bfs: Vec<NodeIndex>,
    infosets: Vec<Infoset>,
    membership: Vec<Option<InfosetId>>,
    ancestry: Vec<Vec<Sequence>>,
    order: Vec<InfosetId>,
}

impl GameTree {
    pub fn from_file(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read game description '{}'", path))?;
        Self::from_text(&text)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_records(parse::records(text)?)
    }

    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        let players = count_players(&records)?;
        let (graph, ids) = assemble(&records, players)?;
        let root = find_root(&graph)?;
        let bfs = breadth_first(&graph, root)?;
        let (infosets, membership) = partition(&graph, &records, &ids, &bfs, players)?;
        let ancestry = ancestry(&graph, &bfs, &membership, players);
        let mut tree = Self {
            graph,
            ids,
            root,
            players,
            bfs,
            infosets,
            membership,
            ancestry,
            order: Vec::new(),
        };
        tree.link()?;
        tree.weigh();
        Ok(tree)
    }

    // structure accessors

    pub fn root(&self) -> NodeIndex {
        self.root
    }
    /// Number of real players; chance is seat 0 and not counted.
    pub fn players(&self) -> usize {
        self.players
    }
    pub fn spot(&self, v: NodeIndex) -> &Spot {
        &self.graph[v]
    }
    pub fn lookup(&self, id: &str) -> Option<NodeIndex> {
        self.ids.get(id).copied()
    }
    /// Nodes in BFS order: parents strictly before children.
    pub fn bfs(&self) -> &[NodeIndex] {
        &self.bfs
    }
    /// Outgoing edges as `(action, child)`, in action order.
    pub fn children(&self, v: NodeIndex) -> Vec<(usize, NodeIndex)> {
        let mut out = self
            .graph
            .edges(v)
            .map(|e| (*e.weight(), e.target()))
            .collect::<Vec<_>>();
        out.sort_by_key(|&(a, _)| a);
        out
    }
    /// Probability of a chance node's outcome edge.
    pub fn chance_prob(&self, v: NodeIndex, action: usize) -> Probability {
        match &self.graph[v].kind {
            Kind::Chance { probs } => probs[action],
            _ => unreachable!("chance probability of a non-chance node"),
        }
    }

    // infoset accessors

    pub fn infosets(&self) -> &[Infoset] {
        &self.infosets
    }
    pub fn infoset(&self, id: InfosetId) -> &Infoset {
        &self.infosets[id]
    }
    /// The infoset containing a decision node.
    pub fn membership(&self, v: NodeIndex) -> Option<InfosetId> {
        self.membership[v.index()]
    }
    /// A player's synthetic root infoset.
    pub fn root_infoset(&self, player: Player) -> InfosetId {
        player - 1
    }
    pub fn is_root_infoset(&self, id: InfosetId) -> bool {
        id < self.players
    }
    /// The last sequence of `player` on the path from the root to `v`,
    /// exclusive of `v` itself.
    pub fn sequence(&self, v: NodeIndex, player: Player) -> Sequence {
        self.ancestry[v.index()][player - 1]
    }
    /// Infosets ordered so that every parent relation points backward.
    pub fn order(&self) -> &[InfosetId] {
        &self.order
    }

    /// Resolve parent sequences and child lists, and fix the infoset order.
    fn link(&mut self) -> Result<()> {
        let position = self
            .bfs
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, i))
            .collect::<HashMap<_, _>>();
        for i in self.players..self.infosets.len() {
            let player = self.infosets[i].player;
            let mut parents = vec![Vec::new(); self.players];
            for &member in &self.infosets[i].members {
                for q in 1..=self.players {
                    let seq = self.ancestry[member.index()][q - 1];
                    if !parents[q - 1].contains(&seq) {
                        parents[q - 1].push(seq);
                    }
                }
            }
            ensure!(
                parents[player - 1].len() == 1,
                "infoset '{}' violates perfect recall: its members disagree \
                 on the owner's preceding sequence",
                self.infosets[i].label
            );
            self.infosets[i].parent = Some(parents[player - 1][0]);
            self.infosets[i].parents = parents;
        }
        let mut links = Vec::new();
        for (j, infoset) in self.infosets.iter().enumerate().skip(self.players) {
            for set in &infoset.parents {
                for &(i, b) in set {
                    links.push((i, b, j));
                }
            }
        }
        for (i, b, j) in links {
            self.infosets[i].children[b].push(j);
        }
        let mut order = (self.players..self.infosets.len()).collect::<Vec<_>>();
        order.sort_by_key(|&i| {
            self.infosets[i]
                .members
                .iter()
                .map(|v| position[v])
                .min()
                .unwrap_or(usize::MAX)
        });
        self.order = (0..self.players).chain(order).collect();
        Ok(())
    }

    /// Compute balanced-exploration subtree weights, leaves upward.
    ///
    /// Per action: one for the sequence itself plus the sizes of the
    /// own-player infosets below it. `size` counts leaf sequences only, so
    /// an action with descendants contributes their sizes and nothing more.
    fn weigh(&mut self) {
        for idx in (0..self.order.len()).rev() {
            let i = self.order[idx];
            let actions = self.infosets[i].actions;
            let mut subtree = vec![0.0; actions];
            let mut size = 0.0;
            for (a, weight) in subtree.iter_mut().enumerate() {
                let below = self.infosets[i]
                    .descend(self, a)
                    .map(|c| self.infosets[c].size)
                    .sum::<Utility>();
                *weight = 1.0 + below;
                size += if below > 0.0 { below } else { 1.0 };
            }
            self.infosets[i].subtree = subtree;
            self.infosets[i].size = size;
        }
    }
}

/// Real players are the decision owners; payoff indices must stay in range.
fn count_players(records: &[Record]) -> Result<usize> {
    let players = records
        .iter()
        .filter_map(|r| match r {
            Record::Decision { player, .. } => Some(*player),
            _ => None,
        })
        .max()
        .context("game description declares no decision nodes")?;
    for record in records {
        if let Record::Leaf { id, payoffs } = record {
            for &(p, _) in payoffs {
                ensure!(
                    p >= 1 && p <= players,
                    "node '{}' pays player {} but only players 1..={} act",
                    id,
                    p,
                    players
                );
            }
        }
    }
    Ok(players)
}

fn assemble(
    records: &[Record],
    players: usize,
) -> Result<(DiGraph<Spot, usize>, HashMap<String, NodeIndex>)> {
    let mut graph = DiGraph::new();
    let mut ids = HashMap::new();
    let mut branches = Vec::new();
    for record in records {
        let (id, kind, children) = match record {
            Record::Leaf { id, payoffs } => {
                let mut paid = vec![0.0; players];
                for &(p, v) in payoffs {
                    paid[p - 1] = v;
                }
                (id, Kind::Terminal { payoffs: paid }, Vec::new())
            }
            Record::Chance { id, outcomes } => {
                let sum = outcomes.iter().map(|&(_, p)| p).sum::<Probability>();
                ensure!(
                    (sum - 1.0).abs() <= CHANCE_TOLERANCE,
                    "chance node '{}' has outcome probabilities summing to {}",
                    id,
                    sum
                );
                let probs = outcomes.iter().map(|&(_, p)| p / sum).collect();
                let children = outcomes.iter().map(|(c, _)| c.clone()).collect();
                (id, Kind::Chance { probs }, children)
            }
            Record::Decision {
                id,
                player,
                children,
            } => (id, Kind::Decision { player: *player }, children.clone()),
            Record::Partition { .. } => continue,
        };
        ensure!(!ids.contains_key(id), "duplicate node id '{}'", id);
        let v = graph.add_node(Spot {
            id: id.clone(),
            kind,
        });
        ids.insert(id.clone(), v);
        branches.push((v, children));
    }
    for (v, children) in branches {
        for (action, child) in children.iter().enumerate() {
            let c = *ids
                .get(child)
                .with_context(|| format!("undeclared child node '{}'", child))?;
            ensure!(
                graph.edges_directed(c, petgraph::Incoming).next().is_none(),
                "node '{}' has multiple parents",
                child
            );
            graph.add_edge(v, c, action);
        }
    }
    Ok((graph, ids))
}

fn find_root(graph: &DiGraph<Spot, usize>) -> Result<NodeIndex> {
    let mut roots = graph.node_indices().filter(|&v| {
        graph
            .edges_directed(v, petgraph::Incoming)
            .next()
            .is_none()
    });
    let root = roots
        .next()
        .context("no root node: every node is referenced as a child")?;
    if let Some(stray) = roots.next() {
        bail!("node '{}' is unreachable from the root", graph[stray].id);
    }
    Ok(root)
}

/// BFS in action order, verifying full reachability.
fn breadth_first(graph: &DiGraph<Spot, usize>, root: NodeIndex) -> Result<Vec<NodeIndex>> {
    let mut order = Vec::with_capacity(graph.node_count());
    let mut queue = std::collections::VecDeque::from([root]);
    while let Some(v) = queue.pop_front() {
        order.push(v);
        let mut edges = graph.edges(v).map(|e| (*e.weight(), e.target())).collect::<Vec<_>>();
        edges.sort_by_key(|&(a, _)| a);
        queue.extend(edges.into_iter().map(|(_, c)| c));
    }
    ensure!(
        order.len() == graph.node_count(),
        "game description contains nodes unreachable from the root"
    );
    Ok(order)
}

/// Build the infoset arena: synthetic per-player roots first, then declared
/// partitions, then auto-wrapped singletons for uncovered decision nodes.
fn partition(
    graph: &DiGraph<Spot, usize>,
    records: &[Record],
    ids: &HashMap<String, NodeIndex>,
    bfs: &[NodeIndex],
    players: usize,
) -> Result<(Vec<Infoset>, Vec<Option<InfosetId>>)> {
    let mut infosets = Vec::new();
    let mut membership = vec![None; graph.node_count()];
    for player in 1..=players {
        infosets.push(Infoset {
            player,
            label: format!("~root:{}", player),
            members: Vec::new(),
            actions: 1,
            parent: None,
            parents: vec![Vec::new(); players],
            children: vec![Vec::new()],
            subtree: vec![0.0],
            size: 0.0,
        });
    }
    let mut declare = |members: Vec<NodeIndex>,
                       label: String,
                       infosets: &mut Vec<Infoset>,
                       membership: &mut Vec<Option<InfosetId>>|
     -> Result<()> {
        let canonical = members[0];
        let player = match graph[canonical].kind {
            Kind::Decision { player } => player,
            _ => bail!(
                "non-decision node '{}' listed in infoset '{}'",
                graph[canonical].id,
                label
            ),
        };
        let actions = graph.edges(canonical).count();
        for &v in &members {
            match graph[v].kind {
                Kind::Decision { player: p } => {
                    ensure!(
                        p == player,
                        "infoset '{}' mixes players {} and {}",
                        label,
                        player,
                        p
                    );
                }
                _ => bail!(
                    "non-decision node '{}' listed in infoset '{}'",
                    graph[v].id,
                    label
                ),
            }
            ensure!(
                graph.edges(v).count() == actions,
                "infoset '{}' members disagree on action count",
                label
            );
            ensure!(
                membership[v.index()].is_none(),
                "node '{}' assigned to multiple infosets",
                graph[v].id
            );
            membership[v.index()] = Some(infosets.len());
        }
        infosets.push(Infoset {
            player,
            label,
            members,
            actions,
            parent: None,
            parents: Vec::new(),
            children: vec![Vec::new(); actions],
            subtree: vec![0.0; actions],
            size: 0.0,
        });
        Ok(())
    };
    for record in records {
        if let Record::Partition { canonical, members } = record {
            let mut nodes = vec![*ids
                .get(canonical)
                .with_context(|| format!("undeclared infoset node '{}'", canonical))?];
            for m in members {
                nodes.push(
                    *ids.get(m)
                        .with_context(|| format!("undeclared infoset node '{}'", m))?,
                );
            }
            declare(nodes, canonical.clone(), &mut infosets, &mut membership)?;
        }
    }
    for &v in bfs {
        if matches!(graph[v].kind, Kind::Decision { .. }) && membership[v.index()].is_none() {
            declare(vec![v], graph[v].id.clone(), &mut infosets, &mut membership)?;
        }
    }
    Ok((infosets, membership))
}

/// For every node and player, the player's last sequence strictly above it.
fn ancestry(
    graph: &DiGraph<Spot, usize>,
    bfs: &[NodeIndex],
    membership: &[Option<InfosetId>],
    players: usize,
) -> Vec<Vec<Sequence>> {
    let mut table = vec![Vec::new(); graph.node_count()];
    table[bfs[0].index()] = (1..=players).map(|p| (p - 1, 0)).collect();
    for &v in bfs {
        for edge in graph.edges(v) {
            let mut inherited = table[v.index()].clone();
            if let Kind::Decision { player } = graph[v].kind {
                inherited[player - 1] = (membership[v.index()].expect("partitioned"), *edge.weight());
            }
            table[edge.target().index()] = inherited;
        }
    }
    table
}
