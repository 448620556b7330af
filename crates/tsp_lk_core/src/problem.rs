//! TSPLIB 95 problem-file model and reader.
//!
//! The reader accepts the subset of TSPLIB the solver operates on: TSP, ATSP,
//! HCP, HPP and CVRP instances with coordinate, explicit-matrix, or edge-list
//! weights. Asymmetric instances are rewritten to symmetric form by node
//! doubling at load time, and HPP instances get the usual dummy node, so the
//! search engine only ever sees a symmetric complete graph.

use std::{
    fs,
    path::Path,
};

use crate::{Error, Result};

const SECTION_END_MARKER: &str = "-1";
const GEO_PI: f64 = 3.141592;
const GEO_RADIUS: f64 = 6378.388;
/// Weight of an HCP/HPP graph edge; non-edges cost one more.
const HCP_EDGE_WEIGHT: i64 = 1;

/// Problem `TYPE` values accepted by the solver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProblemType {
    Tsp,
    Atsp,
    Hcp,
    Hpp,
    Cvrp,
}

impl ProblemType {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "TSP" => Some(Self::Tsp),
            "ATSP" => Some(Self::Atsp),
            "HCP" => Some(Self::Hcp),
            "HPP" => Some(Self::Hpp),
            "CVRP" => Some(Self::Cvrp),
            _ => None,
        }
    }
}

/// `EDGE_WEIGHT_TYPE` values accepted by the solver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdgeWeightType {
    Euc2d,
    Ceil2d,
    Man2d,
    Max2d,
    Geo,
    Att,
    Explicit,
    Special,
}

impl EdgeWeightType {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "EUC_2D" => Some(Self::Euc2d),
            "CEIL_2D" => Some(Self::Ceil2d),
            "MAN_2D" => Some(Self::Man2d),
            "MAX_2D" => Some(Self::Max2d),
            "GEO" => Some(Self::Geo),
            "ATT" => Some(Self::Att),
            "EXPLICIT" => Some(Self::Explicit),
            "SPECIAL" => Some(Self::Special),
            _ => None,
        }
    }
}

/// `EDGE_WEIGHT_FORMAT` values.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdgeWeightFormat {
    FullMatrix,
    UpperRow,
    LowerRow,
    UpperDiagRow,
    LowerDiagRow,
    UpperCol,
    LowerCol,
    UpperDiagCol,
    LowerDiagCol,
}

impl EdgeWeightFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "FULL_MATRIX" => Some(Self::FullMatrix),
            "UPPER_ROW" => Some(Self::UpperRow),
            "LOWER_ROW" => Some(Self::LowerRow),
            "UPPER_DIAG_ROW" => Some(Self::UpperDiagRow),
            "LOWER_DIAG_ROW" => Some(Self::LowerDiagRow),
            "UPPER_COL" => Some(Self::UpperCol),
            "LOWER_COL" => Some(Self::LowerCol),
            "UPPER_DIAG_COL" => Some(Self::UpperDiagCol),
            "LOWER_DIAG_COL" => Some(Self::LowerDiagCol),
            _ => None,
        }
    }

    fn entry_count(self, n: usize) -> usize {
        match self {
            Self::FullMatrix => n * n,
            Self::UpperRow | Self::LowerRow | Self::UpperCol | Self::LowerCol => n * (n - 1) / 2,
            Self::UpperDiagRow | Self::LowerDiagRow | Self::UpperDiagCol | Self::LowerDiagCol => {
                n * (n + 1) / 2
            }
        }
    }
}

/// `EDGE_DATA_FORMAT` values (HCP/HPP instances).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdgeDataFormat {
    EdgeList,
    AdjList,
}

impl EdgeDataFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "EDGE_LIST" => Some(Self::EdgeList),
            "ADJ_LIST" => Some(Self::AdjList),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
enum Weights {
    Coords {
        kind: EdgeWeightType,
        points: Vec<(f64, f64)>,
    },
    /// Full row-major matrix, symmetric after loading.
    Matrix { entries: Vec<i64> },
    /// Sorted adjacency lists; present edges cost [`HCP_EDGE_WEIGHT`].
    Graph { adjacent: Vec<Vec<u32>> },
}

/// A loaded problem instance, already in the symmetric form the search runs on.
#[derive(Clone, Debug)]
pub struct Problem {
    pub name: String,
    pub problem_type: ProblemType,
    /// Node count the solver works with (doubled for ATSP, +1 for HPP).
    pub dimension: usize,
    /// Node count of the instance as read from the file.
    pub base_dimension: usize,
    weights: Weights,
    pub fixed_edges: Vec<(usize, usize)>,
    pub depots: Vec<usize>,
    pub demands: Vec<i64>,
    pub capacity: Option<i64>,
}

impl Problem {
    /// Reads and parses a TSPLIB problem file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parses problem text held in memory. `origin` names the source in
    /// error messages.
    pub fn from_text(text: &str, origin: &str) -> Result<Self> {
        Self::parse(text, origin)
    }

    /// Whether the instance was asymmetric before the node-doubling rewrite.
    pub fn is_asymmetric(&self) -> bool {
        self.problem_type == ProblemType::Atsp
    }

    /// Node coordinates, when the weight function is coordinate-based.
    pub fn coordinates(&self) -> Option<&[(f64, f64)]> {
        match &self.weights {
            Weights::Coords { points, .. } => Some(points),
            _ => None,
        }
    }

    /// Raw edge weight between two solver nodes. Symmetric.
    pub fn distance(&self, i: usize, j: usize) -> i64 {
        debug_assert!(i < self.dimension && j < self.dimension);
        if i == j {
            return 0;
        }
        match &self.weights {
            Weights::Coords { kind, points } => {
                coord_distance(*kind, points[i], points[j])
            }
            Weights::Matrix { entries } => entries[i * self.dimension + j],
            Weights::Graph { adjacent } => {
                if adjacent[i].binary_search(&(j as u32)).is_ok() {
                    HCP_EDGE_WEIGHT
                } else {
                    HCP_EDGE_WEIGHT + 1
                }
            }
        }
    }

    /// Exact cost of a cyclic node sequence.
    pub fn tour_cost(&self, tour: &[usize]) -> i64 {
        let mut cost = 0;
        for (idx, &v) in tour.iter().enumerate() {
            let w = tour[(idx + 1) % tour.len()];
            cost += self.distance(v, w);
        }
        cost
    }

    /// Maps a solver tour back to the node sequence of the instance as read.
    ///
    /// For symmetric instances this strips nothing. For asymmetric instances
    /// the doubled tour alternates originals and copies; the walk direction is
    /// chosen so every original is immediately followed by its copy, which
    /// recovers the directed tour of the original problem. The HPP dummy node
    /// is dropped, leaving the open path in order.
    pub fn reduce_tour(&self, tour: &[usize]) -> Vec<usize> {
        match self.problem_type {
            ProblemType::Atsp => {
                let n = self.base_dimension;
                let forward_ok = tour
                    .iter()
                    .enumerate()
                    .all(|(idx, &v)| v >= n || tour[(idx + 1) % tour.len()] == v + n);
                let originals = |seq: &mut dyn Iterator<Item = usize>| -> Vec<usize> {
                    seq.filter(|&v| v < n).collect()
                };
                if forward_ok {
                    originals(&mut tour.iter().copied())
                } else {
                    originals(&mut tour.iter().rev().copied())
                }
            }
            ProblemType::Hpp => {
                let dummy = self.dimension - 1;
                let start = tour.iter().position(|&v| v == dummy).unwrap_or(0);
                (1..tour.len())
                    .map(|offset| tour[(start + offset) % tour.len()])
                    .collect()
            }
            _ => tour.to_vec(),
        }
    }

    /// Inverse of [`Problem::reduce_tour`]: lifts an instance-space tour into
    /// the space the solver works in.
    pub fn expand_tour(&self, base: &[usize]) -> Vec<usize> {
        match self.problem_type {
            ProblemType::Atsp => {
                let n = self.base_dimension;
                base.iter().flat_map(|&v| [v, v + n]).collect()
            }
            ProblemType::Hpp => {
                let mut tour = base.to_vec();
                tour.push(self.dimension - 1);
                tour
            }
            _ => base.to_vec(),
        }
    }

    fn parse(text: &str, origin: &str) -> Result<Self> {
        let mut parser = ProblemParser::new(origin);
        parser.run(text)?;
        parser.finish()
    }
}

fn nint(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

fn geo_radians(coord: f64) -> f64 {
    let deg = coord.trunc();
    let min = coord - deg;
    GEO_PI * (deg + 5.0 * min / 3.0) / 180.0
}

fn coord_distance(kind: EdgeWeightType, a: (f64, f64), b: (f64, f64)) -> i64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    match kind {
        EdgeWeightType::Euc2d => nint((dx * dx + dy * dy).sqrt()),
        EdgeWeightType::Ceil2d => (dx * dx + dy * dy).sqrt().ceil() as i64,
        EdgeWeightType::Man2d => nint(dx.abs() + dy.abs()),
        EdgeWeightType::Max2d => nint(dx.abs()).max(nint(dy.abs())),
        EdgeWeightType::Att => {
            let r = ((dx * dx + dy * dy) / 10.0).sqrt();
            let t = nint(r);
            if (t as f64) < r { t + 1 } else { t }
        }
        EdgeWeightType::Geo => {
            let lat_a = geo_radians(a.0);
            let lng_a = geo_radians(a.1);
            let lat_b = geo_radians(b.0);
            let lng_b = geo_radians(b.1);
            let q1 = (lng_a - lng_b).cos();
            let q2 = (lat_a - lat_b).cos();
            let q3 = (lat_a + lat_b).cos();
            (GEO_RADIUS * (0.5 * ((1.0 + q1) * q2 - (1.0 - q1) * q3)).acos() + 1.0) as i64
        }
        EdgeWeightType::Explicit | EdgeWeightType::Special => {
            unreachable!("non-coordinate weight kind stored as coordinates")
        }
    }
}

struct ProblemParser {
    origin: String,
    name: String,
    problem_type: Option<ProblemType>,
    dimension: Option<usize>,
    edge_weight_type: Option<EdgeWeightType>,
    edge_weight_format: Option<EdgeWeightFormat>,
    edge_data_format: Option<EdgeDataFormat>,
    capacity: Option<i64>,
    points: Vec<(f64, f64)>,
    weight_tokens: Vec<i64>,
    edges: Vec<(usize, usize)>,
    fixed_edges: Vec<(usize, usize)>,
    depots: Vec<usize>,
    demands: Vec<(usize, i64)>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Section {
    None,
    NodeCoords,
    EdgeWeights,
    EdgeData,
    FixedEdges,
    Depots,
    Demands,
    DisplayData,
}

impl ProblemParser {
    fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            name: "PROBLEM".to_string(),
            problem_type: None,
            dimension: None,
            edge_weight_type: None,
            edge_weight_format: None,
            edge_data_format: None,
            capacity: None,
            points: Vec::new(),
            weight_tokens: Vec::new(),
            edges: Vec::new(),
            fixed_edges: Vec::new(),
            depots: Vec::new(),
            demands: Vec::new(),
        }
    }

    fn err(&self, line_no: usize, message: impl Into<String>) -> Error {
        Error::parse(&self.origin, line_no, message)
    }

    fn run(&mut self, text: &str) -> Result<()> {
        let mut section = Section::None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if line.eq_ignore_ascii_case("EOF") {
                break;
            }

            if let Some(next) = self.try_header(line, line_no)? {
                section = next;
                continue;
            }

            match section {
                Section::None => {
                    return Err(self.err(line_no, format!("unexpected line '{line}'")));
                }
                Section::NodeCoords => self.push_node_coord(line, line_no)?,
                Section::EdgeWeights => {
                    for token in line.split_whitespace() {
                        let value = token.parse::<i64>().map_err(|e| {
                            self.err(line_no, format!("bad edge weight '{token}': {e}"))
                        })?;
                        self.weight_tokens.push(value);
                    }
                }
                Section::EdgeData => self.push_edge_data(line, line_no)?,
                Section::FixedEdges => {
                    if line == SECTION_END_MARKER {
                        section = Section::None;
                        continue;
                    }
                    let (from, to) = self.parse_id_pair(line, line_no)?;
                    self.fixed_edges.push((from, to));
                }
                Section::Depots => {
                    if line == SECTION_END_MARKER {
                        section = Section::None;
                        continue;
                    }
                    self.depots.push(self.parse_id(line, line_no)?);
                }
                Section::Demands => {
                    let mut tokens = line.split_whitespace();
                    let id = tokens
                        .next()
                        .ok_or_else(|| self.err(line_no, "empty demand line"))?;
                    let demand = tokens
                        .next()
                        .ok_or_else(|| self.err(line_no, "demand line missing value"))?;
                    let id = self.parse_id(id, line_no)?;
                    let demand = demand.parse::<i64>().map_err(|e| {
                        self.err(line_no, format!("bad demand '{demand}': {e}"))
                    })?;
                    self.demands.push((id, demand));
                }
                Section::DisplayData => {
                    // Display coordinates have no bearing on the search.
                }
            }
        }

        Ok(())
    }

    fn try_header(&mut self, line: &str, line_no: usize) -> Result<Option<Section>> {
        let keyword = line
            .split([':', '='])
            .next()
            .unwrap_or(line)
            .trim()
            .to_ascii_uppercase();

        let section = match keyword.as_str() {
            "NODE_COORD_SECTION" => Some(Section::NodeCoords),
            "EDGE_WEIGHT_SECTION" => Some(Section::EdgeWeights),
            "EDGE_DATA_SECTION" => Some(Section::EdgeData),
            "FIXED_EDGES_SECTION" => Some(Section::FixedEdges),
            "DEPOT_SECTION" => Some(Section::Depots),
            "DEMAND_SECTION" => Some(Section::Demands),
            "DISPLAY_DATA_SECTION" => Some(Section::DisplayData),
            _ => None,
        };
        if let Some(section) = section {
            return Ok(Some(section));
        }

        let Some((_, value)) = line.split_once([':', '=']) else {
            return Ok(None);
        };
        let value = value.trim();

        match keyword.as_str() {
            "NAME" => self.name = value.to_string(),
            "COMMENT" => {}
            "TYPE" => {
                self.problem_type = Some(ProblemType::parse(value).ok_or_else(|| {
                    self.err(line_no, format!("unsupported problem TYPE '{value}'"))
                })?);
            }
            "DIMENSION" => {
                let dim = value.parse::<usize>().map_err(|e| {
                    self.err(line_no, format!("bad DIMENSION '{value}': {e}"))
                })?;
                if dim == 0 {
                    return Err(self.err(line_no, "DIMENSION must be positive"));
                }
                self.dimension = Some(dim);
            }
            "EDGE_WEIGHT_TYPE" => {
                self.edge_weight_type = Some(EdgeWeightType::parse(value).ok_or_else(|| {
                    self.err(line_no, format!("unsupported EDGE_WEIGHT_TYPE '{value}'"))
                })?);
            }
            "EDGE_WEIGHT_FORMAT" => {
                self.edge_weight_format =
                    Some(EdgeWeightFormat::parse(value).ok_or_else(|| {
                        self.err(line_no, format!("unsupported EDGE_WEIGHT_FORMAT '{value}'"))
                    })?);
            }
            "EDGE_DATA_FORMAT" => {
                self.edge_data_format = Some(EdgeDataFormat::parse(value).ok_or_else(|| {
                    self.err(line_no, format!("unsupported EDGE_DATA_FORMAT '{value}'"))
                })?);
            }
            "NODE_COORD_TYPE" | "DISPLAY_DATA_TYPE" => {}
            "CAPACITY" => {
                self.capacity = Some(value.parse::<i64>().map_err(|e| {
                    self.err(line_no, format!("bad CAPACITY '{value}': {e}"))
                })?);
            }
            _ => {
                return Err(self.err(line_no, format!("unknown keyword '{keyword}'")));
            }
        }

        Ok(Some(Section::None))
    }

    fn parse_id(&self, token: &str, line_no: usize) -> Result<usize> {
        let id = token
            .parse::<usize>()
            .map_err(|e| self.err(line_no, format!("bad node id '{token}': {e}")))?;
        let dim = self.dimension.unwrap_or(usize::MAX);
        if id == 0 || id > dim {
            return Err(self.err(line_no, format!("node id {id} out of range 1..={dim}")));
        }
        Ok(id - 1)
    }

    fn parse_id_pair(&self, line: &str, line_no: usize) -> Result<(usize, usize)> {
        let mut tokens = line.split_whitespace();
        let a = tokens
            .next()
            .ok_or_else(|| self.err(line_no, "expected a node pair"))?;
        let b = tokens
            .next()
            .ok_or_else(|| self.err(line_no, "node pair missing second id"))?;
        Ok((self.parse_id(a, line_no)?, self.parse_id(b, line_no)?))
    }

    fn push_node_coord(&mut self, line: &str, line_no: usize) -> Result<()> {
        let mut tokens = line.split_whitespace();
        let id = tokens
            .next()
            .ok_or_else(|| self.err(line_no, "empty coordinate line"))?;
        let id = self.parse_id(id, line_no)?;
        let x = tokens
            .next()
            .ok_or_else(|| self.err(line_no, "coordinate line missing x"))?;
        let y = tokens
            .next()
            .ok_or_else(|| self.err(line_no, "coordinate line missing y"))?;
        let x = x
            .parse::<f64>()
            .map_err(|e| self.err(line_no, format!("bad coordinate '{x}': {e}")))?;
        let y = y
            .parse::<f64>()
            .map_err(|e| self.err(line_no, format!("bad coordinate '{y}': {e}")))?;

        if self.points.len() <= id {
            self.points.resize(id + 1, (0.0, 0.0));
        }
        self.points[id] = (x, y);
        Ok(())
    }

    fn push_edge_data(&mut self, line: &str, line_no: usize) -> Result<()> {
        let format = self
            .edge_data_format
            .ok_or_else(|| self.err(line_no, "EDGE_DATA_SECTION without EDGE_DATA_FORMAT"))?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match format {
            EdgeDataFormat::EdgeList => {
                if tokens.first() == Some(&SECTION_END_MARKER) {
                    return Ok(());
                }
                if tokens.len() < 2 {
                    return Err(self.err(line_no, "edge list entry needs two node ids"));
                }
                let from = self.parse_id(tokens[0], line_no)?;
                let to = self.parse_id(tokens[1], line_no)?;
                self.edges.push((from, to));
            }
            EdgeDataFormat::AdjList => {
                if tokens.first() == Some(&SECTION_END_MARKER) {
                    return Ok(());
                }
                let node = self.parse_id(tokens[0], line_no)?;
                for token in &tokens[1..] {
                    if *token == SECTION_END_MARKER {
                        break;
                    }
                    let neighbor = self.parse_id(token, line_no)?;
                    self.edges.push((node, neighbor));
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Problem> {
        let problem_type = self
            .problem_type
            .ok_or_else(|| Error::invalid_data(format!("{}: missing TYPE", self.origin)))?;
        let n = self
            .dimension
            .ok_or_else(|| Error::invalid_data(format!("{}: missing DIMENSION", self.origin)))?;

        let mut demands = vec![0; n];
        for (id, demand) in &self.demands {
            if *id >= n {
                return Err(Error::invalid_data(format!(
                    "{}: demand for node {} exceeds DIMENSION {n}",
                    self.origin,
                    *id + 1
                )));
            }
            demands[*id] = *demand;
        }

        match problem_type {
            ProblemType::Hcp | ProblemType::Hpp => self.finish_graph(problem_type, n, demands),
            ProblemType::Atsp => self.finish_asymmetric(n, demands),
            ProblemType::Tsp | ProblemType::Cvrp => self.finish_symmetric(problem_type, n, demands),
        }
    }

    fn finish_graph(self, problem_type: ProblemType, n: usize, demands: Vec<i64>) -> Result<Problem> {
        if self.edges.is_empty() {
            return Err(Error::invalid_data(format!(
                "{}: {:?} instance without EDGE_DATA_SECTION",
                self.origin, problem_type
            )));
        }

        // HPP gets a dummy node adjacent to everything, turning the path
        // problem into a cycle problem on n + 1 nodes.
        let dimension = if problem_type == ProblemType::Hpp { n + 1 } else { n };
        let mut adjacent = vec![Vec::new(); dimension];
        for (from, to) in &self.edges {
            if *from >= n || *to >= n {
                return Err(Error::invalid_data(format!(
                    "{}: edge ({}, {}) exceeds DIMENSION {n}",
                    self.origin,
                    *from + 1,
                    *to + 1
                )));
            }
            if from == to {
                continue;
            }
            adjacent[*from].push(*to as u32);
            adjacent[*to].push(*from as u32);
        }
        if problem_type == ProblemType::Hpp {
            let dummy = n;
            for node in 0..n {
                adjacent[node].push(dummy as u32);
                adjacent[dummy].push(node as u32);
            }
        }
        for list in &mut adjacent {
            list.sort_unstable();
            list.dedup();
        }

        Ok(Problem {
            name: self.name,
            problem_type,
            dimension,
            base_dimension: n,
            weights: Weights::Graph { adjacent },
            fixed_edges: self.fixed_edges,
            depots: self.depots,
            demands,
            capacity: self.capacity,
        })
    }

    fn finish_symmetric(
        self,
        problem_type: ProblemType,
        n: usize,
        demands: Vec<i64>,
    ) -> Result<Problem> {
        let kind = self.edge_weight_type.ok_or_else(|| {
            Error::invalid_data(format!("{}: missing EDGE_WEIGHT_TYPE", self.origin))
        })?;

        let weights = if kind == EdgeWeightType::Explicit {
            Weights::Matrix {
                entries: self.expand_matrix(n)?,
            }
        } else {
            if self.points.len() != n {
                return Err(Error::invalid_data(format!(
                    "{}: DIMENSION is {n} but NODE_COORD_SECTION has {} nodes",
                    self.origin,
                    self.points.len()
                )));
            }
            Weights::Coords {
                kind,
                points: self.points,
            }
        };

        Ok(Problem {
            name: self.name,
            problem_type,
            dimension: n,
            base_dimension: n,
            weights,
            fixed_edges: self.fixed_edges,
            depots: self.depots,
            demands,
            capacity: self.capacity,
        })
    }

    /// Jonker-Volgenant doubling: node `i` couples to its copy `i + n` at zero
    /// cost, copy `i + n` reaches original `j` at the directed cost `c(i, j)`,
    /// and same-side edges get a penalty weight no optimal tour can afford.
    fn finish_asymmetric(self, n: usize, demands: Vec<i64>) -> Result<Problem> {
        let kind = self.edge_weight_type.ok_or_else(|| {
            Error::invalid_data(format!("{}: missing EDGE_WEIGHT_TYPE", self.origin))
        })?;
        if kind != EdgeWeightType::Explicit {
            return Err(Error::invalid_data(format!(
                "{}: ATSP requires EXPLICIT edge weights",
                self.origin
            )));
        }

        let asym = self.expand_matrix(n)?;
        let max_entry = asym.iter().copied().max().unwrap_or(0).max(1);
        let penalty = max_entry
            .checked_mul(n as i64 + 1)
            .and_then(|v| v.checked_add(1))
            .ok_or_else(|| {
                Error::invalid_data(format!("{}: edge weights overflow the doubling penalty", self.origin))
            })?;

        let dim = 2 * n;
        let mut entries = vec![penalty; dim * dim];
        for i in 0..n {
            entries[i * dim + (i + n)] = 0;
            entries[(i + n) * dim + i] = 0;
            for j in 0..n {
                if i == j {
                    continue;
                }
                let cost = asym[i * n + j];
                entries[(i + n) * dim + j] = cost;
                entries[j * dim + (i + n)] = cost;
            }
        }
        for i in 0..dim {
            entries[i * dim + i] = 0;
        }

        Ok(Problem {
            name: self.name,
            problem_type: ProblemType::Atsp,
            dimension: dim,
            base_dimension: n,
            weights: Weights::Matrix { entries },
            fixed_edges: self.fixed_edges,
            depots: self.depots,
            demands,
            capacity: self.capacity,
        })
    }

    /// Expands any `EDGE_WEIGHT_FORMAT` into a full row-major matrix.
    fn expand_matrix(&self, n: usize) -> Result<Vec<i64>> {
        let format = self.edge_weight_format.ok_or_else(|| {
            Error::invalid_data(format!("{}: missing EDGE_WEIGHT_FORMAT", self.origin))
        })?;
        let expected = format.entry_count(n);
        if self.weight_tokens.len() != expected {
            return Err(Error::invalid_data(format!(
                "{}: EDGE_WEIGHT_SECTION has {} entries, expected {expected}",
                self.origin,
                self.weight_tokens.len()
            )));
        }

        let mut entries = vec![0i64; n * n];
        let mut tokens = self.weight_tokens.iter().copied();
        let mut fill = |i: usize, j: usize, value: i64| {
            entries[i * n + j] = value;
            if format != EdgeWeightFormat::FullMatrix {
                entries[j * n + i] = value;
            }
        };

        match format {
            EdgeWeightFormat::FullMatrix => {
                for i in 0..n {
                    for j in 0..n {
                        fill(i, j, tokens.next().expect("counted entries"));
                    }
                }
            }
            EdgeWeightFormat::UpperRow => {
                for i in 0..n {
                    for j in i + 1..n {
                        fill(i, j, tokens.next().expect("counted entries"));
                    }
                }
            }
            EdgeWeightFormat::LowerRow => {
                for i in 0..n {
                    for j in 0..i {
                        fill(i, j, tokens.next().expect("counted entries"));
                    }
                }
            }
            EdgeWeightFormat::UpperDiagRow => {
                for i in 0..n {
                    for j in i..n {
                        fill(i, j, tokens.next().expect("counted entries"));
                    }
                }
            }
            EdgeWeightFormat::LowerDiagRow => {
                for i in 0..n {
                    for j in 0..=i {
                        fill(i, j, tokens.next().expect("counted entries"));
                    }
                }
            }
            EdgeWeightFormat::UpperCol => {
                for j in 0..n {
                    for i in 0..j {
                        fill(i, j, tokens.next().expect("counted entries"));
                    }
                }
            }
            EdgeWeightFormat::LowerCol => {
                for j in 0..n {
                    for i in j + 1..n {
                        fill(i, j, tokens.next().expect("counted entries"));
                    }
                }
            }
            EdgeWeightFormat::UpperDiagCol => {
                for j in 0..n {
                    for i in 0..=j {
                        fill(i, j, tokens.next().expect("counted entries"));
                    }
                }
            }
            EdgeWeightFormat::LowerDiagCol => {
                for j in 0..n {
                    for i in j..n {
                        fill(i, j, tokens.next().expect("counted entries"));
                    }
                }
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::{EdgeWeightType, Problem, ProblemType, coord_distance};

    #[test]
    fn parse_euc2d_instance_and_distances() {
        let text = "\
NAME: square
TYPE: TSP
DIMENSION: 4
EDGE_WEIGHT_TYPE: EUC_2D
NODE_COORD_SECTION
1 0 0
2 3 0
3 3 4
4 0 4
EOF
";
        let problem = Problem::parse(text, "square.tsp").expect("parse problem");
        assert_eq!(problem.problem_type, ProblemType::Tsp);
        assert_eq!(problem.dimension, 4);
        assert_eq!(problem.distance(0, 1), 3);
        assert_eq!(problem.distance(1, 2), 4);
        assert_eq!(problem.distance(0, 2), 5);
        assert_eq!(problem.tour_cost(&[0, 1, 2, 3]), 14);
    }

    #[test]
    fn parse_explicit_lower_diag_row() {
        let text = "\
NAME: tri
TYPE: TSP
DIMENSION: 3
EDGE_WEIGHT_TYPE: EXPLICIT
EDGE_WEIGHT_FORMAT: LOWER_DIAG_ROW
EDGE_WEIGHT_SECTION
0
7 0
3 5 0
EOF
";
        let problem = Problem::parse(text, "tri.tsp").expect("parse problem");
        assert_eq!(problem.distance(0, 1), 7);
        assert_eq!(problem.distance(1, 0), 7);
        assert_eq!(problem.distance(0, 2), 3);
        assert_eq!(problem.distance(1, 2), 5);
    }

    #[test]
    fn parse_explicit_upper_row() {
        let text = "\
TYPE: TSP
DIMENSION: 3
EDGE_WEIGHT_TYPE: EXPLICIT
EDGE_WEIGHT_FORMAT: UPPER_ROW
EDGE_WEIGHT_SECTION
1 2
3
EOF
";
        let problem = Problem::parse(text, "tri.tsp").expect("parse problem");
        assert_eq!(problem.distance(0, 1), 1);
        assert_eq!(problem.distance(0, 2), 2);
        assert_eq!(problem.distance(2, 1), 3);
    }

    #[test]
    fn parse_rejects_wrong_entry_count() {
        let text = "\
TYPE: TSP
DIMENSION: 3
EDGE_WEIGHT_TYPE: EXPLICIT
EDGE_WEIGHT_FORMAT: FULL_MATRIX
EDGE_WEIGHT_SECTION
0 1 2 3
EOF
";
        let err = Problem::parse(text, "bad.tsp").expect_err("entry count should fail");
        assert!(err.to_string().contains("expected 9"));
    }

    #[test]
    fn parse_rejects_unknown_keyword_with_location() {
        let err = Problem::parse("TYPE: TSP\nWHAT_IS_THIS: 1\n", "bad.tsp")
            .expect_err("unknown keyword should fail");
        assert!(err.to_string().contains("bad.tsp:2"));
    }

    #[test]
    fn atsp_doubling_preserves_directed_tour_costs() {
        let text = "\
TYPE: ATSP
DIMENSION: 3
EDGE_WEIGHT_TYPE: EXPLICIT
EDGE_WEIGHT_FORMAT: FULL_MATRIX
EDGE_WEIGHT_SECTION
0 1 10
20 0 2
3 30 0
EOF
";
        let problem = Problem::parse(text, "tiny.atsp").expect("parse problem");
        assert_eq!(problem.dimension, 6);
        assert_eq!(problem.base_dimension, 3);
        assert!(problem.is_asymmetric());

        // Couplings are free, cross edges carry directed costs.
        assert_eq!(problem.distance(0, 3), 0);
        assert_eq!(problem.distance(3, 1), 1);
        assert_eq!(problem.distance(4, 2), 2);
        assert_eq!(problem.distance(5, 0), 3);

        // Doubled rendition of 0 -> 1 -> 2 -> 0 costs the directed sum 1 + 2 + 3.
        let doubled = [0, 3, 1, 4, 2, 5];
        assert_eq!(problem.tour_cost(&doubled), 6);
        assert_eq!(problem.reduce_tour(&doubled), vec![0, 1, 2]);

        // Walked the other way round, reduction recovers the same directed
        // tour: the copy must still follow its original.
        let reversed: Vec<usize> = doubled.iter().rev().copied().collect();
        assert_eq!(problem.reduce_tour(&reversed), vec![0, 1, 2]);
    }

    #[test]
    fn hcp_edges_cost_one_and_non_edges_two() {
        let text = "\
TYPE: HCP
DIMENSION: 4
EDGE_DATA_FORMAT: EDGE_LIST
EDGE_DATA_SECTION
1 2
2 3
3 4
4 1
-1
EOF
";
        let problem = Problem::parse(text, "cycle.hcp").expect("parse problem");
        assert_eq!(problem.distance(0, 1), 1);
        assert_eq!(problem.distance(1, 0), 1);
        assert_eq!(problem.distance(0, 2), 2);
        assert_eq!(problem.tour_cost(&[0, 1, 2, 3]), 4);
    }

    #[test]
    fn hpp_gains_a_dummy_adjacent_to_all() {
        let text = "\
TYPE: HPP
DIMENSION: 3
EDGE_DATA_FORMAT: ADJ_LIST
EDGE_DATA_SECTION
1 2 -1
2 3 -1
-1
EOF
";
        let problem = Problem::parse(text, "path.hpp").expect("parse problem");
        assert_eq!(problem.dimension, 4);
        assert_eq!(problem.distance(3, 0), 1);
        assert_eq!(problem.distance(3, 2), 1);
        // The path 0-1-2 closed through the dummy costs dimension.
        assert_eq!(problem.tour_cost(&[0, 1, 2, 3]), 4);
        assert_eq!(problem.reduce_tour(&[0, 1, 2, 3]), vec![0, 1, 2]);
    }

    #[test]
    fn geo_distance_matches_reference_formula() {
        let d = coord_distance(EdgeWeightType::Geo, (0.0, 0.0), (0.0, 90.0));
        assert_eq!(d, 10020);
    }

    #[test]
    fn att_distance_rounds_up_on_truncation() {
        let d = coord_distance(EdgeWeightType::Att, (0.0, 0.0), (10.0, 0.0));
        assert_eq!(d, 4);
    }

    #[test]
    fn ceil_distance_rounds_up() {
        let d = coord_distance(EdgeWeightType::Ceil2d, (0.0, 0.0), (1.1, 0.0));
        assert_eq!(d, 2);
    }
}
