// src/plan/model.rs

/// How tasks of the source vertex feed tasks of the destination vertex.
///
/// The coordinator only logs this (per edge, when the graph is built) and
/// keeps it on [`DagGraph::edges`](crate::dag::DagGraph::edges) for the
/// shuffle layer, which does the actual routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPattern {
    OneToOne,
    #[default]
    Bipartite,
    Broadcast,
}

/// Stability of the data a source vertex produces for an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceType {
    #[default]
    Stable,
    StablePersisted,
    Ephemeral,
}

/// Resource and locality hints for the tasks of one vertex.
///
/// Passed through untouched to the task layer when the vertex starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceHint {
    pub memory_mb: u32,
    pub virtual_cores: u32,
    pub hosts: Vec<String>,
    pub racks: Vec<String>,
}

impl ResourceHint {
    pub fn new(memory_mb: u32, virtual_cores: u32) -> Self {
        Self {
            memory_mb,
            virtual_cores,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    pub fn with_rack(mut self, rack: impl Into<String>) -> Self {
        self.racks.push(rack.into());
        self
    }
}

/// One stage of the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexPlan {
    /// Unique name within the plan; edges refer to vertices by this name.
    pub name: String,
    /// Number of parallel tasks. Zero is allowed: such a vertex succeeds as
    /// soon as it starts.
    pub num_tasks: usize,
    pub resource: ResourceHint,
}

impl VertexPlan {
    pub fn new(name: impl Into<String>, num_tasks: usize) -> Self {
        Self {
            name: name.into(),
            num_tasks,
            resource: ResourceHint::default(),
        }
    }

    pub fn with_resource(mut self, resource: ResourceHint) -> Self {
        self.resource = resource;
        self
    }
}

/// A data dependency: `destination` consumes the output of `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgePlan {
    pub id: String,
    pub source: String,
    pub destination: String,
    pub connection_pattern: ConnectionPattern,
    pub source_type: SourceType,
}

impl EdgePlan {
    /// Bipartite edge over stable source data, the common case.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            destination: destination.into(),
            connection_pattern: ConnectionPattern::default(),
            source_type: SourceType::default(),
        }
    }

    pub fn with_connection_pattern(mut self, pattern: ConnectionPattern) -> Self {
        self.connection_pattern = pattern;
        self
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }
}

/// The whole submitted job: vertices in ordinal order plus edges.
///
/// The position of a vertex in `vertices` becomes its
/// [`VertexId`](crate::engine::VertexId).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DagPlan {
    pub name: String,
    pub vertices: Vec<VertexPlan>,
    pub edges: Vec<EdgePlan>,
}

impl DagPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_vertex(mut self, vertex: VertexPlan) -> Self {
        self.vertices.push(vertex);
        self
    }

    pub fn with_edge(mut self, edge: EdgePlan) -> Self {
        self.edges.push(edge);
        self
    }

    /// Look up a vertex descriptor by name.
    pub fn vertex(&self, name: &str) -> Option<&VertexPlan> {
        self.vertices.iter().find(|v| v.name == name)
    }
}
