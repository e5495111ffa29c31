//! The workflow AST — an immutable-by-convention arena of entities keyed by stable string
//! IDs. Cross-references (`connection.from.node`, `instance.parent.id`, the node type a
//! node instance refers to) are plain `String` keys resolved through the maps below, never
//! pointers, so `Workflow` stays `Clone + Serialize + Send + Sync` and the analyzer and
//! emitter can both read it without lifetime entanglement.
//!
//! Iteration order on `nodes`/`connections` equals insertion order (an `IndexMap`-style
//! guarantee implemented here with a parallel `Vec<String>` of keys), since re-emission
//! and topological tie-breaking both depend on deterministic ordering.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved pseudo-node name for the workflow's external entry point.
pub const START_NODE: &str = "Start";
/// Reserved pseudo-node name for the workflow's external exit point.
pub const EXIT_NODE: &str = "Exit";
/// External step input every workflow receives.
pub const EXECUTE_PORT: &str = "execute";
/// External step outputs every workflow may produce.
pub const ON_SUCCESS_PORT: &str = "onSuccess";
pub const ON_FAILURE_PORT: &str = "onFailure";
/// Mandatory scoped step ports.
pub const SCOPE_START_PORT: &str = "start";
pub const SCOPE_SUCCESS_PORT: &str = "success";
pub const SCOPE_FAILURE_PORT: &str = "failure";

/// An insertion-ordered map keyed by `String`. Lookup is `O(1)`; iteration preserves
/// insertion order. Used wherever determinism depends on stable ordering (node sets,
/// connection sets, port maps).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderedMap<V> {
    order: Vec<String>,
    map: HashMap<String, V>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self { order: Vec::new(), map: HashMap::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if !self.map.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.map.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.map.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.order.iter().map(move |k| (k.as_str(), self.map.get(k).unwrap()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Semantic data type carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Function,
    Step,
    Any,
}

/// Strategy a node uses to decide whether it is ready to run, given its connected inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecuteWhen {
    Conjunction,
    Disjunction,
    Custom,
}

/// Strategy for coalescing multiple writes that target the same exit port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// `||` — first truthy value wins. Used for `STEP` ports.
    LogicalOr,
    /// `??` — first defined value wins. Used for data ports.
    NullishCoalesce,
}

/// What kind of thing a node type represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeVariant {
    Function,
    Workflow,
    ImportedWorkflow,
    MapIterator,
}

/// Placement hint for a port in visual layout (parsed, never interpreted by the core).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    Top,
    Bottom,
}

/// A port declaration on a node type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDef {
    pub name: String,
    pub data_type: DataType,
    /// Host-language type string, when the assembler could resolve one from the host
    /// function's signature. `None` defaults to [`DataType::Any`] semantics.
    pub host_type: Option<String>,
    pub optional: bool,
    pub default: Option<String>,
    pub expression: bool,
    pub hidden: bool,
    pub failure: bool,
    pub is_control_flow: bool,
    pub scope: Option<String>,
    pub merge_strategy: Option<MergeStrategy>,
    pub order: Option<i64>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub placement: Option<Placement>,
}

impl PortDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            host_type: None,
            optional: false,
            default: None,
            expression: false,
            hidden: false,
            failure: false,
            is_control_flow: false,
            scope: None,
            merge_strategy: None,
            order: None,
            label: None,
            description: None,
            placement: None,
        }
    }

    pub fn step(name: impl Into<String>) -> Self {
        let mut p = Self::new(name, DataType::Step);
        p.is_control_flow = true;
        p
    }
}

/// Pull-execution default declared on a node type, overridable per instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullExecutionConfig {
    pub trigger_port: String,
    pub label: Option<String>,
    pub description: Option<String>,
}

/// A node-type template: the reusable shape a node instance binds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    pub name: String,
    pub function_name: String,
    pub inputs: OrderedMap<PortDef>,
    pub outputs: OrderedMap<PortDef>,
    pub has_success_port: bool,
    pub has_failure_port: bool,
    pub execute_when: ExecuteWhen,
    pub is_async: bool,
    pub variant: NodeVariant,
    pub scopes: Vec<String>,
    pub expression: bool,
    pub import_source: Option<String>,
    pub default_pull_execution: Option<PullExecutionConfig>,
}

impl NodeType {
    pub fn new(name: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function_name: function_name.into(),
            inputs: OrderedMap::new(),
            outputs: OrderedMap::new(),
            has_success_port: false,
            has_failure_port: false,
            execute_when: ExecuteWhen::Conjunction,
            is_async: false,
            variant: NodeVariant::Function,
            scopes: Vec::new(),
            expression: false,
            import_source: None,
            default_pull_execution: None,
        }
    }

    /// A node type is *branching* if it declares more than one control-flow output —
    /// `onSuccess` plus `onFailure`, or two or more custom `@step` ports — so a single
    /// `onSuccess`-only type (the common case) runs unconditionally rather than opening a
    /// branch region.
    pub fn is_branching_type(&self) -> bool {
        let mut control_outputs = self.has_success_port as usize + self.has_failure_port as usize;
        control_outputs += self
            .outputs
            .iter()
            .filter(|(name, p)| p.is_control_flow && *name != "onSuccess" && *name != "onFailure")
            .count();
        control_outputs >= 2
    }

    /// A scope this type opens by attribute or by bearing scoped output ports.
    pub fn opens_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
            || self.outputs.iter().any(|(_, p)| p.scope.as_deref() == Some(scope))
    }

    /// Whether `scope` is a *per-port* scope (has scoped output ports) as opposed to a
    /// node-level scope (declared only via the `scopes` attribute).
    pub fn is_per_port_scope(&self, scope: &str) -> bool {
        self.outputs.iter().any(|(_, p)| p.scope.as_deref() == Some(scope))
    }
}

/// A parent-scope reference on a node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: String,
    pub scope: String,
}

/// Pull-execution configuration on a node instance (overrides the type default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullExecution {
    pub trigger_port: String,
}

/// Per-instance visual/behavioral configuration. Everything here is either cosmetic
/// (position, colour, icon, tags, labels) or a behavioral override (`execute_when`,
/// `pull_execution`, `parent`); the core only acts on the behavioral fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub position: Option<(i64, i64)>,
    pub label: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub tags: Vec<(String, Option<String>)>,
    pub minimized: bool,
    pub execute_when: Option<ExecuteWhen>,
    pub custom_expression: Option<String>,
    pub port_order: HashMap<String, i64>,
    pub port_label: HashMap<String, String>,
    pub port_expressions: HashMap<String, String>,
    pub pull_execution: Option<PullExecution>,
    pub parent: Option<ParentRef>,
}

/// A node instance: a reference to a [`NodeType`] plus instance-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    pub id: String,
    pub type_name: String,
    pub config: InstanceConfig,
}

impl NodeInstance {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self { id: id.into(), type_name: type_name.into(), config: InstanceConfig::default() }
    }
}

/// One side of a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: String,
    pub port: String,
    pub scope: Option<String>,
}

impl Endpoint {
    pub fn new(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self { node: node.into(), port: port.into(), scope: None }
    }

    pub fn scoped(node: impl Into<String>, port: impl Into<String>, scope: impl Into<String>) -> Self {
        Self { node: node.into(), port: port.into(), scope: Some(scope.into()) }
    }
}

/// A directed edge between two typed ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: Endpoint,
    pub to: Endpoint,
}

/// A control-flow route taken by a `@path` macro step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Ok,
    Fail,
}

/// One step in a `@path` macro.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathStep {
    pub node: String,
    pub route: Option<Route>,
}

/// A `@path` sugar macro: a compact encoding of a run of control-flow connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMacro {
    pub steps: Vec<PathStep>,
}

/// A `@map` sugar macro: a compact encoding of a map-iterator child wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapMacro {
    pub instance_id: String,
    pub child_id: String,
    pub source_node: String,
    pub source_port: String,
    pub input_port: Option<String>,
    pub output_port: Option<String>,
}

/// Either sugar macro kind, preserved for round-trip re-emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Macro {
    Path(PathMacro),
    Map(MapMacro),
}

/// A named scope mapping to its ordered child instance IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub name: String,
    pub children: Vec<String>,
}

/// A complete workflow: node types, instances, connections, scopes, and any preserved
/// sugar macros. This is the unit the analyzer, validator, and emitter all consume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub node_types: OrderedMap<NodeType>,
    pub instances: OrderedMap<NodeInstance>,
    pub connections: Vec<Connection>,
    pub scopes: Vec<Scope>,
    pub macros: Vec<Macro>,
    /// Declared synchronous/asynchronous intent from the host annotation, before any
    /// validator-driven promotion to async.
    pub user_specified_async: bool,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn node_type_for(&self, instance_id: &str) -> Option<&NodeType> {
        let inst = self.instances.get(instance_id)?;
        self.node_types.get(&inst.type_name)
    }

    /// All non-reserved instance IDs in declaration order.
    pub fn instance_ids(&self) -> Vec<&str> {
        self.instances.keys().collect()
    }

    /// Children declared for a scope name across all `scopes` entries plus any instance
    /// whose `config.parent.scope` names it directly (the two representations are
    /// reconciled by the assembler but both are honoured here defensively).
    pub fn children_of(&self, parent_id: &str, scope_name: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (id, inst) in self.instances.iter() {
            if let Some(parent) = &inst.config.parent {
                if parent.id == parent_id && parent.scope == scope_name {
                    out.push(id);
                }
            }
        }
        out
    }
}
